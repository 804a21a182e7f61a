//! Ranking and derivation: turns normalized rows into the ordered records
//! a template promises.
//!
//! Pure and deterministic: the same input rows always give the same output
//! sequence. Steps run in a fixed order:
//!
//! 1. re-verify the filters the store already applied
//! 2. compute derived fields; rows whose derivation is undefined are dropped
//! 3. group and aggregate over the surviving rows
//! 4. stable sort by the declared keys (`Null` always last)
//! 5. truncate to top-K

use std::cmp::Ordering;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::model::{Record, Value};
use crate::sparql::ast::{Expr, OrderKey, Projection, SelectQuery};

/// Aggregate function over a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// Number of distinct non-null values of `var`.
    CountDistinct { var: String, alias: String },
    /// Mean of the numeric values of `var`; `Null` when there are none.
    Avg { var: String, alias: String },
}

impl Aggregate {
    pub fn alias(&self) -> &str {
        match self {
            Aggregate::CountDistinct { alias, .. } | Aggregate::Avg { alias, .. } => alias,
        }
    }

    pub fn input(&self) -> &str {
        match self {
            Aggregate::CountDistinct { var, .. } | Aggregate::Avg { var, .. } => var,
        }
    }
}

/// GROUP BY key plus aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    pub group_by: Vec<String>,
    pub aggregates: Vec<Aggregate>,
}

/// Everything the engine does to a template's rows after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derivation {
    pub filters: Vec<Expr>,
    pub derived: Vec<(String, Expr)>,
    pub aggregate: Option<AggregateSpec>,
    pub order: Vec<OrderKey>,
    pub limit: Option<usize>,
}

impl Derivation {
    /// Mirror a query: its top-level filters, projected expressions,
    /// ORDER BY and LIMIT.
    pub fn from_query(query: &SelectQuery) -> Self {
        Self {
            filters: query.pattern.top_level_filters().cloned().collect(),
            derived: query
                .projections
                .iter()
                .filter_map(|p| match p {
                    Projection::Expr { expr, alias } => Some((alias.clone(), expr.clone())),
                    Projection::Var(_) => None,
                })
                .collect(),
            aggregate: None,
            order: query.order_by.clone(),
            limit: query.limit,
        }
    }

    pub fn with_aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregate = Some(spec);
        self
    }

    pub fn order_asc(mut self, var: &str) -> Self {
        self.order.push(OrderKey { var: var.to_owned(), descending: false });
        self
    }

    pub fn order_desc(mut self, var: &str) -> Self {
        self.order.push(OrderKey { var: var.to_owned(), descending: true });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Apply a derivation to normalized rows.
pub fn apply(derivation: &Derivation, rows: Vec<Record>) -> Vec<Record> {
    let mut rows: Vec<Record> = rows
        .into_iter()
        .filter(|row| derivation.filters.iter().all(|f| f.holds(row)))
        .filter_map(|row| derive(&derivation.derived, row))
        .collect();

    if let Some(spec) = &derivation.aggregate {
        rows = aggregate(spec, &rows);
    }

    sort(&mut rows, &derivation.order);

    if let Some(k) = derivation.limit {
        rows.truncate(k);
    }
    rows
}

fn derive(derived: &[(String, Expr)], mut row: Record) -> Option<Record> {
    for (alias, expr) in derived {
        let value = expr.eval(&row)?;
        row.insert(alias.clone(), value);
    }
    Some(row)
}

type GroupKey = SmallVec<[String; 6]>;

struct GroupState {
    key_values: Vec<Value>,
    distinct: Vec<HashSet<String>>,
    sums: Vec<(f64, usize)>,
}

/// Group rows, preserving the order in which groups are first seen.
pub fn aggregate(spec: &AggregateSpec, rows: &[Record]) -> Vec<Record> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<GroupState> = Vec::new();

    for row in rows {
        let key: GroupKey = spec.group_by.iter().map(|v| row.value(v).group_key()).collect();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(GroupState {
                key_values: spec.group_by.iter().map(|v| row.value(v).clone()).collect(),
                distinct: vec![HashSet::new(); spec.aggregates.len()],
                sums: vec![(0.0, 0); spec.aggregates.len()],
            });
            groups.len() - 1
        });
        let state = &mut groups[slot];

        for (i, agg) in spec.aggregates.iter().enumerate() {
            let value = row.value(agg.input());
            match agg {
                Aggregate::CountDistinct { .. } => {
                    if !value.is_null() {
                        state.distinct[i].insert(value.group_key());
                    }
                }
                Aggregate::Avg { .. } => {
                    if let Some(n) = value.as_float() {
                        state.sums[i].0 += n;
                        state.sums[i].1 += 1;
                    }
                }
            }
        }
    }

    groups
        .into_iter()
        .map(|state| {
            let mut record: Record = spec
                .group_by
                .iter()
                .cloned()
                .zip(state.key_values)
                .collect();
            for (i, agg) in spec.aggregates.iter().enumerate() {
                let value = match agg {
                    Aggregate::CountDistinct { .. } => Value::Int(state.distinct[i].len() as i64),
                    Aggregate::Avg { .. } => match state.sums[i] {
                        (_, 0) => Value::Null,
                        (sum, n) => Value::Float(sum / n as f64),
                    },
                };
                record.insert(agg.alias(), value);
            }
            record
        })
        .collect()
}

/// Stable multi-key sort over `Value::order_cmp`. `Null` is last in
/// either direction.
pub fn sort(rows: &mut [Record], keys: &[OrderKey]) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in keys {
            let ord = compare(a.value(&key.var), b.value(&key.var), key.descending);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn compare(a: &Value, b: &Value, descending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.order_cmp(b);
            if descending { ord.reverse() } else { ord }
        }
    }
}
