//! SPARQL SELECT AST
//!
//! These types represent the queries the template library can produce.
//! Text constants are held raw; escaping happens only in `render`, which
//! is the single place an AST becomes query text.

use std::collections::BTreeSet;

use crate::model::{Record, Value};
use crate::{Error, Result};

/// A complete SELECT query.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub projections: Vec<Projection>,
    pub pattern: GroupPattern,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<usize>,
}

/// Single item in the SELECT clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `?name`
    Var(String),
    /// `((?a / ?b) AS ?alias)`
    Expr { expr: Expr, alias: String },
}

impl Projection {
    pub fn name(&self) -> &str {
        match self {
            Projection::Var(v) => v,
            Projection::Expr { alias, .. } => alias,
        }
    }
}

/// `{ ... }`: a basic graph pattern with nested optionals and filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPattern {
    pub elements: Vec<PatternElement>,
}

/// Element of a group pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    Triple(TriplePattern),
    Optional(GroupPattern),
    Filter(Expr),
}

/// `subject predicate object .`
#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: IriRef,
    pub object: PatternTerm,
}

/// Subject/object position in a triple pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternTerm {
    Var(String),
    Iri(IriRef),
    Const(Constant),
}

/// IRIs the templates reference. Local names are compile-time constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IriRef {
    /// `rdf:type`
    RdfType,
    /// `health:<local>`
    Health(&'static str),
}

/// Constant values that appear in patterns and filters.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Text(String),
    Number(f64),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Text(s) => Value::String(s.clone()),
            Constant::Number(n) => Value::Float(*n),
        }
    }
}

/// ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub var: String,
    pub descending: bool,
}

// ============================================================================
// Expressions
// ============================================================================

/// Filter / projection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String),
    Const(Constant),
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add, Sub, Mul, Div,
    // Comparison
    Eq, Neq, Lt, Lte, Gt, Gte,
    // Logical
    And, Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

// ============================================================================
// Fragment builders
// ============================================================================

pub fn var(name: &str) -> PatternTerm {
    PatternTerm::Var(name.to_owned())
}

pub fn class(local: &'static str) -> PatternTerm {
    PatternTerm::Iri(IriRef::Health(local))
}

pub fn text(value: &str) -> PatternTerm {
    PatternTerm::Const(Constant::Text(value.to_owned()))
}

impl GroupPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triple(mut self, subject: PatternTerm, predicate: IriRef, object: PatternTerm) -> Self {
        self.elements.push(PatternElement::Triple(TriplePattern { subject, predicate, object }));
        self
    }

    /// `?s health:<prop> ?o .`
    pub fn attr(self, subject: &str, property: &'static str, object: &str) -> Self {
        self.triple(var(subject), IriRef::Health(property), var(object))
    }

    /// `OPTIONAL { ?s health:<prop> ?o }`
    pub fn optional_attr(self, subject: &str, property: &'static str, object: &str) -> Self {
        self.optional(GroupPattern::new().attr(subject, property, object))
    }

    pub fn optional(mut self, group: GroupPattern) -> Self {
        self.elements.push(PatternElement::Optional(group));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.elements.push(PatternElement::Filter(expr));
        self
    }

    /// Variables bound anywhere in the pattern, optional groups included.
    pub fn bound_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_bound(&mut out);
        out
    }

    fn collect_bound(&self, out: &mut BTreeSet<String>) {
        for element in &self.elements {
            match element {
                PatternElement::Triple(t) => {
                    for term in [&t.subject, &t.object] {
                        if let PatternTerm::Var(v) = term {
                            out.insert(v.clone());
                        }
                    }
                }
                PatternElement::Optional(g) => g.collect_bound(out),
                PatternElement::Filter(_) => {}
            }
        }
    }

    /// Filters at this group's top level (not inside optionals).
    pub fn top_level_filters(&self) -> impl Iterator<Item = &Expr> {
        self.elements.iter().filter_map(|e| match e {
            PatternElement::Filter(expr) => Some(expr),
            _ => None,
        })
    }
}

impl SelectQuery {
    pub fn new(pattern: GroupPattern) -> Self {
        Self {
            projections: Vec::new(),
            pattern,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, vars: &[&str]) -> Self {
        self.projections.extend(vars.iter().map(|v| Projection::Var((*v).to_owned())));
        self
    }

    pub fn select_expr(mut self, expr: Expr, alias: &str) -> Self {
        self.projections.push(Projection::Expr { expr, alias: alias.to_owned() });
        self
    }

    pub fn order_asc(mut self, var: &str) -> Self {
        self.order_by.push(OrderKey { var: var.to_owned(), descending: false });
        self
    }

    pub fn order_desc(mut self, var: &str) -> Self {
        self.order_by.push(OrderKey { var: var.to_owned(), descending: true });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Output column names, in projection order.
    pub fn columns(&self) -> Vec<String> {
        self.projections.iter().map(|p| p.name().to_owned()).collect()
    }

    /// Every variable used by filters, projections and ORDER BY must be
    /// bound by the pattern (ORDER BY may also name a projection alias).
    pub fn check_variables(&self) -> Result<()> {
        let bound = self.pattern.bound_vars();
        let unbound = |v: &String| !bound.contains(v);

        let mut filters = Vec::new();
        collect_filters(&self.pattern, &mut filters);
        for expr in filters {
            if let Some(v) = expr.vars().into_iter().find(unbound) {
                return Err(Error::Template(format!("filter uses unbound variable ?{v}")));
            }
        }

        let mut aliases = BTreeSet::new();
        for p in &self.projections {
            match p {
                Projection::Var(v) if unbound(v) => {
                    return Err(Error::Template(format!("projection of unbound variable ?{v}")));
                }
                Projection::Var(_) => {}
                Projection::Expr { expr, alias } => {
                    if let Some(v) = expr.vars().into_iter().find(unbound) {
                        return Err(Error::Template(format!(
                            "expression ?{alias} uses unbound variable ?{v}"
                        )));
                    }
                    if bound.contains(alias) {
                        return Err(Error::Template(format!("alias ?{alias} is already bound")));
                    }
                    aliases.insert(alias.clone());
                }
            }
        }

        for key in &self.order_by {
            if unbound(&key.var) && !aliases.contains(&key.var) {
                return Err(Error::Template(format!("ORDER BY unbound variable ?{}", key.var)));
            }
        }
        Ok(())
    }
}

fn collect_filters<'a>(group: &'a GroupPattern, out: &mut Vec<&'a Expr>) {
    for element in &group.elements {
        match element {
            PatternElement::Filter(e) => out.push(e),
            PatternElement::Optional(g) => collect_filters(g, out),
            PatternElement::Triple(_) => {}
        }
    }
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_owned())
    }

    pub fn number(n: f64) -> Self {
        Expr::Const(Constant::Number(n))
    }

    pub fn text(s: &str) -> Self {
        Expr::Const(Constant::Text(s.to_owned()))
    }

    fn binary(self, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary { left: Box::new(self), op, right: Box::new(right) }
    }

    pub fn equals(self, right: Expr) -> Self { self.binary(BinaryOp::Eq, right) }
    pub fn not_equals(self, right: Expr) -> Self { self.binary(BinaryOp::Neq, right) }
    pub fn less_than(self, right: Expr) -> Self { self.binary(BinaryOp::Lt, right) }
    pub fn at_most(self, right: Expr) -> Self { self.binary(BinaryOp::Lte, right) }
    pub fn greater_than(self, right: Expr) -> Self { self.binary(BinaryOp::Gt, right) }
    pub fn at_least(self, right: Expr) -> Self { self.binary(BinaryOp::Gte, right) }
    pub fn and(self, right: Expr) -> Self { self.binary(BinaryOp::And, right) }
    pub fn or(self, right: Expr) -> Self { self.binary(BinaryOp::Or, right) }
    pub fn minus(self, right: Expr) -> Self { self.binary(BinaryOp::Sub, right) }
    pub fn divided_by(self, right: Expr) -> Self { self.binary(BinaryOp::Div, right) }

    /// Variables referenced by the expression.
    pub fn vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Var(v) => { out.insert(v.clone()); }
            Expr::Const(_) => {}
            Expr::Binary { left, right, .. } => {
                left.collect_vars(out);
                right.collect_vars(out);
            }
        }
    }

    /// Evaluate against a record with SPARQL error semantics: `None` is the
    /// error/unbound outcome (unbound variable, type mismatch, division by zero).
    pub fn eval(&self, record: &Record) -> Option<Value> {
        match self {
            Expr::Var(v) => match record.value(v) {
                Value::Null => None,
                value => Some(value.clone()),
            },
            Expr::Const(c) => Some(c.to_value()),
            Expr::Binary { left, op, right } => match op {
                BinaryOp::And | BinaryOp::Or => {
                    let l = left.eval(record).and_then(|v| v.as_bool());
                    let r = right.eval(record).and_then(|v| v.as_bool());
                    logical(*op, l, r).map(Value::Bool)
                }
                _ => {
                    let l = left.eval(record)?;
                    let r = right.eval(record)?;
                    binary(*op, &l, &r)
                }
            },
        }
    }

    /// Filter outcome: only a boolean `true` keeps the row.
    pub fn holds(&self, record: &Record) -> bool {
        matches!(self.eval(record), Some(Value::Bool(true)))
    }
}

/// Three-valued `&&` / `||`.
fn logical(op: BinaryOp, l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (op, l, r) {
        (BinaryOp::And, Some(false), _) | (BinaryOp::And, _, Some(false)) => Some(false),
        (BinaryOp::And, Some(true), Some(true)) => Some(true),
        (BinaryOp::Or, Some(true), _) | (BinaryOp::Or, _, Some(true)) => Some(true),
        (BinaryOp::Or, Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Option<Value> {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Eq => l.sparql_eq(r).map(Value::Bool),
        BinaryOp::Neq => l.sparql_eq(r).map(|eq| Value::Bool(!eq)),
        BinaryOp::Lt => l.sparql_cmp(r).map(|o| Value::Bool(o == Less)),
        BinaryOp::Lte => l.sparql_cmp(r).map(|o| Value::Bool(o != Greater)),
        BinaryOp::Gt => l.sparql_cmp(r).map(|o| Value::Bool(o == Greater)),
        BinaryOp::Gte => l.sparql_cmp(r).map(|o| Value::Bool(o != Less)),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => match (l, r) {
            (Value::Int(a), Value::Int(b)) => {
                let v = match op {
                    BinaryOp::Add => a.checked_add(*b),
                    BinaryOp::Sub => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                v.map(Value::Int)
            }
            _ => {
                let (a, b) = (l.as_float()?, r.as_float()?);
                let v = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    _ => a * b,
                };
                Some(Value::Float(v))
            }
        },
        // Integer division yields a decimal in SPARQL
        BinaryOp::Div => {
            let (a, b) = (l.as_float()?, r.as_float()?);
            if b == 0.0 {
                None
            } else {
                Some(Value::Float(a / b))
            }
        }
        BinaryOp::And | BinaryOp::Or => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Record {
        Record::new()
            .with("score", 4.5)
            .with("efficacy", 82)
            .with("zero", 0)
            .with("name", "Marche")
            .with("t1", Value::Iri("h#T1".into()))
            .with("t2", Value::Iri("h#T2".into()))
            .with("missing", Value::Null)
    }

    #[test]
    fn test_comparisons() {
        let r = row();
        assert!(Expr::var("score").at_most(Expr::number(5.0)).holds(&r));
        assert!(!Expr::var("score").greater_than(Expr::number(5.0)).holds(&r));
        assert!(Expr::var("efficacy").at_least(Expr::number(82.0)).holds(&r));
        assert!(Expr::var("t1").not_equals(Expr::var("t2")).holds(&r));
    }

    #[test]
    fn test_division_by_zero_is_undefined() {
        let r = row();
        assert_eq!(Expr::var("efficacy").divided_by(Expr::var("zero")).eval(&r), None);
        assert_eq!(
            Expr::var("efficacy").divided_by(Expr::number(2.0)).eval(&r),
            Some(Value::Float(41.0))
        );
    }

    #[test]
    fn test_unbound_and_type_mismatch_drop_row() {
        let r = row();
        assert!(!Expr::var("missing").at_most(Expr::number(5.0)).holds(&r));
        assert!(!Expr::var("name").at_most(Expr::number(5.0)).holds(&r));
    }

    #[test]
    fn test_three_valued_logic() {
        let r = row();
        let unknown = Expr::var("missing").greater_than(Expr::number(0.0));
        let truth = Expr::var("score").greater_than(Expr::number(0.0));
        assert!(unknown.clone().or(truth.clone()).holds(&r));
        assert_eq!(unknown.and(truth).eval(&r), None);
    }

    #[test]
    fn test_bound_vars_include_optionals() {
        let g = GroupPattern::new()
            .attr("t", "nomTraitement", "name")
            .optional_attr("t", "cout", "cost");
        let vars = g.bound_vars();
        assert!(vars.contains("t") && vars.contains("name") && vars.contains("cost"));
    }

    #[test]
    fn test_check_variables_rejects_unbound_filter() {
        let q = SelectQuery::new(
            GroupPattern::new()
                .attr("t", "nomTraitement", "name")
                .filter(Expr::var("score").at_most(Expr::number(5.0))),
        )
        .select(&["name"]);
        assert!(matches!(q.check_variables(), Err(Error::Template(_))));
    }

    #[test]
    fn test_check_variables_allows_order_by_alias() {
        let q = SelectQuery::new(
            GroupPattern::new()
                .attr("t", "efficacite", "efficacy")
                .attr("t", "score", "score"),
        )
        .select(&["efficacy"])
        .select_expr(Expr::var("efficacy").divided_by(Expr::var("score")), "ratio")
        .order_desc("ratio");
        assert!(q.check_variables().is_ok());
    }
}
