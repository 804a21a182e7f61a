//! AST → SPARQL text.
//!
//! This is the only place caller-supplied text is written into query text,
//! and every text constant goes through [`escape_literal`] on the way.

use std::fmt::Write;

use super::ast::*;
use crate::config::Namespace;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Escape a string for use inside a double-quoted SPARQL literal.
///
/// Backslash first, then quote, newline and carriage return.
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// A quoted, escaped string literal.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", escape_literal(s))
}

/// Format a finite number as a SPARQL numeric literal (never exponent form).
pub fn number(n: f64) -> String {
    format!("{n}")
}

pub(crate) fn prologue(out: &mut String, ns: &Namespace) {
    let _ = writeln!(out, "PREFIX rdf: <{RDF_NS}>");
    let _ = writeln!(out, "PREFIX xsd: <{XSD_NS}>");
    let _ = writeln!(out, "PREFIX health: <{}>", ns.as_str());
}

/// Serialize a SELECT query.
pub fn render_query(query: &SelectQuery, ns: &Namespace) -> String {
    let mut out = String::new();
    prologue(&mut out, ns);
    out.push('\n');

    out.push_str("SELECT ");
    let projections: Vec<String> = query.projections.iter().map(projection).collect();
    out.push_str(&projections.join(" "));
    out.push('\n');

    out.push_str("WHERE ");
    group(&mut out, &query.pattern, 0);
    out.push('\n');

    if !query.order_by.is_empty() {
        let keys: Vec<String> = query
            .order_by
            .iter()
            .map(|k| {
                if k.descending {
                    format!("DESC(?{})", k.var)
                } else {
                    format!("ASC(?{})", k.var)
                }
            })
            .collect();
        let _ = writeln!(out, "ORDER BY {}", keys.join(" "));
    }
    if let Some(n) = query.limit {
        let _ = writeln!(out, "LIMIT {n}");
    }
    out
}

fn projection(p: &Projection) -> String {
    match p {
        Projection::Var(v) => format!("?{v}"),
        Projection::Expr { expr: e, alias } => format!("({} AS ?{alias})", expr(e)),
    }
}

fn group(out: &mut String, g: &GroupPattern, depth: usize) {
    let pad = "    ".repeat(depth + 1);
    out.push_str("{\n");
    for element in &g.elements {
        match element {
            PatternElement::Triple(t) => {
                let _ = writeln!(
                    out,
                    "{pad}{} {} {} .",
                    term(&t.subject),
                    iri(t.predicate),
                    term(&t.object)
                );
            }
            PatternElement::Optional(inner) => {
                out.push_str(&pad);
                out.push_str("OPTIONAL ");
                group(out, inner, depth + 1);
                out.push('\n');
            }
            PatternElement::Filter(e) => {
                let _ = writeln!(out, "{pad}FILTER ({})", expr(e));
            }
        }
    }
    out.push_str(&"    ".repeat(depth));
    out.push('}');
}

fn iri(i: IriRef) -> String {
    match i {
        IriRef::RdfType => "rdf:type".to_string(),
        IriRef::Health(local) => format!("health:{local}"),
    }
}

fn term(t: &PatternTerm) -> String {
    match t {
        PatternTerm::Var(v) => format!("?{v}"),
        PatternTerm::Iri(i) => iri(*i),
        PatternTerm::Const(c) => constant(c),
    }
}

fn constant(c: &Constant) -> String {
    match c {
        Constant::Text(s) => quote(s),
        Constant::Number(n) => number(*n),
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Var(v) => format!("?{v}"),
        Expr::Const(c) => constant(c),
        Expr::Binary { left, op, right } => {
            format!("({} {} {})", expr(left), op.symbol(), expr(right))
        }
    }
}
