//! # SPARQL Template Library
//!
//! Parameter validation, the query AST, the fixed template repertoire and
//! its serializer. Pure functions; nothing here touches the transport.

pub mod ast;
pub mod params;
pub mod render;
pub mod templates;
pub mod update;

use crate::config::Namespace;
use crate::Result;
use params::ParamSet;
use templates::{Template, TemplateKind};

/// Validate `params` for `kind` and build the template.
///
/// Validation failures come back as `Error::ParameterValidation`.
pub fn prepare(kind: TemplateKind, params: &ParamSet) -> Result<Template> {
    let validated = params::validate(kind.params(), params)?;
    templates::build(kind, &validated)
}

/// Validate, build and serialize a template query.
pub fn render(kind: TemplateKind, params: &ParamSet, ns: &Namespace) -> Result<String> {
    let template = prepare(kind, params)?;
    Ok(render::render_query(&template.query, ns))
}
