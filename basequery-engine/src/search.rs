//! Free-text search across configured fields.
//!
//! A term `t` over fields `[f1, ..., fn]` compiles to
//! `(f1 LIKE :search_0 OR ... OR fn LIKE :search_{n-1})`, every parameter bound
//! to `%t%`. Dotted fields resolve through their relation alias.

use crate::alias::AliasResolver;
use crate::filter::{CompareOp, FilterValue, NamedParams, Predicate};

/// A compiled search group.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    /// The OR group.
    pub predicate: Predicate,
    /// Bindings `search_0 ..`.
    pub params: NamedParams,
}

/// Compile a search term over `fields`.
///
/// Returns `None` for a blank term or an empty field list.
pub fn compile_search<S: AsRef<str>>(
    term: Option<&str>,
    fields: &[S],
    aliases: &mut AliasResolver,
) -> Option<CompiledSearch> {
    let term = term.map(str::trim).filter(|t| !t.is_empty())?;
    if fields.is_empty() {
        return None;
    }

    let pattern = FilterValue::String(format!("%{}%", term));
    let mut params = NamedParams::with_capacity(fields.len());
    let mut group = Vec::with_capacity(fields.len());

    for (i, field) in fields.iter().enumerate() {
        let param = format!("search_{}", i);
        params.insert(param.clone(), pattern.clone());
        group.push(Predicate::Compare {
            column: aliases.dotted_column(field.as_ref()),
            op: CompareOp::Like,
            param,
        });
    }

    tracing::debug!(fields = fields.len(), "compiled search");
    Some(CompiledSearch {
        predicate: Predicate::Any(group),
        params,
    })
}
