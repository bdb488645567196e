//! SQL-visible aliases for the root entity and joined relation paths.
//!
//! ```rust
//! use basequery_engine::alias::{alias_of_entity, alias_of_path, AliasResolver};
//!
//! assert_eq!(alias_of_entity("EmployeeRecord"), "employeeRecord");
//! assert_eq!(alias_of_path("employee.person"), "employee_person");
//!
//! let mut aliases = AliasResolver::new("Payment");
//! assert_eq!(aliases.root(), "payment");
//! assert_eq!(aliases.resolve("employee.person"), "employee_person");
//! ```

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::relations::path::SEPARATOR;
use crate::types::ColumnRef;

/// Alias of an entity: its name with the first character lowercased.
pub fn alias_of_entity(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Alias of a relation path: every separator replaced by `_`.
pub fn alias_of_path(path: &str) -> String {
    path.replace(SEPARATOR, "_")
}

/// Qualify `field` with the alias of `relation`, or with `root_alias` when
/// the field lives on the root entity.
pub fn field_path(field: &str, relation: Option<&str>, root_alias: &str) -> String {
    match relation {
        Some(path) => format!("{}.{}", alias_of_path(path), field),
        None => format!("{}.{}", root_alias, field),
    }
}

/// Per-plan alias table.
///
/// Aliases are memoized per path, and a path whose natural alias is already
/// taken (by the root or by a different path, e.g. `"a_b"` and `"a.b"`) gets
/// a numeric suffix, so distinct paths never share an alias.
#[derive(Debug, Clone)]
pub struct AliasResolver {
    root: String,
    by_path: IndexMap<String, String>,
    taken: HashSet<String>,
}

impl AliasResolver {
    /// Create a resolver for a root entity.
    pub fn new(root_entity: &str) -> Self {
        let root = alias_of_entity(root_entity);
        let mut taken = HashSet::new();
        taken.insert(root.clone());
        Self {
            root,
            by_path: IndexMap::new(),
            taken,
        }
    }

    /// Alias of the root entity.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Alias for `path`, assigning one on first use.
    pub fn resolve(&mut self, path: &str) -> &str {
        if !self.by_path.contains_key(path) {
            let alias = self.unique(&alias_of_path(path));
            self.by_path.insert(path.to_string(), alias);
        }
        &self.by_path[path]
    }

    /// Reserve an alias not bound to a path (e.g. a join table), suffixed
    /// if `natural` is taken.
    pub fn unique(&mut self, natural: &str) -> String {
        let mut candidate = natural.to_string();
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{}", natural, suffix);
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    /// Alias already assigned to `path`, if any.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    /// Alias for an optional relation; `None` is the root.
    pub fn alias_for(&mut self, relation: Option<&str>) -> String {
        match relation {
            Some(path) => self.resolve(path).to_string(),
            None => self.root.clone(),
        }
    }

    /// Column reference for `field` on the root or on `relation`.
    pub fn column(&mut self, field: &str, relation: Option<&str>) -> ColumnRef {
        ColumnRef::new(self.alias_for(relation), field)
    }

    /// Column reference for a possibly dotted field (`"person.name"`).
    pub fn dotted_column(&mut self, field: &str) -> ColumnRef {
        let (relation, leaf) = crate::relations::path::split_field(field);
        self.column(leaf, relation)
    }

    /// Every assigned path alias, in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_path.iter().map(|(p, a)| (p.as_str(), a.as_str()))
    }
}
