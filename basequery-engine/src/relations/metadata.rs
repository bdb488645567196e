//! Read-only entity metadata: columns, relations and the registry that
//! resolves relation paths across entities.

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::relations::path;

/// Type of relation between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// One-to-one relation (e.g., Employee has one Person).
    OneToOne,
    /// One-to-many relation (e.g., Account has many Transfers).
    OneToMany,
    /// Many-to-one relation (e.g., Transfer belongs to Account).
    ManyToOne,
    /// Many-to-many relation through a join table.
    ManyToMany,
}

impl RelationType {
    /// Check if this relation returns multiple records.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Check if this relation returns a single record.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

/// A physical or virtual column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnRepr")]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,
    /// Virtual columns are computed by the application and never selected.
    #[serde(rename = "isVirtual")]
    pub is_virtual: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default, rename = "isVirtual", alias = "is_virtual")]
        is_virtual: bool,
    },
}

impl From<ColumnRepr> for ColumnMeta {
    fn from(repr: ColumnRepr) -> Self {
        match repr {
            ColumnRepr::Name(name) => Self { name, is_virtual: false },
            ColumnRepr::Full { name, is_virtual } => Self { name, is_virtual },
        }
    }
}

/// A pair of columns joined by equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    /// Column on the owning (parent) entity.
    pub local: String,
    /// Column on the target entity.
    pub referenced: String,
}

/// Join table for many-to-many relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTableMeta {
    /// Name of the join table.
    pub table: String,
    /// Column referencing the source entity.
    pub source_column: String,
    /// Column referencing the target entity.
    pub target_column: String,
}

/// Metadata for one relation of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMeta {
    /// Name of the relation (property name on the owning entity).
    pub name: String,
    /// Name of the target entity.
    pub target: String,
    /// Type of relation.
    pub kind: RelationType,
    /// Column pairs for the join condition.
    ///
    /// For a many-to-many relation the single pair names the owning entity's
    /// key (matched by the join table's source column) and the target's key
    /// (matched by the join table's target column).
    #[serde(default)]
    pub join_columns: Vec<JoinColumn>,
    /// Join table for many-to-many relations.
    #[serde(default)]
    pub join_table: Option<JoinTableMeta>,
    /// Whether the foreign key lives on the owning entity. Defaults by kind:
    /// many-to-one and one-to-one own their key, the others do not.
    #[serde(default)]
    pub owning: Option<bool>,
}

impl RelationMeta {
    fn with_kind(name: impl Into<String>, target: impl Into<String>, kind: RelationType) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            join_columns: Vec::new(),
            join_table: None,
            owning: None,
        }
    }

    /// Create a one-to-one relation (owning side).
    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, target, RelationType::OneToOne)
    }

    /// Create a one-to-many relation.
    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, target, RelationType::OneToMany)
    }

    /// Create a many-to-one relation.
    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, target, RelationType::ManyToOne)
    }

    /// Create a many-to-many relation through a join table.
    pub fn many_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        join_table: JoinTableMeta,
    ) -> Self {
        let mut relation = Self::with_kind(name, target, RelationType::ManyToMany);
        relation.join_table = Some(join_table);
        relation
    }

    /// Add a join column pair.
    pub fn join_on(mut self, local: impl Into<String>, referenced: impl Into<String>) -> Self {
        self.join_columns.push(JoinColumn {
            local: local.into(),
            referenced: referenced.into(),
        });
        self
    }

    /// Mark the inverse side of a one-to-one relation.
    pub fn inverse(mut self) -> Self {
        self.owning = Some(false);
        self
    }

    /// Whether the foreign key columns live on the owning entity.
    pub fn is_owning(&self) -> bool {
        self.owning.unwrap_or(matches!(
            self.kind,
            RelationType::ManyToOne | RelationType::OneToOne
        ))
    }

    /// Physical foreign-key columns on the owning entity implied by this
    /// relation. Empty when the key lives on the target or a join table.
    pub fn foreign_key_columns(&self) -> IndexSet<&str> {
        if !self.is_owning() || self.join_table.is_some() {
            return IndexSet::new();
        }
        self.join_columns.iter().map(|jc| jc.local.as_str()).collect()
    }
}

/// Metadata for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name (e.g. `"Employee"`). Filled from the schema key when loaded.
    #[serde(default)]
    pub name: String,
    /// Physical table name.
    pub table: String,
    /// Primary key columns.
    #[serde(default = "default_primary_key")]
    pub primary_key: Vec<String>,
    /// Columns, in declaration order.
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,
    /// Relations, in declaration order.
    #[serde(default)]
    pub relations: Vec<RelationMeta>,
    /// Column holding the soft-delete timestamp, if the entity is soft-deletable.
    #[serde(default)]
    pub soft_delete_column: Option<String>,
}

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string()]
}

impl EntityMetadata {
    /// Create metadata for an entity with an `id` primary key.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            columns: Vec::new(),
            relations: Vec::new(),
            soft_delete_column: None,
        }
    }

    /// Add a physical column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnMeta {
            name: name.into(),
            is_virtual: false,
        });
        self
    }

    /// Add several physical columns.
    pub fn columns(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for name in names {
            self = self.column(name);
        }
        self
    }

    /// Add a virtual column.
    pub fn virtual_column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnMeta {
            name: name.into(),
            is_virtual: true,
        });
        self
    }

    /// Add a relation.
    pub fn relation(mut self, relation: RelationMeta) -> Self {
        self.relations.push(relation);
        self
    }

    /// Set the primary key columns.
    pub fn primary_key(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the entity soft-deletable through the given column.
    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    /// Physical (non-virtual) column names.
    pub fn physical_columns(&self) -> IndexSet<&str> {
        self.columns
            .iter()
            .filter(|c| !c.is_virtual)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Whether `name` is a physical column of this entity.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| !c.is_virtual && c.name == name)
    }

    /// Whether `name` is a declared column, virtual or not.
    pub fn declares_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Relations keyed by name.
    pub fn relations_by_name(&self) -> IndexMap<&str, &RelationMeta> {
        self.relations.iter().map(|r| (r.name.as_str(), r)).collect()
    }

    /// Look up a relation by name.
    pub fn relation_named(&self, name: &str) -> Option<&RelationMeta> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Union of every owner-side foreign key column.
    pub fn foreign_key_columns(&self) -> IndexSet<&str> {
        self.relations
            .iter()
            .flat_map(|r| r.foreign_key_columns())
            .collect()
    }
}

/// One hop along a resolved relation path.
#[derive(Debug, Clone, Copy)]
pub struct Hop<'a> {
    /// The path up to and including this hop (e.g. `"employee.person"`).
    pub path: &'a str,
    /// The entity the relation is declared on.
    pub parent: &'a EntityMetadata,
    /// The relation being traversed.
    pub relation: &'a RelationMeta,
    /// The relation's target entity.
    pub target: &'a EntityMetadata,
}

/// Read-only access to entity metadata, owned by the storage layer.
pub trait SchemaRegistry: Send + Sync {
    /// Look up an entity by name.
    fn entity(&self, name: &str) -> Option<&EntityMetadata>;

    /// Look up an entity or fail with a configuration error.
    fn require_entity(&self, name: &str) -> QueryResult<&EntityMetadata> {
        self.entity(name).ok_or_else(|| {
            QueryError::configuration(format!("Unknown entity '{}'", name)).with_model(name)
        })
    }

    /// Walk `path` from `root`, returning one hop per segment.
    fn resolve_path<'a>(&'a self, root: &'a EntityMetadata, path: &'a str) -> QueryResult<Vec<Hop<'a>>> {
        if !path::is_well_formed(path) {
            return Err(QueryError::unknown_relation(&root.name, path));
        }

        let mut hops = Vec::with_capacity(path::depth(path));
        let mut current = root;
        for prefix in path::ancestors(path) {
            let segment = path::leaf(prefix);
            let relation = current
                .relation_named(segment)
                .ok_or_else(|| QueryError::unknown_relation(&root.name, prefix))?;
            let target = self.entity(&relation.target).ok_or_else(|| {
                QueryError::configuration(format!(
                    "Relation '{}.{}' targets unknown entity '{}'",
                    current.name, relation.name, relation.target
                ))
            })?;
            hops.push(Hop {
                path: prefix,
                parent: current,
                relation,
                target,
            });
            current = target;
        }
        Ok(hops)
    }

    /// The entity reached at the end of `path`.
    fn target_of<'a>(&'a self, root: &'a EntityMetadata, path: &'a str) -> QueryResult<&'a EntityMetadata> {
        let hops = self.resolve_path(root, path)?;
        Ok(hops.last().map(|h| h.target).unwrap_or(root))
    }
}

/// An owned set of entity metadata.
///
/// ```toml
/// [entities.Employee]
/// table = "employees"
/// columns = ["id", "name", "personId", "createdAt"]
///
/// [[entities.Employee.relations]]
/// name = "person"
/// target = "Person"
/// kind = "many_to_one"
/// join_columns = [{ local = "personId", referenced = "id" }]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Entities keyed by name.
    #[serde(default)]
    pub entities: IndexMap<String, EntityMetadata>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    pub fn with_entity(mut self, entity: EntityMetadata) -> Self {
        self.register(entity);
        self
    }

    /// Register an entity in place.
    pub fn register(&mut self, entity: EntityMetadata) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Parse a schema from TOML.
    pub fn from_toml_str(content: &str) -> QueryResult<Self> {
        let schema: Self = toml::from_str(content).map_err(|e| {
            QueryError::configuration(format!("Invalid schema TOML: {}", e)).with_source(e)
        })?;
        schema.finish()
    }

    /// Parse a schema from JSON.
    pub fn from_json_str(content: &str) -> QueryResult<Self> {
        let schema: Self = serde_json::from_str(content).map_err(|e| {
            QueryError::configuration(format!("Invalid schema JSON: {}", e)).with_source(e)
        })?;
        schema.finish()
    }

    /// Load a schema from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("Cannot read schema file {}: {}", path.display(), e))
                .with_source(e)
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Fill entity names from their keys and check relation targets.
    fn finish(mut self) -> QueryResult<Self> {
        for (key, entity) in self.entities.iter_mut() {
            if entity.name.is_empty() {
                entity.name = key.clone();
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that every relation targets a known entity and that every join
    /// column exists on its side of the join.
    pub fn validate(&self) -> QueryResult<()> {
        for entity in self.entities.values() {
            if entity.primary_key.is_empty() {
                return Err(QueryError::configuration(format!(
                    "Entity '{}' declares no primary key",
                    entity.name
                )));
            }
            for relation in &entity.relations {
                let target = self.entities.get(&relation.target).ok_or_else(|| {
                    QueryError::configuration(format!(
                        "Relation '{}.{}' targets unknown entity '{}'",
                        entity.name, relation.name, relation.target
                    ))
                })?;

                if relation.join_columns.is_empty() {
                    return Err(QueryError::configuration(format!(
                        "Relation '{}.{}' declares no join columns",
                        entity.name, relation.name
                    )));
                }

                if relation.join_table.is_none() {
                    for jc in &relation.join_columns {
                        if !entity.has_column(&jc.local) || !target.has_column(&jc.referenced) {
                            return Err(QueryError::configuration(format!(
                                "Relation '{}.{}' joins unknown columns {} = {}",
                                entity.name, relation.name, jc.local, jc.referenced
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl SchemaRegistry for Schema {
    fn entity(&self, name: &str) -> Option<&EntityMetadata> {
        self.entities.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .with_entity(
                EntityMetadata::new("Payment", "payments")
                    .columns(["id", "amount", "employeeId", "createdAt"])
                    .relation(RelationMeta::many_to_one("employee", "Employee").join_on("employeeId", "id")),
            )
            .with_entity(
                EntityMetadata::new("Employee", "employees")
                    .columns(["id", "role", "personId"])
                    .virtual_column("displayName")
                    .relation(RelationMeta::many_to_one("person", "Person").join_on("personId", "id")),
            )
            .with_entity(EntityMetadata::new("Person", "people").columns(["id", "name"]))
    }

    #[test]
    fn test_relation_type() {
        assert!(RelationType::OneToMany.is_many());
        assert!(RelationType::ManyToMany.is_many());
        assert!(RelationType::OneToOne.is_one());
        assert!(!RelationType::ManyToOne.is_many());
    }

    #[test]
    fn test_foreign_key_columns() {
        let owning = RelationMeta::many_to_one("person", "Person").join_on("personId", "id");
        assert_eq!(owning.foreign_key_columns().into_iter().collect::<Vec<_>>(), vec!["personId"]);

        let inverse = RelationMeta::one_to_many("payments", "Payment").join_on("id", "employeeId");
        assert!(inverse.foreign_key_columns().is_empty());

        let one_inverse = RelationMeta::one_to_one("profile", "Profile").join_on("id", "employeeId").inverse();
        assert!(one_inverse.foreign_key_columns().is_empty());
    }

    #[test]
    fn test_physical_columns_skip_virtual() {
        let schema = schema();
        let employee = schema.entity("Employee").unwrap();
        assert!(employee.has_column("role"));
        assert!(!employee.has_column("displayName"));
        assert_eq!(employee.physical_columns().len(), 3);
    }

    #[test]
    fn test_relations_by_name() {
        let schema = crate::testing::payroll_schema();
        let employee = schema.entity("Employee").unwrap();
        let relations = employee.relations_by_name();

        assert_eq!(relations.keys().copied().collect::<Vec<_>>(), vec!["person", "department", "payments"]);
        assert_eq!(relations["department"].target, "Department");
        assert_eq!(relations["payments"].kind, RelationType::OneToMany);
        assert!(!relations.contains_key("address"));
    }

    #[test]
    fn test_resolve_path() {
        let schema = schema();
        let root = schema.entity("Payment").unwrap();
        let hops = schema.resolve_path(root, "employee.person").unwrap();

        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].path, "employee");
        assert_eq!(hops[0].target.name, "Employee");
        assert_eq!(hops[1].path, "employee.person");
        assert_eq!(hops[1].parent.name, "Employee");
        assert_eq!(hops[1].target.table, "people");
    }

    #[test]
    fn test_resolve_unknown_path() {
        let schema = schema();
        let root = schema.entity("Payment").unwrap();
        let err = schema.resolve_path(root, "employee.department").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidQueryRelation);
        assert_eq!(err.context.paths, vec!["employee.department".to_string()]);
    }

    #[test]
    fn test_schema_from_toml() {
        let schema = Schema::from_toml_str(
            r#"
            [entities.Employee]
            table = "employees"
            columns = ["id", "personId", { name = "displayName", isVirtual = true }]
            soft_delete_column = "deletedAt"

            [[entities.Employee.relations]]
            name = "person"
            target = "Person"
            kind = "many_to_one"
            join_columns = [{ local = "personId", referenced = "id" }]

            [entities.Person]
            table = "people"
            columns = ["id", "name"]
            "#,
        )
        .unwrap();

        let employee = schema.entity("Employee").unwrap();
        assert_eq!(employee.name, "Employee");
        assert_eq!(employee.primary_key, vec!["id".to_string()]);
        assert!(!employee.has_column("displayName"));
        assert_eq!(employee.soft_delete_column.as_deref(), Some("deletedAt"));
        assert_eq!(employee.relation_named("person").unwrap().kind, RelationType::ManyToOne);
    }

    #[test]
    fn test_schema_rejects_dangling_target() {
        let err = Schema::from_json_str(
            r#"{"entities": {"Employee": {"table": "employees", "columns": ["id", "personId"],
                "relations": [{"name": "person", "target": "Person", "kind": "many_to_one",
                               "join_columns": [{"local": "personId", "referenced": "id"}]}]}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidConfiguration);
    }
}
