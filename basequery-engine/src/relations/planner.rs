//! Join planning for declared relation paths.
//!
//! Every declared path is expanded into its ancestors, deduplicated and
//! ordered by depth so parents are joined before children. Without a
//! projection every join selects all physical columns of its target; with
//! one, each join selects only what the projection reaches:
//!
//! - a path targeted by a dotted select field selects those columns plus
//!   the target's primary key
//! - an intermediate hop selects its physical columns minus the foreign
//!   keys excluded by [`ForeignKeyExclusion`]
//! - any other declared path is joined without contributing columns

use indexmap::{IndexMap, IndexSet};

use crate::alias::AliasResolver;
use crate::config::ForeignKeyExclusion;
use crate::error::{QueryError, QueryResult};
use crate::plan::{JoinMode, JoinStep, LinkTable, SelectColumn};
use crate::relations::metadata::{EntityMetadata, SchemaRegistry};
use crate::relations::path;
use crate::types::ColumnRef;

/// Planned joins and the full column selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinPlan {
    /// Joins, parents before children.
    pub joins: Vec<JoinStep>,
    /// Root columns followed by join columns.
    pub select: Vec<SelectColumn>,
}

/// Expand paths into their ancestors, deduplicated and ordered by depth.
///
/// Idempotent: overlapping or repeated inputs produce each path once.
pub fn expand_paths<S: AsRef<str>>(relations: &[S]) -> Vec<String> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    for relation in relations {
        for prefix in path::ancestors(relation.as_ref()) {
            seen.insert(prefix);
        }
    }

    let mut paths: Vec<String> = seen.into_iter().map(str::to_string).collect();
    paths.sort_by_key(|p| path::depth(p));
    paths
}

/// Plans `LEFT JOIN`s from a root entity.
pub struct JoinPlanner<'a, R: SchemaRegistry + ?Sized> {
    schema: &'a R,
    root: &'a EntityMetadata,
    foreign_keys: ForeignKeyExclusion,
    with_deleted: bool,
}

impl<'a, R: SchemaRegistry + ?Sized> JoinPlanner<'a, R> {
    /// Create a planner for `root`.
    pub fn new(schema: &'a R, root: &'a EntityMetadata) -> Self {
        Self {
            schema,
            root,
            foreign_keys: ForeignKeyExclusion::default(),
            with_deleted: false,
        }
    }

    /// Set the foreign-key exclusion policy for intermediate hops.
    pub fn foreign_key_exclusion(mut self, policy: ForeignKeyExclusion) -> Self {
        self.foreign_keys = policy;
        self
    }

    /// Keep soft-deleted rows of joined entities.
    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    /// Plan joins for `relations` under an optional projection.
    ///
    /// A dotted `sort_by` adds its column to its relation's selection; a
    /// plain one is always selected on the root.
    pub fn plan<S: AsRef<str>>(
        &self,
        relations: &[S],
        select: Option<&[String]>,
        sort_by: Option<&str>,
        aliases: &mut AliasResolver,
    ) -> QueryResult<JoinPlan> {
        let paths = expand_paths(relations);

        let mut root_columns: IndexSet<&str> = IndexSet::new();
        let mut targeted: IndexMap<&str, IndexSet<&str>> = IndexMap::new();

        match select {
            None => root_columns = self.root.physical_columns(),
            Some(fields) => {
                for field in fields {
                    match path::split_field(field) {
                        (Some(relation), leaf) => {
                            targeted.entry(relation).or_default().insert(leaf);
                        }
                        (None, column) => {
                            root_columns.insert(column);
                        }
                    }
                }
                root_columns.extend(self.root.primary_key.iter().map(String::as_str));
                if let Some(sort) = sort_by {
                    match path::split_field(sort) {
                        (Some(relation), leaf) => {
                            targeted.entry(relation).or_default().insert(leaf);
                        }
                        (None, column) => {
                            root_columns.insert(column);
                        }
                    }
                }
            }
        }

        root_columns.retain(|column| {
            let known = self.root.has_column(column);
            if !known {
                tracing::debug!(entity = %self.root.name, column, "skipping non-physical root column");
            }
            known
        });

        let reached: IndexSet<&str> = targeted
            .keys()
            .flat_map(|relation| path::ancestors(*relation))
            .collect();

        let root_alias = aliases.root().to_string();
        let mut plan = JoinPlan {
            joins: Vec::with_capacity(paths.len()),
            select: root_columns
                .iter()
                .map(|column| SelectColumn::root(&root_alias, column))
                .collect(),
        };

        for relation_path in &paths {
            let hops = self.schema.resolve_path(self.root, relation_path)?;
            let hop = hops.last().ok_or_else(|| {
                QueryError::internal(format!("relation path '{}' resolved to no hops", relation_path))
            })?;
            let target = hop.target;

            let parent_alias = aliases.alias_for(path::parent(relation_path));
            let alias = aliases.resolve(relation_path).to_string();

            let (mode, columns) = if select.is_none() {
                (JoinMode::Full, owned_columns(target.physical_columns()))
            } else if let Some(leaves) = targeted.get(relation_path.as_str()) {
                let mut columns: IndexSet<&str> =
                    leaves.iter().copied().filter(|c| target.has_column(c)).collect();
                columns.extend(target.primary_key.iter().map(String::as_str));
                (JoinMode::Projected, owned_columns(columns))
            } else if reached.contains(relation_path.as_str()) {
                let excluded = self.excluded_foreign_keys(target, relation_path, &reached);
                let mut columns = target.physical_columns();
                columns.retain(|c| !excluded.contains(c));
                (JoinMode::Projected, owned_columns(columns))
            } else {
                (JoinMode::Projected, Vec::new())
            };

            let relation = hop.relation;
            let (on, link) = match &relation.join_table {
                Some(join_table) => {
                    let keys = relation.join_columns.first().ok_or_else(|| {
                        QueryError::configuration(format!(
                            "Relation '{}.{}' declares no join columns",
                            hop.parent.name, relation.name
                        ))
                    })?;
                    let link_alias = aliases.unique(&format!("{}_link", alias));
                    let link = LinkTable {
                        table: join_table.table.clone(),
                        on_parent: (
                            ColumnRef::new(&link_alias, &join_table.source_column),
                            ColumnRef::new(&parent_alias, &keys.local),
                        ),
                        alias: link_alias.clone(),
                    };
                    let on = vec![(
                        ColumnRef::new(&alias, &keys.referenced),
                        ColumnRef::new(&link_alias, &join_table.target_column),
                    )];
                    (on, Some(link))
                }
                None if relation.join_columns.is_empty() => {
                    return Err(QueryError::configuration(format!(
                        "Relation '{}.{}' declares no join columns",
                        hop.parent.name, relation.name
                    )));
                }
                None => {
                    let on = relation
                        .join_columns
                        .iter()
                        .map(|jc| {
                            (
                                ColumnRef::new(&alias, &jc.referenced),
                                ColumnRef::new(&parent_alias, &jc.local),
                            )
                        })
                        .collect();
                    (on, None)
                }
            };

            let soft_delete = if self.with_deleted {
                None
            } else {
                target
                    .soft_delete_column
                    .as_ref()
                    .map(|column| ColumnRef::new(&alias, column))
            };

            plan.select.extend(
                columns
                    .iter()
                    .map(|column| SelectColumn::relation(relation_path, &alias, column)),
            );

            plan.joins.push(JoinStep {
                path: relation_path.clone(),
                alias,
                parent_alias,
                table: target.table.clone(),
                kind: relation.kind,
                many: hops.iter().any(|h| h.relation.kind.is_many()),
                mode,
                on,
                soft_delete,
                link,
                columns,
                primary_key: target.primary_key.clone(),
            });
        }

        tracing::debug!(
            root = %self.root.name,
            joins = plan.joins.len(),
            columns = plan.select.len(),
            "planned joins"
        );
        Ok(plan)
    }

    /// Foreign-key columns hidden on a projected intermediate hop.
    fn excluded_foreign_keys<'e>(
        &self,
        entity: &'e EntityMetadata,
        relation_path: &str,
        reached: &IndexSet<&str>,
    ) -> IndexSet<&'e str> {
        match self.foreign_keys {
            ForeignKeyExclusion::AllForeignKeys => entity.foreign_key_columns(),
            ForeignKeyExclusion::NextHop => reached
                .iter()
                .filter(|p| path::parent(p) == Some(relation_path))
                .filter_map(|child| entity.relation_named(path::leaf(child)))
                .flat_map(|relation| relation.foreign_key_columns())
                .collect(),
        }
    }
}

fn owned_columns(columns: IndexSet<&str>) -> Vec<String> {
    columns.into_iter().map(str::to_string).collect()
}
