//! Hydration of flat joined rows into nested records.
//!
//! Relation columns come back as `"path.column"` outputs. Hydration turns
//! them into nested objects (`{"employee": {"person": {"name": ..}}}`),
//! groups to-many relations into arrays keyed by the parent's primary key,
//! and collapses root rows multiplied by to-many joins back into one record.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::plan::CompiledPlan;
use crate::relations::path;
use crate::traits::Row;

#[derive(Debug, Default)]
struct Node {
    /// `(output name, field name)` pairs.
    columns: Vec<(String, String)>,
    /// Outputs identifying one instance.
    key: Vec<String>,
    many: bool,
    children: IndexMap<String, Node>,
}

impl Node {
    fn has_content(&self) -> bool {
        !self.columns.is_empty() || self.children.values().any(Node::has_content)
    }

    fn child_mut(&mut self, relation_path: &str) -> Option<&mut Node> {
        let mut node = self;
        for segment in relation_path.split(path::SEPARATOR) {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }
}

/// Builds nested records from the rows of one compiled plan.
#[derive(Debug)]
pub struct Hydrator {
    root: Node,
    group_by_root: bool,
}

impl Hydrator {
    /// Prepare hydration for `plan`.
    pub fn new(plan: &CompiledPlan) -> Self {
        let mut root = Node::default();
        for column in plan.select.iter().filter(|c| !c.output.contains(path::SEPARATOR)) {
            root.columns.push((column.output.clone(), column.output.clone()));
        }
        root.key = plan.primary_key.clone();

        for join in &plan.joins {
            let columns: Vec<(String, String)> = join
                .columns
                .iter()
                .map(|c| (format!("{}.{}", join.path, c), c.clone()))
                .collect();
            let mut key: Vec<String> = join
                .primary_key
                .iter()
                .filter(|pk| join.columns.contains(pk))
                .map(|pk| format!("{}.{}", join.path, pk))
                .collect();
            if key.is_empty() {
                key = columns.iter().map(|(output, _)| output.clone()).collect();
            }

            let node = Node {
                columns,
                key,
                many: join.kind.is_many(),
                children: IndexMap::new(),
            };
            let parent = match path::parent(&join.path) {
                Some(parent_path) => root.child_mut(parent_path),
                None => Some(&mut root),
            };
            if let Some(parent) = parent {
                parent.children.insert(path::leaf(&join.path).to_string(), node);
            }
        }

        Self {
            root,
            group_by_root: plan.has_to_many(),
        }
    }

    /// Hydrate rows into one JSON object per root record.
    pub fn hydrate(&self, rows: &[Row]) -> Vec<Value> {
        if !self.group_by_root {
            return rows
                .iter()
                .map(|row| Value::Object(build_object(&self.root, &[row])))
                .collect();
        }

        group_rows(&self.root, rows.iter(), false)
            .into_values()
            .map(|group| Value::Object(build_object(&self.root, &group)))
            .collect()
    }
}

/// Hydrate rows for `plan` and deserialize each record into `T`.
pub fn decode_rows<T: DeserializeOwned>(plan: &CompiledPlan, rows: &[Row]) -> QueryResult<Vec<T>> {
    Hydrator::new(plan)
        .hydrate(rows)
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|e| {
                QueryError::deserialization(e.to_string())
                    .with_model(&plan.root_entity)
                    .with_source(e)
            })
        })
        .collect()
}

fn group_rows<'r>(
    node: &Node,
    rows: impl Iterator<Item = &'r Row>,
    skip_null_keys: bool,
) -> IndexMap<String, Vec<&'r Row>> {
    let mut groups: IndexMap<String, Vec<&'r Row>> = IndexMap::new();
    for row in rows {
        let values: Vec<&Value> = node
            .key
            .iter()
            .map(|output| row.get(output).unwrap_or(&Value::Null))
            .collect();
        if skip_null_keys && values.iter().all(|v| v.is_null()) {
            continue;
        }
        let key = serde_json::to_string(&values).unwrap_or_default();
        groups.entry(key).or_default().push(row);
    }
    groups
}

fn build_object(node: &Node, rows: &[&Row]) -> Map<String, Value> {
    let mut object = Map::new();
    let Some(first) = rows.first() else {
        return object;
    };

    for (output, field) in &node.columns {
        object.insert(field.clone(), first.get(output).cloned().unwrap_or(Value::Null));
    }

    for (name, child) in &node.children {
        if !child.has_content() {
            continue;
        }
        let value = if child.many {
            Value::Array(
                group_rows(child, rows.iter().copied(), true)
                    .into_values()
                    .map(|group| Value::Object(build_object(child, &group)))
                    .collect(),
            )
        } else if !child.columns.is_empty()
            && child
                .columns
                .iter()
                .all(|(output, _)| first.get(output).is_none_or(Value::is_null))
        {
            Value::Null
        } else {
            Value::Object(build_object(child, rows))
        };
        object.insert(name.clone(), value);
    }

    object
}
