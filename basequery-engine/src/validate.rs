//! Pre-execution validation of query options against entity metadata.
//!
//! Runs before planning so an impossible configuration is rejected before
//! any statement is rendered:
//!
//! - page and limit bounds ([`ErrorCode::InvalidParameter`])
//! - the root has a primary key
//! - every declared relation path resolves, and every hop has join columns
//! - dotted select fields are checked exhaustively: every uncovered
//!   relation prefix is reported in one [`ErrorCode::MissingRequiredRelation`]
//! - sort, search, date and filter fields fail fast with
//!   [`ErrorCode::InvalidQueryRelation`]
//!
//! [`ErrorCode::InvalidParameter`]: crate::error::ErrorCode::InvalidParameter
//! [`ErrorCode::MissingRequiredRelation`]: crate::error::ErrorCode::MissingRequiredRelation
//! [`ErrorCode::InvalidQueryRelation`]: crate::error::ErrorCode::InvalidQueryRelation

use crate::error::{ErrorCode, QueryError, QueryResult};
use crate::filter::FilterCondition;
use crate::options::{MAX_LIMIT, QueryOptions};
use crate::query_error;
use crate::relations::path;
use crate::relations::{EntityMetadata, SchemaRegistry};

/// Validate `options` for a listing rooted at `root`.
pub fn validate<R: SchemaRegistry + ?Sized>(
    schema: &R,
    root: &EntityMetadata,
    options: &QueryOptions,
) -> QueryResult<()> {
    validate_bounds(options)?;

    if root.primary_key.is_empty() {
        return Err(QueryError::configuration(format!("Entity '{}' declares no primary key", root.name))
            .with_model(&root.name));
    }

    for relation in &options.relations {
        let hops = schema
            .resolve_path(root, relation)
            .map_err(|e| e.with_context("Resolving declared relations"))?;
        for hop in &hops {
            if hop.relation.join_columns.is_empty() {
                return Err(QueryError::configuration(format!(
                    "Relation '{}.{}' declares no join columns",
                    hop.parent.name, hop.relation.name
                ))
                .with_model(&root.name)
                .with_suggestion("Declare the join with `join_on(local, referenced)`"));
            }
        }
    }

    validate_select(schema, root, options)?;

    if let Some(sort_by) = &options.sort_by {
        check_field(schema, root, &options.relations, sort_by)
            .map_err(|e| e.with_context("Validating sortBy"))?;
    }
    for field in &options.search_fields {
        check_field(schema, root, &options.relations, field)
            .map_err(|e| e.with_context("Validating searchFields"))?;
    }
    if let Some(date_field) = &options.date_field {
        check_field(schema, root, &options.relations, date_field)
            .map_err(|e| e.with_context("Validating dateField"))?;
    }
    for filter in &options.filters {
        check_filter(schema, root, &options.relations, filter)
            .map_err(|e| e.with_context("Validating filters"))?;
    }

    Ok(())
}

/// Check page and limit bounds.
pub fn validate_bounds(options: &QueryOptions) -> QueryResult<()> {
    if options.page < 1 {
        return Err(query_error!(
            ErrorCode::InvalidParameter,
            format!("page must be at least 1, got {}", options.page),
            with_field = "page"
        ));
    }
    if options.limit < 1 || options.limit > MAX_LIMIT {
        return Err(query_error!(
            ErrorCode::InvalidParameter,
            format!("limit must be between 1 and {}, got {}", MAX_LIMIT, options.limit),
            with_field = "limit",
            with_suggestion = format!("Request at most {} rows per page", MAX_LIMIT)
        ));
    }
    Ok(())
}

/// Check the projection. Every missing relation prefix is collected before
/// failing; unknown columns fail on the first one found.
fn validate_select<R: SchemaRegistry + ?Sized>(
    schema: &R,
    root: &EntityMetadata,
    options: &QueryOptions,
) -> QueryResult<()> {
    let Some(select) = &options.select else {
        return Ok(());
    };

    let mut missing: Vec<&str> = Vec::new();
    for field in select {
        if let (Some(prefix), _) = path::split_field(field) {
            if !path::is_covered(prefix, &options.relations) && !missing.contains(&prefix) {
                missing.push(prefix);
            }
        }
    }
    if !missing.is_empty() {
        return Err(QueryError::missing_required_relations(missing)
            .with_model(&root.name)
            .with_context("Validating select"));
    }

    for field in select {
        let (entity, leaf) = match path::split_field(field) {
            (Some(prefix), leaf) => (schema.target_of(root, prefix)?, leaf),
            (None, column) => (root, column),
        };
        if !entity.declares_column(leaf) {
            return Err(unknown_column(field, entity).with_context("Validating select"));
        }
    }
    Ok(())
}

/// Check a sort, search or date field.
fn check_field<R: SchemaRegistry + ?Sized>(
    schema: &R,
    root: &EntityMetadata,
    relations: &[String],
    field: &str,
) -> QueryResult<()> {
    match path::split_field(field) {
        (Some(prefix), leaf) => check_column(schema, root, relations, Some(prefix), leaf, field),
        (None, column) => check_column(schema, root, relations, None, column, field),
    }
}

fn check_filter<R: SchemaRegistry + ?Sized>(
    schema: &R,
    root: &EntityMetadata,
    relations: &[String],
    filter: &FilterCondition,
) -> QueryResult<()> {
    match filter.relation.as_deref() {
        Some(relation) => {
            let display = format!("{}.{}", relation, filter.field);
            check_column(schema, root, relations, Some(relation), &filter.field, &display)
        }
        None => check_field(schema, root, relations, &filter.field),
    }
}

fn check_column<R: SchemaRegistry + ?Sized>(
    schema: &R,
    root: &EntityMetadata,
    relations: &[String],
    relation: Option<&str>,
    column: &str,
    display: &str,
) -> QueryResult<()> {
    let entity = match relation {
        Some(prefix) => {
            if !path::is_covered(prefix, relations) {
                return Err(QueryError::invalid_query_relation(
                    display,
                    format!("relation '{}' is not declared", prefix),
                )
                .with_model(&root.name));
            }
            schema.target_of(root, prefix)?
        }
        None => root,
    };

    if entity.has_column(column) {
        Ok(())
    } else {
        Err(unknown_column(display, entity).with_model(&root.name))
    }
}

fn unknown_column(field: &str, entity: &EntityMetadata) -> QueryError {
    QueryError::invalid_query_relation(
        field,
        format!("'{}' has no column '{}'", entity.name, path::leaf(field)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator;
    use crate::relations::Schema;
    use crate::testing::payroll_schema;
    use pretty_assertions::assert_eq;

    fn check(options: &QueryOptions) -> QueryResult<()> {
        let schema: Schema = payroll_schema();
        let root = schema.entity("Payment").unwrap();
        validate(&schema, root, options)
    }

    #[test]
    fn test_select_with_declared_chain() {
        let options = QueryOptions::new()
            .relations(["employee", "employee.person"])
            .select(["id", "employee.person.name"]);
        assert!(check(&options).is_ok());
    }

    #[test]
    fn test_select_missing_relation() {
        let options = QueryOptions::new()
            .relations(["employee"])
            .select(["id", "employee.person.name"]);
        let err = check(&options).unwrap_err();

        assert_eq!(err.code, ErrorCode::MissingRequiredRelation);
        assert_eq!(err.context.paths, vec!["employee.person".to_string()]);
    }

    #[test]
    fn test_select_reports_every_missing_relation() {
        let options = QueryOptions::new().relations(["employee"]).select([
            "employee.person.name",
            "tags.label",
            "employee.person.email",
            "employee.department.title",
        ]);
        let err = check(&options).unwrap_err();

        assert_eq!(err.code, ErrorCode::MissingRequiredRelation);
        assert_eq!(
            err.context.paths,
            vec![
                "employee.person".to_string(),
                "tags".to_string(),
                "employee.department".to_string()
            ]
        );
    }

    #[test]
    fn test_select_covered_by_descendant() {
        let options = QueryOptions::new()
            .relations(["employee.person.address"])
            .select(["employee.role", "employee.person.name"]);
        assert!(check(&options).is_ok());
    }

    #[test]
    fn test_select_unknown_leaf() {
        let options = QueryOptions::new()
            .relations(["employee.person"])
            .select(["employee.person.nickname"]);
        let err = check(&options).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQueryRelation);
        assert_eq!(err.context.field.as_deref(), Some("employee.person.nickname"));
    }

    #[test]
    fn test_select_allows_virtual_columns() {
        let options = QueryOptions::new()
            .relations(["employee"])
            .select(["employee.displayName"]);
        assert!(check(&options).is_ok());
    }

    #[test]
    fn test_unresolvable_relation() {
        let options = QueryOptions::new().relations(["employee.manager"]);
        let err = check(&options).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQueryRelation);
    }

    #[test]
    fn test_relation_without_join_columns() {
        use crate::relations::{EntityMetadata, RelationMeta};

        let schema = Schema::new()
            .with_entity(
                EntityMetadata::new("Payment", "payments")
                    .columns(["id", "employeeId"])
                    .relation(RelationMeta::many_to_one("employee", "Employee")),
            )
            .with_entity(EntityMetadata::new("Employee", "employees").columns(["id", "role"]));
        let root = schema.entity("Payment").unwrap();

        let err = validate(&schema, root, &QueryOptions::new().relations(["employee"])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
        assert!(err.message.contains("Payment.employee"));

        assert!(validate(&schema, root, &QueryOptions::new()).is_ok());
    }

    #[test]
    fn test_root_without_primary_key() {
        use crate::relations::EntityMetadata;

        let schema = Schema::new().with_entity(
            EntityMetadata::new("Ledger", "ledger")
                .columns(["reference", "amount"])
                .primary_key(Vec::<&str>::new()),
        );
        let root = schema.entity("Ledger").unwrap();

        let err = validate(&schema, root, &QueryOptions::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_sort_by() {
        assert!(check(&QueryOptions::new().sort("amount", Default::default())).is_ok());

        let err = check(&QueryOptions::new().sort("employee.role", Default::default())).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQueryRelation);

        let err = check(&QueryOptions::new().sort("nope", Default::default())).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQueryRelation);
        assert_eq!(err.context.operation.as_deref(), Some("Validating sortBy"));

        let options = QueryOptions::new()
            .relations(["employee"])
            .sort("employee.role", Default::default());
        assert!(check(&options).is_ok());
    }

    #[test]
    fn test_search_fields() {
        let ok = QueryOptions::new()
            .relations(["employee.person"])
            .search("ana", ["reference", "employee.person.name"]);
        assert!(check(&ok).is_ok());

        let undeclared = QueryOptions::new().search("ana", ["employee.person.name"]);
        assert_eq!(check(&undeclared).unwrap_err().code, ErrorCode::InvalidQueryRelation);

        let virtual_field = QueryOptions::new()
            .relations(["employee"])
            .search("ana", ["employee.displayName"]);
        assert_eq!(check(&virtual_field).unwrap_err().code, ErrorCode::InvalidQueryRelation);
    }

    #[test]
    fn test_filters() {
        let ok = QueryOptions::new()
            .relations(["employee.person"])
            .filter(FilterCondition::new("name", Operator::ILike, "ana").on_relation("employee.person"))
            .filter(FilterCondition::new("status", Operator::Equals, "PAID"));
        assert!(check(&ok).is_ok());

        let uncovered = QueryOptions::new()
            .relations(["employee"])
            .filter(FilterCondition::new("name", Operator::ILike, "ana").on_relation("employee.person"));
        let err = check(&uncovered).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQueryRelation);
        assert_eq!(err.context.field.as_deref(), Some("employee.person.name"));

        let unknown = QueryOptions::new().filter(FilterCondition::new("colour", Operator::Equals, "red"));
        assert_eq!(check(&unknown).unwrap_err().code, ErrorCode::InvalidQueryRelation);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(check(&QueryOptions::new().page(0, 10)).unwrap_err().code, ErrorCode::InvalidParameter);
        assert_eq!(check(&QueryOptions::new().page(1, 0)).unwrap_err().code, ErrorCode::InvalidParameter);
        assert_eq!(check(&QueryOptions::new().page(1, 101)).unwrap_err().code, ErrorCode::InvalidParameter);
        assert!(check(&QueryOptions::new().page(1, 100)).is_ok());
    }
}
