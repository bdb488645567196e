//! SQL rendering of compiled plans.
//!
//! Named parameters are rendered as positional placeholders for the target
//! dialect; list parameters expand into one placeholder per element.
//! Identifiers are always quoted.

use crate::error::{QueryError, QueryResult};
use crate::filter::{FilterValue, NamedParams, Predicate};
use crate::plan::{CompiledPlan, JoinStep};
use crate::types::{ColumnRef, SortOrder};

/// Escape and quote an identifier with the given quote character.
pub fn escape_identifier_with(name: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    let escaped = name.replace(quote, &doubled);
    format!("{}{}{}", quote, escaped, quote)
}

/// Escape an identifier with ANSI double quotes.
pub fn escape_identifier(name: &str) -> String {
    escape_identifier_with(name, '"')
}

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DatabaseType {
    /// PostgreSQL uses $1, $2, etc.
    #[default]
    PostgreSQL,
    /// MySQL uses ?, ?, etc.
    MySQL,
    /// SQLite uses ?, ?, etc.
    SQLite,
}

impl DatabaseType {
    /// Get the parameter placeholder for this database type.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }

    /// Quote an identifier.
    pub fn quote(&self, name: &str) -> String {
        match self {
            Self::MySQL => escape_identifier_with(name, '`'),
            Self::PostgreSQL | Self::SQLite => escape_identifier(name),
        }
    }

    /// Quote an `alias.column` reference.
    pub fn column(&self, column: &ColumnRef) -> String {
        format!("{}.{}", self.quote(&column.alias), self.quote(&column.column))
    }
}

/// A rendered statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Parameters in placeholder order; always scalars.
    pub params: Vec<FilterValue>,
}

/// A SQL builder for constructing statements.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    db_type: DatabaseType,
    sql: String,
    params: Vec<FilterValue>,
}

impl SqlBuilder {
    /// Create a new SQL builder.
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            sql: String::with_capacity(256),
            params: Vec::new(),
        }
    }

    /// Create a PostgreSQL SQL builder.
    pub fn postgres() -> Self {
        Self::new(DatabaseType::PostgreSQL)
    }

    /// Push a literal SQL string.
    pub fn push(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.sql.push_str(sql.as_ref());
        self
    }

    /// Push a parameter placeholder and bind `value`.
    pub fn push_param(&mut self, value: impl Into<FilterValue>) -> &mut Self {
        self.params.push(value.into());
        let placeholder = self.db_type.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Push a quoted identifier.
    pub fn push_identifier(&mut self, name: &str) -> &mut Self {
        let quoted = self.db_type.quote(name);
        self.sql.push_str(&quoted);
        self
    }

    /// Push a quoted `alias.column`.
    pub fn push_column(&mut self, column: &ColumnRef) -> &mut Self {
        let quoted = self.db_type.column(column);
        self.sql.push_str(&quoted);
        self
    }

    /// Push a named parameter from `params`, expanding lists.
    pub fn push_named(&mut self, name: &str, params: &NamedParams) -> QueryResult<&mut Self> {
        let value = params
            .get(name)
            .ok_or_else(|| QueryError::internal(format!("unbound parameter '{}'", name)))?;
        match value {
            FilterValue::List(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push_param(value.clone());
                }
            }
            scalar => {
                self.push_param(scalar.clone());
            }
        }
        Ok(self)
    }

    /// Push a predicate.
    pub fn push_predicate(&mut self, predicate: &Predicate, params: &NamedParams) -> QueryResult<&mut Self> {
        match predicate {
            Predicate::Compare { column, op, param } => {
                self.push_column(column).push(" ").push(op.as_sql()).push(" ");
                self.push_named(param, params)?;
            }
            Predicate::ILike { column, param } => {
                self.push("LOWER(").push_column(column).push(") LIKE LOWER(");
                self.push_named(param, params)?;
                self.push(")");
            }
            Predicate::InList { negated, empty: true, .. } => {
                self.push(if *negated { "TRUE" } else { "FALSE" });
            }
            Predicate::InList { column, negated, param, .. } => {
                self.push_column(column).push(if *negated { " NOT IN (" } else { " IN (" });
                self.push_named(param, params)?;
                self.push(")");
            }
            Predicate::Between { column, start, end } => {
                self.push_column(column).push(" BETWEEN ");
                self.push_named(start, params)?;
                self.push(" AND ");
                self.push_named(end, params)?;
            }
            Predicate::Null { column, negated } => {
                self.push_column(column)
                    .push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Any(group) => {
                self.push("(");
                for (i, inner) in group.iter().enumerate() {
                    if i > 0 {
                        self.push(" OR ");
                    }
                    self.push_predicate(inner, params)?;
                }
                self.push(")");
            }
        }
        Ok(self)
    }

    /// Build the final statement.
    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::postgres()
    }
}

/// Alias of the derived table holding one page of root keys.
const PAGE_KEYS_ALIAS: &str = "page_keys";

#[derive(Debug, Clone, Copy)]
enum OrderTarget {
    Rows,
    Groups,
}

/// Renders the page and count statements of a compiled plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanRenderer {
    db_type: DatabaseType,
}

impl PlanRenderer {
    /// Create a renderer for a dialect.
    pub fn new(db_type: DatabaseType) -> Self {
        Self { db_type }
    }

    /// `SELECT ... ORDER BY ... LIMIT .. OFFSET ..`
    ///
    /// When a to-many join multiplies root rows, the window is taken over
    /// distinct root keys instead: a grouped key query picks the page of
    /// roots and the joined rows are restricted to those roots, so every
    /// record on the page comes back with all of its related rows.
    pub fn select(&self, plan: &CompiledPlan) -> QueryResult<Statement> {
        let mut builder = SqlBuilder::new(self.db_type);
        builder.push("SELECT ");
        if plan.select.is_empty() {
            builder.push_identifier(&plan.root_alias).push(".*");
        }
        for (i, column) in plan.select.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder
                .push_column(&column.column)
                .push(" AS ")
                .push_identifier(&column.output);
        }

        self.push_tables(&mut builder, plan);

        if plan.has_to_many() {
            builder.push(if plan.predicates.is_empty() { " WHERE " } else { " WHERE (" });
            self.push_predicates(&mut builder, plan)?;
            if !plan.predicates.is_empty() {
                builder.push(") AND ");
            }
            self.push_page_keys(&mut builder, plan)?;
            self.push_order(&mut builder, plan, OrderTarget::Rows);
        } else {
            self.push_where(&mut builder, plan)?;
            self.push_order(&mut builder, plan, OrderTarget::Rows);
            builder.push(" ");
            builder.push(plan.pagination.to_sql());
        }

        let statement = builder.build();
        tracing::trace!(sql = %statement.sql, params = statement.params.len(), "rendered page query");
        Ok(statement)
    }

    /// `SELECT COUNT(DISTINCT root.pk) AS total ...` over the same joins and predicates.
    pub fn count(&self, plan: &CompiledPlan) -> QueryResult<Statement> {
        let mut builder = SqlBuilder::new(self.db_type);
        let keys: Vec<String> = plan
            .primary_key
            .iter()
            .map(|pk| self.db_type.column(&ColumnRef::new(&plan.root_alias, pk)))
            .collect();

        builder.push("SELECT COUNT(DISTINCT ");
        match (self.db_type, keys.len()) {
            (_, 1) => builder.push(&keys[0]),
            (DatabaseType::PostgreSQL, _) => builder.push(format!("({})", keys.join(", "))),
            (DatabaseType::MySQL, _) => builder.push(keys.join(", ")),
            (DatabaseType::SQLite, _) => builder.push(keys.join(" || '|' || ")),
        };
        builder.push(") AS ").push_identifier("total");

        self.push_from(&mut builder, plan)?;

        let statement = builder.build();
        tracing::trace!(sql = %statement.sql, params = statement.params.len(), "rendered count query");
        Ok(statement)
    }

    fn push_from(&self, builder: &mut SqlBuilder, plan: &CompiledPlan) -> QueryResult<()> {
        self.push_tables(builder, plan);
        self.push_where(builder, plan)
    }

    fn push_tables(&self, builder: &mut SqlBuilder, plan: &CompiledPlan) {
        builder
            .push(" FROM ")
            .push_identifier(&plan.root_table)
            .push(" AS ")
            .push_identifier(&plan.root_alias);

        for join in &plan.joins {
            self.push_join(builder, join);
        }
    }

    fn push_where(&self, builder: &mut SqlBuilder, plan: &CompiledPlan) -> QueryResult<()> {
        if !plan.predicates.is_empty() {
            builder.push(" WHERE ");
            self.push_predicates(builder, plan)?;
        }
        Ok(())
    }

    fn push_predicates(&self, builder: &mut SqlBuilder, plan: &CompiledPlan) -> QueryResult<()> {
        for (i, predicate) in plan.predicates.iter().enumerate() {
            if i > 0 {
                builder.push(" AND ");
            }
            builder.push_predicate(predicate, &plan.params)?;
        }
        Ok(())
    }

    /// `root.pk IN (SELECT .. FROM (<grouped key page>) AS page_keys)`.
    ///
    /// The derived table keeps `LIMIT` out of the `IN` subquery itself,
    /// which MySQL rejects.
    fn push_page_keys(&self, builder: &mut SqlBuilder, plan: &CompiledPlan) -> QueryResult<()> {
        let keys: Vec<ColumnRef> = plan
            .primary_key
            .iter()
            .map(|pk| ColumnRef::new(&plan.root_alias, pk))
            .collect();
        let composite = keys.len() > 1;

        if composite {
            builder.push("(");
        }
        self.push_columns(builder, &keys);
        if composite {
            builder.push(")");
        }

        builder.push(" IN (SELECT ");
        let page_keys: Vec<ColumnRef> = plan
            .primary_key
            .iter()
            .map(|pk| ColumnRef::new(PAGE_KEYS_ALIAS, pk))
            .collect();
        self.push_columns(builder, &page_keys);
        builder.push(" FROM (SELECT ");
        self.push_columns(builder, &keys);
        self.push_from(builder, plan)?;
        builder.push(" GROUP BY ");
        self.push_columns(builder, &keys);
        self.push_order(builder, plan, OrderTarget::Groups);
        builder.push(" ");
        builder.push(plan.pagination.to_sql());
        builder.push(") AS ").push_identifier(PAGE_KEYS_ALIAS).push(")");
        Ok(())
    }

    fn push_columns(&self, builder: &mut SqlBuilder, columns: &[ColumnRef]) {
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push_column(column);
        }
    }

    /// ORDER BY the plan order. With to-many joins the root key is appended
    /// as a tie-breaker, and grouped key queries order by `MIN` (ascending)
    /// or `MAX` (descending) of each sort column.
    fn push_order(&self, builder: &mut SqlBuilder, plan: &CompiledPlan, target: OrderTarget) {
        let root_keys: Vec<ColumnRef> = if plan.has_to_many() {
            plan.primary_key
                .iter()
                .map(|pk| ColumnRef::new(&plan.root_alias, pk))
                .collect()
        } else {
            Vec::new()
        };
        let mut order: Vec<(&ColumnRef, SortOrder)> =
            plan.order.iter().map(|o| (&o.column, o.order)).collect();
        for key in &root_keys {
            if !order.iter().any(|(column, _)| *column == key) {
                order.push((key, SortOrder::Asc));
            }
        }
        if order.is_empty() {
            return;
        }

        builder.push(" ORDER BY ");
        for (i, (column, direction)) in order.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            match target {
                OrderTarget::Rows => {
                    builder.push_column(column);
                }
                OrderTarget::Groups => {
                    builder
                        .push(match direction {
                            SortOrder::Asc => "MIN(",
                            SortOrder::Desc => "MAX(",
                        })
                        .push_column(column)
                        .push(")");
                }
            }
            builder.push(" ").push(direction.as_sql());
        }
    }

    fn push_join(&self, builder: &mut SqlBuilder, join: &JoinStep) {
        if let Some(link) = &join.link {
            builder
                .push(" LEFT JOIN ")
                .push_identifier(&link.table)
                .push(" AS ")
                .push_identifier(&link.alias)
                .push(" ON ")
                .push_column(&link.on_parent.0)
                .push(" = ")
                .push_column(&link.on_parent.1);
        }

        builder
            .push(" LEFT JOIN ")
            .push_identifier(&join.table)
            .push(" AS ")
            .push_identifier(&join.alias)
            .push(" ON ");
        for (i, (left, right)) in join.on.iter().enumerate() {
            if i > 0 {
                builder.push(" AND ");
            }
            builder.push_column(left).push(" = ").push_column(right);
        }
        if let Some(deleted) = &join.soft_delete {
            builder.push(" AND ").push_column(deleted).push(" IS NULL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompareOp;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("user"), "\"user\"");
        assert_eq!(escape_identifier("has\"quote"), "\"has\"\"quote\"");
        assert_eq!(DatabaseType::MySQL.quote("order"), "`order`");
        assert_eq!(DatabaseType::MySQL.quote("a`b"), "`a``b`");
    }

    #[test]
    fn test_database_placeholder() {
        assert_eq!(DatabaseType::PostgreSQL.placeholder(1), "$1");
        assert_eq!(DatabaseType::PostgreSQL.placeholder(5), "$5");
        assert_eq!(DatabaseType::MySQL.placeholder(1), "?");
        assert_eq!(DatabaseType::SQLite.placeholder(1), "?");
    }

    #[test]
    fn test_sql_builder() {
        let mut builder = SqlBuilder::postgres();
        builder
            .push("SELECT * FROM ")
            .push_identifier("user")
            .push(" WHERE ")
            .push_identifier("id")
            .push(" = ")
            .push_param(42i32);

        let statement = builder.build();
        assert_eq!(statement.sql, "SELECT * FROM \"user\" WHERE \"id\" = $1");
        assert_eq!(statement.params, vec![FilterValue::Int(42)]);
    }

    #[test]
    fn test_list_params_expand() {
        let mut params = NamedParams::new();
        params.insert("filter_0".into(), FilterValue::List(vec!["A".into(), "B".into()]));
        params.insert("filter_1".into(), FilterValue::Int(3));

        let mut builder = SqlBuilder::postgres();
        builder
            .push_predicate(
                &Predicate::InList {
                    column: ColumnRef::new("payment", "status"),
                    negated: false,
                    param: "filter_0".into(),
                    empty: false,
                },
                &params,
            )
            .unwrap();
        builder.push(" AND ");
        builder
            .push_predicate(
                &Predicate::Compare {
                    column: ColumnRef::new("payment", "amount"),
                    op: CompareOp::Gt,
                    param: "filter_1".into(),
                },
                &params,
            )
            .unwrap();

        let statement = builder.build();
        assert_eq!(
            statement.sql,
            "\"payment\".\"status\" IN ($1, $2) AND \"payment\".\"amount\" > $3"
        );
        assert_eq!(statement.params.len(), 3);
    }

    #[test]
    fn test_unbound_parameter_is_internal_error() {
        let mut builder = SqlBuilder::postgres();
        let err = builder.push_named("filter_9", &NamedParams::new()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Internal);
    }

    fn compile(options: &crate::options::QueryOptions) -> CompiledPlan {
        crate::query::compile_plan(&crate::testing::payroll_schema(), "Payment", options).unwrap()
    }

    #[test]
    fn test_to_one_page_limits_rows() {
        use crate::options::QueryOptions;

        let plan = compile(&QueryOptions::new().relations(["employee"]).page(3, 25));
        let statement = PlanRenderer::new(DatabaseType::PostgreSQL).select(&plan).unwrap();

        assert!(!statement.sql.contains("page_keys"));
        assert!(statement
            .sql
            .ends_with("WHERE \"payment\".\"deletedAt\" IS NULL ORDER BY \"payment\".\"createdAt\" DESC LIMIT 25 OFFSET 50"));
    }

    #[test]
    fn test_to_many_page_limits_root_keys() {
        use crate::filter::{FilterCondition, Operator};
        use crate::options::QueryOptions;

        let plan = compile(
            &QueryOptions::new()
                .relations(["tags"])
                .filter(FilterCondition::new("amount", Operator::Gt, 100))
                .page(2, 10),
        );
        let statement = PlanRenderer::new(DatabaseType::PostgreSQL).select(&plan).unwrap();

        let tables = "FROM \"payments\" AS \"payment\" \
            LEFT JOIN \"payment_tags\" AS \"tags_link\" ON \"tags_link\".\"paymentId\" = \"payment\".\"id\" \
            LEFT JOIN \"tags\" AS \"tags\" ON \"tags\".\"id\" = \"tags_link\".\"tagId\"";
        let expected_tail = format!(
            "{tables} WHERE (\"payment\".\"amount\" > $1 AND \"payment\".\"deletedAt\" IS NULL) \
             AND \"payment\".\"id\" IN (SELECT \"page_keys\".\"id\" FROM (SELECT \"payment\".\"id\" \
             {tables} WHERE \"payment\".\"amount\" > $2 AND \"payment\".\"deletedAt\" IS NULL \
             GROUP BY \"payment\".\"id\" \
             ORDER BY MAX(\"payment\".\"createdAt\") DESC, MIN(\"payment\".\"id\") ASC \
             LIMIT 10 OFFSET 10) AS \"page_keys\") \
             ORDER BY \"payment\".\"createdAt\" DESC, \"payment\".\"id\" ASC"
        );
        assert!(statement.sql.ends_with(&expected_tail), "{}", statement.sql);
        assert_eq!(statement.params, vec![FilterValue::Int(100), FilterValue::Int(100)]);

        let count = PlanRenderer::new(DatabaseType::PostgreSQL).count(&plan).unwrap();
        assert!(count.sql.starts_with("SELECT COUNT(DISTINCT \"payment\".\"id\") AS \"total\""));
        assert!(!count.sql.contains("LIMIT"));
        assert_eq!(count.params, vec![FilterValue::Int(100)]);
    }

    #[test]
    fn test_to_many_page_on_mysql_uses_derived_table() {
        use crate::options::QueryOptions;

        let plan = compile(&QueryOptions::new().relations(["tags"]).page(1, 5));
        let statement = PlanRenderer::new(DatabaseType::MySQL).select(&plan).unwrap();

        assert!(statement.sql.contains("`payment`.`id` IN (SELECT `page_keys`.`id` FROM (SELECT `payment`.`id` FROM"));
        assert!(statement.sql.contains("LIMIT 5 OFFSET 0) AS `page_keys`)"));
    }
}
