//! Filter conditions and their compilation into bound predicates.
//!
//! Each filter at index `i` binds its value under the name `filter_i`
//! (`filter_i_start` / `filter_i_end` for `BETWEEN`). Values are only ever
//! bound, never spliced into SQL text.
//!
//! ```rust
//! use basequery_engine::alias::AliasResolver;
//! use basequery_engine::filter::{compile_filters, FilterCondition, Operator};
//!
//! let filters = vec![
//!     FilterCondition::new("status", Operator::Equals, "PAID"),
//!     FilterCondition::new("name", Operator::ILike, "ana").on_relation("person"),
//! ];
//! let mut aliases = AliasResolver::new("Payment");
//! let compiled = compile_filters(&filters, &mut aliases);
//!
//! assert_eq!(compiled.predicates[0].to_string(), "payment.status = :filter_0");
//! assert_eq!(compiled.predicates[1].to_string(), "LOWER(person.name) LIKE LOWER(:filter_1)");
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::alias::AliasResolver;
use crate::types::ColumnRef;

/// Named bind parameters, in binding order.
pub type NamedParams = IndexMap<String, FilterValue>;

/// A filter value that can be used in comparisons.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this is a list value.
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Textual form of a scalar, `None` for null and lists.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null | Self::List(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
        }
    }

    /// Coerce into a list for `IN` / `NOT IN`.
    ///
    /// Lists pass through, a string containing commas is split on them,
    /// null becomes the empty list and any other scalar a 1-element list.
    pub fn into_list(self) -> Vec<FilterValue> {
        match self {
            Self::List(values) => values,
            Self::Null => Vec::new(),
            Self::String(s) if s.contains(',') => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Self::String(part.to_string()))
                .collect(),
            other => vec![other],
        }
    }

    /// Wrap the value as a `%value%` substring pattern.
    pub fn contains_pattern(&self) -> FilterValue {
        Self::String(format!("%{}%", self.as_text().unwrap_or_default()))
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    /// `col = value`.
    #[default]
    Equals,
    /// `col != value`.
    NotEquals,
    /// Case-sensitive substring match.
    Like,
    /// Case-insensitive substring match.
    #[serde(rename = "ILIKE")]
    ILike,
    /// Membership in a list.
    In,
    /// Non-membership in a list.
    NotIn,
    /// `col > value`.
    Gt,
    /// `col >= value`.
    Gte,
    /// `col < value`.
    Lt,
    /// `col <= value`.
    Lte,
    /// Inclusive range, value is a 2-element list.
    Between,
    /// `col IS NULL`.
    IsNull,
    /// `col IS NOT NULL`.
    IsNotNull,
}

/// One filter in a listing query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Column name on the root entity or on `relation`.
    pub field: String,
    /// The comparison.
    #[serde(default)]
    pub operator: Operator,
    /// The value; ignored by `IS_NULL` / `IS_NOT_NULL`.
    #[serde(default)]
    pub value: FilterValue,
    /// Relation path the field belongs to, root when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl FilterCondition {
    /// Create a filter on a root column.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            relation: None,
        }
    }

    /// Move the filter onto a relation path.
    pub fn on_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Whether this is a well-formed `BETWEEN` (exactly two bounds).
    pub fn is_valid_between(&self) -> bool {
        matches!(&self.value, FilterValue::List(bounds) if bounds.len() == 2)
    }
}

/// Binary comparison operators rendered as `col op :param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `LIKE`
    Like,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl CompareOp {
    /// SQL operator text.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Like => "LIKE",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// A single boolean predicate over qualified columns and named parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `col op :param`
    Compare {
        column: ColumnRef,
        op: CompareOp,
        param: String,
    },
    /// `LOWER(col) LIKE LOWER(:param)`
    ILike { column: ColumnRef, param: String },
    /// `col [NOT] IN (:param)`; an empty list renders `FALSE` (`TRUE` when negated).
    InList {
        column: ColumnRef,
        negated: bool,
        param: String,
        empty: bool,
    },
    /// `col BETWEEN :start AND :end`
    Between {
        column: ColumnRef,
        start: String,
        end: String,
    },
    /// `col IS [NOT] NULL`
    Null { column: ColumnRef, negated: bool },
    /// Disjunction, rendered parenthesized.
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Names of the parameters this predicate binds, in order.
    pub fn params(&self) -> Vec<&str> {
        match self {
            Self::Compare { param, .. } | Self::ILike { param, .. } => vec![param.as_str()],
            Self::InList { param, empty, .. } => {
                if *empty {
                    Vec::new()
                } else {
                    vec![param.as_str()]
                }
            }
            Self::Between { start, end, .. } => vec![start.as_str(), end.as_str()],
            Self::Null { .. } => Vec::new(),
            Self::Any(inner) => inner.iter().flat_map(|p| p.params()).collect(),
        }
    }
}

/// Named-parameter form, for logs and tests. Dialect rendering lives in [`crate::sql`].
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { column, op, param } => write!(f, "{} {} :{}", column, op.as_sql(), param),
            Self::ILike { column, param } => write!(f, "LOWER({}) LIKE LOWER(:{})", column, param),
            Self::InList { negated, empty: true, .. } => {
                f.write_str(if *negated { "TRUE" } else { "FALSE" })
            }
            Self::InList { column, negated, param, .. } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} {}IN (:...{})", column, not, param)
            }
            Self::Between { column, start, end } => {
                write!(f, "{} BETWEEN :{} AND :{}", column, start, end)
            }
            Self::Null { column, negated } => {
                write!(f, "{} IS {}NULL", column, if *negated { "NOT " } else { "" })
            }
            Self::Any(inner) => {
                f.write_str("(")?;
                for (i, p) in inner.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" OR ")?;
                    }
                    write!(f, "{}", p)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Output of [`compile_filters`]: predicates to conjoin and their bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilters {
    /// One predicate per surviving filter, in input order.
    pub predicates: Vec<Predicate>,
    /// Named bindings for every predicate.
    pub params: NamedParams,
}

/// Compile filter conditions into predicates.
///
/// A `BETWEEN` whose value is not a 2-element list is dropped with a warning;
/// the remaining filters keep their positional parameter names.
pub fn compile_filters(filters: &[FilterCondition], aliases: &mut AliasResolver) -> CompiledFilters {
    let mut out = CompiledFilters::default();

    for (i, filter) in filters.iter().enumerate() {
        let column = aliases.column(&filter.field, filter.relation.as_deref());
        let param = format!("filter_{}", i);

        let predicate = match filter.operator {
            Operator::Equals => compare(&mut out.params, column, CompareOp::Eq, param, filter.value.clone()),
            Operator::NotEquals => compare(&mut out.params, column, CompareOp::Ne, param, filter.value.clone()),
            Operator::Gt => compare(&mut out.params, column, CompareOp::Gt, param, filter.value.clone()),
            Operator::Gte => compare(&mut out.params, column, CompareOp::Gte, param, filter.value.clone()),
            Operator::Lt => compare(&mut out.params, column, CompareOp::Lt, param, filter.value.clone()),
            Operator::Lte => compare(&mut out.params, column, CompareOp::Lte, param, filter.value.clone()),
            Operator::Like => {
                let pattern = filter.value.contains_pattern();
                compare(&mut out.params, column, CompareOp::Like, param, pattern)
            }
            Operator::ILike => {
                out.params.insert(param.clone(), filter.value.contains_pattern());
                Predicate::ILike { column, param }
            }
            Operator::In | Operator::NotIn => {
                let values = filter.value.clone().into_list();
                let empty = values.is_empty();
                if !empty {
                    out.params.insert(param.clone(), FilterValue::List(values));
                }
                Predicate::InList {
                    column,
                    negated: filter.operator == Operator::NotIn,
                    param,
                    empty,
                }
            }
            Operator::Between => {
                let FilterValue::List(bounds) = &filter.value else {
                    tracing::warn!(field = %filter.field, index = i, "dropping BETWEEN filter without a [start, end] list");
                    continue;
                };
                let [start_value, end_value] = bounds.as_slice() else {
                    tracing::warn!(
                        field = %filter.field,
                        index = i,
                        bounds = bounds.len(),
                        "dropping BETWEEN filter that does not have exactly two bounds"
                    );
                    continue;
                };
                let start = format!("{}_start", param);
                let end = format!("{}_end", param);
                out.params.insert(start.clone(), start_value.clone());
                out.params.insert(end.clone(), end_value.clone());
                Predicate::Between { column, start, end }
            }
            Operator::IsNull => Predicate::Null { column, negated: false },
            Operator::IsNotNull => Predicate::Null { column, negated: true },
        };

        out.predicates.push(predicate);
    }

    tracing::debug!(
        filters = filters.len(),
        predicates = out.predicates.len(),
        "compiled filters"
    );
    out
}

fn compare(
    params: &mut NamedParams,
    column: ColumnRef,
    op: CompareOp,
    param: String,
    value: FilterValue,
) -> Predicate {
    params.insert(param.clone(), value);
    Predicate::Compare { column, op, param }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(filters: &[FilterCondition]) -> CompiledFilters {
        let mut aliases = AliasResolver::new("Payment");
        compile_filters(filters, &mut aliases)
    }

    #[test]
    fn test_operator_serde() {
        let op: Operator = serde_json::from_str("\"NOT_IN\"").unwrap();
        assert_eq!(op, Operator::NotIn);
        assert_eq!(serde_json::to_string(&Operator::ILike).unwrap(), "\"ILIKE\"");
        assert_eq!(serde_json::to_string(&Operator::IsNotNull).unwrap(), "\"IS_NOT_NULL\"");
    }

    #[test]
    fn test_filter_condition_deserialize() {
        let filter: FilterCondition =
            serde_json::from_str(r#"{"field": "createdAt", "operator": "BETWEEN", "value": ["2024-01-01", "2024-12-31"]}"#)
                .unwrap();
        assert_eq!(filter.operator, Operator::Between);
        assert!(filter.is_valid_between());
        assert_eq!(filter.relation, None);
    }

    #[test]
    fn test_comparison_templates() {
        let compiled = compile(&[
            FilterCondition::new("status", Operator::Equals, "PAID"),
            FilterCondition::new("status", Operator::NotEquals, "VOID"),
            FilterCondition::new("amount", Operator::Gte, 100),
            FilterCondition::new("amount", Operator::Lt, 500),
        ]);

        let rendered: Vec<String> = compiled.predicates.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "payment.status = :filter_0",
                "payment.status != :filter_1",
                "payment.amount >= :filter_2",
                "payment.amount < :filter_3",
            ]
        );
        assert_eq!(compiled.params["filter_2"], FilterValue::Int(100));
    }

    #[test]
    fn test_like_wraps_value() {
        let compiled = compile(&[
            FilterCondition::new("name", Operator::Like, "ana").on_relation("employee.person"),
        ]);
        assert_eq!(compiled.predicates[0].to_string(), "employee_person.name LIKE :filter_0");
        assert_eq!(compiled.params["filter_0"], FilterValue::from("%ana%"));
    }

    #[test]
    fn test_in_coercion() {
        let compiled = compile(&[
            FilterCondition::new("status", Operator::In, "PAID, PENDING"),
            FilterCondition::new("id", Operator::In, 7),
            FilterCondition::new("status", Operator::NotIn, vec!["VOID"]),
        ]);

        assert_eq!(
            compiled.params["filter_0"],
            FilterValue::List(vec!["PAID".into(), "PENDING".into()])
        );
        assert_eq!(compiled.params["filter_1"], FilterValue::List(vec![FilterValue::Int(7)]));
        assert_eq!(compiled.predicates[2].to_string(), "payment.status NOT IN (:...filter_2)");
    }

    #[test]
    fn test_empty_in_lists() {
        let compiled = compile(&[
            FilterCondition::new("status", Operator::In, Vec::<String>::new()),
            FilterCondition::new("status", Operator::NotIn, Vec::<String>::new()),
        ]);
        assert_eq!(compiled.predicates[0].to_string(), "FALSE");
        assert_eq!(compiled.predicates[1].to_string(), "TRUE");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_between_guard() {
        let compiled = compile(&[
            FilterCondition::new("amount", Operator::Between, vec![1]),
            FilterCondition::new("createdAt", Operator::Between, vec!["2024-01-01", "2024-12-31"]),
            FilterCondition::new("amount", Operator::Between, 5),
        ]);

        assert_eq!(compiled.predicates.len(), 1);
        assert_eq!(
            compiled.predicates[0].to_string(),
            "payment.createdAt BETWEEN :filter_1_start AND :filter_1_end"
        );
        assert_eq!(compiled.params.keys().collect::<Vec<_>>(), vec!["filter_1_start", "filter_1_end"]);
    }

    #[test]
    fn test_null_checks_bind_nothing() {
        let compiled = compile(&[
            FilterCondition::new("paidAt", Operator::IsNull, FilterValue::Null),
            FilterCondition::new("paidAt", Operator::IsNotNull, "ignored"),
        ]);
        assert_eq!(compiled.predicates[0].to_string(), "payment.paidAt IS NULL");
        assert_eq!(compiled.predicates[1].to_string(), "payment.paidAt IS NOT NULL");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_parameter_isolation() {
        let hostile = "x'; DROP TABLE payments; --";
        let compiled = compile(&[FilterCondition::new("reference", Operator::Equals, hostile)]);

        let rendered = compiled.predicates[0].to_string();
        assert!(!rendered.contains("DROP"));
        assert_eq!(compiled.params["filter_0"], FilterValue::from(hostile));
    }
}
