//! Error types for listing queries with actionable messages.
//!
//! Every error carries an [`ErrorCode`] for programmatic handling, plus
//! context (model, field, offending relation paths) and suggestions.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: BQ{category}{number}
//! - 1xxx: Query shape errors (missing relation, unknown field, bad filter value)
//! - 3xxx: Connection errors (refused, timeout)
//! - 5xxx: Execution errors (parameter, database)
//! - 6xxx: Data errors (row deserialization)
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use basequery_engine::{ErrorCode, QueryError};
//!
//! let err = QueryError::missing_required_relations(["employee.person"]);
//! assert_eq!(err.code, ErrorCode::MissingRequiredRelation);
//! assert_eq!(err.code.code(), "BQ1006");
//! assert!(err.is_configuration_error());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Keywords that mark a storage-layer failure as a query-shape mistake.
const SHAPE_KEYWORDS: &[&str] = &["join", "alias", "column", "relation"];

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Query shape errors (1xxx)
    /// Malformed filter value (BQ1003).
    InvalidFilterValue = 1003,
    /// A selected path needs a relation that was never declared (BQ1006).
    MissingRequiredRelation = 1006,
    /// A sort, search, date or filter field does not exist or is unreachable (BQ1007).
    InvalidQueryRelation = 1007,

    // Connection errors (3xxx)
    /// Database connection failed (BQ3001).
    ConnectionFailed = 3001,
    /// Connection timeout (BQ3003).
    ConnectionTimeout = 3003,

    // Query execution errors (5xxx)
    /// Invalid parameter (BQ5003).
    InvalidParameter = 5003,
    /// General database error (BQ5005).
    DatabaseError = 5005,

    // Data errors (6xxx)
    /// Deserialization error (BQ6003).
    DeserializationError = 6003,

    // Configuration errors (7xxx)
    /// Invalid configuration (BQ7001).
    InvalidConfiguration = 7001,

    // Internal errors (9xxx)
    /// Internal error (BQ9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "BQ1006").
    pub fn code(&self) -> String {
        format!("BQ{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidFilterValue => "Invalid filter value",
            Self::MissingRequiredRelation => "Missing required relation",
            Self::InvalidQueryRelation => "Invalid query relation",
            Self::ConnectionFailed => "Database connection failed",
            Self::ConnectionTimeout => "Connection timeout",
            Self::InvalidParameter => "Invalid parameter",
            Self::DatabaseError => "Database error",
            Self::DeserializationError => "Deserialization error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The entity involved.
    pub model: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// Relation paths the error is about (e.g. every missing relation).
    pub paths: Vec<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while building or executing a listing query.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// One or more selected fields need relations that were never declared.
    ///
    /// `paths` lists every missing relation prefix, in the order found.
    pub fn missing_required_relations<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let listed = paths.join(", ");
        let mut err = Self::new(
            ErrorCode::MissingRequiredRelation,
            format!("Missing required relation(s) for select: {}", listed),
        )
        .with_code_suggestion(
            "Declare every relation whose fields are selected",
            format!("relations = [{}]", paths.iter().map(|p| format!("\"{}\"", p)).collect::<Vec<_>>().join(", ")),
        );
        err.context.paths = paths;
        err
    }

    /// A sort, search, date or filter field references an unknown column or
    /// an undeclared relation.
    pub fn invalid_query_relation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidQueryRelation,
            format!("Invalid query relation for '{}': {}", field, message),
        )
        .with_field(&field)
        .with_suggestion("Check the field name against the entity's columns")
        .with_suggestion("Declare the relation the field belongs to in `relations`")
    }

    /// A relation path does not resolve against the schema.
    pub fn unknown_relation(model: impl Into<String>, path: impl Into<String>) -> Self {
        let model = model.into();
        let path = path.into();
        let mut err = Self::new(
            ErrorCode::InvalidQueryRelation,
            format!("Relation '{}' does not exist on {}", path, model),
        )
        .with_model(&model)
        .with_suggestion("Check each dotted segment against the entity's relations");
        err.context.paths.push(path);
        err
    }

    /// A filter value has the wrong shape or cannot be parsed.
    pub fn invalid_filter_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidFilterValue,
            format!("Invalid filter value for {}: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Invalid input for {}: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
            .with_suggestion("Check that the database server is running")
            .with_suggestion("Verify the connection URL is correct")
    }

    /// Create a connection timeout error.
    pub fn connection_timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorCode::ConnectionTimeout,
            format!("Connection timed out after {}ms", duration_ms),
        )
        .with_suggestion("Increase the connect_timeout in your connection string")
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
            .with_suggestion("Check the database logs for more details")
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::DeserializationError, format!("Failed to deserialize result: {}", message))
            .with_suggestion("Check that the target type matches the selected columns")
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Classification ==============

    /// Re-classify a storage failure.
    ///
    /// Query-shape errors pass through untouched. A storage error whose
    /// message mentions a join, alias, column or relation becomes
    /// [`ErrorCode::InvalidQueryRelation`] with the original kept as its
    /// source; anything else (connectivity, timeouts) is returned unchanged.
    pub fn classify_storage(self) -> Self {
        if self.is_configuration_error() || self.is_connection_error() {
            return self;
        }

        let lowered = self.message.to_lowercase();
        if !SHAPE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            return self;
        }

        let mut err = Self::new(
            ErrorCode::InvalidQueryRelation,
            format!("Query configuration rejected by storage: {}", self.message),
        )
        .with_help("Check declared relations, selected columns and sort/search fields");
        err.context.sql = self.context.sql.clone();
        err.source = Some(Box::new(self));
        err
    }

    // ============== Error Checks ==============

    /// Check if this error is a caller-fixable query shape mistake.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::MissingRequiredRelation
                | ErrorCode::InvalidQueryRelation
                | ErrorCode::InvalidFilterValue
                | ErrorCode::InvalidParameter
                | ErrorCode::InvalidConfiguration
        )
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self.code, ErrorCode::ConnectionFailed | ErrorCode::ConnectionTimeout)
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::ConnectionTimeout
    }

    // ============== Display Functions ==============

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if !self.context.paths.is_empty() {
            output.push_str(&format!("  → Relations: {}\n", self.context.paths.join(", ")));
        }

        // SQL (truncated if too long)
        if let Some(ref sql) = self.context.sql {
            let sql_display = if sql.len() > 200 {
                let cut = (0..=200).rev().find(|i| sql.is_char_boundary(*i)).unwrap_or(0);
                format!("{}...", &sql[..cut])
            } else {
                sql.clone()
            };
            output.push_str(&format!("  → SQL: {}\n", sql_display));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!("     ```\n     {}\n     ```\n", code.replace('\n', "\n     ")));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::InvalidFilterValue.code(), "BQ1003");
        assert_eq!(ErrorCode::MissingRequiredRelation.code(), "BQ1006");
        assert_eq!(ErrorCode::InvalidQueryRelation.code(), "BQ1007");
        assert_eq!(ErrorCode::ConnectionFailed.code(), "BQ3001");
    }

    #[test]
    fn test_missing_required_relations_lists_every_path() {
        let err = QueryError::missing_required_relations(["a.c", "x"]);
        assert_eq!(err.code, ErrorCode::MissingRequiredRelation);
        assert_eq!(err.context.paths, vec!["a.c".to_string(), "x".to_string()]);
        assert!(err.message.contains("a.c, x"));
    }

    #[test]
    fn test_classify_storage_shape_error() {
        let err = QueryError::database("column employee_person.nmae does not exist")
            .with_sql("SELECT 1");
        let classified = err.classify_storage();

        assert_eq!(classified.code, ErrorCode::InvalidQueryRelation);
        assert_eq!(classified.context.sql.as_deref(), Some("SELECT 1"));
        assert!(std::error::Error::source(&classified).is_some());
    }

    #[test]
    fn test_classify_storage_keeps_unrelated_errors() {
        let classified = QueryError::database("deadlock detected").classify_storage();
        assert_eq!(classified.code, ErrorCode::DatabaseError);

        let classified = QueryError::connection("could not resolve relation host").classify_storage();
        assert_eq!(classified.code, ErrorCode::ConnectionFailed);
    }

    #[test]
    fn test_classify_storage_keeps_validator_errors() {
        let original = QueryError::missing_required_relations(["employee.person"]);
        let classified = original.classify_storage();
        assert_eq!(classified.code, ErrorCode::MissingRequiredRelation);
        assert_eq!(classified.context.paths, vec!["employee.person".to_string()]);
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::invalid_query_relation("person.nmae", "unknown column")
            .with_model("Payment")
            .with_context("Validating search fields");

        let output = err.display_full();
        assert!(output.contains("BQ1007"));
        assert!(output.contains("Payment"));
        assert!(output.contains("person.nmae"));
        assert!(output.contains("Suggestions"));
    }

    #[test]
    fn test_error_macro() {
        let err = query_error!(
            ErrorCode::InvalidParameter,
            "limit must be between 1 and 100",
            with_field = "limit",
            with_suggestion = "Request at most 100 rows per page"
        );

        assert_eq!(err.code, ErrorCode::InvalidParameter);
        assert_eq!(err.context.field, Some("limit".to_string()));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_connection_errors() {
        assert!(QueryError::connection("refused").is_connection_error());
        assert!(QueryError::connection_timeout(5000).is_timeout());
        assert!(!QueryError::database("boom").is_connection_error());
    }
}
