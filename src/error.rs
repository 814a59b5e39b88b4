//! Error taxonomy for the aggregation pipeline.
//!
//! Every variant is fatal to a run: the pipeline either writes a complete,
//! consistent set of tables or fails before touching any output.

use thiserror::Error;

/// Errors raised while loading, normalizing, aggregating or writing data.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input matches neither known source schema, or a required
    /// column is absent after renaming.
    #[error("schema error in {path}: {message}")]
    Schema {
        /// File the schema problem was found in.
        path: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A field could not be parsed to its expected type.
    #[error("cannot parse {column} value {value:?} at {path}:{line}")]
    TypeParse {
        path: String,
        /// 1-based line number within the file, header included.
        line: u64,
        column: String,
        value: String,
    },

    /// The run configuration is invalid (e.g. inverted regime boundaries).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn schema(path: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn type_parse(path: &str, line: u64, column: &str, value: &str) -> Self {
        Self::TypeParse {
            path: path.to_string(),
            line,
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse_message_names_location() {
        let err = PipelineError::type_parse("a.csv", 7, "LATITUDE", "north");
        assert_eq!(
            err.to_string(),
            "cannot parse LATITUDE value \"north\" at a.csv:7"
        );
    }

    #[test]
    fn test_schema_message() {
        let err = PipelineError::schema("b.csv", "missing column STATUS");
        assert_eq!(err.to_string(), "schema error in b.csv: missing column STATUS");
    }
}
