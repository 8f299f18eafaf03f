use std::path::PathBuf;

use thiserror::Error;

/// Every failure the profiler core can surface to its caller.
///
/// Registry errors are returned synchronously from `add`/`remove` and
/// never leave partial state behind. A collector that fails while
/// collecting is not reported through this type: the pipeline records
/// it as [`CollectorOutcome::Failed`](crate::collector::CollectorOutcome)
/// in that collector's slot.
#[derive(Debug, Error)]
pub enum ProfilerError {
    /// The collector spec is missing a required piece.
    #[error("invalid collector `{collector}`: missing {missing}")]
    InvalidCollector {
        collector: String,
        missing: &'static str,
    },

    /// A different collector type already owns this name.
    #[error("collector name `{name}` is already used by `{existing}`")]
    DuplicateName { name: String, existing: String },

    /// The exact same collector type was registered twice.
    #[error("collector `{collector}` is already registered")]
    DuplicateRegistration { collector: String },

    /// Unregister was called for a type that has no entry.
    #[error("collector `{collector}` is not registered")]
    NotRegistered { collector: String },

    /// A FILE template could not be found under the templates root.
    #[error("template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// A template could not be read or parsed.
    #[error("template error: {0}")]
    Template(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Settings failed validation or could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for ProfilerError {
    fn from(e: redis::RedisError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ProfilerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("serialization: {e}"))
    }
}

pub type Result<T, E = ProfilerError> = std::result::Result<T, E>;
