use super::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectionError {
    /// A lazy load was needed but the collection has no usable session.
    #[error("failed to lazily initialize a collection{0}")]
    LazyInitialization(String),

    /// A gate was hit while the collection was itself being loaded.
    #[error("Reentrant collection initialization: {0}")]
    ReentrantInitialization(String),

    #[error("Illegal attempt to associate a collection with two open sessions: {0}")]
    DualAssociation(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl CollectionError {
    /// Builds the lazy-initialization error, naming the role and owner key when known.
    pub fn lazy_initialization(role: Option<&str>, key: Option<&Value>, message: &str) -> Self {
        match (role, key) {
            (Some(role), Some(key)) => {
                Self::LazyInitialization(format!(" of role: {}#{}: {}", role, key, message))
            }
            (Some(role), None) => {
                Self::LazyInitialization(format!(" of role: {}: {}", role, message))
            }
            _ => Self::LazyInitialization(format!(": {}", message)),
        }
    }

    /// True for the usage errors raised when a collection cannot reach its session.
    pub fn is_lazy_initialization(&self) -> bool {
        matches!(self, Self::LazyInitialization(_))
    }
}

pub type Result<T> = std::result::Result<T, CollectionError>;

impl<T> From<std::sync::PoisonError<T>> for CollectionError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for CollectionError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CollectionError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CollectionError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_initialization_message_includes_role() {
        let key = Value::Integer(7);
        let err =
            CollectionError::lazy_initialization(Some("Order.lines"), Some(&key), "no Session");
        assert_eq!(
            err.to_string(),
            "failed to lazily initialize a collection of role: Order.lines#7: no Session"
        );
        assert!(err.is_lazy_initialization());

        let err = CollectionError::lazy_initialization(None, None, "no Session");
        assert_eq!(err.to_string(), "failed to lazily initialize a collection: no Session");
    }
}
