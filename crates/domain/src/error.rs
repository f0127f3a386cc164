/// Shared error type used across all tessera crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing host capability or invalid / missing configuration.
    #[error("configuration: {0}")]
    Configuration(String),

    /// A guarded operation failed; `context` names the operation.
    #[error("{context} failed: {source}")]
    Runtime {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("invalid state: {0}")]
    State(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap `source` as the cause of a failed `context` operation.
    pub fn runtime(context: impl Into<String>, source: Error) -> Self {
        Self::Runtime {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Walk through `Runtime` wrappers and return the innermost cause.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Runtime { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_display_names_the_operation() {
        let err = Error::runtime("closing session", Error::Other("disk full".into()));
        assert_eq!(err.to_string(), "closing session failed: disk full");
    }

    #[test]
    fn root_cause_unwraps_nested_runtime() {
        let err = Error::runtime(
            "outer",
            Error::runtime("inner", Error::Configuration("no name".into())),
        );
        assert!(err.root_cause().is_configuration());
    }
}
