use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Which side of a stage a queue is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEnd {
    Input,
    Output,
}

impl std::fmt::Display for QueueEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEnd::Input => write!(f, "input"),
            QueueEnd::Output => write!(f, "output"),
        }
    }
}

/// Errors that can occur while wiring or running stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required argument was unset or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A queue-backed stage was built without its queue
    #[error("Stage '{stage}' requires an {end} queue")]
    MissingQueue { stage: String, end: QueueEnd },

    /// Pipeline has already been started
    #[error("Pipeline has already been started")]
    AlreadyStarted,

    /// No stages in pipeline
    #[error("Cannot start pipeline with no stages")]
    NoStages,

    /// Thread spawn or join error
    #[error("Thread error in stage '{stage}': {reason}")]
    ThreadError { stage: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_queue_message() {
        let err = PipelineError::MissingQueue {
            stage: "decoder".into(),
            end: QueueEnd::Input,
        };
        assert_eq!(err.to_string(), "Stage 'decoder' requires an input queue");
    }
}
