use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("Malformed topic: {0}")]
    Malformed(std::string::String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Payload is not a JSON object")]
    NotAnObject,
    #[error("Invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: std::string::String,
    },
}
