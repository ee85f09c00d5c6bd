use aether_core::error::{PayloadError, TopicError};
use std::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DBError {
    #[error(transparent)]
    SQLError(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Database directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum MQTTError {
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error("Invalid Payload: {0}")]
    Payload(#[from] PayloadError),
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::error::Error),
    #[error("Request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("Connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("Ingest channel closed")]
    ChannelClosed,
    #[error("Ingest queue full")]
    QueueFull,
    #[error("Client already started")]
    AlreadyStarted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, std::string::String),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub enum ObserverError {
    User(Box<dyn error::Error + Send + Sync>),
    Internal(Box<dyn error::Error + Send + Sync>),
}

impl From<DBError> for ObserverError {
    fn from(err: DBError) -> Self {
        ObserverError::Internal(Box::from(err))
    }
}

impl From<MQTTError> for ObserverError {
    fn from(err: MQTTError) -> Self {
        match err {
            MQTTError::Topic(_) | MQTTError::Payload(_) | MQTTError::Parse(_) => {
                ObserverError::User(Box::from(err))
            }
            _ => ObserverError::Internal(Box::from(err)),
        }
    }
}
