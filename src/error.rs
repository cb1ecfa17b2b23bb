use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Model returned an empty response")]
    EmptyModelOutput,

    #[error("Could not recover valid SQL statements from the model response")]
    NoStatements,

    #[error("Unparsable model output: {0}")]
    UnparsableModelOutput(String),

    #[error("The database has no tables")]
    EmptySchema,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
