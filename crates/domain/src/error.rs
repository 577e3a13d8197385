/// Shared error type used across all Orion crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("engine {engine}: {message}")]
    Engine { engine: String, message: String },

    #[error("memory: {0}")]
    Memory(String),

    #[error("store: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("security: {0}")]
    Security(String),

    #[error("acp {code}: {message}")]
    Acp { code: String, message: String },

    #[error("channel: {0}")]
    Channel(String),

    #[error("tool: {0}")]
    Tool(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
