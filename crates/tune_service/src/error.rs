//! 服务错误

use tune_player::EngineError;

use crate::PlaylistError;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Service not bound")]
    NotBound,
    #[error("Service disconnected")]
    Disconnected,
    #[error("No songs found!")]
    NoSongs,
    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Config(e.to_string())
    }
}
