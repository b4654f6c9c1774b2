//! tune_service - 后台播放服务
//!
//! 播放状态机、播放列表游标、命令/事件运行时，以及 UI 侧的绑定句柄。

mod broadcast;
mod command;
mod config;
mod connection;
mod error;
mod observer;
mod playlist;
mod runtime;
mod service;
mod state;

#[cfg(test)]
mod fake;

pub use broadcast::*;
pub use command::*;
pub use config::*;
pub use connection::*;
pub use error::*;
pub use observer::*;
pub use playlist::*;
pub use runtime::*;
pub use service::*;
pub use state::*;

pub use tune_player::{AudioEngine, EngineEvent, EngineNotice, TrackLocator, TrackMetadata};
