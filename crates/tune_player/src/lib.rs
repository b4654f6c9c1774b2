//! tune_player - 音频引擎
//!
//! 单曲目播放引擎：定位符解析、解码、输出，以及供播放服务驱动的 [`AudioEngine`] 抽象。

mod config;
mod decoder;
mod engine;
#[cfg(test)]
mod fixture;
mod locator;
mod metadata;
#[cfg(feature = "native")]
mod native;
#[cfg(feature = "native")]
mod output;
mod source;

pub use config::*;
pub use decoder::*;
pub use engine::*;
pub use locator::*;
pub use metadata::*;
#[cfg(feature = "native")]
pub use native::*;
#[cfg(feature = "native")]
pub use output::*;
pub use source::*;
