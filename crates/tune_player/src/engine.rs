//! 引擎抽象
//!
//! [`AudioEngine`] 描述一个单曲目、异步准备的播放组件。准备完成、跳转完成、播放结束
//! 与错误都以 [`EngineNotice`] 的形式通过通道回报给持有引擎的线程。

use std::path::PathBuf;

use crate::{DecoderError, TrackLocator, TrackMetadata};

/// 引擎错误
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
    #[error("No data source set")]
    NoSource,
    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),
    #[cfg(feature = "native")]
    #[error("Output error: {0}")]
    Output(#[from] crate::OutputError),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine already released")]
    Released,
}

/// 引擎回调事件（引擎 -> 服务）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// 异步准备完成，可以开始播放
    Prepared,
    /// 跳转完成
    SeekComplete,
    /// 当前曲目播放结束
    Completion,
    /// 播放错误
    Error(String),
}

/// 带数据源代号的回调
///
/// `generation` 与发出时引擎的 [`AudioEngine::generation`] 相同。数据源被替换后，
/// 旧代号的回调应被丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineNotice {
    pub generation: u64,
    pub event: EngineEvent,
}

impl EngineNotice {
    pub fn new(generation: u64, event: EngineEvent) -> Self {
        Self { generation, event }
    }
}

/// 单曲目播放引擎
pub trait AudioEngine {
    /// 绑定数据源，代号加一
    fn set_data_source(&mut self, locator: &TrackLocator) -> Result<(), EngineError>;

    /// 开始异步准备，完成后回报 [`EngineEvent::Prepared`]
    fn prepare_async(&mut self) -> Result<(), EngineError>;

    fn start(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);

    /// 清除数据源，回到未初始化状态
    fn reset(&mut self);

    /// 异步跳转，完成后回报 [`EngineEvent::SeekComplete`]
    fn seek_to(&mut self, position_ms: u64);

    fn is_playing(&self) -> bool;

    fn duration_ms(&self) -> Option<u64>;

    fn position_ms(&self) -> u64;

    /// 已准备数据源的元数据
    fn metadata(&self) -> TrackMetadata;

    /// 当前数据源代号
    fn generation(&self) -> u64;

    /// 释放资源，之后引擎不可再用
    fn release(&mut self);
}
