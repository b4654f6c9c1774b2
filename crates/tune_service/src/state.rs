//! 播放状态

use serde::{Deserialize, Serialize};

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    /// 引擎正在异步准备当前曲目
    Preparing,
    /// 已准备，等待首次跳转完成后开始播放
    Ready,
    Playing,
    Paused,
    /// 播放列表结束或被停止
    Stopped,
}

impl PlaybackState {
    pub fn is_prepared(self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }
}

/// 跳转状态，与主状态正交
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekState {
    #[default]
    None,
    /// 准备完成前记录的目标位置（毫秒）
    Pending(u64),
    /// 已交给引擎、等待完成回调
    InFlight(u64),
}

/// 推送给 UI 的状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MusicUpdate {
    pub is_paused: bool,
    pub is_prepared: bool,
    pub state: PlaybackState,
    pub track_index: usize,
}

impl MusicUpdate {
    pub fn new(state: PlaybackState, track_index: usize) -> Self {
        Self {
            is_paused: state == PlaybackState::Paused,
            is_prepared: state.is_prepared(),
            state,
            track_index,
        }
    }
}

/// 上一首/下一首的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipOutcome {
    /// 游标后移并开始下一首
    Advanced,
    /// 已是最后一首，什么也不做
    AtEnd,
    /// 游标前移并开始上一首
    Retreated,
    /// 已是第一首，回到当前曲目开头
    Rewound,
    /// 播放列表为空
    NoSongs,
}

impl SkipOutcome {
    /// 游标是否移动
    pub fn moved(self) -> bool {
        matches!(self, Self::Advanced | Self::Retreated)
    }
}
