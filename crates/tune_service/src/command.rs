//! 服务命令和事件定义

use serde::{Deserialize, Serialize};
use tune_player::TrackLocator;

use crate::{MusicUpdate, Playlist, SkipOutcome};

/// 服务命令（UI -> 服务）
#[derive(Debug, Clone)]
pub enum ServiceCommand {
    /// 替换播放列表，不开始播放
    SetPlaylist(Playlist),
    /// 从游标处开始播放
    Play,
    /// 替换播放列表并从第一首开始
    Start(Playlist),
    /// 播放指定曲目
    PlayIndex(usize),
    Pause,
    Resume,
    Next,
    Previous,
    /// 跳转到指定位置（毫秒）
    SeekTo(u64),
    /// 从头播放当前曲目
    Restart,
    Stop,
    /// 重新推送当前状态和曲目信息（重新绑定后使用）
    Refresh,
    /// 关闭服务
    Shutdown,
}

/// 正在播放的曲目信息，每次准备成功广播一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
    pub locator: TrackLocator,
    pub track_index: usize,
}

/// 服务事件（服务 -> UI）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServiceEvent {
    /// 状态变更
    StateChanged(MusicUpdate),
    /// 当前曲目信息
    NowPlaying(NowPlaying),
    /// 上一首/下一首结果
    Skipped(SkipOutcome),
    /// 播放进度
    Position {
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// 播放列表全部播完
    Finished,
    /// 播放列表为空
    NoSongs,
    /// 播放错误
    Error(String),
}
