//! 播放列表

use serde::{Deserialize, Serialize};
use tune_player::{LocatorError, TrackLocator};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("Invalid locator #{index}: {source}")]
    InvalidLocator {
        index: usize,
        #[source]
        source: LocatorError,
    },
}

/// 不可变的曲目序列，每次开始播放时整体替换
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    tracks: Vec<TrackLocator>,
}

impl Playlist {
    pub fn new(tracks: Vec<TrackLocator>) -> Self {
        Self { tracks }
    }

    /// 从字符串列表解析，任何一项无效则整体失败
    pub fn parse<I, S>(items: I) -> Result<Self, PlaylistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tracks = items
            .into_iter()
            .enumerate()
            .map(|(index, s)| {
                TrackLocator::parse(s.as_ref())
                    .map_err(|source| PlaylistError::InvalidLocator { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackLocator> {
        self.tracks.get(index)
    }

    /// 最后一个有效下标，空列表为 0
    pub fn last_index(&self) -> usize {
        self.tracks.len().saturating_sub(1)
    }

    /// 把下标限制在 `[0, len-1]`
    pub fn clamp(&self, index: usize) -> usize {
        index.min(self.last_index())
    }
}
