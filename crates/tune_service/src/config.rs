//! 服务配置

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tune_player::PlayerConfig;

use crate::ServiceError;

/// 服务配置，JSON 中缺省的字段取默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 命令通道容量
    pub command_capacity: usize,
    /// 事件通道容量
    pub event_capacity: usize,
    /// 播放中进度事件的间隔
    pub position_interval_ms: u64,
    /// 输出缓冲区大小（帧）
    pub output_buffer_frames: usize,
    /// 远程曲目下载超时
    pub http_timeout_secs: u64,
    /// 远程曲目最大字节数
    pub http_max_bytes: u64,
    /// Android 日志标签
    pub log_tag: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command_capacity: 32,
            event_capacity: 64,
            position_interval_ms: 500,
            output_buffer_frames: 8192,
            http_timeout_secs: 15,
            http_max_bytes: 256 * 1024 * 1024,
            log_tag: "TuneService".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub(crate) fn validate(&self) -> Result<(), ServiceError> {
        if self.command_capacity == 0 || self.event_capacity == 0 {
            return Err(ServiceError::Config(
                "channel capacities must be non-zero".into(),
            ));
        }
        if self.position_interval_ms == 0 {
            return Err(ServiceError::Config(
                "position_interval_ms must be non-zero".into(),
            ));
        }
        if self.output_buffer_frames == 0 {
            return Err(ServiceError::Config(
                "output_buffer_frames must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms)
    }

    /// 引擎侧配置
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            buffer_frames: self.output_buffer_frames,
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            http_max_bytes: self.http_max_bytes,
        }
    }
}
