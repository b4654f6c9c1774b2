//! 引擎配置

use std::time::Duration;

/// 播放引擎配置
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// 输出环形缓冲区大小（帧）
    pub buffer_frames: usize,
    /// HTTP 请求超时
    pub http_timeout: Duration,
    /// 远程曲目最大下载字节数
    pub http_max_bytes: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            buffer_frames: 8192,
            http_timeout: Duration::from_secs(15),
            http_max_bytes: 256 * 1024 * 1024, // 256MB
        }
    }
}
