//! 数据源打开

use std::fs::File;
use std::io::ErrorKind;

use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

use crate::{EngineError, PlayerConfig, TrackLocator};

/// 已打开的数据源及解码提示
pub struct OpenedSource {
    pub source: Box<dyn MediaSource>,
    pub hint: Hint,
}

/// 检查数据源是否可用（不读取内容）
pub fn check_source(locator: &TrackLocator) -> Result<(), EngineError> {
    match locator {
        TrackLocator::Path(path) => {
            if path.is_file() {
                Ok(())
            } else {
                Err(EngineError::SourceNotFound(path.clone()))
            }
        }
        TrackLocator::Url(url) => {
            if cfg!(feature = "http") {
                Ok(())
            } else {
                Err(EngineError::UnsupportedSource(format!(
                    "{url} (built without http support)"
                )))
            }
        }
    }
}

/// 打开数据源
pub fn open_source(
    locator: &TrackLocator,
    config: &PlayerConfig,
) -> Result<OpenedSource, EngineError> {
    let mut hint = Hint::new();
    if let Some(ext) = locator.extension() {
        hint.with_extension(&ext);
    }

    let source: Box<dyn MediaSource> = match locator {
        TrackLocator::Path(path) => match File::open(path) {
            Ok(f) => Box::new(f),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EngineError::SourceNotFound(path.clone()))
            }
            Err(e) => return Err(e.into()),
        },
        TrackLocator::Url(url) => open_url(url, config)?,
    };

    Ok(OpenedSource { source, hint })
}

/// 下载远程曲目到内存，保证解码器可以跳转
#[cfg(feature = "http")]
fn open_url(url: &str, config: &PlayerConfig) -> Result<Box<dyn MediaSource>, EngineError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(config.http_timeout))
        .build()
        .into();

    let response = agent
        .get(url)
        .call()
        .map_err(|e| EngineError::Http(e.to_string()))?;

    let bytes = read_capped(response.into_body().into_reader(), config.http_max_bytes)?;

    log::debug!("downloaded {} bytes from {}", bytes.len(), url);
    Ok(Box::new(std::io::Cursor::new(bytes)))
}

/// 读完整个响应体；超过上限时报错，不截断
#[cfg(feature = "http")]
fn read_capped(reader: impl std::io::Read, max_bytes: u64) -> Result<Vec<u8>, EngineError> {
    use std::io::Read;

    let mut bytes = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut bytes)?;
    if bytes.len() as u64 > max_bytes {
        return Err(EngineError::Http(format!(
            "track exceeds {max_bytes} bytes"
        )));
    }
    Ok(bytes)
}

#[cfg(not(feature = "http"))]
fn open_url(url: &str, _config: &PlayerConfig) -> Result<Box<dyn MediaSource>, EngineError> {
    Err(EngineError::UnsupportedSource(format!(
        "{url} (built without http support)"
    )))
}
