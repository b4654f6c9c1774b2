//! 曲目定位符
//!
//! 本地文件路径或 HTTP(S) URL。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 定位符解析错误
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("Empty track locator")]
    Empty,
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// 曲目定位符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TrackLocator {
    /// 本地文件
    Path(PathBuf),
    /// 远程 HTTP(S) 资源
    Url(String),
}

impl TrackLocator {
    pub fn parse(s: &str) -> Result<Self, LocatorError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LocatorError::Empty);
        }

        if is_http_url(s) {
            return Ok(Self::Url(s.to_string()));
        }

        if let Some((scheme, _)) = s.split_once("://") {
            return Err(LocatorError::UnsupportedScheme(scheme.to_string()));
        }

        Ok(Self::Path(PathBuf::from(s)))
    }

    /// 小写扩展名，用作解码提示
    pub fn extension(&self) -> Option<String> {
        match self {
            Self::Path(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase()),
            Self::Url(url) => {
                let segment = last_url_segment(url)?;
                let (_, ext) = segment.rsplit_once('.')?;
                if ext.is_empty() {
                    None
                } else {
                    Some(ext.to_lowercase())
                }
            }
        }
    }

    /// 缺少标题标签时使用的显示名（去掉扩展名的文件名）
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Url(url) => match last_url_segment(url) {
                Some(segment) => match segment.rsplit_once('.') {
                    Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                    _ => segment.to_string(),
                },
                None => url.clone(),
            },
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Url(_) => None,
        }
    }
}

impl FromStr for TrackLocator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TrackLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

fn is_http_url(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// URL 最后一段路径（去掉 query 与 fragment）
fn last_url_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    // 只有主机名时没有路径段
    let (_, rest) = path.split_once('/')?;
    let segment = rest.rsplit('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(
            TrackLocator::parse("/sdcard/Music/a.mp3").unwrap(),
            TrackLocator::Path(PathBuf::from("/sdcard/Music/a.mp3"))
        );
        assert_eq!(
            TrackLocator::parse("https://cdn.example.com/a.mp3").unwrap(),
            TrackLocator::Url("https://cdn.example.com/a.mp3".into())
        );
        assert!(matches!(
            TrackLocator::parse("HTTP://example.com/a.ogg").unwrap(),
            TrackLocator::Url(_)
        ));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert_eq!(TrackLocator::parse("  "), Err(LocatorError::Empty));
        assert_eq!(
            TrackLocator::parse("content://media/external/audio/1"),
            Err(LocatorError::UnsupportedScheme("content".into()))
        );
    }

    #[test]
    fn test_extension() {
        let url = TrackLocator::parse("https://example.com/songs/track.FLAC?token=abc").unwrap();
        assert_eq!(url.extension().as_deref(), Some("flac"));

        let stream = TrackLocator::parse("https://example.com/stream").unwrap();
        assert_eq!(stream.extension(), None);

        let local = TrackLocator::parse("music/song.Mp3").unwrap();
        assert_eq!(local.extension().as_deref(), Some("mp3"));
    }

    #[test]
    fn test_display_name() {
        let local = TrackLocator::parse("/music/Blue in Green.flac").unwrap();
        assert_eq!(local.display_name(), "Blue in Green");

        let url = TrackLocator::parse("https://example.com/a/b/so_what.mp3#t=10").unwrap();
        assert_eq!(url.display_name(), "so_what");

        let bare = TrackLocator::parse("https://example.com").unwrap();
        assert_eq!(bare.display_name(), "https://example.com");
    }
}
