//! 曲目元数据

use serde::{Deserialize, Serialize};
use symphonia::core::meta::{MetadataRevision, StandardTagKey, Value as MetaValue};

use crate::TrackLocator;

/// 从标签中读取的曲目信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

impl TrackMetadata {
    /// 合并一组标签，已有字段优先
    pub fn absorb(&mut self, revision: &MetadataRevision) {
        for tag in revision.tags() {
            let value = meta_value_to_string(&tag.value);
            if value.trim().is_empty() {
                continue;
            }
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => {
                    self.title.get_or_insert(value);
                }
                Some(StandardTagKey::Artist) => {
                    self.artist.get_or_insert(value);
                }
                Some(StandardTagKey::Album) => {
                    self.album.get_or_insert(value);
                }
                _ => {}
            }
        }
    }

    /// 标题，缺失时退回到定位符的文件名
    pub fn title_or_name(&self, locator: &TrackLocator) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| locator.display_name())
    }
}

fn meta_value_to_string(v: &MetaValue) -> String {
    match v {
        MetaValue::Binary(b) => format!("(binary:{} bytes)", b.len()),
        MetaValue::Boolean(b) => b.to_string(),
        MetaValue::Float(f) => f.to_string(),
        MetaValue::SignedInt(i) => i.to_string(),
        MetaValue::String(s) => s.to_string(),
        MetaValue::UnsignedInt(u) => u.to_string(),
        _ => String::new(),
    }
}
