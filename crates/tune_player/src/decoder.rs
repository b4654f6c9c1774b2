//! 音频解码器
//!
//! 使用 symphonia 解码音频流

use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;

use crate::{OpenedSource, TrackMetadata};

/// 解码器错误
#[derive(thiserror::Error, Debug)]
pub enum DecoderError {
    #[error("No supported audio track found")]
    NoTrack,
    #[error("Unsupported codec")]
    UnsupportedCodec,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SymphoniaError> for DecoderError {
    fn from(e: SymphoniaError) -> Self {
        DecoderError::Decode(e.to_string())
    }
}

/// 音频信息
#[derive(Debug, Clone)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub duration: Option<Duration>,
    pub codec: String,
}

/// 音频解码器
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    pub info: AudioInfo,
    pub metadata: TrackMetadata,
}

impl AudioDecoder {
    /// 探测数据源并创建解码器，同时读取标签
    pub fn open(opened: OpenedSource) -> Result<Self, DecoderError> {
        let OpenedSource { source, hint } = opened;
        let mss = MediaSourceStream::new(source, Default::default());

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecoderError::Decode(e.to_string()))?;

        // 容器外（如 ID3v2）与容器内的标签都读取，前者优先
        let mut metadata = TrackMetadata::default();
        if let Some(probed_meta) = probed.metadata.get() {
            if let Some(rev) = probed_meta.current() {
                metadata.absorb(rev);
            }
        }
        {
            let format_meta = probed.format.metadata();
            if let Some(rev) = format_meta.current() {
                metadata.absorb(rev);
            }
        }

        let format = probed.format;

        // 查找第一个音频轨道
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoTrack)?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let duration = codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));
        metadata.duration_ms = duration.map(|d| d.as_millis() as u64);

        let info = AudioInfo {
            sample_rate,
            channels,
            duration,
            codec: format!("{:?}", codec_params.codec),
        };

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|_| DecoderError::UnsupportedCodec)?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_buf: None,
            info,
            metadata,
        })
    }

    /// 解码下一帧，返回交错的 f32 采样；`None` 表示流结束
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            // 跳过非目标轨道
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                // 损坏的包直接跳过
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let capacity = decoded.capacity();

            let needs_alloc = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < capacity * spec.channels.count());
            if needs_alloc {
                self.sample_buf = Some(SampleBuffer::new(capacity as u64, spec));
            }
            let Some(sample_buf) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(sample_buf.samples().to_vec()));
        }
    }

    /// 跳转到指定时间
    pub fn seek(&mut self, time: Duration) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: symphonia::core::units::Time::from(time.as_secs_f64()),
            track_id: Some(self.track_id),
        };

        self.format
            .seek(SeekMode::Accurate, seek_to)
            .map_err(|e| DecoderError::Decode(e.to_string()))?;

        // 重置解码器状态
        self.decoder.reset();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::open_wav;
    use std::io::Cursor;
    use symphonia::core::probe::Hint;

    fn decode_all(decoder: &mut AudioDecoder) -> usize {
        let mut total = 0;
        while let Some(samples) = decoder.decode_next().unwrap() {
            total += samples.len();
        }
        total
    }

    #[test]
    fn test_open_wav_reads_info() {
        let decoder = open_wav(8000, 8000);
        assert_eq!(decoder.info.sample_rate, 8000);
        assert_eq!(decoder.info.channels, 1);
        assert_eq!(decoder.info.duration, Some(Duration::from_secs(1)));
        assert_eq!(decoder.metadata.duration_ms, Some(1000));
        assert_eq!(decoder.metadata.title, None);
    }

    #[test]
    fn test_decode_to_end_then_seek_back() {
        let mut decoder = open_wav(8000, 8000);
        assert_eq!(decode_all(&mut decoder), 8000);
        assert!(decoder.decode_next().unwrap().is_none());

        decoder.seek(Duration::from_millis(500)).unwrap();
        let rest = decode_all(&mut decoder);
        assert!(rest > 0 && rest < 8000, "decoded {rest} samples after seek");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = AudioDecoder::open(OpenedSource {
            source: Box::new(Cursor::new(vec![0u8; 64])),
            hint: Hint::new(),
        });
        assert!(result.is_err());
    }
}
