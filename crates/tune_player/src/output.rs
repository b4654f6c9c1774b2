//! 音频输出
//!
//! 使用 cpal 进行音频播放

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};

/// 音频输出错误
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("No output device available")]
    NoDevice,
    #[error("No supported config")]
    NoConfig,
    #[error("Stream error: {0}")]
    Stream(String),
}

/// 音频输出配置
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// 缓冲区大小（帧）
    pub buffer_frames: usize,
}

/// 音频输出流
///
/// `Stream` 不能跨线程移动，输出必须在创建它的线程上使用。
pub struct AudioOutput {
    _stream: Stream,
    ring: Arc<RingBuffer>,
    is_playing: Arc<AtomicBool>,
    position_frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioOutput {
    /// 创建音频输出
    pub fn new(config: OutputConfig) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;

        Self::with_device(&device, config)
    }

    /// 使用指定设备创建音频输出
    fn with_device(device: &Device, config: OutputConfig) -> Result<Self, OutputError> {
        let supported_config = device
            .supported_output_configs()
            .map_err(|e| OutputError::Stream(e.to_string()))?
            .find(|c| {
                c.channels() == config.channels
                    && c.min_sample_rate().0 <= config.sample_rate
                    && c.max_sample_rate().0 >= config.sample_rate
                    && c.sample_format() == SampleFormat::F32
            })
            .ok_or(OutputError::NoConfig)?;

        let stream_config: StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(config.sample_rate))
            .into();

        let channels = config.channels.max(1) as usize;
        let ring = Arc::new(RingBuffer::new(config.buffer_frames * channels));
        let is_playing = Arc::new(AtomicBool::new(false));
        let position_frames = Arc::new(AtomicU64::new(0));

        let ring_clone = ring.clone();
        let is_playing_clone = is_playing.clone();
        let position_clone = position_frames.clone();

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if is_playing_clone.load(Ordering::Relaxed) {
                        let read = ring_clone.read(data);
                        // 填充未读取部分为静音
                        for sample in &mut data[read..] {
                            *sample = 0.0;
                        }
                        position_clone.fetch_add((read / channels) as u64, Ordering::Relaxed);
                    } else {
                        // 暂停时输出静音
                        for sample in data.iter_mut() {
                            *sample = 0.0;
                        }
                    }
                },
                |err| {
                    log::error!("audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| OutputError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| OutputError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            ring,
            is_playing,
            position_frames,
            sample_rate: config.sample_rate,
        })
    }

    /// 写入采样数据，返回实际写入的采样数
    pub fn write(&self, samples: &[f32]) -> usize {
        self.ring.write(samples)
    }

    /// 缓冲区剩余空间（采样数）
    pub fn free_space(&self) -> usize {
        self.ring.free_space()
    }

    /// 缓冲区中尚未播放的采样数
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// 丢弃尚未播放的数据
    pub fn clear(&self) {
        self.ring.clear();
    }

    /// 设置播放状态
    pub fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    /// 自上次重置以来已播放的毫秒数
    pub fn position_ms(&self) -> u64 {
        let frames = self.position_frames.load(Ordering::Relaxed);
        frames * 1000 / self.sample_rate.max(1) as u64
    }

    /// 重置位置
    pub fn reset_position(&self) {
        self.position_frames.store(0, Ordering::Relaxed);
    }
}

/// 有界采样队列，写满时拒绝多余数据
struct RingBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, data: &[f32]) -> usize {
        let mut buf = self.lock();
        let n = data.len().min(self.capacity - buf.len());
        buf.extend(data[..n].iter().copied());
        n
    }

    fn read(&self, output: &mut [f32]) -> usize {
        let mut buf = self.lock();
        let to_read = output.len().min(buf.len());

        let (a, b) = buf.as_slices();
        let a_len = a.len().min(to_read);
        output[..a_len].copy_from_slice(&a[..a_len]);
        let b_len = to_read - a_len;
        if b_len > 0 {
            output[a_len..to_read].copy_from_slice(&b[..b_len]);
        }

        buf.drain(..to_read);
        to_read
    }

    fn free_space(&self) -> usize {
        self.capacity - self.lock().len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
