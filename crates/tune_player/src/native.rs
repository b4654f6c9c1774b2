//! 本地播放引擎
//!
//! 每个数据源对应一个工作线程：打开、探测、创建输出后回报 `Prepared`，之后在循环中
//! 处理传输命令并解码。cpal 的输出流不能跨线程，所以它只存在于工作线程内。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::{
    check_source, open_source, AudioDecoder, AudioEngine, AudioOutput, EngineError, EngineEvent,
    EngineNotice, OutputConfig, PlayerConfig, TrackLocator, TrackMetadata,
};

const UNKNOWN_DURATION: u64 = u64::MAX;

/// 工作线程命令
#[derive(Debug, Clone, Copy)]
enum WorkerCommand {
    Start,
    Pause,
    Seek(u64),
    Stop,
}

/// 引擎与工作线程共享的状态
struct WorkerShared {
    playing: AtomicBool,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
    metadata: Mutex<TrackMetadata>,
}

impl WorkerShared {
    fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            position_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(UNKNOWN_DURATION),
            metadata: Mutex::new(TrackMetadata::default()),
        }
    }
}

struct Worker {
    cmd_tx: Sender<WorkerCommand>,
    shared: Arc<WorkerShared>,
    join: Option<JoinHandle<()>>,
}

/// 基于 symphonia + cpal 的引擎
pub struct NativeEngine {
    config: PlayerConfig,
    notice_tx: Sender<EngineNotice>,
    locator: Option<TrackLocator>,
    generation: u64,
    worker: Option<Worker>,
    released: bool,
}

impl NativeEngine {
    pub fn new(config: PlayerConfig, notice_tx: Sender<EngineNotice>) -> Self {
        Self {
            config,
            notice_tx,
            locator: None,
            generation: 0,
            worker: None,
            released: false,
        }
    }

    fn send(&self, cmd: WorkerCommand) {
        if let Some(worker) = &self.worker {
            let _ = worker.cmd_tx.send(cmd);
        }
    }

    /// 通知工作线程退出；不等待，下载中的线程会在超时后自行结束
    fn shutdown_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.cmd_tx.send(WorkerCommand::Stop);
            worker.shared.playing.store(false, Ordering::Relaxed);
        }
    }
}

impl AudioEngine for NativeEngine {
    fn set_data_source(&mut self, locator: &TrackLocator) -> Result<(), EngineError> {
        if self.released {
            return Err(EngineError::Released);
        }
        self.shutdown_worker();
        self.generation += 1;
        self.locator = None;

        check_source(locator)?;
        self.locator = Some(locator.clone());
        Ok(())
    }

    fn prepare_async(&mut self) -> Result<(), EngineError> {
        if self.released {
            return Err(EngineError::Released);
        }
        let locator = self.locator.clone().ok_or(EngineError::NoSource)?;
        self.shutdown_worker();

        let (cmd_tx, cmd_rx) = unbounded();
        let shared = Arc::new(WorkerShared::new());
        let task = WorkerTask {
            generation: self.generation,
            locator,
            config: self.config.clone(),
            notice_tx: self.notice_tx.clone(),
            cmd_rx,
            shared: shared.clone(),
        };

        let join = thread::Builder::new()
            .name(format!("tune-engine-{}", self.generation))
            .spawn(move || task.run())?;

        self.worker = Some(Worker {
            cmd_tx,
            shared,
            join: Some(join),
        });
        Ok(())
    }

    fn start(&mut self) {
        if let Some(worker) = &self.worker {
            worker.shared.playing.store(true, Ordering::Relaxed);
        }
        self.send(WorkerCommand::Start);
    }

    fn pause(&mut self) {
        if let Some(worker) = &self.worker {
            worker.shared.playing.store(false, Ordering::Relaxed);
        }
        self.send(WorkerCommand::Pause);
    }

    fn stop(&mut self) {
        self.pause();
    }

    fn reset(&mut self) {
        self.shutdown_worker();
        self.locator = None;
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.send(WorkerCommand::Seek(position_ms));
    }

    fn is_playing(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.shared.playing.load(Ordering::Relaxed))
    }

    fn duration_ms(&self) -> Option<u64> {
        self.worker.as_ref().and_then(|w| {
            match w.shared.duration_ms.load(Ordering::Relaxed) {
                UNKNOWN_DURATION => None,
                ms => Some(ms),
            }
        })
    }

    fn position_ms(&self) -> u64 {
        self.worker
            .as_ref()
            .map_or(0, |w| w.shared.position_ms.load(Ordering::Relaxed))
    }

    fn metadata(&self) -> TrackMetadata {
        self.worker
            .as_ref()
            .map(|w| {
                w.shared
                    .metadata
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            })
            .unwrap_or_default()
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.locator = None;
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.cmd_tx.send(WorkerCommand::Stop);
            if let Some(join) = worker.join.take() {
                if join.join().is_err() {
                    log::error!("engine worker panicked");
                }
            }
        }
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.shutdown_worker();
    }
}

/// 单个数据源的工作线程
struct WorkerTask {
    generation: u64,
    locator: TrackLocator,
    config: PlayerConfig,
    notice_tx: Sender<EngineNotice>,
    cmd_rx: Receiver<WorkerCommand>,
    shared: Arc<WorkerShared>,
}

impl WorkerTask {
    fn notify(&self, event: EngineEvent) {
        let _ = self
            .notice_tx
            .send(EngineNotice::new(self.generation, event));
    }

    fn run(self) {
        let (decoder, output) = match self.prepare() {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("failed to prepare {}: {}", self.locator, e);
                self.notify(EngineEvent::Error(e.to_string()));
                return;
            }
        };

        // 准备期间引擎可能已经换了数据源
        match self.cmd_rx.try_recv() {
            Ok(WorkerCommand::Stop) | Err(TryRecvError::Disconnected) => return,
            Ok(cmd) => {
                self.notify(EngineEvent::Prepared);
                PlaybackLoop::new(&self, decoder, output).run(Some(cmd));
            }
            Err(TryRecvError::Empty) => {
                self.notify(EngineEvent::Prepared);
                PlaybackLoop::new(&self, decoder, output).run(None);
            }
        }
    }

    fn prepare(&self) -> Result<(AudioDecoder, AudioOutput), EngineError> {
        let opened = open_source(&self.locator, &self.config)?;
        let decoder = AudioDecoder::open(opened)?;

        let info = &decoder.info;
        if let Some(duration) = info.duration {
            self.shared
                .duration_ms
                .store(duration.as_millis() as u64, Ordering::Relaxed);
        }
        *self
            .shared
            .metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = decoder.metadata.clone();

        log::debug!(
            "prepared {} ({}, {} Hz, {} ch)",
            self.locator,
            info.codec,
            info.sample_rate,
            info.channels
        );

        let output = AudioOutput::new(OutputConfig {
            sample_rate: info.sample_rate,
            channels: info.channels as u16,
            buffer_frames: self.config.buffer_frames,
        })?;

        Ok((decoder, output))
    }
}

/// 播放循环写入采样的去处
trait SampleSink {
    fn write(&self, samples: &[f32]) -> usize;
    fn free_space(&self) -> usize;
    fn buffered(&self) -> usize;
    fn clear(&self);
    fn set_playing(&self, playing: bool);
    fn position_ms(&self) -> u64;
    fn reset_position(&self);
}

impl SampleSink for AudioOutput {
    fn write(&self, samples: &[f32]) -> usize {
        AudioOutput::write(self, samples)
    }

    fn free_space(&self) -> usize {
        AudioOutput::free_space(self)
    }

    fn buffered(&self) -> usize {
        AudioOutput::buffered(self)
    }

    fn clear(&self) {
        AudioOutput::clear(self)
    }

    fn set_playing(&self, playing: bool) {
        AudioOutput::set_playing(self, playing)
    }

    fn position_ms(&self) -> u64 {
        AudioOutput::position_ms(self)
    }

    fn reset_position(&self) {
        AudioOutput::reset_position(self)
    }
}

struct PlaybackLoop<'a, S: SampleSink> {
    task: &'a WorkerTask,
    decoder: AudioDecoder,
    output: S,
    /// 已解码但还没写进输出缓冲的采样
    pending: Vec<f32>,
    /// 最近一次跳转的目标，输出位置从这里开始累加
    position_base: u64,
    playing: bool,
    ended: bool,
}

impl<'a, S: SampleSink> PlaybackLoop<'a, S> {
    fn new(task: &'a WorkerTask, decoder: AudioDecoder, output: S) -> Self {
        Self {
            task,
            decoder,
            output,
            pending: Vec::new(),
            position_base: 0,
            playing: false,
            ended: false,
        }
    }

    fn run(mut self, first: Option<WorkerCommand>) {
        if let Some(cmd) = first {
            if !self.handle_command(cmd) {
                return;
            }
        }

        loop {
            loop {
                match self.task.cmd_rx.try_recv() {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            self.step();

            // 避免 CPU 空转
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// 补充输出缓冲、检查结束并发布当前位置
    fn step(&mut self) {
        if self.playing {
            self.fill_output();
            self.check_completion();
        }
        self.task
            .shared
            .position_ms
            .store(self.position_base + self.output.position_ms(), Ordering::Relaxed);
    }

    fn handle_command(&mut self, cmd: WorkerCommand) -> bool {
        match cmd {
            WorkerCommand::Start => {
                self.playing = true;
                self.output.set_playing(true);
            }
            WorkerCommand::Pause => {
                self.playing = false;
                self.output.set_playing(false);
            }
            WorkerCommand::Seek(position_ms) => self.seek(position_ms),
            WorkerCommand::Stop => {
                self.output.set_playing(false);
                return false;
            }
        }
        true
    }

    fn seek(&mut self, position_ms: u64) {
        match self.decoder.seek(Duration::from_millis(position_ms)) {
            Ok(()) => {
                self.output.clear();
                self.output.reset_position();
                self.pending.clear();
                self.position_base = position_ms;
                self.ended = false;
                self.task.notify(EngineEvent::SeekComplete);
            }
            Err(e) => {
                log::error!("seek to {} ms failed: {}", position_ms, e);
                self.task.notify(EngineEvent::Error(e.to_string()));
            }
        }
    }

    fn fill_output(&mut self) {
        while !self.ended && self.output.free_space() > 0 {
            if self.pending.is_empty() {
                match self.decoder.decode_next() {
                    Ok(Some(samples)) => self.pending = samples,
                    Ok(None) => self.ended = true,
                    Err(e) => {
                        log::error!("decode error: {}", e);
                        self.ended = true;
                        self.playing = false;
                        self.output.set_playing(false);
                        self.task.shared.playing.store(false, Ordering::Relaxed);
                        self.task.notify(EngineEvent::Error(e.to_string()));
                        return;
                    }
                }
                continue;
            }

            let written = self.output.write(&self.pending);
            self.pending.drain(..written);
            if written == 0 {
                break;
            }
        }
    }

    fn check_completion(&mut self) {
        if self.ended && self.pending.is_empty() && self.output.buffered() == 0 {
            self.playing = false;
            self.output.set_playing(false);
            self.task.shared.playing.store(false, Ordering::Relaxed);
            self.task.notify(EngineEvent::Completion);
        }
    }
}
