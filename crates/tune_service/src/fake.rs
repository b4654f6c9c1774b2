//! 测试用的脚本化引擎

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use tune_player::{
    AudioEngine, EngineError, EngineEvent, EngineNotice, TrackLocator, TrackMetadata,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetDataSource(TrackLocator),
    PrepareAsync,
    Start,
    Pause,
    Stop,
    Reset,
    SeekTo(u64),
    Release,
}

/// 记录调用的假引擎
///
/// 给了 `notice_tx` 时，准备和跳转会立即回报完成（用于运行时测试）；
/// 否则由测试手动投递回调。
pub struct FakeEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    notice_tx: Option<Sender<EngineNotice>>,
    missing: HashSet<TrackLocator>,
    titles: Vec<(TrackLocator, String)>,
    locator: Option<TrackLocator>,
    generation: u64,
    playing: bool,
    position_ms: u64,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            notice_tx: None,
            missing: HashSet::new(),
            titles: Vec::new(),
            locator: None,
            generation: 0,
            playing: false,
            position_ms: 0,
        }
    }

    pub fn auto(notice_tx: Sender<EngineNotice>) -> Self {
        Self {
            notice_tx: Some(notice_tx),
            ..Self::new()
        }
    }

    pub fn with_missing(mut self, locator: &str) -> Self {
        self.missing.insert(TrackLocator::parse(locator).unwrap());
        self
    }

    pub fn with_title(mut self, locator: &str, title: &str) -> Self {
        self.titles
            .push((TrackLocator::parse(locator).unwrap(), title.to_string()));
        self
    }

    /// 与测试共享调用记录（引擎被移进服务线程时使用）
    pub fn with_call_log(mut self, calls: Arc<Mutex<Vec<Call>>>) -> Self {
        self.calls = calls;
        self
    }

    pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
        self.calls.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn notify(&self, event: EngineEvent) {
        if let Some(tx) = &self.notice_tx {
            let _ = tx.send(EngineNotice::new(self.generation, event));
        }
    }
}

impl AudioEngine for FakeEngine {
    fn set_data_source(&mut self, locator: &TrackLocator) -> Result<(), EngineError> {
        self.record(Call::SetDataSource(locator.clone()));
        self.generation += 1;
        if self.missing.contains(locator) {
            return Err(EngineError::SourceNotFound(
                locator.as_path().map(|p| p.to_path_buf()).unwrap_or_default(),
            ));
        }
        self.locator = Some(locator.clone());
        Ok(())
    }

    fn prepare_async(&mut self) -> Result<(), EngineError> {
        self.record(Call::PrepareAsync);
        if self.locator.is_none() {
            return Err(EngineError::NoSource);
        }
        self.notify(EngineEvent::Prepared);
        Ok(())
    }

    fn start(&mut self) {
        self.record(Call::Start);
        self.playing = true;
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
        self.playing = false;
    }

    fn stop(&mut self) {
        self.record(Call::Stop);
        self.playing = false;
    }

    fn reset(&mut self) {
        self.record(Call::Reset);
        self.locator = None;
        self.playing = false;
        self.position_ms = 0;
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.record(Call::SeekTo(position_ms));
        self.position_ms = position_ms;
        self.notify(EngineEvent::SeekComplete);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn duration_ms(&self) -> Option<u64> {
        self.locator.as_ref().map(|_| 180_000)
    }

    fn position_ms(&self) -> u64 {
        self.position_ms
    }

    fn metadata(&self) -> TrackMetadata {
        let title = self.locator.as_ref().and_then(|current| {
            self.titles
                .iter()
                .find(|(locator, _)| locator == current)
                .map(|(_, title)| title.clone())
        });
        TrackMetadata {
            title,
            ..Default::default()
        }
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn release(&mut self) {
        self.record(Call::Release);
    }
}
