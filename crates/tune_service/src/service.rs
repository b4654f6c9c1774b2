//! 播放状态机
//!
//! [`MusicService`] 独占一个 [`AudioEngine`]，维护播放列表游标，并把引擎的异步回调
//! （准备完成、跳转完成、播放结束、错误）转换成状态迁移。所有方法都在同一个线程上调用。
//!
//! ```text
//! Idle ──start──▶ Preparing ──prepared──▶ Playing ◀──resume── Paused
//!                     │                      │  └────pause────▶ │
//!                     └─prepared+pending seek─▶ Ready ──seek complete──▶ Playing
//! Playing ──completion (last track)──▶ Stopped
//! ```

use log::{debug, error, info, warn};
use tune_player::{AudioEngine, EngineEvent, EngineNotice, TrackLocator};

use crate::{
    BoxedObserver, MusicUpdate, NowPlaying, ObserverId, Observers, PlaybackState, Playlist,
    SeekState, ServiceCommand, ServiceError, ServiceEvent, SkipOutcome,
};

/// 后台播放服务
pub struct MusicService<E: AudioEngine> {
    engine: E,
    playlist: Playlist,
    cursor: usize,
    state: PlaybackState,
    seek: SeekState,
    observers: Observers,
    last_update: Option<MusicUpdate>,
    now_playing: Option<NowPlaying>,
    released: bool,
}

impl<E: AudioEngine> MusicService<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            playlist: Playlist::default(),
            cursor: 0,
            state: PlaybackState::Idle,
            seek: SeekState::None,
            observers: Observers::default(),
            last_update: None,
            now_playing: None,
            released: false,
        }
    }

    // ------------------------------------------------------------------
    // 观察者
    // ------------------------------------------------------------------

    pub fn register(&mut self, observer: BoxedObserver) -> ObserverId {
        self.observers.register(observer)
    }

    pub fn unregister(&mut self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    fn emit(&mut self, event: ServiceEvent) {
        self.observers.notify(&event);
    }

    /// 迁移到新状态，快照有变化时推送
    fn transition(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("playback state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        let update = self.snapshot();
        if self.last_update != Some(update) {
            self.last_update = Some(update);
            self.emit(ServiceEvent::StateChanged(update));
        }
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn seek_state(&self) -> SeekState {
        self.seek
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn snapshot(&self) -> MusicUpdate {
        MusicUpdate::new(self.state, self.cursor)
    }

    pub fn current_locator(&self) -> Option<&TrackLocator> {
        self.playlist.get(self.cursor)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        if self.state.is_prepared() {
            self.engine.duration_ms()
        } else {
            None
        }
    }

    pub fn position_ms(&self) -> u64 {
        if self.state.is_prepared() {
            self.engine.position_ms()
        } else {
            0
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 最近一次广播的曲目信息，曲目停止或出错后清空
    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// 无条件推送当前快照和曲目信息
    pub fn refresh(&mut self) {
        let update = self.snapshot();
        self.last_update = Some(update);
        self.emit(ServiceEvent::StateChanged(update));
        if let Some(now_playing) = self.now_playing.clone() {
            self.emit(ServiceEvent::NowPlaying(now_playing));
        }
    }

    // ------------------------------------------------------------------
    // 控制
    // ------------------------------------------------------------------

    /// 整体替换播放列表，不开始播放
    pub fn set_playlist(&mut self, playlist: Playlist) {
        debug!("playlist replaced ({} tracks)", playlist.len());
        self.playlist = playlist;
        self.cursor = self.playlist.clamp(self.cursor);
    }

    /// 从游标处开始播放
    pub fn initiate(&mut self) -> Result<(), ServiceError> {
        self.start(self.cursor)
    }

    /// 停掉当前数据源，开始异步准备指定曲目
    pub fn start(&mut self, track_index: usize) -> Result<(), ServiceError> {
        if self.released {
            return Err(ServiceError::Disconnected);
        }
        if self.playlist.is_empty() {
            warn!("No songs found!");
            self.emit(ServiceEvent::NoSongs);
            return Err(ServiceError::NoSongs);
        }

        self.cursor = self.playlist.clamp(track_index);
        let Some(locator) = self.playlist.get(self.cursor).cloned() else {
            return Err(ServiceError::NoSongs);
        };

        self.engine.stop();
        self.engine.reset();
        self.now_playing = None;
        // 进行中的跳转属于旧数据源；待定的跳转保留给新曲目
        if let SeekState::InFlight(_) = self.seek {
            self.seek = SeekState::None;
        }

        debug!("play #{}: {}", self.cursor, locator);
        let prepared = self
            .engine
            .set_data_source(&locator)
            .and_then(|()| self.engine.prepare_async());

        match prepared {
            Ok(()) => {
                self.transition(PlaybackState::Preparing);
                Ok(())
            }
            Err(e) => {
                error!("failed to start {}: {}", locator, e);
                self.engine.reset();
                self.emit(ServiceEvent::Error(e.to_string()));
                self.transition(PlaybackState::Idle);
                Err(e.into())
            }
        }
    }

    /// 从头播放当前曲目
    pub fn restart(&mut self) -> Result<(), ServiceError> {
        self.start(self.cursor)
    }

    /// 仅在播放中有效，返回是否暂停
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing || !self.engine.is_playing() {
            debug!("pause ignored in {:?}", self.state);
            return false;
        }
        self.engine.pause();
        self.transition(PlaybackState::Paused);
        true
    }

    /// 仅在暂停时有效，返回是否恢复
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            debug!("resume ignored in {:?}", self.state);
            return false;
        }
        self.engine.start();
        self.transition(PlaybackState::Playing);
        true
    }

    pub fn next(&mut self) -> SkipOutcome {
        if self.playlist.is_empty() {
            return SkipOutcome::NoSongs;
        }
        if self.cursor < self.playlist.last_index() {
            // 失败已通过事件报告
            let _ = self.start(self.cursor + 1);
            SkipOutcome::Advanced
        } else {
            SkipOutcome::AtEnd
        }
    }

    pub fn previous(&mut self) -> SkipOutcome {
        if self.playlist.is_empty() {
            return SkipOutcome::NoSongs;
        }
        if self.cursor > 0 {
            let _ = self.start(self.cursor - 1);
            SkipOutcome::Retreated
        } else {
            self.seek_to(0);
            SkipOutcome::Rewound
        }
    }

    /// 已准备时立即跳转，否则记下目标，准备完成后再跳
    pub fn seek_to(&mut self, position_ms: u64) {
        if self.state.is_prepared() {
            debug!("seek to {} ms", position_ms);
            self.engine.seek_to(position_ms);
            self.seek = SeekState::InFlight(position_ms);
        } else {
            debug!("seek to {} ms deferred until prepared", position_ms);
            self.seek = SeekState::Pending(position_ms);
        }
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.engine.reset();
        self.now_playing = None;
        self.cursor = 0;
        self.seek = SeekState::None;
        self.transition(PlaybackState::Stopped);
    }

    /// 释放引擎，之后服务不可再用
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.engine.stop();
        self.engine.release();
        self.released = true;
        debug!("engine released");
    }

    /// 执行一条命令
    pub fn handle_command(&mut self, cmd: ServiceCommand) {
        match cmd {
            ServiceCommand::SetPlaylist(playlist) => self.set_playlist(playlist),
            ServiceCommand::Play => {
                let _ = self.initiate();
            }
            ServiceCommand::Start(playlist) => {
                self.set_playlist(playlist);
                let _ = self.start(0);
            }
            ServiceCommand::PlayIndex(index) => {
                let _ = self.start(index);
            }
            ServiceCommand::Pause => {
                self.pause();
            }
            ServiceCommand::Resume => {
                self.resume();
            }
            ServiceCommand::Next => {
                let outcome = self.next();
                self.emit(ServiceEvent::Skipped(outcome));
            }
            ServiceCommand::Previous => {
                let outcome = self.previous();
                self.emit(ServiceEvent::Skipped(outcome));
            }
            ServiceCommand::SeekTo(position_ms) => self.seek_to(position_ms),
            ServiceCommand::Restart => {
                let _ = self.restart();
            }
            ServiceCommand::Stop => self.stop(),
            ServiceCommand::Refresh => self.refresh(),
            ServiceCommand::Shutdown => self.shutdown(),
        }
    }

    /// 播放中推送一次进度
    pub fn report_position(&mut self) {
        if self.state == PlaybackState::Playing {
            let event = ServiceEvent::Position {
                position_ms: self.engine.position_ms(),
                duration_ms: self.engine.duration_ms(),
            };
            self.emit(event);
        }
    }

    // ------------------------------------------------------------------
    // 引擎回调
    // ------------------------------------------------------------------

    /// 分发引擎回调，丢弃旧数据源的回调
    pub fn handle_engine_notice(&mut self, notice: EngineNotice) {
        if notice.generation != self.engine.generation() {
            warn!(
                "stale engine event {:?} (generation {} != {})",
                notice.event,
                notice.generation,
                self.engine.generation()
            );
            return;
        }

        match notice.event {
            EngineEvent::Prepared => self.on_prepared(),
            EngineEvent::SeekComplete => self.on_seek_complete(),
            EngineEvent::Completion => self.on_completion(),
            EngineEvent::Error(message) => self.on_error(message),
        }
    }

    fn on_prepared(&mut self) {
        if self.state != PlaybackState::Preparing {
            warn!("prepared callback ignored in {:?}", self.state);
            return;
        }

        self.announce_now_playing();

        match self.seek {
            SeekState::Pending(target) => {
                // 先跳转，跳转完成后再开始，避免从 0 开始播放
                self.engine.seek_to(target);
                self.seek = SeekState::InFlight(target);
                self.transition(PlaybackState::Ready);
            }
            SeekState::None | SeekState::InFlight(_) => {
                self.seek = SeekState::None;
                self.engine.start();
                self.transition(PlaybackState::Playing);
            }
        }
    }

    fn on_seek_complete(&mut self) {
        if let SeekState::InFlight(_) = self.seek {
            self.seek = SeekState::None;
        }

        match self.state {
            PlaybackState::Ready => {
                self.engine.start();
                self.transition(PlaybackState::Playing);
            }
            PlaybackState::Playing if !self.engine.is_playing() => self.engine.start(),
            _ => {}
        }
    }

    fn on_completion(&mut self) {
        if self.state != PlaybackState::Playing {
            warn!("completion callback ignored in {:?}", self.state);
            return;
        }

        if self.cursor < self.playlist.last_index() {
            let _ = self.start(self.cursor + 1);
        } else {
            info!("playlist finished");
            self.engine.stop();
            self.engine.reset();
            self.now_playing = None;
            self.cursor = 0;
            self.seek = SeekState::None;
            self.transition(PlaybackState::Stopped);
            self.emit(ServiceEvent::Finished);
        }
    }

    fn on_error(&mut self, message: String) {
        // 停止后才送达的错误属于已经放弃的数据源
        if matches!(self.state, PlaybackState::Stopped | PlaybackState::Idle) {
            warn!("error callback ignored in {:?}: {}", self.state, message);
            return;
        }
        error!("playback error: {}", message);
        self.engine.reset();
        self.now_playing = None;
        if let SeekState::InFlight(_) = self.seek {
            self.seek = SeekState::None;
        }
        self.emit(ServiceEvent::Error(message));
        self.transition(PlaybackState::Idle);
    }

    fn announce_now_playing(&mut self) {
        let Some(locator) = self.playlist.get(self.cursor).cloned() else {
            return;
        };
        let metadata = self.engine.metadata();
        let now_playing = NowPlaying {
            title: metadata.title_or_name(&locator),
            artist: metadata.artist,
            album: metadata.album,
            duration_ms: metadata.duration_ms.or_else(|| self.engine.duration_ms()),
            locator,
            track_index: self.cursor,
        };
        info!("playback started: {}", now_playing.title);
        self.now_playing = Some(now_playing.clone());
        self.emit(ServiceEvent::NowPlaying(now_playing));
    }
}

impl<E: AudioEngine> Drop for MusicService<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
