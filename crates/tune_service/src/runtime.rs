//! 服务线程
//!
//! 服务线程独占 [`MusicService`]，在同一个线程上处理 UI 命令和引擎回调。

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender, TrySendError};
use tune_player::{AudioEngine, EngineNotice};

use crate::{
    BoxedObserver, MusicService, ServiceCommand, ServiceConfig, ServiceError, ServiceEvent,
    ServiceObserver,
};

/// 服务句柄
pub struct ServiceHandle {
    cmd_tx: Sender<ServiceCommand>,
    evt_rx: Receiver<ServiceEvent>,
    join: Option<JoinHandle<()>>,
}

impl ServiceHandle {
    /// 发送命令
    pub fn send(&self, cmd: ServiceCommand) -> Result<(), ServiceError> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| ServiceError::Disconnected)
    }

    pub fn events(&self) -> &Receiver<ServiceEvent> {
        &self.evt_rx
    }

    /// 关闭服务线程并等待引擎释放
    pub fn shutdown(mut self) -> Result<(), ServiceError> {
        let _ = self.cmd_tx.send(ServiceCommand::Shutdown);
        match self.join.take() {
            Some(join) => join.join().map_err(|_| ServiceError::Disconnected),
            None => Ok(()),
        }
    }
}

/// 把事件转发到 UI 的通道，不阻塞服务线程
///
/// 通道满时丢弃新的进度事件；其他事件挤掉最旧的一条，保证 UI 最终看到最新状态。
struct ChannelObserver {
    evt_tx: Sender<ServiceEvent>,
    evt_rx: Receiver<ServiceEvent>,
}

impl ServiceObserver for ChannelObserver {
    fn on_event(&mut self, event: &ServiceEvent) {
        let mut event = event.clone();
        loop {
            match self.evt_tx.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(ServiceEvent::Position { .. })) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(oldest) = self.evt_rx.try_recv() {
                        log::warn!("event channel full, dropping {:?}", oldest);
                    }
                    event = rejected;
                }
            }
        }
    }
}

/// 服务构建器
pub struct ServiceBuilder {
    config: ServiceConfig,
    observers: Vec<BoxedObserver>,
}

impl ServiceBuilder {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    /// 追加一个观察者（在服务线程上调用）
    pub fn observer(mut self, observer: impl ServiceObserver + Send + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// 启动服务线程，引擎在线程内创建
    pub fn spawn<E, F>(self, make_engine: F) -> Result<ServiceHandle, ServiceError>
    where
        E: AudioEngine,
        F: FnOnce(Sender<EngineNotice>) -> E + Send + 'static,
    {
        self.config.validate()?;
        let (cmd_tx, cmd_rx) = bounded(self.config.command_capacity);
        let (evt_tx, evt_rx) = bounded(self.config.event_capacity);
        let interval = self.config.position_interval();
        let observers = self.observers;
        let channel_rx = evt_rx.clone();

        let join = thread::Builder::new()
            .name("tune-service".into())
            .spawn(move || {
                let (notice_tx, notice_rx) = unbounded();
                let engine = make_engine(notice_tx.clone());

                let mut service = MusicService::new(engine);
                service.register(Box::new(ChannelObserver {
                    evt_tx,
                    evt_rx: channel_rx,
                }));
                for observer in observers {
                    service.register(observer);
                }

                // 持有一个发送端，通知通道不会断开
                let _notice_tx = notice_tx;
                run_service(&mut service, &cmd_rx, &notice_rx, tick(interval));
                service.shutdown();
            })?;

        Ok(ServiceHandle {
            cmd_tx,
            evt_rx,
            join: Some(join),
        })
    }
}

/// 使用默认观察者启动服务
pub fn spawn_service<E, F>(
    config: ServiceConfig,
    make_engine: F,
) -> Result<ServiceHandle, ServiceError>
where
    E: AudioEngine,
    F: FnOnce(Sender<EngineNotice>) -> E + Send + 'static,
{
    ServiceBuilder::new(config).spawn(make_engine)
}

fn run_service<E: AudioEngine>(
    service: &mut MusicService<E>,
    cmd_rx: &Receiver<ServiceCommand>,
    notice_rx: &Receiver<EngineNotice>,
    ticker: Receiver<std::time::Instant>,
) {
    log::debug!("service loop started");
    loop {
        let running = select! {
            recv(cmd_rx) -> msg => match msg {
                Ok(ServiceCommand::Shutdown) | Err(_) => false,
                Ok(cmd) => {
                    service.handle_command(cmd);
                    true
                }
            },
            recv(notice_rx) -> msg => {
                if let Ok(notice) = msg {
                    service.handle_engine_notice(notice);
                }
                true
            },
            recv(ticker) -> _ => {
                service.report_position();
                true
            },
        };
        if !running {
            break;
        }
    }
    log::debug!("service loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeEngine};
    use crate::{MusicUpdate, PlaybackState, Playlist, SkipOutcome};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn wait_for(handle: &ServiceHandle, pred: impl Fn(&ServiceEvent) -> bool) -> ServiceEvent {
        loop {
            let event = handle
                .events()
                .recv_timeout(TIMEOUT)
                .expect("timed out waiting for event");
            if pred(&event) {
                return event;
            }
        }
    }

    fn spawn_fake() -> (ServiceHandle, Arc<Mutex<Vec<Call>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = log.clone();
        let handle = spawn_service(ServiceConfig::default(), move |tx| {
            FakeEngine::auto(tx).with_call_log(calls)
        })
        .unwrap();
        (handle, log)
    }

    #[test]
    fn test_start_plays_through_channels() {
        let (handle, _) = spawn_fake();
        handle
            .send(ServiceCommand::Start(
                Playlist::parse(["/music/a.mp3", "/music/b.mp3"]).unwrap(),
            ))
            .unwrap();

        let event = wait_for(&handle, |e| matches!(e, ServiceEvent::NowPlaying(_)));
        match event {
            ServiceEvent::NowPlaying(np) => assert_eq!(np.title, "a"),
            other => panic!("unexpected {other:?}"),
        }
        wait_for(&handle, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state == PlaybackState::Playing)
        });

        handle.send(ServiceCommand::Next).unwrap();
        let event = wait_for(&handle, |e| matches!(e, ServiceEvent::Skipped(_)));
        assert_eq!(event, ServiceEvent::Skipped(SkipOutcome::Advanced));

        handle.shutdown().unwrap();
    }

    #[test]
    fn test_pending_seek_through_channels() {
        let (handle, log) = spawn_fake();
        handle
            .send(ServiceCommand::SetPlaylist(Playlist::parse(["a.mp3"]).unwrap()))
            .unwrap();
        handle.send(ServiceCommand::SeekTo(30_000)).unwrap();
        handle.send(ServiceCommand::Play).unwrap();

        wait_for(&handle, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state == PlaybackState::Playing)
        });
        handle.shutdown().unwrap();

        let calls = log.lock().unwrap().clone();
        let seek = calls.iter().position(|c| *c == Call::SeekTo(30_000)).unwrap();
        let start = calls.iter().position(|c| *c == Call::Start).unwrap();
        assert!(seek < start);
        assert_eq!(calls.last(), Some(&Call::Release));
    }

    #[test]
    fn test_empty_playlist_reports_no_songs() {
        let (handle, _) = spawn_fake();
        handle.send(ServiceCommand::Play).unwrap();
        let event = wait_for(&handle, |_| true);
        assert_eq!(event, ServiceEvent::NoSongs);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_extra_observer_runs_on_service_thread() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        let handle = ServiceBuilder::new(ServiceConfig::default())
            .observer(move |e: &ServiceEvent| {
                if matches!(e, ServiceEvent::NowPlaying(_)) {
                    *counter.lock().unwrap() += 1;
                }
            })
            .spawn(FakeEngine::auto)
            .unwrap();

        handle
            .send(ServiceCommand::Start(Playlist::parse(["x.wav"]).unwrap()))
            .unwrap();
        wait_for(&handle, |e| matches!(e, ServiceEvent::NowPlaying(_)));
        handle.shutdown().unwrap();

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_spawn_rejects_invalid_config() {
        let zero_tick = ServiceConfig {
            position_interval_ms: 0,
            ..ServiceConfig::default()
        };
        assert!(matches!(
            spawn_service(zero_tick, FakeEngine::auto),
            Err(ServiceError::Config(_))
        ));

        let zero_capacity = ServiceConfig {
            command_capacity: 0,
            ..ServiceConfig::default()
        };
        assert!(matches!(
            ServiceBuilder::new(zero_capacity).spawn(FakeEngine::auto),
            Err(ServiceError::Config(_))
        ));
    }

    #[test]
    fn test_position_reported_only_while_playing() {
        let config = ServiceConfig {
            position_interval_ms: 10,
            ..ServiceConfig::default()
        };
        let handle = spawn_service(config, FakeEngine::auto).unwrap();

        // 准备完成前没有进度
        handle.send(ServiceCommand::SetPlaylist(Playlist::parse(["a.mp3"]).unwrap())).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(handle
            .events()
            .try_iter()
            .all(|e| !matches!(e, ServiceEvent::Position { .. })));

        handle.send(ServiceCommand::Play).unwrap();
        wait_for(&handle, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state == PlaybackState::Playing)
        });
        for _ in 0..3 {
            let event = wait_for(&handle, |e| matches!(e, ServiceEvent::Position { .. }));
            assert_eq!(
                event,
                ServiceEvent::Position {
                    position_ms: 0,
                    duration_ms: Some(180_000),
                }
            );
        }

        handle.send(ServiceCommand::Pause).unwrap();
        wait_for(&handle, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state == PlaybackState::Paused)
        });
        std::thread::sleep(Duration::from_millis(60));
        assert!(handle
            .events()
            .try_iter()
            .all(|e| !matches!(e, ServiceEvent::Position { .. })));

        handle.shutdown().unwrap();
    }

    #[test]
    fn test_full_channel_keeps_latest_transition() {
        let config = ServiceConfig {
            event_capacity: 4,
            position_interval_ms: 5,
            ..ServiceConfig::default()
        };
        let handle = spawn_service(config, FakeEngine::auto).unwrap();
        handle
            .send(ServiceCommand::Start(Playlist::parse(["a.mp3"]).unwrap()))
            .unwrap();

        // 不读取事件，让进度塞满通道
        std::thread::sleep(Duration::from_millis(100));
        handle.send(ServiceCommand::Stop).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let events: Vec<ServiceEvent> = handle.events().try_iter().collect();
        assert!(events.len() <= 4);
        assert_eq!(
            events.last(),
            Some(&ServiceEvent::StateChanged(MusicUpdate::new(
                PlaybackState::Stopped,
                0
            )))
        );
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_dropped_handle_stops_service() {
        let (handle, log) = spawn_fake();
        drop(handle);
        let deadline = std::time::Instant::now() + TIMEOUT;
        while !log.lock().unwrap().contains(&Call::Release) {
            assert!(std::time::Instant::now() < deadline, "engine not released");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
