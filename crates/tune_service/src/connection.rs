//! UI 侧的服务绑定
//!
//! 绑定是异步完成的，UI 可能在绑定前就发出操作；所有控制方法在未绑定时返回
//! [`ServiceError::NotBound`]，由 UI 自行提示。

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::{Playlist, ServiceCommand, ServiceError, ServiceEvent, ServiceHandle};

#[derive(Default)]
pub struct ServiceConnection {
    handle: Option<ServiceHandle>,
}

impl ServiceConnection {
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// 绑定服务，返回之前绑定的句柄
    ///
    /// 绑定后请求服务重新推送当前状态，未绑定期间被挤掉的事件不影响 UI。
    pub fn bind(&mut self, handle: ServiceHandle) -> Option<ServiceHandle> {
        log::debug!("service bound");
        let previous = self.handle.replace(handle);
        if let Err(e) = self.send(ServiceCommand::Refresh) {
            log::warn!("state refresh failed: {}", e);
        }
        previous
    }

    /// 解除绑定；服务继续运行，直到句柄被关闭或丢弃
    pub fn unbind(&mut self) -> Option<ServiceHandle> {
        log::debug!("service unbound");
        self.handle.take()
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    pub fn send(&self, cmd: ServiceCommand) -> Result<(), ServiceError> {
        match &self.handle {
            Some(handle) => handle.send(cmd),
            None => {
                log::warn!("{:?} dropped: service not bound", cmd);
                Err(ServiceError::NotBound)
            }
        }
    }

    pub fn set_playlist(&self, playlist: Playlist) -> Result<(), ServiceError> {
        self.send(ServiceCommand::SetPlaylist(playlist))
    }

    pub fn start(&self, playlist: Playlist) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Start(playlist))
    }

    pub fn play(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Play)
    }

    pub fn play_index(&self, index: usize) -> Result<(), ServiceError> {
        self.send(ServiceCommand::PlayIndex(index))
    }

    pub fn pause(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Resume)
    }

    /// 结果通过 [`ServiceEvent::Skipped`] 返回
    pub fn next(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Next)
    }

    /// 结果通过 [`ServiceEvent::Skipped`] 返回
    pub fn previous(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Previous)
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<(), ServiceError> {
        self.send(ServiceCommand::SeekTo(position_ms))
    }

    pub fn restart(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Restart)
    }

    pub fn stop(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Stop)
    }

    /// 事件接收端的副本，可用于 `select!`
    pub fn events(&self) -> Option<Receiver<ServiceEvent>> {
        self.handle.as_ref().map(|h| h.events().clone())
    }

    /// 非阻塞地取出所有待处理事件
    pub fn poll_events(&self) -> Vec<ServiceEvent> {
        match &self.handle {
            Some(handle) => handle.events().try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// 取出一个待处理事件（不阻塞）
    pub fn try_event(&self) -> Option<ServiceEvent> {
        self.handle.as_ref()?.events().try_recv().ok()
    }

    /// 等待下一个事件
    pub fn wait_event(&self, timeout: Duration) -> Result<Option<ServiceEvent>, ServiceError> {
        let handle = self.handle.as_ref().ok_or(ServiceError::NotBound)?;
        match handle.events().recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ServiceError::Disconnected),
        }
    }

    /// 解除绑定并关闭服务
    pub fn shutdown(&mut self) -> Result<(), ServiceError> {
        match self.handle.take() {
            Some(handle) => handle.shutdown(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEngine;
    use crate::{spawn_service, MusicUpdate, PlaybackState, ServiceConfig, SkipOutcome};
    use std::thread;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn connect() -> ServiceConnection {
        let handle = spawn_service(ServiceConfig::default(), FakeEngine::auto).unwrap();
        let mut connection = ServiceConnection::new();
        assert!(connection.bind(handle).is_none());
        connection
    }

    fn next_matching(
        connection: &ServiceConnection,
        pred: impl Fn(&ServiceEvent) -> bool,
    ) -> ServiceEvent {
        loop {
            match connection.wait_event(TIMEOUT).unwrap() {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("timed out waiting for event"),
            }
        }
    }

    #[test]
    fn test_commands_before_bind_are_rejected() {
        let connection = ServiceConnection::new();
        assert!(!connection.is_bound());
        assert!(matches!(connection.play(), Err(ServiceError::NotBound)));
        assert!(matches!(connection.seek_to(1_000), Err(ServiceError::NotBound)));
        assert!(matches!(
            connection.wait_event(TIMEOUT),
            Err(ServiceError::NotBound)
        ));
        assert!(connection.poll_events().is_empty());
        assert!(connection.try_event().is_none());
        assert!(connection.events().is_none());
    }

    #[test]
    fn test_bound_connection_controls_playback() {
        let mut connection = connect();
        connection
            .start(Playlist::parse(["a.mp3", "b.mp3"]).unwrap())
            .unwrap();
        next_matching(&connection, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state == PlaybackState::Playing)
        });

        connection.pause().unwrap();
        let event = next_matching(&connection, |e| matches!(e, ServiceEvent::StateChanged(_)));
        match event {
            ServiceEvent::StateChanged(update) => {
                assert!(update.is_paused);
                assert!(update.is_prepared);
            }
            other => panic!("unexpected {other:?}"),
        }

        connection.previous().unwrap();
        let event = next_matching(&connection, |e| matches!(e, ServiceEvent::Skipped(_)));
        assert_eq!(event, ServiceEvent::Skipped(SkipOutcome::Rewound));

        connection.shutdown().unwrap();
        assert!(!connection.is_bound());
    }

    #[test]
    fn test_unbind_then_commands_fail() {
        let mut connection = connect();
        let handle = connection.unbind().unwrap();
        assert!(matches!(connection.stop(), Err(ServiceError::NotBound)));

        // 服务仍在运行，可以重新绑定
        connection.bind(handle);
        connection.stop().unwrap();
        let event = next_matching(&connection, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state != PlaybackState::Idle)
        });
        assert_eq!(
            event,
            ServiceEvent::StateChanged(MusicUpdate::new(PlaybackState::Stopped, 0))
        );
        connection.shutdown().unwrap();
    }

    #[test]
    fn test_bind_pushes_current_state() {
        let connection = connect();
        let event = next_matching(&connection, |_| true);
        assert_eq!(
            event,
            ServiceEvent::StateChanged(MusicUpdate::new(PlaybackState::Idle, 0))
        );
    }

    #[test]
    fn test_rebind_after_missed_transitions_shows_latest_state() {
        let config = ServiceConfig {
            event_capacity: 8,
            position_interval_ms: 5,
            ..ServiceConfig::default()
        };
        let handle = spawn_service(config, FakeEngine::auto).unwrap();
        let mut connection = ServiceConnection::new();
        connection.bind(handle);
        connection
            .start(Playlist::parse(["a.mp3", "b.mp3"]).unwrap())
            .unwrap();
        next_matching(&connection, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state == PlaybackState::Playing)
        });

        // 解绑期间进度事件塞满通道，之后的迁移仍要送达
        let handle = connection.unbind().unwrap();
        thread::sleep(Duration::from_millis(200));
        handle.send(ServiceCommand::Pause).unwrap();
        connection.bind(handle);

        let paused = next_matching(&connection, |e| {
            matches!(e, ServiceEvent::StateChanged(u) if u.state == PlaybackState::Paused)
        });
        assert_eq!(
            paused,
            ServiceEvent::StateChanged(MusicUpdate::new(PlaybackState::Paused, 0))
        );
        let now_playing = next_matching(&connection, |e| matches!(e, ServiceEvent::NowPlaying(_)));
        match now_playing {
            ServiceEvent::NowPlaying(np) => assert_eq!(np.title, "a"),
            other => panic!("unexpected {other:?}"),
        }

        thread::sleep(Duration::from_millis(50));
        let last_state = connection
            .poll_events()
            .into_iter()
            .filter_map(|e| match e {
                ServiceEvent::StateChanged(update) => Some(update.state),
                _ => None,
            })
            .last();
        assert!(matches!(last_state, None | Some(PlaybackState::Paused)));
        connection.shutdown().unwrap();
    }
}
