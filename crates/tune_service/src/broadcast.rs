//! 正在播放广播

use crate::{NowPlaying, ServiceEvent, ServiceObserver};

/// 曲目开始播放的接收者
pub trait NowPlayingReceiver: Send {
    fn on_now_playing(&mut self, now_playing: &NowPlaying);
}

/// 把标题写进日志
#[derive(Debug, Default)]
pub struct LogReceiver;

impl NowPlayingReceiver for LogReceiver {
    fn on_now_playing(&mut self, now_playing: &NowPlaying) {
        log::info!(
            "now playing: {} (artist: {}, album: {}, duration: {} ms)",
            now_playing.title,
            now_playing.artist.as_deref().unwrap_or("-"),
            now_playing.album.as_deref().unwrap_or("-"),
            now_playing
                .duration_ms
                .map(|d| d.to_string())
                .unwrap_or_else(|| "?".into()),
        );
    }
}

/// 把 [`ServiceEvent::NowPlaying`] 分发给所有接收者
#[derive(Default)]
pub struct Broadcaster {
    receivers: Vec<Box<dyn NowPlayingReceiver>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_receiver(mut self, receiver: impl NowPlayingReceiver + 'static) -> Self {
        self.receivers.push(Box::new(receiver));
        self
    }

    pub fn broadcast(&mut self, now_playing: &NowPlaying) {
        for receiver in &mut self.receivers {
            receiver.on_now_playing(now_playing);
        }
    }
}

impl ServiceObserver for Broadcaster {
    fn on_event(&mut self, event: &ServiceEvent) {
        if let ServiceEvent::NowPlaying(now_playing) = event {
            self.broadcast(now_playing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Sender};
    use tune_player::TrackLocator;

    struct TitleSink(Sender<String>);

    impl NowPlayingReceiver for TitleSink {
        fn on_now_playing(&mut self, now_playing: &NowPlaying) {
            let _ = self.0.send(now_playing.title.clone());
        }
    }

    #[test]
    fn test_only_now_playing_is_broadcast() {
        let (tx, rx) = unbounded();
        let mut broadcaster = Broadcaster::new()
            .with_receiver(LogReceiver)
            .with_receiver(TitleSink(tx));

        broadcaster.on_event(&ServiceEvent::Finished);
        broadcaster.on_event(&ServiceEvent::NowPlaying(NowPlaying {
            title: "Freddie Freeloader".into(),
            artist: None,
            album: None,
            duration_ms: Some(586_000),
            locator: TrackLocator::parse("/music/02.flac").unwrap(),
            track_index: 1,
        }));

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["Freddie Freeloader"]);
    }
}
