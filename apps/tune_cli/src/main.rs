//! tune-cli - 命令行播放器
//!
//! 从标准输入读取控制命令，驱动后台播放服务

use std::io::BufRead;
use std::thread;

use crossbeam_channel::{select, unbounded, Receiver};
use tune_player::NativeEngine;
use tune_service::{
    Broadcaster, LogReceiver, MusicUpdate, PlaybackState, Playlist, ServiceBuilder,
    ServiceConfig, ServiceConnection, ServiceError, ServiceEvent, SkipOutcome,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let (config_path, locators) = match parse_args(&args[1..]) {
        Some(parsed) => parsed,
        None => {
            eprintln!("Usage:");
            eprintln!("  {} [--config <file.json>] <locator>...", args[0]);
            eprintln!();
            eprintln!("Commands (stdin):");
            eprintln!("  play | pause | resume | toggle | next | prev");
            eprintln!("  seek <seconds> | restart | stop | status | quit");
            std::process::exit(1);
        }
    };

    let config = match config_path {
        Some(path) => match ServiceConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => ServiceConfig::default(),
    };

    let playlist = match Playlist::parse(&locators) {
        Ok(playlist) => playlist,
        Err(e) => {
            eprintln!("Invalid playlist: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config, playlist) {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }
}

/// 解析参数，返回 (配置文件, 曲目列表)
fn parse_args(args: &[String]) -> Option<(Option<String>, Vec<String>)> {
    let mut config = None;
    let mut locators = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(iter.next()?.clone()),
            "-h" | "--help" => return None,
            _ => locators.push(arg.clone()),
        }
    }
    if locators.is_empty() {
        return None;
    }
    Some((config, locators))
}

fn run(config: ServiceConfig, playlist: Playlist) -> Result<(), ServiceError> {
    let player_config = config.player_config();
    let handle = ServiceBuilder::new(config)
        .observer(Broadcaster::new().with_receiver(LogReceiver))
        .spawn(move |notice_tx| NativeEngine::new(player_config, notice_tx))?;

    let mut connection = ServiceConnection::new();
    connection.bind(handle);
    log::debug!("service bound with {} tracks", playlist.len());
    connection.set_playlist(playlist)?;
    let events = connection.events().ok_or(ServiceError::NotBound)?;

    let lines = spawn_stdin_reader();
    let mut view = PlayerView::default();
    println!("Ready. Type `play` to start, `quit` to exit.");

    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else { break };
                match Input::parse(&line) {
                    Some(Input::Quit) => break,
                    Some(input) => {
                        if let Err(e) = dispatch(&connection, &view, input) {
                            eprintln!("{}", e);
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => eprintln!("Unknown command: {}", line.trim()),
                }
            },
            recv(events) -> event => match event {
                Ok(event) => view.apply(&event),
                Err(_) => break,
            },
        }
    }

    connection.shutdown()
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Input {
    Play,
    Pause,
    Resume,
    Toggle,
    Next,
    Prev,
    Seek(f64),
    Restart,
    Stop,
    Status,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let input = match words.next()? {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "toggle" => Self::Toggle,
            "next" => Self::Next,
            "prev" | "previous" => Self::Prev,
            "seek" => {
                let secs: f64 = words.next()?.parse().ok()?;
                if !secs.is_finite() || secs < 0.0 {
                    return None;
                }
                Self::Seek(secs)
            }
            "restart" => Self::Restart,
            "stop" => Self::Stop,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            _ => return None,
        };
        Some(input)
    }
}

fn dispatch(
    connection: &ServiceConnection,
    view: &PlayerView,
    input: Input,
) -> Result<(), ServiceError> {
    match input {
        Input::Play => connection.play(),
        Input::Pause => connection.pause(),
        Input::Resume => connection.resume(),
        Input::Toggle => match view.toggle_action() {
            Toggle::Initiate => connection.play(),
            Toggle::Resume => connection.resume(),
            Toggle::Pause => connection.pause(),
        },
        Input::Next => connection.next(),
        Input::Prev => connection.previous(),
        Input::Seek(secs) => connection.seek_to((secs * 1000.0) as u64),
        Input::Restart => connection.restart(),
        Input::Stop => connection.stop(),
        Input::Status => {
            println!("{}", view.status_line());
            Ok(())
        }
        Input::Quit => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    Initiate,
    Resume,
    Pause,
}

/// 终端上的播放状态
#[derive(Debug, Default)]
struct PlayerView {
    update: MusicUpdate,
    title: Option<String>,
    position_ms: u64,
    duration_ms: Option<u64>,
}

impl PlayerView {
    fn is_loading(&self) -> bool {
        matches!(
            self.update.state,
            PlaybackState::Preparing | PlaybackState::Ready
        )
    }

    /// 播放按钮：未准备时开始，暂停时恢复，其余情况暂停
    fn toggle_action(&self) -> Toggle {
        if !self.update.is_prepared && !self.is_loading() {
            Toggle::Initiate
        } else if self.update.is_paused {
            Toggle::Resume
        } else {
            Toggle::Pause
        }
    }

    fn apply(&mut self, event: &ServiceEvent) {
        match event {
            ServiceEvent::StateChanged(update) => {
                self.update = *update;
                if !update.is_prepared {
                    self.position_ms = 0;
                }
                println!("[{:?}] track #{}", update.state, update.track_index + 1);
            }
            ServiceEvent::NowPlaying(now_playing) => {
                self.title = Some(now_playing.title.clone());
                self.duration_ms = now_playing.duration_ms;
                println!("Now playing: {}", now_playing.title);
            }
            ServiceEvent::Skipped(outcome) => match outcome {
                SkipOutcome::AtEnd => println!("Already at the last track"),
                SkipOutcome::NoSongs => println!("No songs found!"),
                _ => {}
            },
            ServiceEvent::Position {
                position_ms,
                duration_ms,
            } => {
                self.position_ms = *position_ms;
                if duration_ms.is_some() {
                    self.duration_ms = *duration_ms;
                }
            }
            ServiceEvent::Finished => println!("Playlist finished"),
            ServiceEvent::NoSongs => println!("No songs found!"),
            ServiceEvent::Error(e) => eprintln!("Player error: {}", e),
        }
    }

    fn status_line(&self) -> String {
        let state = if self.is_loading() {
            "loading".to_string()
        } else {
            format!("{:?}", self.update.state).to_lowercase()
        };
        format!(
            "{} #{} {} [{} / {}]",
            state,
            self.update.track_index + 1,
            self.title.as_deref().unwrap_or("-"),
            format_ms(self.position_ms),
            self.duration_ms.map(format_ms).unwrap_or_else(|| "--:--".into()),
        )
    }
}

fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
