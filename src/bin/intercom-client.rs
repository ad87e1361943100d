//! Intercom client
//!
//! Run with: intercom-client [DEVICE] [--server ADDR] [--background PATH] [--publish]
//!
//! Plays back whatever the relay is broadcasting and publishes frames from
//! the capture device while publishing is on. Press Enter to switch
//! publishing on or off. Only the synthetic `test-pattern[:WxH]` device is
//! built in.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

use intercom_relay::client::{
    CaptureLoop, ClientConfig, DisplaySink, IntercomConnector, LoggingDisplay, PlaybackConsumer,
    PlaybackEvent, RelayReceiver,
};
use intercom_relay::media::source::{load_raw_image, SCREEN_HEIGHT, SCREEN_WIDTH};
use intercom_relay::media::{PixelFormat, TestPattern};
use intercom_relay::Result;

const FRAME_INTERVAL: Duration = Duration::from_micros(1_000_000 / 30);

#[derive(Parser, Debug)]
#[command(name = "intercom-client")]
#[command(about = "Two-party video intercom client")]
struct Args {
    /// Capture device
    #[arg(default_value = "test-pattern")]
    device: String,

    /// Relay server address
    #[arg(short, long, env = "INTERCOM_SERVER", default_value = "127.0.0.1:6000")]
    server: SocketAddr,

    /// Raw BGR24 image shown while nothing is received
    #[arg(short, long)]
    background: Option<PathBuf>,

    /// Publisher name
    #[arg(short, long)]
    name: Option<String>,

    /// Start publishing right away
    #[arg(short, long)]
    publish: bool,

    /// Publish a sine tone of this frequency as audio
    #[arg(long, value_name = "HZ")]
    tone: Option<u32>,

    /// Stop publishing after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Client failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut source = TestPattern::from_device(&args.device)?;
    if let Some(count) = args.frames {
        source = source.limit(count);
    }
    if let Some(hz) = args.tone {
        source = source.with_tone(hz);
    }

    let mut config = ClientConfig::new(args.server);
    if let Some(name) = args.name {
        config = config.name(name);
    }

    let mut playback = PlaybackConsumer::new(config.staleness_window);
    if let Some(path) = &args.background {
        let image = load_raw_image(path, SCREEN_WIDTH, SCREEN_HEIGHT, PixelFormat::Bgr24).await?;
        playback = playback.with_default_image(image);
    }
    let playback = Arc::new(Mutex::new(playback));

    let (sender, receiver) = IntercomConnector::connect(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (enabled_tx, enabled_rx) = watch::channel(args.publish);
    let (event_tx, event_rx) = mpsc::channel(64);

    let capture = CaptureLoop::new(sender, source, FRAME_INTERVAL);
    let mut publish = tokio::spawn(capture.run(enabled_rx, shutdown_rx));
    let toggle = tokio::spawn(toggle_loop(enabled_tx));
    let mut receive = tokio::spawn(receive_loop(receiver, Arc::clone(&playback), event_tx));
    let display = tokio::spawn(display_loop(LoggingDisplay::new(), playback, event_rx));

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            shutdown_tx.send_replace(true);
            flatten((&mut publish).await)
        }
        res = &mut receive => {
            tracing::info!("Server closed the connection");
            shutdown_tx.send_replace(true);
            flatten(res)
        }
        res = &mut publish => flatten(res),
    };

    receive.abort();
    display.abort();
    toggle.abort();
    result
}

fn flatten(res: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match res {
        Ok(inner) => inner,
        Err(e) => {
            tracing::error!(error = %e, "Task failed");
            Ok(())
        }
    }
}

/// Switch publishing on or off on every line read from stdin
async fn toggle_loop(enabled: watch::Sender<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(_)) = lines.next_line().await {
        enabled.send_modify(|on| *on = !*on);
        tracing::info!(publishing = *enabled.borrow(), "Publish toggled");
    }
}

/// Feed relayed messages into playback
async fn receive_loop(
    mut receiver: RelayReceiver,
    playback: Arc<Mutex<PlaybackConsumer>>,
    events: mpsc::Sender<PlaybackEvent>,
) -> Result<()> {
    while let Some(msg) = receiver.next_message().await? {
        let event = playback.lock().await.on_message(msg, Instant::now());
        if let Some(event) = event {
            let _ = events.send(event).await;
        }
    }
    Ok(())
}

/// Refresh the display at the frame rate
async fn display_loop<D: DisplaySink>(
    mut display: D,
    playback: Arc<Mutex<PlaybackConsumer>>,
    mut events: mpsc::Receiver<PlaybackEvent>,
) {
    let mut ticker = interval(FRAME_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = events.recv() => display.on_event(&event),
            _ = ticker.tick() => {
                let mut playback = playback.lock().await;
                if let Some(event) = playback.refresh(Instant::now()) {
                    display.on_event(&event);
                }
                display.show(playback.displayable());
                // Audio output device is external; drain so it never piles up
                let _ = playback.take_audio();
            }
        }
    }
}
