//! Intercom relay server
//!
//! Run with: intercom-server [--port PORT] [--standby PATH]
//!
//! The standby file is raw pixel data (BGR24 by default) shown to clients
//! while nobody is broadcasting.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use intercom_relay::media::source::{load_raw_image, SCREEN_HEIGHT, SCREEN_WIDTH};
use intercom_relay::media::PixelFormat;
use intercom_relay::protocol::constants::DEFAULT_PORT;
use intercom_relay::{IntercomServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "intercom-server")]
#[command(about = "Two-party video intercom relay server")]
struct Args {
    /// Listening port
    #[arg(short, long, env = "INTERCOM_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Listening address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Raw default media sent to clients on connect
    #[arg(short, long)]
    standby: Option<PathBuf>,

    /// Width of the standby image
    #[arg(long, default_value_t = SCREEN_WIDTH)]
    standby_width: i32,

    /// Height of the standby image
    #[arg(long, default_value_t = SCREEN_HEIGHT)]
    standby_height: i32,

    /// Staleness window in milliseconds
    #[arg(long, default_value_t = 300)]
    staleness_ms: u64,

    /// Minimum milliseconds between images relayed to one client (0 = no limit)
    #[arg(long, default_value_t = 33)]
    min_video_interval_ms: u64,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::with_addr(SocketAddr::new(self.bind, self.port))
            .max_connections(self.max_connections)
            .staleness_window(Duration::from_millis(self.staleness_ms))
            .min_video_interval(Duration::from_millis(self.min_video_interval_ms))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let mut config = args.server_config();

    if let Some(path) = &args.standby {
        match load_raw_image(path, args.standby_width, args.standby_height, PixelFormat::Bgr24).await {
            Ok(image) => config = config.standby_image(image),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load standby media");
                return ExitCode::FAILURE;
            }
        }
    }

    let server = IntercomServer::new(config);
    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
