//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use democast_core::protocol::{DEFAULT_DELAY_SECS, DEFAULT_OUTPUT, DEFAULT_PORT};

/// Scripted desktop demo recorder.
///
/// Run `democast daemon` inside the desktop session of the machine being
/// recorded, then drive it from the host with `ping`, `list` and `record`.
#[derive(Debug, Parser)]
#[command(name = "democast", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the recording daemon (inside the desktop session)
    #[command(after_help = "\
Examples:
  democast daemon                                   # Listen on 0.0.0.0:9999
  democast daemon --port 7000 --bind 127.0.0.1
  democast daemon --scenarios-dir ~/demos
  democast daemon --element-locator /usr/local/bin/a11y-locate")]
    Daemon(DaemonArgs),

    /// Check that the daemon is reachable
    Ping(ConnectArgs),

    /// List the scenarios the daemon can record
    List(ConnectArgs),

    /// Record a scenario to a video file on the daemon's machine
    #[command(after_help = "\
Examples:
  democast record basic_usage
  democast record multi_monitor --output /tmp/multi.webm --framerate 30
  democast record basic_usage --host 192.168.122.10 --pre-delay 2")]
    Record(RecordArgs),

    /// Convert a recording into an optimized GIF (needs ffmpeg and gifsicle)
    #[command(after_help = "\
Examples:
  democast convert recording.webm demo.gif
  democast convert recording.webm demo.gif --fps 10 --width 640 --lossy 120")]
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct DaemonArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Directory holding <name>.json scenario scripts [env: DEMOCAST_SCENARIOS_DIR]
    #[arg(long, value_name = "DIR")]
    pub scenarios_dir: Option<PathBuf>,

    /// Helper that resolves UI elements to screen bounds [env: DEMOCAST_ELEMENT_LOCATOR]
    #[arg(long, value_name = "CMD")]
    pub element_locator: Option<PathBuf>,
}

/// Where the daemon is.
#[derive(Debug, Clone, Args)]
pub struct ConnectArgs {
    /// Daemon host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Daemon port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds to wait for the response
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Scenario name (see `democast list`)
    pub scenario: String,

    /// Output path on the daemon's machine
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Seconds to record before the scenario starts
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    pub pre_delay: f64,

    /// Seconds to keep recording after the scenario ends
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    pub post_delay: f64,

    /// Screencast framerate
    #[arg(long)]
    pub framerate: Option<i32>,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input video
    pub input: PathBuf,

    /// Output GIF
    pub output: PathBuf,

    /// Frames per second
    #[arg(long, default_value_t = 15)]
    pub fps: u32,

    /// Output width in pixels (height keeps the aspect ratio)
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Palette size
    #[arg(long, default_value_t = 256)]
    pub colors: u32,

    /// gifsicle lossy level
    #[arg(long, default_value_t = 80)]
    pub lossy: u32,
}
