//! democast CLI and daemon entry point.

mod args;
mod convert;
mod daemon;
mod input;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use democast_core::input::SessionKind;
use democast_core::protocol::{Command, RecordRequest};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::args::{Cli, Commands, ConnectArgs, DaemonArgs};
use crate::convert::{convert_to_gif, ConvertOptions};
use crate::daemon::recording::RecordingSession;
use crate::daemon::scenario::ScenarioDirectory;
use crate::daemon::screencast::GnomeScreencast;
use crate::daemon::{paths, DaemonClient, DaemonContext, DaemonServer};
use crate::input::{CommandLocator, ElementLocator, InputEngine, UnavailableLocator};

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Daemon(args) => {
            run_daemon(args);
            return;
        }
        Commands::Convert(args) => {
            let options = ConvertOptions {
                fps: args.fps,
                width: args.width,
                colors: args.colors,
                lossy: args.lossy,
            };
            convert_to_gif(&args.input, &args.output, &options).map(|size| {
                println!("{} ({} KB)", args.output.display(), size / 1024);
            })
        }
        Commands::Ping(connect) => run_client_command(&connect, Command::Ping),
        Commands::List(connect) => run_client_command(&connect, Command::ListScenarios),
        Commands::Record(args) => {
            let mut request = RecordRequest::new(args.scenario);
            request.output = args.output;
            request.pre_delay = args.pre_delay;
            request.post_delay = args.post_delay;
            if let Some(framerate) = args.framerate {
                let mut options = Map::new();
                options.insert("framerate".to_string(), Value::from(framerate));
                request.options = Some(options);
            }
            run_client_command(&args.connect, Command::Record(request))
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Send one command to the daemon and print the response.
///
/// Exits with status 1 when the daemon reports an error.
fn run_client_command(connect: &ConnectArgs, command: Command) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let client = DaemonClient::new(connect.host.clone(), connect.port)
            .with_timeout(Duration::from_secs(connect.timeout));

        let response = client.send(&command).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);

        if !response.is_ok() {
            std::process::exit(1);
        }
        Ok(())
    })
}

fn build_context(args: DaemonArgs) -> DaemonContext {
    let session = SessionKind::from_session_type(std::env::var("XDG_SESSION_TYPE").ok().as_deref());
    info!("Session type {:?}, using {}", session, session.tool().program());

    let scenarios = ScenarioDirectory::new(paths::scenarios_dir(args.scenarios_dir));
    info!("Scenarios directory: {}", scenarios.dir().display());

    let locator: Arc<dyn ElementLocator> = match paths::element_locator(args.element_locator) {
        Some(program) => {
            info!("Element locator: {}", program.display());
            Arc::new(CommandLocator::new(program))
        }
        None => {
            info!("No element locator configured, element steps will fail");
            Arc::new(UnavailableLocator)
        }
    };

    DaemonContext {
        recorder: Arc::new(RecordingSession::new(Box::new(GnomeScreencast::new()))),
        scenarios: Arc::new(scenarios),
        input: Arc::new(InputEngine::new(session)),
        locator,
    }
}

/// Run the daemon server with graceful signal handling.
///
/// On SIGINT (Ctrl+C) or SIGTERM the server stops accepting, drains
/// in-flight connections, then stops any recording still running.
fn run_daemon(args: DaemonArgs) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let address = format!("{}:{}", args.bind, args.port);
        let ctx = build_context(args);

        let server = match DaemonServer::bind(address.as_str(), ctx).await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to start daemon: {:#}", e);
                std::process::exit(1);
            }
        };
        let ctx = server.context();

        // Select the pointer backend now so a missing uinput device shows up at startup
        let input = ctx.input.clone();
        match tokio::task::spawn_blocking(move || input.backend_name()).await {
            Ok(backend) => info!("Pointer backend ready: {}", backend),
            Err(e) => error!("Pointer backend selection failed: {}", e),
        }

        // In-flight commands get to answer before the recording is torn down
        if let Err(e) = server.run_until(shutdown_signal()).await {
            error!("Daemon error: {:#}", e);
            std::process::exit(1);
        }

        if let Err(e) = tokio::task::spawn_blocking(move || ctx.stop_active_recording()).await {
            error!("Failed to stop recording on exit: {}", e);
        }
    });
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, shutting down gracefully");
        }
    }
}

/// Wait for SIGTERM signal (Unix only).
///
/// If signal registration fails, logs a warning and waits indefinitely.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to register SIGTERM handler: {}, daemon will only respond to SIGINT",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}

/// SIGTERM is not available on non-Unix platforms; use a never-completing future.
#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
