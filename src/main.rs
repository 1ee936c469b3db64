use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use docvec::cli::commands::{
    handle_chunk, handle_collection, handle_config, handle_embed, handle_ingest, handle_search,
    handle_status, handle_upload,
};
use docvec::cli::{Cli, Commands};
use docvec::models::{Config, OutputFormat};

/// Detect ONNX Runtime library path and set ORT_DYLIB_PATH if not already set.
/// Must be called before any ort code runs.
fn detect_and_set_ort_path() {
    if std::env::var("ORT_DYLIB_PATH")
        .map(|p| Path::new(&p).exists())
        .unwrap_or(false)
    {
        return;
    }

    let home = std::env::var("HOME").unwrap_or_default();

    let found = if cfg!(target_os = "macos") {
        [
            format!("{home}/.local/lib/docvec/libonnxruntime.dylib"),
            "/opt/homebrew/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
            "/usr/local/opt/onnxruntime/lib/libonnxruntime.dylib".into(),
        ]
        .into_iter()
        .find(|p| Path::new(p).exists())
    } else if cfg!(target_os = "linux") {
        [
            format!("{home}/.local/lib/docvec/libonnxruntime.so"),
            "/usr/lib/libonnxruntime.so".into(),
            "/usr/local/lib/libonnxruntime.so".into(),
            "/usr/lib/x86_64-linux-gnu/libonnxruntime.so".into(),
        ]
        .into_iter()
        .find(|p| Path::new(p).exists())
    } else {
        None
    };

    if let Some(path) = found {
        // SAFETY: Called at program start before any threads are spawned.
        unsafe {
            std::env::set_var("ORT_DYLIB_PATH", path);
        }
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "docvec=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    detect_and_set_ort_path();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = cli.format.unwrap_or_else(|| {
        Config::load()
            .map(|c| c.search.default_format)
            .unwrap_or_default()
    });

    tokio::select! {
        result = run_command(cli.command, format) => result,
        _ = shutdown_signal() => {
            warn!("received shutdown signal, stopping");
            std::process::exit(130);
        }
    }
}

async fn run_command(command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Chunk(args) => handle_chunk(args, format).await,
        Commands::Embed(args) => handle_embed(args, format).await,
        Commands::Upload(args) => handle_upload(args, format).await,
        Commands::Ingest(args) => handle_ingest(args, format).await,
        Commands::Search(args) => handle_search(args, format).await,
        Commands::Status(args) => handle_status(args, format).await,
        Commands::Collection(cmd) => handle_collection(cmd, format).await,
        Commands::Config(cmd) => handle_config(cmd, format).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
