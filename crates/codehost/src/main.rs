use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use codehost::{Host, HostConfig};

/// Initialize tracing with CODEHOST_LOG and LOG_FORMAT support.
///
/// Always writes to stderr: stdout carries the frame channel.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("CODEHOST_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("trace") => "trace",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("codehost={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = HostConfig::detect();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        os = %config.os,
        temp_dir = %config.temp_dir.display(),
        timeout_secs = config.timeout.as_secs(),
        "codehost starting"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async {
        let host = Host::new(&config);
        host.serve(tokio::io::stdin(), tokio::io::stdout()).await
    })?;

    Ok(())
}
