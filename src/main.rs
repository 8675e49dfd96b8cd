mod app;
mod model;
mod msg;
mod plugin;
mod rpc;

use std::io;
use std::sync::mpsc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use app::App;
use model::config::AppConfig;
use msg::Msg;
use rpc::Nvim;

fn main() -> Result<()> {
    let config = AppConfig::load()?;

    // Initialize logging to file (never stdout: it carries the rpc channel)
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "my-plugin.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    tracing::info!("my-plugin starting");

    let nvim = Nvim::new(io::stdout(), config.request_timeout());
    let result = run(nvim);

    if let Err(e) = &result {
        tracing::error!("my-plugin error: {e:?}");
    }
    tracing::info!("my-plugin exiting");

    result
}

fn run(nvim: Nvim) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let mut app = App::new(nvim.clone())?;

    // Reader thread: decodes stdin and forwards as Msg
    nvim.spawn_reader(io::stdin(), tx);

    // ── Main dispatch loop ──
    while !app.should_quit {
        let msg = rx.recv()?;
        app.update(msg)?;
    }

    Ok(())
}
