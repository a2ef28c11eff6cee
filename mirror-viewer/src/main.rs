//! Mirror viewer — entry point.
//!
//! ```text
//! mirror-viewer --session <id>             Mirror a session with defaults
//! mirror-viewer --config <path>            Use custom config TOML
//! mirror-viewer --server <url> --push <ws> Override endpoints
//! mirror-viewer --gen-config               Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_core::{HttpLiveApi, MirrorClient, PushChannel, StreamEvent, WebSocketPush};

use mirror_viewer::commands::Command;
use mirror_viewer::config::ViewerConfig;
use mirror_viewer::display::write_snapshot;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mirror-viewer", about = "Live remote browser viewport mirror")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "mirror-viewer.toml")]
    config: PathBuf,

    /// Session to mirror on startup.
    #[arg(short, long)]
    session: Option<String>,

    /// HTTP API base URL (overrides config).
    #[arg(long)]
    server: Option<String>,

    /// Push channel WebSocket URL (overrides config; empty disables push).
    #[arg(long)]
    push: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(url) = cli.server {
        config.network.api_base_url = url;
    }
    if let Some(url) = cli.push {
        config.network.push_url = url;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("mirror-viewer v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Transports ───────────────────────────────────────────

    let api = Arc::new(HttpLiveApi::new(
        &config.network.api_base_url,
        Duration::from_millis(config.network.timeout_ms),
    )?);

    let push = (!config.network.push_url.is_empty()).then(|| WebSocketPush::spawn(&config.network.push_url));

    // ── 2. Client ───────────────────────────────────────────────

    let mut builder = MirrorClient::builder(api)
        .config(config.stream.clone())
        .container(config.display.container());
    if let Some(viewport) = config.display.viewport() {
        builder = builder.viewport(viewport);
    }
    if let Some(push) = &push {
        builder = builder.push(Arc::clone(push) as Arc<dyn PushChannel>);
    }
    let (client, mut events) = builder.build();

    if let Some(id) = cli.session {
        client.set_session(Some(id));
    }

    // ── 3. Event loop ───────────────────────────────────────────

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            Some(event) = events.recv() => report(event),
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Keep mirroring after the script ends.
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        error!("stdin: {e}");
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() || line.trim_start().starts_with('#') {
                    continue;
                }
                let cmd = match line.parse::<Command>() {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };
                if !execute(&client, &config, cmd).await {
                    break;
                }
            }
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    client.shutdown();
    if let Some(push) = push {
        push.close();
    }

    Ok(())
}

/// Run one command. Returns `false` on `quit`.
async fn execute(client: &MirrorClient, config: &ViewerConfig, cmd: Command) -> bool {
    if (cmd.is_mouse() && !config.input.capture_mouse) || (cmd.is_keyboard() && !config.input.capture_keyboard) {
        info!("input capture disabled; command ignored");
        return true;
    }

    match cmd {
        Command::Input(event) => match client.send_input(event).await {
            Ok(Some(route)) => info!(?route, "input sent"),
            Ok(None) => info!("input dropped (no session, no frame yet, or throttled)"),
            Err(e) => warn!("input failed: {e}"),
        },
        Command::Hide => client.set_visible(false),
        Command::Show => client.set_visible(true),
        Command::Session(id) => client.set_session(Some(id)),
        Command::Viewport(v) => client.set_viewport(Some(v)),
        Command::Container(rect) => client.set_container(rect),
        Command::Snapshot => {
            let canvas = client.canvas();
            let result = write_snapshot(&canvas.lock(), &config.display.snapshot_path);
            match result {
                Ok(()) => info!(path = %config.display.snapshot_path.display(), "snapshot written"),
                Err(e) => warn!("snapshot failed: {e}"),
            }
        }
        Command::Stats => {
            let s = client.stats();
            info!(
                session = ?client.session_id(),
                state = %client.connection_state(),
                frames = s.total_frames,
                bytes = s.total_bytes,
                fps = format_args!("{:.1}", s.current_fps),
                avg_fps = format_args!("{:.1}", s.avg_fps),
                bps = s.bytes_per_second,
                dropped = client.dropped_frames(),
                "stats"
            );
            if let Some(server) = client.server_stats() {
                info!(
                    e2e_p95_ms = server.e2e_p95_ms,
                    actual_fps = server.actual_fps,
                    severity = %server.severity(),
                    "server stats"
                );
            }
        }
        Command::Quit => return false,
    }
    true
}

/// Log a stream event.
fn report(event: StreamEvent) {
    match event {
        StreamEvent::FrameRendered { .. } | StreamEvent::Stats(_) => {}
        StreamEvent::DimensionsChanged(d) => info!(width = d.width, height = d.height, "frame size"),
        StreamEvent::ConnectionChanged { session_id, state } => {
            info!(session = %session_id, %state, "connection")
        }
        StreamEvent::PageMetadata(meta) => info!(
            title = meta.title.as_deref().unwrap_or(""),
            url = meta.url.as_deref().unwrap_or(""),
            "page"
        ),
        StreamEvent::ServerStats { severity, stats, .. } => {
            if severity != mirror_core::Severity::None {
                warn!(bottleneck = ?stats.primary_bottleneck, %severity, "server bottleneck");
            }
        }
        StreamEvent::StreamError(e) => warn!("stream error: {e}"),
        StreamEvent::InputError(e) => warn!("input error: {e}"),
    }
}
