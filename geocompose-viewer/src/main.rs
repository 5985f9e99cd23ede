use anyhow::Context;
use geocompose::{
    core::config::EngineConfig,
    state::{LayerStatus, MapStateDocument},
    HeadlessEngine, HttpRemoteSource, MapSession, Point,
};
use std::{path::PathBuf, sync::Arc};

/// Rebuilds a shared map from its state document and reports every layer
#[derive(clap::Parser, Debug)]
#[command(name = "geocompose-viewer", version, about)]
struct Cli {
    /// Map state document (JSON)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    document: PathBuf,

    /// Engine configuration overrides (JSON)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Route remote requests through this same-origin proxy
    #[arg(long)]
    proxy: Option<String>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 768)]
    height: u32,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(proxy) = &cli.proxy {
        config.remote.proxy_url = Some(proxy.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let text = std::fs::read_to_string(&cli.document)
        .with_context(|| format!("reading document {}", cli.document.display()))?;
    let document = MapStateDocument::from_json(&text)
        .with_context(|| format!("parsing document {}", cli.document.display()))?;

    let engine = HeadlessEngine::new(
        Point::new(f64::from(cli.width), f64::from(cli.height)),
        config.selection.hit_tolerance_px,
    );
    let source = Arc::new(HttpRemoteSource::new(config.remote.clone()));
    let mut session = MapSession::new(config, Box::new(engine), source)?;

    log::info!("opening \"{}\" with {} layers", document.subject, document.layers.len());
    let report = session.open_document(&document).await;

    let view = session.registry().engine().view();
    println!("{}", report.subject);
    println!(
        "base {} | center {:.5}, {:.5} | zoom {:.2}",
        report.base_layer_id, view.center[0], view.center[1], view.zoom
    );
    for layer in &report.layers {
        let status = match &layer.status {
            LayerStatus::Loaded(_) => "loaded".to_string(),
            LayerStatus::Degraded { reason, .. } => format!("degraded ({})", reason),
            LayerStatus::Unavailable { reason } => format!("unavailable ({})", reason),
            LayerStatus::Placeholder => "placeholder (local layer, not shared)".to_string(),
        };
        println!("{:>3}  {:<32} {}", layer.index, layer.name, status);
    }

    if !report.is_complete() {
        log::warn!("{} of {} layers did not fully load", report.failures().count(), report.layers.len());
    }
    Ok(())
}
