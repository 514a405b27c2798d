//! QuickReply - hotkey-driven replies
//!
//! Copy a message with a hotkey, let a model answer it, click to paste.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quickreply::backend::create_backend;
use quickreply::clipboard::{NoTextExtractor, SystemClipboard};
use quickreply::config::{config_path, Config};
use quickreply::history::AntiRepeatWindow;
use quickreply::input::{RdevKeyboard, SettleDelays};
use quickreply::listener::{spawn_event_source, ListenerLifecycle};
use quickreply::media::MediaLibrary;
use quickreply::method::MethodCatalog;
use quickreply::notify::{HeadlessUi, LogNotifier};
use quickreply::prompts::{seed_default_templates, PromptCatalog};
use quickreply::remote::RemoteMediaSource;
use quickreply::resolver::{ArtifactResolver, ResolvedArtifact};
use quickreply::session::{control_channel, SessionController, SessionGate};
use quickreply::worker::{GenerationSettings, ReplyPipeline, SessionWorker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: <config dir>/quickreply/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for hotkeys until Ctrl+C (default)
    Run,
    /// List the configured reply methods
    Methods,
    /// Generate one reply for TEXT and print it
    Ask {
        #[arg(short, long, default_value = "normal")]
        method: String,
        text: String,
    },
    /// Write the default config file and starter prompt templates
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let path = args.config.clone().unwrap_or_else(config_path);
    let config = Config::load_from(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    // Setup logging; RUST_LOG wins over the config
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Methods => list_methods(&config),
        Command::Ask { method, text } => ask(&config, &method, &text).await,
        Command::InitConfig { force } => init_config(&path, force),
    }
}

fn build_pipeline(config: &Config, window: Arc<AntiRepeatWindow>) -> Result<ReplyPipeline> {
    let backend = create_backend(config)?;
    let library = MediaLibrary::new(&config.assets_dir);
    let prompts = PromptCatalog::new(config.prompts_dir(), library.clone());
    let resolver = ArtifactResolver::new(library, window.clone());
    let settings = GenerationSettings {
        temperature: config.temperature,
        regenerate_on_missing_artifact: config.regenerate_on_missing_artifact,
    };
    let pipeline = ReplyPipeline::new(prompts, backend, resolver, window, settings);
    if !config.remote_lookup_enabled() {
        return Ok(pipeline);
    }
    info!("  - Remote media lookup: {}", config.remote_media_url);
    let remote = RemoteMediaSource::new(
        &config.remote_media_url,
        config.downloads_dir(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(pipeline.with_remote(Arc::new(remote)))
}

async fn run(config: Config) -> Result<()> {
    info!("💬 QuickReply v{} starting...", env!("CARGO_PKG_VERSION"));

    let catalog = MethodCatalog::new(config.methods.clone())?;
    let window = Arc::new(AntiRepeatWindow::new());
    let pipeline = build_pipeline(&config, window)?;
    let clipboard = Arc::new(SystemClipboard::new()?);
    let worker = Arc::new(SessionWorker::new(
        clipboard,
        Arc::new(NoTextExtractor),
        pipeline,
    ));

    let notifier = Arc::new(LogNotifier);
    let gate = SessionGate::new();
    let (control, inbox) = control_channel();
    let delays = SettleDelays::from_millis(config.copy_settle_ms, config.paste_settle_ms);
    let listeners = Arc::new(ListenerLifecycle::new(
        &config.hotkeys,
        control.clone(),
        Arc::new(RdevKeyboard::new()),
        notifier.clone(),
        gate.clone(),
        delays,
    )?);

    let controller = SessionController::new(
        catalog,
        worker,
        listeners.clone(),
        notifier,
        Arc::new(HeadlessUi),
        gate,
        (control, inbox),
    );
    let handle = controller.handle();
    let actor = tokio::spawn(controller.run());

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let _hook = spawn_event_source(event_tx)?;
    let dispatch = tokio::spawn(listeners.run(event_rx));

    info!("✅ QuickReply ready - select text and press a hotkey");
    for binding in &config.hotkeys {
        info!("   {} → {}", binding.combo, binding.method);
    }

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    handle.shutdown()?;
    if let Err(e) = actor.await {
        warn!("Session controller ended abnormally: {}", e);
    }
    let _ = dispatch.await;
    Ok(())
}

fn list_methods(config: &Config) -> Result<()> {
    let catalog = MethodCatalog::new(config.methods.clone())?;
    for method in catalog.iter() {
        println!("{:<10} {:<12} {}", method.id, method.kind(), method.display_label);
    }
    Ok(())
}

async fn ask(config: &Config, method_id: &str, text: &str) -> Result<()> {
    let catalog = MethodCatalog::new(config.methods.clone())?;
    let method = catalog.get(method_id)?;
    let pipeline = build_pipeline(config, Arc::new(AntiRepeatWindow::new()))?;

    let artifact = pipeline.produce(method, text, &|_| {}).await?;
    match &artifact {
        ResolvedArtifact::Text(reply) => println!("{reply}"),
        ResolvedArtifact::Image(path) => println!("{}", path.display()),
    }
    pipeline.commit(method, &artifact);
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = Config::default();
    config.save_to(path)?;
    println!("Wrote default config to {}", path.display());

    // assets/prompts/<template_id>.txt, assets/<media_dir>/ for media methods
    let prompts_dir = config.prompts_dir();
    for template in seed_default_templates(&prompts_dir)? {
        println!("Wrote prompt template {}", template.display());
    }
    for method in config.methods.iter().filter(|m| m.media_reply) {
        if let Some(dir) = &method.media_dir {
            let dir = config.assets_dir.join(dir);
            std::fs::create_dir_all(&dir)?;
            println!("Put '{}' images in {}", method.id, dir.display());
        }
    }
    Ok(())
}
