use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{PitcrewConfig, config_dir, shellexpand, shellexpand_str};

use chrono::Utc;
use pitcrew_core::delegates::standard_team;
use pitcrew_core::dispatcher::Dispatcher;
use pitcrew_core::session::SessionStore;
use pitcrew_core::tools::ToolRegistry;
use pitcrew_core::types::{FrontendKind, IncomingTurn, Notification};
use pitcrew_eval::EvalRunner;
use pitcrew_gateway::GatewayServer;
use pitcrew_queue::{CompletionListener, SimWorker, StatusStore, topic::build_topic};
use pitcrew_store::{ArtifactStore, TicketIssuer};
use pitcrew_vcs::{GithubRepo, Heads, InMemoryRepo, RepoProvider};

#[derive(Parser)]
#[command(name = "pitcrew")]
#[command(version)]
#[command(about = "pitcrew: a conversational crew for your game-build pipeline")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// Start the interactive terminal session (and gateway, if enabled)
    Start,

    /// Send a one-shot request to the agent team
    Ask {
        /// The request to send
        message: String,
    },

    /// Replay recorded conversations against the router
    Eval {
        /// Fixture file or directory (defaults to the configured eval path)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Start => cmd_start(&cli.config).await,
        Commands::Ask { message } => cmd_ask(&cli.config, &message).await,
        Commands::Eval { path } => cmd_eval(&cli.config, path).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    tokio::fs::create_dir_all(config_dir.join("artifacts")).await?;

    println!("pitcrew initialized at {}", config_dir.display());
    println!(
        "Edit {} to point at your repository and worker.",
        config_path.display()
    );
    println!();
    println!("Next steps:");
    println!("  pitcrew start            # interactive session");
    println!("  pitcrew ask \"build main\"  # one-shot request");
    println!("  pitcrew eval             # replay recorded conversations");
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = PitcrewConfig::load_or_default(config_path);
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}

/// Everything a front end needs to run turns
struct Runtime {
    dispatcher: Arc<Dispatcher>,
    notify_rx: mpsc::Receiver<Notification>,
    cancel: CancellationToken,
}

struct RuntimeOptions {
    simulate_worker: bool,
    placeholder_uploads: bool,
    in_memory_status: bool,
}

fn build_repo(cfg: &PitcrewConfig) -> Result<Arc<dyn RepoProvider>> {
    match cfg.vcs.provider.as_str() {
        "github" => {
            if cfg.vcs.owner.is_empty() || cfg.vcs.repo.is_empty() {
                anyhow::bail!("vcs.provider = \"github\" requires vcs.owner and vcs.repo");
            }
            let token = shellexpand_str(&cfg.vcs.token);
            let token = if token.is_empty() { None } else { Some(token) };
            info!(
                "Using GitHub repository {}/{}",
                cfg.vcs.owner, cfg.vcs.repo
            );
            Ok(Arc::new(GithubRepo::new(
                cfg.vcs.owner.clone(),
                cfg.vcs.repo.clone(),
                token,
            )))
        }
        _ => {
            info!("Using built-in fixture repository");
            Ok(Arc::new(InMemoryRepo::default()))
        }
    }
}

async fn build_runtime(cfg: &PitcrewConfig, opts: RuntimeOptions) -> Result<Runtime> {
    let repo = build_repo(cfg)?;

    let artifacts_root = shellexpand(&cfg.artifacts.root);
    tokio::fs::create_dir_all(&artifacts_root)
        .await
        .with_context(|| format!("Failed to create {}", artifacts_root.display()))?;
    let artifacts = Arc::new(ArtifactStore::new(artifacts_root));
    let issuer = Arc::new(TicketIssuer::new(cfg.artifacts.base_url.clone()));

    let status = if opts.in_memory_status {
        StatusStore::in_memory()?
    } else {
        let db_path = shellexpand(&cfg.storage.db_path);
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        StatusStore::open(&db_path)?
    };
    let status = Arc::new(status);

    let (publisher, build_rx) = build_topic(cfg.queue.capacity);

    let mut registry = ToolRegistry::new();
    pitcrew_queue::tools::register_all(&mut registry, publisher, status.clone());
    pitcrew_vcs::tools::register_all(&mut registry, repo.clone());
    pitcrew_store::tools::register_all(
        &mut registry,
        artifacts.clone(),
        issuer,
        opts.placeholder_uploads,
    );
    info!("Registered {} tools", registry.len());

    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(standard_team()),
        Arc::new(SessionStore::new()),
        Arc::new(Heads::new(repo)),
    )
    .with_default_branch(cfg.agent.default_branch.clone())
    .with_default_command(cfg.agent.default_command.clone());

    let cancel = CancellationToken::new();
    let (notify_tx, notify_rx) = mpsc::channel::<Notification>(100);
    let (completion_tx, completion_rx) = mpsc::channel(100);

    let listener =
        CompletionListener::new(completion_rx, status.clone(), notify_tx, cancel.clone());
    tokio::spawn(listener.run());

    if opts.simulate_worker {
        let worker = SimWorker::new(
            build_rx,
            status,
            artifacts,
            completion_tx,
            cancel.clone(),
        )
        .with_build_delay(Duration::from_millis(cfg.worker.build_delay_ms));
        tokio::spawn(worker.run());
        info!("Simulated worker enabled");
    } else {
        // Keep the topic and completion channel open so publishes buffer
        // until shutdown instead of failing
        let cancel_hold = cancel.clone();
        tokio::spawn(async move {
            let _build_rx = build_rx;
            let _completion_tx = completion_tx;
            cancel_hold.cancelled().await;
        });
    }

    Ok(Runtime {
        dispatcher: Arc::new(dispatcher),
        notify_rx,
        cancel,
    })
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = PitcrewConfig::load(config_path)?;
    info!("Starting pitcrew...");

    let gateway_enabled = cfg.gateway.enabled
        || std::env::var("PITCREW_GATEWAY").map(|v| v == "1").unwrap_or(false);

    let mut runtime = build_runtime(
        &cfg,
        RuntimeOptions {
            simulate_worker: cfg.worker.simulate,
            // Terminal-only runs have no upload endpoint; stage a placeholder
            placeholder_uploads: !gateway_enabled,
            in_memory_status: false,
        },
    )
    .await?;

    if gateway_enabled {
        let host = std::env::var("PITCREW_HOST").unwrap_or_else(|_| cfg.gateway.host.clone());
        let port = std::env::var("PITCREW_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(cfg.gateway.port);
        let token = shellexpand_str(&cfg.gateway.auth_token);
        let token = if token.is_empty() { None } else { Some(token) };

        let server = Arc::new(GatewayServer::new(runtime.dispatcher.clone(), token));
        let gateway_cancel = runtime.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = server.serve(&host, port, gateway_cancel).await {
                error!("Gateway failed: {}", e);
            }
        });
    }

    println!("pitcrew is running. Type a request, or 'exit' to quit.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C");
                break;
            }
            notification = runtime.notify_rx.recv() => {
                match notification {
                    Some(notification) => println!("[pitcrew] {}", notification.content),
                    None => break,
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" {
                    break;
                }
                let turn = IncomingTurn {
                    session_id: "terminal".to_string(),
                    user_id: "terminal_user".to_string(),
                    content: line.to_string(),
                    frontend: FrontendKind::Terminal,
                    timestamp: Utc::now(),
                };
                match runtime.dispatcher.handle_turn(turn).await {
                    Ok(outcome) => println!("pitcrew: {}", outcome.reply),
                    Err(e) => error!("Turn failed: {:#}", e),
                }
            }
        }
    }

    runtime.cancel.cancel();
    info!("pitcrew stopped");
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, message: &str) -> Result<()> {
    let cfg = PitcrewConfig::load_or_default(config_path);
    let runtime = build_runtime(
        &cfg,
        RuntimeOptions {
            simulate_worker: false,
            placeholder_uploads: true,
            in_memory_status: false,
        },
    )
    .await?;

    let turn = IncomingTurn {
        session_id: format!("oneshot-{}", uuid::Uuid::new_v4()),
        user_id: "terminal_user".to_string(),
        content: message.to_string(),
        frontend: FrontendKind::Terminal,
        timestamp: Utc::now(),
    };
    let outcome = runtime.dispatcher.handle_turn(turn).await?;
    println!("{}", outcome.reply);

    runtime.cancel.cancel();
    Ok(())
}

async fn cmd_eval(config_path: &Option<PathBuf>, path: Option<PathBuf>) -> Result<()> {
    let cfg = PitcrewConfig::load_or_default(config_path);
    let eval_path = path.unwrap_or_else(|| PathBuf::from(&cfg.eval.path));

    let sets = pitcrew_eval::load_all(&eval_path)?;
    info!("Loaded {} eval set(s) from {}", sets.len(), eval_path.display());

    let mut all_passed = true;
    for set in &sets {
        // A fresh runtime per set: replayed sessions must start empty, and
        // no worker runs so the status store stays silent
        let runtime = build_runtime(
            &cfg,
            RuntimeOptions {
                simulate_worker: false,
                placeholder_uploads: false,
                in_memory_status: true,
            },
        )
        .await?;

        let runner = EvalRunner::new(runtime.dispatcher.clone())
            .with_response_threshold(cfg.eval.response_threshold);
        let report = runner.run_set(set).await?;
        print!("{}", report.summary());
        all_passed &= report.passed();

        runtime.cancel.cancel();
    }

    if !all_passed {
        anyhow::bail!("evaluation failed");
    }
    println!("All evaluations passed.");
    Ok(())
}
