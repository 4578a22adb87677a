use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use signalgate::application::usecases::{DispatchSignalUseCase, RunOnceUseCase};
use signalgate::application::{Clock, Notifier, SignalCooldownManager, SignalPublisher, SignalStore};
use signalgate::infrastructure::{
    broadcast_publisher::BroadcastPublisher, clock::SystemClock, console_notifier::ConsoleNotifier,
    jsonl_inbox::JsonlInboxSource, memory_store::InMemorySignalStore,
    multi_notifier::MultiNotifier, signal_bus::SignalBus, sqlite_store::SqliteSignalStore,
    telegram_notifier::TelegramNotifier,
};
use signalgate::interfaces::config::Config;
use signalgate::interfaces::http_api::{build_router, ApiState};

#[derive(Parser, Debug)]
#[command(name = "signalgate")]
struct Args {
    /// Path to config.yaml
    #[arg(long, env = "SIGNALGATE_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Process the inbox once and exit
    #[arg(long)]
    once: bool,

    /// Do not send external notifications (console only)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("signalgate=info".parse().unwrap()),
        )
        .init();
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }
    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // 1) load config
    let cfg = Config::load_from_file(&args.config)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {e}", args.config))?;

    // 2) build infra
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let gate = Arc::new(SignalCooldownManager::new(
        cfg.cooldown.to_policy(),
        clock.clone(),
    ));

    let store: Arc<dyn SignalStore> = match &cfg.database_url {
        Some(url) => Arc::new(SqliteSignalStore::new(url).await?),
        None => {
            tracing::warn!("database_url not set, signal log kept in memory");
            Arc::new(InMemorySignalStore::new())
        }
    };

    // notifiers fanout
    let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(ConsoleNotifier::new())];
    if args.dry_run {
        tracing::warn!("--dry-run enabled: only console output");
    } else if let Some(tg) = &cfg.telegram {
        let mut telegram = TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id.clone());
        if let Some(base) = &tg.api_base {
            telegram = telegram.with_api_base(base.clone());
        }
        notifiers.push(Box::new(telegram));
    } else {
        tracing::warn!("telegram not configured, TelegramNotifier disabled");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(MultiNotifier::new(notifiers));

    let bus = SignalBus::new(256);
    let publisher: Arc<dyn SignalPublisher> = Arc::new(BroadcastPublisher::new(bus.clone()));

    // 3) run once
    if args.once {
        let Some(inbox) = &cfg.inbox else {
            anyhow::bail!("--once needs an inbox in the config");
        };
        if !gate.is_startup_complete() {
            tracing::warn!("startup cooldown is active; every signal will be blocked");
        }
        let source = JsonlInboxSource::new(inbox.clone(), clock.clone());
        let run_once = RunOnceUseCase {
            source: &source,
            dispatch: DispatchSignalUseCase {
                gate: &gate,
                store: store.as_ref(),
                notifier: notifier.as_ref(),
                publisher: Some(publisher.as_ref()),
            },
        };
        let summary = run_once.execute().await?;
        tracing::info!(?summary, "run once completed");
        return Ok(());
    }

    // 4) inbox polling in the background
    if let Some(inbox) = cfg.inbox.clone() {
        let source = JsonlInboxSource::new(inbox, clock.clone());
        let gate = gate.clone();
        let store = store.clone();
        let notifier = notifier.clone();
        let publisher = publisher.clone();
        let poll_interval = cfg.poll_interval_seconds;

        tokio::spawn(async move {
            tracing::info!(poll_interval = poll_interval, "inbox polling started");
            loop {
                let run_once = RunOnceUseCase {
                    source: &source,
                    dispatch: DispatchSignalUseCase {
                        gate: &gate,
                        store: store.as_ref(),
                        notifier: notifier.as_ref(),
                        publisher: Some(publisher.as_ref()),
                    },
                };
                if let Err(e) = run_once.execute().await {
                    tracing::error!("inbox poll failed: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_secs(poll_interval)).await;
            }
        });
    }

    // 5) serve
    let state = ApiState {
        gate,
        store,
        notifier,
        publisher: Some(publisher),
        api_token: cfg.api_token.clone(),
        signal_bus: Some(bus),
    };
    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    tracing::info!(bind = %cfg.bind, "http api listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
