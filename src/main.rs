use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use no_savesies::core::config::Config;
use no_savesies::core::database;
use no_savesies::features::device::{
    FixOptions, JsonFileActionStore, LocalActionStore, ManualLocationProvider,
};
use no_savesies::features::map::{load_detail, render_board, select, LogMapSurface, MapViewport};
use no_savesies::features::reports::models::{Coordinates, ObjectCategory};
use no_savesies::features::reports::services::{
    ActionOutcome, CategoryFilter, PhotoInput, SharedBoard,
};
use no_savesies::features::reports::{
    GeocodingService, PgChangeFeed, PgReportRepository, ReportActions, ReportBoard,
    ReportSyncWorker, SubmissionFlow,
};
use no_savesies::modules::imaging::ImageNormalizer;
use no_savesies::modules::storage::S3PhotoStorage;

#[derive(Parser)]
#[command(name = "no-savesies", about = "Crowdsourced parking savesie reports")]
struct CliParser {
    /// Command to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the live board and log markers after every change.
    Watch {
        /// Only show one category (chair, trash_can, cone, other or all).
        #[arg(long, default_value = "all")]
        filter: CategoryFilter,
    },
    /// Report a savesie at a location with a photo.
    Report {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        category: ObjectCategory,
        #[arg(long)]
        photo: PathBuf,
    },
    /// Confirm a savesie is still there.
    Confirm { id: Uuid },
    /// Mark a savesie as gone.
    Resolve { id: Uuid },
    /// Flag a report as wrong or abusive.
    Flag { id: Uuid },
    /// Print the detail view for one report.
    Show { id: Uuid },
}

fn main() -> anyhow::Result<()> {
    let cli_args = CliParser::parse();

    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(2)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli_args.command))
}

/// Wiring shared by every command
struct Client {
    config: Config,
    repository: Arc<PgReportRepository>,
    feed: Arc<PgChangeFeed>,
    local_actions: Arc<JsonFileActionStore>,
    board: SharedBoard,
}

impl Client {
    fn sync_worker(&self) -> ReportSyncWorker {
        ReportSyncWorker::new(
            self.repository.clone(),
            self.feed.clone(),
            self.board.clone(),
        )
    }

    fn actions(&self) -> ReportActions {
        ReportActions::new(
            self.repository.clone(),
            self.local_actions.clone(),
            self.board.clone(),
        )
    }
}

async fn async_main(command: Command) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!("Configuration loaded successfully");

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    database::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed successfully");

    let client = Client {
        repository: Arc::new(PgReportRepository::new(pool.clone())),
        feed: Arc::new(PgChangeFeed::new(pool.clone())),
        local_actions: Arc::new(JsonFileActionStore::open(
            config.device.local_actions_path.clone(),
        )),
        board: ReportBoard::shared(),
        config,
    };

    match command {
        Command::Watch { filter } => watch(&client, filter).await,
        Command::Report {
            lat,
            lng,
            category,
            photo,
        } => report(&client, Coordinates { lat, lng }, category, &photo).await,
        Command::Confirm { id } => {
            client.sync_worker().refresh().await?;
            let outcome = client.actions().confirm(id).await;
            print_outcome(outcome.map_err(|e| {
                tracing::error!("{}", e);
                e.user_message()
            }))
        }
        Command::Resolve { id } => {
            client.sync_worker().refresh().await?;
            let outcome = client.actions().resolve(id).await;
            print_outcome(outcome.map_err(|e| {
                tracing::error!("{}", e);
                e.user_message()
            }))
        }
        Command::Flag { id } => {
            client.sync_worker().refresh().await?;
            let outcome = client.actions().flag(id).await;
            print_outcome(outcome.map_err(|e| {
                tracing::error!("{}", e);
                e.user_message()
            }))
        }
        Command::Show { id } => show(&client, id).await,
    }
}

async fn watch(client: &Client, filter: CategoryFilter) -> anyhow::Result<()> {
    client.board.write().await.set_filter(filter);

    let worker = Arc::new(client.sync_worker());
    let mut revisions = worker.subscribe();
    let running = Arc::clone(&worker);
    let sync = tokio::spawn(async move {
        if let Err(e) = running.run().await {
            tracing::error!("Report sync worker stopped: {}", e);
        }
    });
    tracing::info!("Report sync worker spawned");

    let viewport = MapViewport::from_config(&client.config.map);
    let mut surface = LogMapSurface;

    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let board = client.board.read().await;
                render_board(&mut surface, &viewport, &board, Utc::now());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    sync.abort();
    Ok(())
}

async fn report(
    client: &Client,
    at: Coordinates,
    category: ObjectCategory,
    photo_path: &Path,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(photo_path)
        .await
        .with_context(|| format!("Failed to read {}", photo_path.display()))?;
    let photo = PhotoInput {
        file_name: photo_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: content_type_for(photo_path).to_string(),
        bytes,
    };

    let photos = S3PhotoStorage::new(client.config.storage.clone()).await?;
    let flow = SubmissionFlow::new(
        Arc::new(ManualLocationProvider::new(Some(at))),
        Arc::new(photos),
        client.repository.clone(),
        ImageNormalizer::new(&client.config.image),
        FixOptions::from_config(&client.config.device),
    );

    let steps = async {
        if flow.start().await?.is_none() {
            return Ok(None);
        }
        flow.choose_category(category)?;
        flow.attach_photo(Some(photo)).await
    };

    match steps.await {
        Ok(Some(submitted)) => {
            println!("{}", submitted.message());
            println!("{}", submitted.report.id);
            Ok(())
        }
        Ok(None) => bail!("Report was not submitted"),
        Err(e) => {
            tracing::error!("Submission failed: {}", e);
            bail!(e.user_message())
        }
    }
}

async fn show(client: &Client, id: Uuid) -> anyhow::Result<()> {
    client.sync_worker().refresh().await?;

    let report = {
        let board = client.board.read().await;
        match select(&board, id, Utc::now()) {
            Some(report) => report.clone(),
            None => bail!("Report {} is not active", id),
        }
    };

    let geocoder = GeocodingService::new(&client.config.geocoding)?;
    let local_actions: &dyn LocalActionStore = client.local_actions.as_ref();
    let detail = load_detail(&report, &geocoder, local_actions, Utc::now()).await;

    println!(
        "{} {}",
        report.object_type.unwrap_or(ObjectCategory::Other).emoji(),
        detail.category_label
    );
    println!("{}", detail.address);
    println!("{}", detail.reported_ago);
    println!("Confirmations: {}", report.confirmations);
    println!("Expires: {}", report.expires_at.to_rfc3339());
    println!("Photo: {}", report.photo_url);
    if let Some(city) = &report.city {
        println!("City: {}", city);
    }
    println!(
        "Can confirm: {}, resolve: {}, flag: {}",
        detail.can_confirm, detail.can_resolve, detail.can_flag
    );
    Ok(())
}

fn print_outcome(outcome: Result<ActionOutcome, &'static str>) -> anyhow::Result<()> {
    match outcome {
        Ok(ActionOutcome::AlreadyRecorded) => {
            println!("Already recorded on this device");
            Ok(())
        }
        Ok(ActionOutcome::InFlight) => {
            println!("Another action on this report is still running");
            Ok(())
        }
        Ok(outcome) => {
            if let Some(message) = outcome.message() {
                println!("{}", message);
            }
            Ok(())
        }
        Err(message) => bail!(message),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
