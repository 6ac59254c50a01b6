use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use file_intake::{
    admin, api,
    blob_store::LocalStore,
    config::Config,
    naming::UuidGenerator,
    storage::{Database, TABLE_NAMES},
    AppState,
};

#[derive(Parser)]
#[command(name = "file-intake", version, about = "Per-customer file intake API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Create customers and give each a token; existing customers are kept
    Seed {
        /// Customer names (defaults to two demo customers)
        names: Vec<String>,
    },
    /// Issue a new token for a customer, invalidating the old one
    RotateToken {
        customer_id: i64,
    },
    /// Print tables, customers and record counts
    Inspect,
    /// Find blobs with no metadata record
    Reconcile {
        /// Remove the orphans instead of only listing them
        #[arg(long)]
        delete: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;

    let db = Database::open(&config.server.data_dir)
        .with_context(|| format!("Failed to open database in {}", config.server.data_dir))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, db).await,
        Commands::Seed { names } => {
            let names = if names.is_empty() {
                admin::DEFAULT_CUSTOMERS
                    .iter()
                    .map(|n| n.to_string())
                    .collect()
            } else {
                names
            };
            for outcome in admin::seed_customers(&db, &names)? {
                let customer = outcome.customer;
                let verb = if outcome.created { "created" } else { "exists" };
                println!(
                    "{verb}: id={} name={:?} token={}",
                    customer.id,
                    customer.name,
                    customer.token.unwrap_or_default()
                );
            }
            Ok(())
        }
        Commands::RotateToken { customer_id } => {
            let customer = admin::rotate_token(&db, customer_id)?;
            println!(
                "rotated: id={} name={:?} token={}",
                customer.id,
                customer.name,
                customer.token.unwrap_or_default()
            );
            Ok(())
        }
        Commands::Inspect => {
            println!("tables: {}", TABLE_NAMES.join(", "));
            println!("customers:");
            for customer in db.list_customers()? {
                println!("  id={} name={:?}", customer.id, customer.name);
            }
            let counts = db.counts()?;
            println!(
                "records: customers={} uploads={} processed={}",
                counts.customers, counts.uploads, counts.processed
            );
            Ok(())
        }
        Commands::Reconcile { delete } => {
            let store = LocalStore::new(&config.storage.upload_root)?;
            let orphans = admin::find_orphans(&db, &store).await?;
            for key in &orphans {
                println!("orphan: {key}");
            }
            if delete {
                admin::remove_orphans(&store, &orphans).await?;
                println!("removed {} orphaned blob(s)", orphans.len());
            } else {
                println!("found {} orphaned blob(s)", orphans.len());
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

async fn serve(config: Config, db: Database) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "file-intake starting");
    info!("Database opened at: {}", config.server.data_dir);

    let blob_store = LocalStore::new(&config.storage.upload_root)?;
    info!("Storing uploads under: {}", config.storage.upload_root);

    let customers = db.list_customers()?;
    if customers.is_empty() {
        tracing::warn!("No customers registered; run `file-intake seed` to create some");
    } else {
        info!(count = customers.len(), "Customers registered");
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        blob_store: Arc::new(blob_store),
        ids: Arc::new(UuidGenerator),
    });

    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, draining connections");
}
