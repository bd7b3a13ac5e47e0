use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use wikiscroll::app::{App, EVENT_CHANNEL_CAPACITY};
use wikiscroll::config::Config;
use wikiscroll::liked::LikedStore;
use wikiscroll::storage::{Database, DatabaseError};
use wikiscroll::ui;
use wikiscroll::util::atomic_write;

/// Get the config directory path (~/.config/wikiscroll/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("wikiscroll"))
}

#[derive(Parser, Debug)]
#[command(
    name = "wikiscroll",
    about = "Infinite-scroll terminal browser for random Wikipedia articles"
)]
struct Args {
    /// Config file (default: ~/.config/wikiscroll/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write liked articles as a Markdown list and exit
    #[arg(long, value_name = "FILE")]
    export_liked: Option<PathBuf>,

    /// Print liked articles and exit
    #[arg(long)]
    list_liked: bool,

    /// Remove all liked articles and exit
    #[arg(long)]
    clear_liked: bool,

    /// Reset database (a timestamped backup is kept)
    #[arg(long)]
    reset_db: bool,
}

/// Log to a file in the config directory; the terminal belongs to the TUI.
fn init_tracing(config_dir: &std::path::Path) -> Result<()> {
    let log_path = config_dir.join("wikiscroll.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file '{}'", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wikiscroll=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // Config directory holds the liked list and the log: user-only access.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700)) {
            eprintln!("Warning: could not restrict permissions on {}: {e}", config_dir.display());
        }
    }

    init_tracing(&config_dir)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting wikiscroll");

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;

    let db_path = config_dir.join("wikiscroll.db");

    if args.reset_db && db_path.exists() {
        let backup_path = config_dir.join(format!(
            "wikiscroll.db.backup.{}",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        let content = std::fs::read(&db_path).context("Failed to read database for backup")?;
        atomic_write(&backup_path, &content).with_context(|| {
            format!(
                "Failed to create backup at '{}'. Database is unchanged.",
                backup_path.display()
            )
        })?;
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset. Backup kept at {}", backup_path.display());
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of wikiscroll appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let mut liked = LikedStore::load(db).await.context("Failed to load liked articles")?;

    if args.list_liked {
        for article in liked.list() {
            println!("{}\t{}", article.title, article.page_url);
        }
        return Ok(());
    }
    if let Some(path) = &args.export_liked {
        liked.export_to_file(path)?;
        println!("Exported {} liked articles to {}", liked.len(), path.display());
        return Ok(());
    }
    if args.clear_liked {
        let count = liked.len();
        liked.clear().await?;
        println!("Cleared {count} liked articles.");
        return Ok(());
    }

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut app = App::from_config(config, liked, event_tx).context("Failed to create application")?;

    ui::run(&mut app, event_rx).await?;

    tracing::info!("Exiting");
    println!("Goodbye!");
    Ok(())
}
