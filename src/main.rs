use tracing::{error, info};

use cubby::{Config, Database, DirectoryService, FilesystemMirror};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = cubby::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        cubby::logging::init_console_only(&config.logging.level);
    }

    info!("Cubby - per-user file storage");

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    let mirror = FilesystemMirror::from_config(&config.storage);
    if let Err(e) = DirectoryService::new(&db, &mirror).setup_root() {
        error!("Failed to prepare storage root: {e}");
        std::process::exit(1);
    }

    info!(
        "Storage ready at {} (database {})",
        mirror.root().display(),
        config.database.path
    );
}
