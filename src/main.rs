//! Farmdesk CLI - worker backend for the prawn farm

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use farmdesk::auth::{CredentialVerifier, DEFAULT_WORKER_ROLE};
use farmdesk::config::{self, FarmdeskConfig};
use farmdesk::server::{self, AppState};
use farmdesk::ui::{self, Icons};
use farmdesk::{IdentityClaim, OwnerKey, SqliteStore};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "farmdesk")]
#[command(version)]
#[command(about = "Farm worker backend - task resolution, feeding reminders and order updates")]
#[command(long_about = r#"
Farmdesk serves the worker routes of the farm backend over a SQLite database.
The task route works against whatever task table the database has: it finds
the table and its owner columns at request time.

Example usage:
  farmdesk init --seed
  farmdesk serve --port 5000
  farmdesk tasks --email nimal@farm.lk
  farmdesk token --id 1 --role worker
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the demo tables
    Init {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Secret used to sign and verify worker tokens
        #[arg(long)]
        jwt_secret: Option<String>,

        /// Insert sample workers, tasks, feedings and orders
        #[arg(long)]
        seed: bool,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Resolve the tasks owned by a worker
    Tasks {
        /// Worker id
        #[arg(long)]
        id: Option<String>,

        /// Worker email
        #[arg(long)]
        email: Option<String>,

        /// Worker name
        #[arg(long)]
        name: Option<String>,

        /// Resolve from a signed worker token instead
        #[arg(long, conflicts_with_all = ["id", "email", "name"])]
        token: Option<String>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show which task table and columns would be used
    Inspect {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Sign a worker token for testing
    Token {
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        name: Option<String>,

        /// Role claim; pass an empty string to omit it
        #[arg(long, default_value = DEFAULT_WORKER_ROLE)]
        role: String,

        /// Lifetime in seconds
        #[arg(long, default_value = "86400")]
        ttl: i64,

        /// Issue a token without an expiry
        #[arg(long, conflicts_with = "ttl")]
        no_expiry: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut settings = config::load_config(Some(&config_path))?
        .unwrap_or_default()
        .with_env_overrides()?;

    match cli.command {
        Commands::Init { database, jwt_secret, seed, force } => {
            let database = database.map(|d| d.to_string_lossy().to_string());
            let settings = config::init_config(&config_path, database, jwt_secret, force, |key| std::env::var(key).ok())?;
            let db_path = settings.database_path();
            config::ensure_db_dir(&db_path)?;

            let store = SqliteStore::open(&db_path)?;
            store.initialize_demo_schema(seed)?;

            ui::success(&format!("Wrote {}", config_path.display()));
            ui::success(&format!("Initialized {}", db_path.display()));
            if settings.jwt_secret.is_none() {
                ui::warn("No JWT secret configured; set JWT_SECRET before serving");
            }
        }

        Commands::Serve { port, database } => {
            if let Some(database) = database {
                settings.database = Some(database.to_string_lossy().to_string());
            }
            let port = port.unwrap_or_else(|| settings.port());
            let db_path = settings.database_path();
            if !db_path.exists() {
                anyhow::bail!("database not found at {} (run `farmdesk init` first)", db_path.display());
            }

            ui::header(Icons::TRACTOR, "Farmdesk worker backend");
            ui::field("Database", &db_path.display().to_string());
            ui::field("Port", &port.to_string());

            let state = AppState::from_config(&settings)?;
            server::start_server(port, state).await?;
        }

        Commands::Tasks { id, email, name, token, database, format } => {
            if let Some(database) = database {
                settings.database = Some(database.to_string_lossy().to_string());
            }

            let claim = match token {
                Some(token) => verifier(&settings)?.verify(&token)?.claim,
                None => IdentityClaim {
                    id: id.as_deref().map(OwnerKey::from),
                    email,
                    name,
                },
            };
            if claim.is_empty() {
                anyhow::bail!("pass --id, --email, --name or --token");
            }

            let store = SqliteStore::open_read_only(&settings.database_path())?;
            let resolution = settings.resolver().resolve(&store, &claim)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
            } else {
                ui::header(Icons::SEARCH, &format!("Tasks from {}", resolution.table));
                let path = serde_json::to_value(&resolution.path)?;
                ui::field("Path", path["kind"].as_str().unwrap_or("unknown"));
                ui::field("Records", &resolution.records.len().to_string());
                if resolution.records.is_empty() {
                    println!("{}", ui::dim("No tasks found."));
                } else {
                    println!("{}", ui::records_table(&resolution.records));
                }
            }
        }

        Commands::Inspect { database } => {
            if let Some(database) = database {
                settings.database = Some(database.to_string_lossy().to_string());
            }

            let store = SqliteStore::open_read_only(&settings.database_path())?;
            let resolver = settings.resolver();
            let facts = resolver.discover(&store)?;

            let none = || ui::dim("(none)");
            let tiebreak = if facts.tiebreak.is_empty() {
                "rowid".to_string()
            } else {
                facts.tiebreak.join(", ")
            };

            ui::header(Icons::DATABASE, &format!("Schema facts ({})", settings.database_path().display()));
            println!(
                "{}",
                ui::facts_table(&[
                    ("Table", facts.table.clone()),
                    ("Owner column", facts.owner_column.clone().unwrap_or_else(none)),
                    ("Email column", facts.email_column.clone().unwrap_or_else(none)),
                    ("Order column", facts.order_column.clone().unwrap_or_else(none)),
                    ("Tiebreak", tiebreak),
                    ("Result limit", resolver.limit().to_string()),
                ])
            );
        }

        Commands::Token { id, email, name, role, ttl, no_expiry } => {
            let mut payload = serde_json::Map::new();
            if let Some(id) = id.as_deref() {
                payload.insert("id".to_string(), OwnerKey::from(id).to_json());
            }
            for (field, value) in [("email", email), ("name", name)] {
                if let Some(value) = value {
                    payload.insert(field.to_string(), json!(value));
                }
            }
            if payload.is_empty() {
                anyhow::bail!("pass at least one of --id, --email or --name");
            }
            if !role.is_empty() {
                payload.insert("role".to_string(), json!(role));
            }

            let ttl = if no_expiry { None } else { Some(ttl) };
            let token = verifier(&settings)?.issue(Value::Object(payload), ttl)?;
            println!("{} {}", Icons::KEY, token);
        }
    }

    Ok(())
}

fn verifier(settings: &FarmdeskConfig) -> anyhow::Result<CredentialVerifier> {
    let secret = settings
        .jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("JWT secret not configured (set JWT_SECRET or jwt_secret in the config file)"))?;
    Ok(CredentialVerifier::new(secret).with_required_role(settings.worker_role()))
}
