//! Multi-blog kernel server.
//!
//! Usage:
//!   multiblog serve
//!   multiblog migrate
//!   multiblog create-user --name alice [--superuser]
//!   multiblog create-token --user alice --name cli [--expires-in-days 30]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use multiblog_kernel::config::Config;
use multiblog_kernel::db;
use multiblog_kernel::models::{ApiToken, Principal, generate_token, hash_token};
use multiblog_kernel::routes;
use multiblog_kernel::state::AppState;
use multiblog_kernel::store::{BlogStore, PgBlogStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Apply database migrations and exit.
    Migrate,

    /// Create a user who can be assigned to blogs.
    CreateUser {
        #[arg(long)]
        name: String,

        /// Grant access to every blog.
        #[arg(long)]
        superuser: bool,
    },

    /// Issue an API token for an existing user and print it once.
    CreateToken {
        /// User name.
        #[arg(long)]
        user: String,

        /// Label for the token.
        #[arg(long, default_value = "cli")]
        name: String,

        /// Days until the token expires. Never expires if omitted.
        #[arg(long)]
        expires_in_days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = db::create_pool(&config).await?;
            db::run_migrations(&pool).await?;
            info!("migrations applied");
            Ok(())
        }
        Command::CreateUser { name, superuser } => {
            let store = connect(&config).await?;
            let principal = Principal {
                user_id: Uuid::now_v7(),
                name,
                is_superuser: superuser,
            };
            store.insert_principal(&principal).await?;
            info!(user = %principal.name, superuser, "user created");
            println!("{}", principal.user_id);
            Ok(())
        }
        Command::CreateToken {
            user,
            name,
            expires_in_days,
        } => {
            let store = connect(&config).await?;
            let principal = store
                .find_principal_by_name(&user)
                .await?
                .with_context(|| format!("no user named '{user}'"))?;

            let raw = generate_token();
            let now = Utc::now();
            let token = ApiToken {
                id: Uuid::now_v7(),
                user_id: principal.user_id,
                name,
                token_hash: hash_token(&raw),
                created: now,
                expires_at: expires_in_days.map(|days| now + Duration::days(i64::from(days))),
            };
            store.insert_api_token(&token).await?;
            info!(user = %principal.name, token = %token.name, "API token created");
            println!("{raw}");
            Ok(())
        }
    }
}

async fn connect(config: &Config) -> Result<PgBlogStore> {
    let pool = db::create_pool(config).await?;
    db::run_migrations(&pool).await?;
    Ok(PgBlogStore::new(pool))
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting multi-blog kernel");
    info!(port = config.port, channel = %config.channel, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let cors = build_cors_layer(&config);

    // TraceLayer → CORS → api_token → routes
    let app = routes::app(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
