use axum::{Router, middleware, routing::get};
use clap::Parser;
use omniauth::AuthenticatedUser;
use omniauth::auth::omniauth_middleware;
use omniauth::config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Demo server protected by the omniauth middleware")]
struct Args {
    /// TOML or YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

async fn hello(AuthenticatedUser(user): AuthenticatedUser) -> String {
    match user.email() {
        Some(email) => format!("Hello {} <{}>", user.name(), email.as_str()),
        None => format!("Hello {}", user.name()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::load(args.config.as_deref())?;
    let auth = Arc::new(config.auth.build()?);

    let app = Router::new()
        .route("/", get(hello))
        .fallback(get(hello))
        .layer(middleware::from_fn_with_state(auth, omniauth_middleware))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested, stopping server...");
        })
        .await?;

    info!("server stopped");
    Ok(())
}
