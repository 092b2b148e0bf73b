//! Content-state bridge API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app::config::{ArgsError, DeploymentConfig, ServerArgs, print_usage};
use app::error::AppError;
use app::state::AppState;
use services::{
    BridgeServices, Clock, GradeSink, HttpGradeSink, HttpGradeSinkConfig, TracingGradeSink,
};

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file exists; sqlx does not create it by default.
fn prepare_sqlite_file(db_url: &str) -> Result<(), AppError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn grade_sink() -> Arc<dyn GradeSink> {
    match HttpGradeSinkConfig::from_env() {
        Some(config) => {
            let sink = HttpGradeSink::new(config);
            tracing::info!(endpoint = sink.endpoint(), "publishing grades over HTTP");
            Arc::new(sink)
        }
        None => Arc::new(TracingGradeSink),
    }
}

async fn run(args: ServerArgs) -> Result<(), AppError> {
    let deployment = match &args.config_path {
        Some(path) => DeploymentConfig::load(path)?,
        None => {
            tracing::warn!("no deployment config given, every origin will be rejected");
            DeploymentConfig::default()
        }
    };
    let policy = deployment.origin_policy()?;
    let outlines = deployment.course_outlines()?;

    let db_url = normalize_sqlite_url(args.db_url);
    prepare_sqlite_file(&db_url)?;
    let services =
        BridgeServices::new_sqlite(&db_url, Clock::default_clock(), policy, grade_sink()).await?;
    services.install_courses(&outlines).await?;
    tracing::info!(courses = outlines.len(), db = %db_url, "catalog installed");

    let app = app::build_router(AppState::new(services)).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = match ServerArgs::from_process() {
        Ok(args) => args,
        Err(ArgsError::HelpRequested) => {
            print_usage();
            return;
        }
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "server stopped");
        std::process::exit(2);
    }
}
