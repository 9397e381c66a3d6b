use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use stockscope_backend::app;
use stockscope_backend::logging::{init_logging, LoggingConfig};
use stockscope_backend::pipeline::{PipelineConfig, PipelineController};
use stockscope_backend::providers::{
    NewsIntelligenceProvider, OpenAiClient, OpenAiConfig, ProviderSet, StatForecastProvider,
    YahooDataProvider, YahooHistoryClient,
};
use stockscope_backend::providers::news::NewsConfig;
use stockscope_backend::services::LexiconClassifier;
use stockscope_backend::state::AppState;
use stockscope_backend::store::{InMemoryJobStore, JobStore, PgJobStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    // Job store: postgres by default, in-memory for local experiments.
    let store_kind = std::env::var("JOB_STORE").unwrap_or_else(|_| "postgres".to_string());
    let store: Arc<dyn JobStore> = match store_kind.to_lowercase().as_str() {
        "memory" => {
            tracing::info!("Using job store: in-memory");
            Arc::new(InMemoryJobStore::new())
        }
        "postgres" => {
            let database_url =
                std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&database_url)
                .await
                .context("failed to connect to Postgres")?;
            let pg = PgJobStore::new(pool);
            pg.migrate()
                .await
                .map_err(|e| anyhow::anyhow!("migration failed: {}", e))?;
            tracing::info!("Using job store: Postgres");
            Arc::new(pg)
        }
        other => anyhow::bail!("invalid JOB_STORE: {}. Must be 'postgres' or 'memory'", other),
    };

    // Provider adapters. The sentiment classifier is built once here and
    // injected; the LLM client serves both narrative stages.
    let classifier = Arc::new(LexiconClassifier::new());
    let llm = Arc::new(OpenAiClient::new(OpenAiConfig::from_env()));
    let providers = ProviderSet {
        data: Arc::new(YahooDataProvider::new()),
        intelligence: Arc::new(NewsIntelligenceProvider::new(
            NewsConfig::from_env(),
            classifier,
        )),
        forecast: Arc::new(StatForecastProvider::new(Arc::new(
            YahooHistoryClient::new(),
        ))),
        analyst: llm.clone(),
        advisor: llm,
    };

    let pipeline = PipelineController::spawn(store, providers, PipelineConfig::from_env());
    let app = app::create_app(AppState { pipeline });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr)
        .await
        .context("failed to bind listener")?;
    tracing::info!("🚀 Stockscope backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
