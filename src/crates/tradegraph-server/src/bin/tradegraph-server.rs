//! tradegraph analysis server binary
//!
//! Serves the analysis API. The deep/quick models come from an
//! OpenAI-compatible endpoint when `LLM_API_KEY` is set; `--offline` runs
//! with the scripted model for demos and smoke tests.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tradegraph_agents::config::AnalysisConfig;
use tradegraph_core::cache::TtlCache;
use tradegraph_llm::openai::{OpenAiCompatibleClient, RemoteModelConfig};
use tradegraph_llm::scripted::ScriptedModel;
use tradegraph_llm::traits::ChatModel;
use tradegraph_server::session::SessionServices;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tradegraph-server", about = "Multi-agent equity analysis server")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "TRADEGRAPH_HOST")]
    host: String,

    /// Bind port
    #[arg(long, default_value_t = 8000, env = "TRADEGRAPH_PORT")]
    port: u16,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = "https://api.openai.com/v1", env = "LLM_API_BASE")]
    api_base: String,

    /// Deep-thinking model name
    #[arg(long, default_value = "gpt-4o", env = "TRADEGRAPH_DEEP_MODEL")]
    deep_model: String,

    /// Quick model name (signal extraction)
    #[arg(long, default_value = "gpt-4o-mini", env = "TRADEGRAPH_QUICK_MODEL")]
    quick_model: String,

    /// Run with the scripted model instead of a remote provider
    #[arg(long)]
    offline: bool,

    /// Persist results under this directory
    #[arg(long, env = "TRADEGRAPH_RESULTS_DIR")]
    results_dir: Option<PathBuf>,

    /// Investment debate round cap (1-5)
    #[arg(long, default_value_t = 3, env = "TRADEGRAPH_MAX_DEBATE_ROUNDS")]
    max_debate_rounds: usize,

    /// Session deadline in seconds
    #[arg(long, default_value_t = 120, env = "TRADEGRAPH_EXECUTION_TIMEOUT")]
    execution_timeout_seconds: u64,
}

fn build_models(args: &Args) -> anyhow::Result<(Arc<dyn ChatModel>, Arc<dyn ChatModel>)> {
    if args.offline {
        tracing::warn!("running offline with the scripted model");
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(
            "Offline mode: no provider configured. HOLD.",
        ));
        return Ok((model.clone(), model));
    }

    let deep = OpenAiCompatibleClient::new(
        RemoteModelConfig::from_env("LLM_API_KEY", &args.api_base, &args.deep_model)
            .context("configuring deep model")?,
    )
    .context("building deep model client")?;
    let quick = OpenAiCompatibleClient::new(
        RemoteModelConfig::from_env("LLM_API_KEY", &args.api_base, &args.quick_model)
            .context("configuring quick model")?,
    )
    .context("building quick model client")?;

    Ok((Arc::new(deep), Arc::new(quick)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let (model, quick_model) = build_models(&args)?;

    let config = AnalysisConfig::builder()
        .max_debate_rounds(args.max_debate_rounds)
        .execution_timeout(std::time::Duration::from_secs(args.execution_timeout_seconds))
        .results_dir(args.results_dir.clone())
        .build();

    let registry = Arc::new(tradegraph_dataflows::standard_feed_registry(
        config.news_max_articles,
    ));
    let tool_cache = Arc::new(TtlCache::new(1_000, config.tool_cache_ttl));

    let services = Arc::new(SessionServices {
        model,
        quick_model,
        registry,
        tool_cache,
        base_config: config,
    });

    let router = tradegraph_server::create_router(services);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "tradegraph server listening");
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
