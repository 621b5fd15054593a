use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shasha_tutor::config::Config;
use shasha_tutor::conversation::ConversationStore;
use shasha_tutor::genai::GeminiClientBuilder;
use shasha_tutor::handler::{router, AppState};
use shasha_tutor::tutor::Tutor;

const CONFIG_ENV: &str = "SHASHA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_thread_ids(true).with_line_number(false);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::from_file_with_env(&config_path).with_context(|| format!("Failed to load configuration from {config_path}"))?;

    init_tracing(&config);

    let client = reqwest::Client::builder().timeout(Duration::from_secs(config.genai.timeout_secs)).build()?;
    let model = GeminiClientBuilder::new().client(client).config(config.gemini()).build()?;
    info!("Using {} for text and {} for speech", config.genai.text_model, config.genai.tts_model);

    let state = AppState::new(
        Tutor::new(model, config.speech_settings()),
        ConversationStore::new(config.sessions.max_sessions),
        config.streaming.chunk_size,
    );
    let app = router(state, &config.server);

    let listener = TcpListener::bind(&config.server.bind_addr).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    tokio::select! {
        res = axum::serve(listener, app) => res,
        res = tokio::signal::ctrl_c() => res,
    }?;

    Ok(())
}
