use std::sync::Arc;

use clap::Parser;

use trivia_helper_lib::{config::AppConfig, http};

/// Serves the trivia page and the `/ask` endpoint.
#[derive(Debug, Parser)]
#[command(name = "trivia-helper", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "TRIVIA_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    if config.openai_api_key.is_empty() {
        log::warn!("OPENAI_API_KEY is not set; the openai backend will answer with an error");
    }
    if config.anthropic_api_key.is_empty() {
        log::warn!("ANTHROPIC_API_KEY is not set; the anthropic backend will answer with an error");
    }

    http::serve(Arc::new(config)).await
}
