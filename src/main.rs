use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use coachd::config::AppConfig;
use coachd::pipeline::Pipeline;
use coachd::providers::GroqClient;
use coachd::state::SqliteStore;
use coachd::traits::{GoalStore, PreferenceStore, SemanticClient};
use coachd::types::ChannelKind;

/// Rolling conversation context kept for the local chat loop, in characters.
const CONTEXT_CAP_CHARS: usize = 2_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = AppConfig::load(&config_path)?;

    if config.semantic.api_key.is_empty() {
        anyhow::bail!(
            "No semantic API key configured. Set [semantic] api_key in {} or COACHD_API_KEY.",
            config_path.display()
        );
    }

    let store = Arc::new(SqliteStore::connect(&config.state.db_path).await?);
    let semantic = Arc::new(
        GroqClient::new(
            &config.semantic.base_url,
            &config.semantic.api_key,
            &config.semantic.model,
            config.semantic.timeout_secs,
        )
        .map_err(|e| anyhow::anyhow!(e))?,
    );

    let pipeline = Pipeline::new(
        semantic as Arc<dyn SemanticClient>,
        store.clone() as Arc<dyn GoalStore>,
        store as Arc<dyn PreferenceStore>,
    );

    let channel = ChannelKind::parse(&config.coach.default_channel).unwrap_or(ChannelKind::Api);
    info!(
        channel = channel.as_str(),
        model = %config.semantic.model,
        "coachd ready — type a message, ctrl-d to quit"
    );

    chat_loop(&pipeline, channel).await
}

/// Line-oriented local chat loop: one pipeline turn per stdin line, with a
/// rolling context window of recent exchanges.
async fn chat_loop(pipeline: &Pipeline, channel: ChannelKind) -> anyhow::Result<()> {
    let user_id = whoami();
    let mut context = String::new();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        let context_arg = if context.is_empty() {
            None
        } else {
            Some(context.as_str())
        };
        let reply = pipeline
            .handle_message(message, &user_id, channel, context_arg)
            .await;

        stdout
            .write_all(format!("{}\n", reply.text).as_bytes())
            .await?;
        if reply.metadata.tools_used > 0 {
            info!(
                tools = ?reply.metadata.tool_names,
                success_rate = reply.metadata.success_rate,
                "Turn used tools"
            );
        }

        context.push_str(&format!("user: {}\ncoach: {}\n", message, reply.text));
        if context.len() > CONTEXT_CAP_CHARS {
            let cut = context.len() - CONTEXT_CAP_CHARS;
            let boundary = (cut..context.len())
                .find(|i| context.is_char_boundary(*i))
                .unwrap_or(0);
            context = context.split_off(boundary);
        }

        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "local".to_string())
}
