use anyhow::Context;
use tokio::io::BufReader;

use inbox_assist::{AppConfig, Assistant, repl};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so replies on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env().context("Invalid INBOX_ASSIST_* configuration")?;
    let assistant = Assistant::open(&config)
        .await
        .with_context(|| format!("Failed to open data in {}", config.data_dir.display()))?;

    eprintln!("📬 Inbox Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Inbox: {} ({} emails)", config.inbox_path.display(), assistant.inbox().len());
    eprintln!("   Data: {}", config.data_dir.display());
    eprintln!("   Type `help` for commands, `quit` to exit.\n");

    let stdin = BufReader::new(tokio::io::stdin());
    repl::run(&assistant, stdin, tokio::io::stdout())
        .await
        .context("Error reading stdin")?;

    Ok(())
}
