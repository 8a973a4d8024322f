use anyhow::{Context, Result};
use clap::Parser;
use gmail_filter::{
    config, logging, pipeline, results, EmailClassifier, FilterConfig, GmailClient, OllamaClient,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gmail-filter")]
#[command(about = "Move unnecessary Gmail messages under a review label using a local LLM")]
#[command(
    long_about = "Reads recent messages from the Gmail inbox, asks a local Ollama model whether\n\
    each one is worth keeping, and moves the unnecessary ones to a review label.\n\n\
    Nothing is deleted. Settings come from environment variables or a .env file."
)]
struct Cli {
    /// Classify messages but never create labels or move anything
    #[arg(long)]
    dry_run: bool,

    /// Override MAX_EMAILS for this run
    #[arg(long, value_name = "N")]
    max_emails: Option<u32>,

    /// Load settings from this dotenv file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    config::load_env_file(cli.env_file.as_deref())?;
    let mut config = FilterConfig::from_env()?;
    if let Some(max_emails) = cli.max_emails {
        config.max_emails = max_emails;
    }
    let config = config;

    logging::init(config.log_level, config.log_file.as_deref())?;

    tracing::info!("=== Gmail Unnecessary Email Filter ===");

    tracing::info!("Step 1: Checking configuration");
    if !config.credentials_file.exists() {
        tracing::error!(
            "Credentials file not found: {}",
            config.credentials_file.display()
        );
        tracing::error!("To create credentials.json, follow these steps:");
        tracing::error!("1. Create a Google Cloud Project at https://console.cloud.google.com/");
        tracing::error!("2. Enable Gmail API for your project");
        tracing::error!("3. Create OAuth 2.0 Desktop credentials");
        tracing::error!("4. Download the credentials file and point CREDENTIALS_FILE at it");
        anyhow::bail!(
            "Credentials file not found: {}",
            config.credentials_file.display()
        );
    }

    tracing::info!("Step 2: Initializing Ollama client");
    let ollama = OllamaClient::from_config(&config)?;
    if !ollama.check_availability().await {
        tracing::error!(
            "Cannot connect to Ollama API at {}.",
            config.ollama_api_url
        );
        tracing::error!("Please make sure Ollama is installed and running (https://ollama.ai/).");
        tracing::error!(
            "Make sure the model is pulled: ollama pull {}",
            ollama.model()
        );
        anyhow::bail!("Ollama API unavailable at {}", config.ollama_api_url);
    }
    let classifier = EmailClassifier::new(ollama, config.retry);

    tracing::info!("Step 3: Connecting to Gmail");
    let gmail = GmailClient::connect(&config)
        .await
        .context("Error connecting to Gmail")?;

    tracing::info!("Step 4: Processing emails");
    tracing::info!("This may take some time depending on the number of emails...");
    let summary = pipeline::run(&config, &gmail, &classifier, cli.dry_run).await?;

    tracing::info!("Step 5: Saving results");
    match results::save_results(&summary, &config.results_dir) {
        Ok(path) => tracing::info!("Results saved to {}", path.display()),
        Err(e) => tracing::error!("Could not save results: {:#}", e),
    }

    tracing::info!("Processing complete!");
    tracing::info!("Total emails processed: {}", summary.total_processed);
    tracing::info!(
        "Unnecessary emails moved to '{}': {}",
        config.label_name,
        summary.moved().count()
    );
    if summary.unavailable_count > 0 {
        tracing::warn!(
            "{} emails could not be classified and were left in the inbox",
            summary.unavailable_count
        );
    }
    if !cli.dry_run {
        tracing::info!(
            "Please review the emails under the label '{}' to confirm they are indeed unnecessary.",
            config.label_name
        );
    }

    Ok(())
}
