//! Command-line interface for nodeflow.
//!
//! Provides commands for running the HTTP service and for exercising the
//! extraction pipeline directly from a shell.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::adapters::{
    IdentityProvider, InMemoryIdentity, InMemoryProjectStore, OpenAiClient, ProjectStore,
    SupabaseClient,
};
use crate::config::Config;
use crate::domain::{ExtractionResult, SourceReference};
use crate::extract::{platform, Pipeline};
use crate::server::{run_server, AppState};

/// nodeflow - backend for the node-based workflow app
#[derive(Parser, Debug)]
#[command(name = "nodeflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep users and projects in memory instead of Supabase
        #[arg(long)]
        in_memory: bool,
    },

    /// Scrape a web page and print its text
    Scrape {
        /// Page URL
        url: String,

        /// Render the page in a headless browser first
        #[arg(long)]
        scripted: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transcribe a YouTube/Instagram URL or a local audio file
    Transcribe {
        /// URL or file path
        target: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolved configuration (secrets masked)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve { port, in_memory } => serve(port, in_memory).await,
            Commands::Scrape {
                url,
                scripted,
                json,
            } => scrape(&url, scripted, json).await,
            Commands::Transcribe { target, json } => transcribe(&target, json).await,
            Commands::Config => show_config(),
        }
    }
}

/// Start the HTTP service with production adapters
async fn serve(port: Option<u16>, in_memory: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let openai = Arc::new(OpenAiClient::new(
        &config.openai,
        config.require_openai_key()?.to_string(),
    )?);

    let (identity, projects): (Arc<dyn IdentityProvider>, Arc<dyn ProjectStore>) = if in_memory {
        warn!("Using in-memory users and projects; nothing survives a restart");
        (
            Arc::new(InMemoryIdentity::new()),
            Arc::new(InMemoryProjectStore::new()),
        )
    } else {
        let (_, anon_key, service_key) = config.require_supabase()?;
        let supabase = Arc::new(SupabaseClient::new(
            &config.supabase,
            anon_key.to_string(),
            service_key.to_string(),
            &config.server.frontend_url,
        )?);
        (supabase.clone(), supabase)
    };

    tokio::fs::create_dir_all(&config.extraction.uploads_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create uploads directory: {}",
                config.extraction.uploads_dir.display()
            )
        })?;

    for script in [
        config.extraction.video_downloader_script(),
        config.extraction.post_downloader_script(),
    ] {
        if !script.exists() {
            warn!(
                script = %script.display(),
                "Downloader script not found; its endpoints will fail"
            );
        }
    }

    let pipeline = Arc::new(Pipeline::from_config(&config.extraction, openai.clone())?);

    let state = AppState {
        identity,
        projects,
        chat: openai,
        pipeline,
    };

    run_server(state, &config.server).await
}

/// Build a pipeline for one-shot CLI use
fn cli_pipeline(config: &Config, require_speech: bool) -> Result<Pipeline> {
    let api_key = if require_speech {
        config.require_openai_key()?.to_string()
    } else {
        // Scraping never reaches the speech engine
        config.openai.api_key.clone().unwrap_or_default()
    };

    let speech = Arc::new(OpenAiClient::new(&config.openai, api_key)?);
    Pipeline::from_config(&config.extraction, speech)
}

async fn scrape(url: &str, scripted: bool, json: bool) -> Result<()> {
    let config = Config::load()?;
    let pipeline = cli_pipeline(&config, false)?;

    let result = pipeline
        .extract(&SourceReference::web_page(url, scripted))
        .await?;
    print_result(&result, json)
}

async fn transcribe(target: &str, json: bool) -> Result<()> {
    let config = Config::load()?;

    let path = Path::new(target);
    let source = if path.is_file() {
        SourceReference::uploaded_audio(path)
    } else if platform::is_youtube(target) {
        SourceReference::video(target)
    } else if platform::is_instagram(target) {
        SourceReference::short_form_post(target)
    } else {
        anyhow::bail!(
            "'{}' is neither a local file nor a YouTube or Instagram URL",
            target
        );
    };

    let pipeline = cli_pipeline(&config, true)?;
    let result = pipeline.extract(&source).await?;
    print_result(&result, json)
}

fn print_result(result: &ExtractionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("# {}", result.title);
        println!("{}", result.url);
        println!();
        println!("{}", result.text);
    }
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("nodeflow configuration");
    println!();
    let width = config
        .describe()
        .iter()
        .map(|(k, _)| k.len())
        .max()
        .unwrap_or(0);
    for (key, value) in config.describe() {
        println!("  {:width$}  {}", key, value, width = width);
    }

    Ok(())
}
