use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{config_dir, expand_tilde, SwitchboardConfig};
use switchboard_core::{
    available_responders, ApiClient, ConversationThread, DirectHandler, DomainExpert,
    EmailFormatter, ExecutorConfig, KnowledgeQa, LlmSynthesizer, Orchestrator, PlannerConfig,
    ResponderSet, RouterConfig, RoutingPolicy, TaskPlanner, WeatherLookup, WorkflowExecutor,
};
use switchboard_knowledge::{HttpEmbedder, SupportStore};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version)]
#[command(about = "Switchboard — routes requests to specialized responders")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a one-shot request
    Ask {
        /// The request to route
        message: String,
    },

    /// Interactive chat session with conversation history
    Chat,

    /// List available responder capabilities
    Agents,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Agents => cmd_agents(),
        Commands::Ask { message } => cmd_ask(&cli.config, &message).await,
        Commands::Chat => cmd_chat(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        println!("Created default config at {}", config_path.display());
    }

    println!("Edit {} to configure your API keys.", config_path.display());
    Ok(())
}

fn cmd_config(custom_path: &Option<PathBuf>) -> Result<()> {
    let config = SwitchboardConfig::load(custom_path)?;
    // Debug impls mask all secrets
    println!("{:#?}", config);
    Ok(())
}

fn cmd_agents() -> Result<()> {
    println!("Available responders:\n");
    for capability in available_responders() {
        println!("  {}", capability.name);
        println!("    {}", capability.description);
        println!("    keywords: {}\n", capability.keywords.join(", "));
    }
    Ok(())
}

async fn cmd_ask(custom_path: &Option<PathBuf>, message: &str) -> Result<()> {
    let config = SwitchboardConfig::load(custom_path)?;
    let orchestrator = build_orchestrator(&config).await?;

    let mut thread = ConversationThread::new();
    match orchestrator.handle_request(message, &mut thread).await {
        Ok(response) => {
            println!("{response}");
            Ok(())
        }
        Err(e) => {
            error!("Request failed on every path: {:#}", e);
            println!("{}", APOLOGY);
            Ok(())
        }
    }
}

async fn cmd_chat(custom_path: &Option<PathBuf>) -> Result<()> {
    let config = SwitchboardConfig::load(custom_path)?;
    let orchestrator = build_orchestrator(&config).await?;

    println!("Switchboard chat — type 'exit' to quit.\n");

    let stdin = std::io::stdin();
    let mut thread = ConversationThread::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        match orchestrator.handle_request(input, &mut thread).await {
            Ok(response) => println!("\n{response}\n"),
            Err(e) => {
                error!("Request failed on every path: {:#}", e);
                println!("\n{}\n", APOLOGY);
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

const APOLOGY: &str =
    "I'm sorry — I wasn't able to process that request right now. Please try again in a moment.";

/// Wire the full responder set from configuration
async fn build_orchestrator(config: &SwitchboardConfig) -> Result<Orchestrator> {
    let api = ApiClient::new(
        config.providers.anthropic.api_key.clone(),
        Some(config.agent.default_model.clone()),
    )
    .with_max_tokens(config.agent.max_tokens)
    .with_base_url(config.providers.anthropic.base_url.clone());

    let db_path = expand_tilde(&config.knowledge.db_path);
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    let mut store = SupportStore::new(&db_path)
        .with_context(|| format!("Failed to open support store at {}", db_path.display()))?;

    if let Some(embeddings) = &config.providers.embeddings {
        if !embeddings.api_key.trim().is_empty() {
            let embedder = HttpEmbedder::new(
                embeddings.api_key.clone(),
                Some(embeddings.model.clone()),
            )
            .with_base_url(embeddings.base_url.clone());
            store = store.with_embedder(Arc::new(embedder));
        }
    }

    let store = Arc::new(store);
    if store.document_count().await? == 0 {
        info!("Support store is empty, seeding sample documents");
        store.populate_sample_data().await?;
    }

    let responders = ResponderSet {
        knowledge_qa: Arc::new(
            KnowledgeQa::new(api.clone(), store.clone()).with_top_k(config.knowledge.top_k),
        ),
        domain_expert: Arc::new(DomainExpert::new(api.clone())),
        weather: Arc::new(WeatherLookup::new(config.weather.api_key.clone())),
        direct: Arc::new(DirectHandler::new(api.clone())),
        email: Arc::new(EmailFormatter::new(api.clone())),
        planner: Arc::new(TaskPlanner::new(
            api.clone(),
            PlannerConfig {
                max_subtasks: config.planner.max_subtasks,
                max_concurrent: config.planner.max_concurrent,
                subtask_timeout_secs: config.planner.subtask_timeout_secs,
            },
        )),
    };

    let executor = WorkflowExecutor::new(
        responders,
        Arc::new(LlmSynthesizer::new(api.clone())),
        ExecutorConfig {
            responder_timeout_secs: config.executor.responder_timeout_secs,
            planner_timeout_secs: config.executor.planner_timeout_secs,
        },
    );

    let policy = RoutingPolicy::new(
        api,
        RouterConfig {
            strategy: config.routing.strategy,
            complexity_word_threshold: config.routing.complexity_word_threshold,
        },
    );

    Ok(Orchestrator::new(policy, executor))
}
