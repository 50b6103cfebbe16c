mod config;
mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use hive_core::{ApiPool, Endpoint, Orchestrator, Provider, ProviderRegistry};
use hive_core::memory::NoopMemorySink;
use hive_core::worker::tool::ToolRegistry;

use config::{ConfigFile, EndpointEntry, HiveConfig, PolicySection};

#[derive(Parser)]
#[command(name = "hive", about = "Multi-provider LLM orchestrator")]
struct Cli {
    /// Path to the hive.toml config file (overrides HIVE_CONFIG and the
    /// default XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter hive.toml config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Decompose a goal and run it to completion
    Run {
        /// The goal text to decompose and execute
        goal: String,
        /// Optional JSON context object passed through to decomposition and
        /// execution prompts
        #[arg(long)]
        context: Option<String>,
    },
    /// Print the orchestrator's configured workers
    Workers,
}

/// Execute `hive init`: write a starter config file with one example
/// endpoint and the spec-default policy section.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = ConfigFile {
        endpoints: vec![EndpointEntry {
            provider: "openai".to_string(),
            credential: "replace-me".to_string(),
            model_name: "gpt-4".to_string(),
            base_url: None,
            priority: 10,
            capabilities: Vec::new(),
        }],
        policy: PolicySection::default(),
    };

    config::save_config(&cfg, &path)?;

    println!("Config written to {}", path.display());
    println!("Edit the `credential` field before running `hive run`.");
    Ok(())
}

/// Build an `ApiPool` (with a `DemoProvider` registered for each distinct
/// configured provider) from a resolved [`HiveConfig`].
async fn build_pool(resolved: &HiveConfig) -> anyhow::Result<Arc<ApiPool>> {
    let mut registry = ProviderRegistry::new();
    let mut seen = std::collections::HashSet::new();

    for entry in &resolved.endpoints {
        let provider: Provider = entry
            .provider
            .parse()
            .with_context(|| format!("unrecognized provider {:?}", entry.provider))?;
        if seen.insert(provider) {
            registry.register(Arc::new(demo::DemoProvider::new(provider)));
        }
    }

    let pool = Arc::new(ApiPool::new(resolved.pool.clone(), Arc::new(registry)));
    for entry in &resolved.endpoints {
        let provider: Provider = entry.provider.parse().expect("validated above");
        let endpoint = Endpoint::new(provider, entry.model_name.clone(), entry.priority)
            .with_capabilities(entry.capabilities.clone());
        pool.add_endpoint(endpoint).await;
    }

    Ok(pool)
}

async fn build_orchestrator(resolved: &HiveConfig) -> anyhow::Result<Orchestrator> {
    let pool = build_pool(resolved).await?;
    let orchestrator = Orchestrator::new(
        resolved.orchestrator.clone(),
        pool,
        Arc::new(NoopMemorySink),
        Arc::new(ToolRegistry::new()),
    )
    .await;
    Ok(orchestrator)
}

async fn cmd_run(resolved: &HiveConfig, goal: &str, context: Option<String>) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(resolved).await?;
    orchestrator.start();

    let context_value = context
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("--context is not valid JSON")?;

    let task = orchestrator.execute_goal(goal, context_value.as_ref()).await;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}

async fn cmd_workers(resolved: &HiveConfig) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(resolved).await?;
    for worker in orchestrator.workers() {
        println!(
            "{}  role={:<10} mode={:<12} load={} status={:?}",
            worker.id, worker.role, format!("{:?}", worker.mode), worker.current_load, worker.status
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => cmd_init(force)?,
        Commands::Run { goal, context } => {
            let resolved = HiveConfig::resolve(cli.config.as_deref())?;
            cmd_run(&resolved, &goal, context).await?;
        }
        Commands::Workers => {
            let resolved = HiveConfig::resolve(cli.config.as_deref())?;
            cmd_workers(&resolved).await?;
        }
    }

    Ok(())
}
