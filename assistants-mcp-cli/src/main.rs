//! assistants-mcp - MCP server for assistants-style APIs

use anyhow::{Context, Result, bail};
use assistants_mcp_core::config::AssistantsMcpConfig;
use assistants_mcp_core::mcp::{LineSink, LineSource, McpServerBuilder};
use assistants_mcp_core::provider::{ProviderHealth, ProviderRegistry};
use assistants_mcp_core::resources::ResourceCatalog;
use assistants_mcp_core::tools::{HANDLER_TABLE, ToolHandlerRegistry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "assistants-mcp")]
#[command(about = "MCP server for the assistants API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout
    Serve {
        /// Configuration file; defaults to assistants-mcp.toml and the environment
        #[arg(short, long, env = "ASSISTANTS_MCP_CONFIG_PATH")]
        config: Option<PathBuf>,
        /// Accept requests before `initialize`; `server.lazy_initialize` also enables it
        #[arg(long)]
        lazy: bool,
    },
    /// List registered tools
    Tools {
        /// Print handler statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// List bundled resources
    Resources,
    /// Initialize providers and verify the tool and resource tables
    Check {
        #[arg(short, long, env = "ASSISTANTS_MCP_CONFIG_PATH")]
        config: Option<PathBuf>,
    },
    /// Version information
    Version,
}

fn load_config(path: Option<&PathBuf>) -> Result<AssistantsMcpConfig> {
    let config = match path {
        Some(path) => AssistantsMcpConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_env_defaults(),
        None => AssistantsMcpConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

/// `--lazy` can only turn lazy initialization on; it never overrides config
fn server_builder(config: AssistantsMcpConfig, lazy: bool) -> McpServerBuilder {
    let builder = McpServerBuilder::from_config(config);
    if lazy {
        builder.lazy_initialize(true)
    } else {
        builder
    }
}

fn init_tracing(default_level: &str) {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, lazy } => {
            let config = load_config(config.as_ref())?;
            init_tracing(&config.logging.level);

            let server = server_builder(config, lazy)
                .build_initialized()
                .await
                .context("starting server")?;

            Arc::new(server)
                .run(LineSource::stdin(), LineSink::stdout())
                .await?;
        }
        Commands::Tools { json } => {
            let registry = ToolHandlerRegistry::standard()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&registry.stats())?);
            } else {
                for definition in registry.definitions() {
                    println!("{:<26} {:<10} {}", definition.name, definition.category, definition.description);
                }
            }
        }
        Commands::Resources => {
            for descriptor in ResourceCatalog::standard()?.list() {
                println!("{:<44} {}", descriptor.uri, descriptor.name);
            }
        }
        Commands::Check { config } => {
            let config = load_config(config.as_ref())?;
            init_tracing(&config.logging.level);

            let tools = ToolHandlerRegistry::standard()?;
            tools.verify_against(HANDLER_TABLE)?;
            println!("tools: {} registered", tools.len());

            let resources = ResourceCatalog::standard()?;
            resources.verify()?;
            println!("resources: {} readable", resources.len());

            let providers = ProviderRegistry::standard(&config);
            providers.initialize().await.context("initializing providers")?;

            let mut unhealthy = 0;
            for (name, health) in providers.check_health().await {
                println!("provider {}: {:?}", name, health);
                if health == ProviderHealth::Unhealthy {
                    unhealthy += 1;
                }
            }
            if providers.is_empty().await {
                println!("no providers configured");
            }
            if unhealthy > 0 {
                bail!("{} provider(s) unhealthy", unhealthy);
            }
        }
        Commands::Version => {
            println!("assistants-mcp {}", env!("CARGO_PKG_VERSION"));
            println!("assistants-mcp-core {}", assistants_mcp_core::VERSION);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_after(configured: bool, flag: bool) -> bool {
        let mut config = AssistantsMcpConfig::default();
        config.server.lazy_initialize = configured;
        let server = server_builder(config, flag).build().unwrap();
        server.config().lazy_initialize
    }

    #[test]
    fn test_lazy_flag_does_not_override_config() {
        assert!(lazy_after(true, false));
        assert!(lazy_after(false, true));
        assert!(lazy_after(true, true));
        assert!(!lazy_after(false, false));
    }
}
