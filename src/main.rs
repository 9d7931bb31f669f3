mod cli;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use nb_convert::{CapabilityRegistry, ToolRegistry, SUPPORT_MATRIX};
use nb_core::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "nodeblack=trace,nb_server=trace,nb_convert=debug,nb_db=debug,nb_core=debug,tower_http=debug"
                .to_string()
        } else {
            "nodeblack=info,nb_server=info,nb_convert=info,nb_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Formats { json } => formats(cli.config.as_deref(), json),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("nodeblack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::GenerateApiKey { prefix } => {
            println!("{}", generate_api_key(&prefix));
            Ok(())
        }
    }
}

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if config.auth.enabled && config.auth.keys().next().is_none() {
        tracing::warn!("Auth is enabled but no API keys are configured; every upload will be rejected");
    }

    tracing::info!(
        "NodeBlack will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    nb_server::start(config).await?;
    Ok(())
}

fn formats(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let registry = CapabilityRegistry::build(&tools, &config.tools);

    if json {
        let rows: Vec<_> = SUPPORT_MATRIX
            .iter()
            .map(|route| {
                serde_json::json!({
                    "capability": route.capability,
                    "input_formats": route.sources,
                    "output_formats": route.targets,
                    "available": registry.is_available(route.capability),
                })
            })
            .collect();
        let body = serde_json::json!({
            "conversions": rows,
            "capabilities": registry.report(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    for route in SUPPORT_MATRIX {
        let mark = if registry.is_available(route.capability) {
            "✓"
        } else {
            "✗"
        };
        println!(
            "{mark} {:<13} {} -> {}",
            route.capability.as_str(),
            route.sources.join(","),
            route.targets.join(",")
        );
    }
    for info in registry.report() {
        if let Some(reason) = info.reason {
            println!("\n{} disabled: {reason}", info.capability);
        }
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All conversion tools are available!");
    } else {
        println!("Some tools are missing. Conversions that need them will fail with a capability error.");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Max upload: {} bytes", config.server.max_upload_bytes);
            println!("  Artifact TTL: {}s", config.artifacts.ttl_secs);
            println!(
                "  Workers: {} (queue {})",
                config.jobs.workers, config.jobs.queue_capacity
            );
            println!("  Auth enabled: {}", config.auth.enabled);
            println!("  API keys: {}", config.auth.keys().count());
            for warning in config.validate() {
                println!("  ⚠ {warning}");
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }
    Ok(())
}

/// `{prefix}_` followed by 32 random bytes, URL-safe base64.
fn generate_api_key(prefix: &str) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rand::Rng;

    let bytes: [u8; 32] = rand::thread_rng().gen();
    let key = URL_SAFE_NO_PAD.encode(bytes);
    if prefix.is_empty() {
        key
    } else {
        format!("{prefix}_{key}")
    }
}
