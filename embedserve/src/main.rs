//! Embedserve - static file serving on Pingora
//!
//! This is the main entry point for the Embedserve CLI.

mod service;

use clap::{Parser, Subcommand};
use embedserve_core::config::{
    ConfigLoader, EmbedserveConfig, HandlerConfig, NotFoundMode, RouteConfig, ServerConfig,
};
use service::EmbedService;
use std::collections::HashMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Embedserve - serve files from a directory or an embedded tree
#[derive(Parser)]
#[command(name = "embedserve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server with a configuration file
    Run {
        /// Path to the configuration file (JSON or TOML)
        #[arg(default_value = "embedserve.toml")]
        config: String,
    },

    /// Start a quick file server
    #[command(name = "file-server")]
    FileServer {
        /// Address to listen on
        #[arg(long, default_value = ":8080")]
        listen: String,

        /// Root directory to serve
        #[arg(long, default_value = ".")]
        root: String,

        /// Mount prefix
        #[arg(long, default_value = "/")]
        prefix: String,

        /// Index file served for directories
        #[arg(long, default_value = "index.html")]
        index: String,

        /// Render listings for directories without an index
        #[arg(long)]
        browse: bool,

        /// Answer 404 for missing files instead of passing them on
        #[arg(long)]
        not_found: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "embedserve.toml")]
        config: String,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config: config_path } => {
            let config = match ConfigLoader::load(&config_path) {
                Ok(c) => c,
                Err(e) => {
                    init_tracing(cli.verbose, "info");
                    tracing::error!("❌ Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };
            init_tracing(cli.verbose, &config.logging.level);
            tracing::info!("📄 Loaded configuration from: {}", config_path);
            run_server(config)?;
        }

        Commands::FileServer {
            listen,
            root,
            prefix,
            index,
            browse,
            not_found,
        } => {
            init_tracing(cli.verbose, "info");
            tracing::info!("Starting file server on {} serving {}", listen, root);

            let root_path = std::fs::canonicalize(&root)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or(root);

            let config = EmbedserveConfig {
                servers: vec![ServerConfig {
                    name: Some("_".to_string()),
                    listen: vec![listen_addr(&listen)],
                    routes: vec![RouteConfig {
                        path: prefix,
                        handler: HandlerConfig::FileServer {
                            root: root_path,
                            index,
                            browse,
                            not_found: if not_found {
                                NotFoundMode::Status
                            } else {
                                NotFoundMode::Next
                            },
                        },
                    }],
                }],
                ..Default::default()
            };
            config.validate()?;
            run_server(config)?;
        }

        Commands::Validate { config } => {
            init_tracing(cli.verbose, "info");
            tracing::info!("Validating config: {}", config);

            match ConfigLoader::load(&config) {
                Ok(_) => println!("✅ Configuration '{}' is valid!", config),
                Err(e) => {
                    eprintln!("❌ Configuration Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Embedserve v{}", embedserve_core::VERSION);
        }
    }

    Ok(())
}

/// Install the subscriber; `RUST_LOG` overrides `level`, `--verbose` forces debug
fn init_tracing(verbose: bool, level: &str) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    if verbose {
        tracing::info!("Verbose mode enabled");
    }
}

/// `:8080` binds every interface
fn listen_addr(listen: &str) -> String {
    if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    }
}

fn run_server(config: EmbedserveConfig) -> anyhow::Result<()> {
    tracing::info!("🚀 Starting Embedserve v{}", embedserve_core::VERSION);
    tracing::info!("🔧 Configured {} server(s)", config.servers.len());

    if config.servers.is_empty() {
        tracing::warn!("⚠️ No servers configured!");
        return Ok(());
    }

    let mut server = pingora::server::Server::new(Some(pingora::server::configuration::Opt {
        upgrade: false,
        daemon: false,
        nocapture: false,
        test: false,
        conf: None,
    }))?;
    server.bootstrap();

    // Group servers by listen address
    let mut services: HashMap<String, EmbedService> = HashMap::new();
    let mut binding_info: HashMap<String, Vec<String>> = HashMap::new();

    for server_config in &config.servers {
        tracing::debug!(
            "🚀 Processing ServerConfig: name={:?}, listens={:?}",
            server_config.name,
            server_config.listen
        );

        let listen_addrs = if server_config.listen.is_empty() {
            vec!["0.0.0.0:80".to_string()]
        } else {
            server_config.listen.iter().map(|l| listen_addr(l)).collect()
        };

        for addr in listen_addrs {
            services
                .entry(addr.clone())
                .or_default()
                .add_server(server_config)?;

            let site_name = server_config.name.clone().unwrap_or_else(|| "default".to_string());
            binding_info.entry(addr).or_default().push(site_name);
        }
    }

    tracing::info!("🌐 Server binding information:");
    for (addr, sites) in &binding_info {
        tracing::info!("   📍 {} -> [{}]", addr, sites.join(", "));
    }

    for (addr, logic) in services {
        let mut service = pingora::proxy::http_proxy_service(&server.configuration, logic);
        service.add_tcp(&addr);
        tracing::info!("👂 Listening on http://{}", addr);
        server.add_service(service);
    }

    server.run_forever();
}
