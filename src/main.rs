//! NetStream - Graph events over the network
//!
//! Relays graph mutation events from producers to live subscribers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use netstream::broker::{Broker, EventLog, ProcessRegistry};
use netstream::config::{self, Config};
use netstream::network::{
    resolve_host, subscribe, subscribe_websocket, IngestServer, Publisher, Server, TransportKind,
};
use netstream::pipe::NetStreamPipe;
use netstream::protocol::{self, EventEncoder, GraphEvent, Sink, SinkFn, Value};

/// NetStream - Stream graph events to live subscribers
#[derive(Parser)]
#[command(name = "netstream")]
#[command(author = "NetStream Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Stream graph mutation events to live subscribers", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay events from producers to subscribers
    Serve {
        /// Port subscribers connect to
        #[arg(short, long)]
        port: Option<u16>,

        /// Port producers publish to
        #[arg(long)]
        ingest_port: Option<u16>,

        /// Also serve WebSocket subscribers on this port
        #[arg(long)]
        websocket_port: Option<u16>,

        /// Transport of the main subscriber endpoint
        #[arg(short, long, value_enum)]
        transport: Option<TransportKind>,

        /// Do not replay history to new subscribers
        #[arg(long)]
        no_replay: bool,
    },

    /// Subscribe to a server and print its events
    Listen {
        /// Server to connect to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Connect over WebSocket instead of raw TCP
        #[arg(long)]
        websocket: bool,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Publish a small ring graph to an ingest endpoint
    Demo {
        /// Server to publish to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Ingest port
        #[arg(short, long)]
        port: Option<u16>,

        /// Number of nodes in the ring
        #[arg(short, long, default_value_t = 8)]
        nodes: usize,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let level = if cli.verbose || config.general.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve {
            port,
            ingest_port,
            websocket_port,
            transport,
            no_replay,
        } => {
            let options = ServeOptions {
                port: port.unwrap_or(config.network.port),
                ingest_port: ingest_port.unwrap_or(config.network.ingest_port),
                websocket_port: websocket_port.or(config.network.websocket_port),
                transport: transport.unwrap_or(config.network.transport),
                replay: config.replay.enabled && !no_replay,
            };
            run_serve(&config, options).await?;
        }
        Commands::Listen {
            host,
            port,
            websocket,
            json,
        } => {
            run_listen(&config, &host, port, websocket, json).await?;
        }
        Commands::Demo { host, port, nodes } => {
            let port = port.unwrap_or(config.network.ingest_port);
            run_demo(&config, &host, port, nodes).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

struct ServeOptions {
    port: u16,
    ingest_port: u16,
    websocket_port: Option<u16>,
    transport: TransportKind,
    replay: bool,
}

/// Run the relay until Ctrl+C
async fn run_serve(config: &Config, options: ServeOptions) -> anyhow::Result<()> {
    let history = options.replay.then(|| Arc::new(EventLog::new()));

    let mut broker = Broker::new("netstream");
    if let Some(log) = &history {
        broker = broker.with_replay(log.clone());
    }
    let broker = Arc::new(broker);

    if let Some(filter) = config.allow_list() {
        tracing::info!("Only accepting subscribers from: {:?}", config.security.allowed_hosts);
        broker.add_filter(filter);
    }

    let mut servers = vec![Server::new(
        config.network_config(options.port),
        options.transport,
        broker.clone(),
    )];
    if let Some(ws_port) = options.websocket_port {
        if options.transport != TransportKind::WebSocket {
            servers.push(Server::new(
                config.network_config(ws_port),
                TransportKind::WebSocket,
                broker.clone(),
            ));
        }
    }

    let pipe = match &history {
        Some(log) => NetStreamPipe::with_history(broker.clone(), log.clone()),
        None => NetStreamPipe::new(broker.clone()),
    };
    let mut ingest = IngestServer::new(config.network_config(options.ingest_port), pipe.clone());

    println!("\n========================================");
    println!("  NetStream Relay Running");
    println!("========================================");
    for server in &mut servers {
        let addr = server.start().await?;
        println!("  Subscribers ({}): {}", server.kind(), addr);
    }
    let ingest_addr = ingest.start().await?;
    println!("  Producers: {}", ingest_addr);
    println!("  Replay: {}", if history.is_some() { "on" } else { "off" });
    println!("========================================");
    println!("\nPress Ctrl+C to stop.\n");

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");

    pipe.end();
    ingest.stop().await?;

    let stopped = ProcessRegistry::global().shutdown();
    for server in &mut servers {
        server.stop().await?;
    }
    tracing::info!("Relay stopped ({} brokers shut down)", stopped);

    Ok(())
}

/// Print every event from a server until it ends the stream
async fn run_listen(
    config: &Config,
    host: &str,
    port: Option<u16>,
    websocket: bool,
    json: bool,
) -> anyhow::Result<()> {
    let sink = SinkFn(move |event: GraphEvent| print_event(&event, json));

    let subscription = async {
        if websocket {
            let port = port
                .or(config.network.websocket_port)
                .unwrap_or(protocol::DEFAULT_WEBSOCKET_PORT);
            subscribe_websocket(&format!("ws://{}:{}", host, port), sink).await?;
        } else {
            let port = port.unwrap_or(config.network.port);
            let addr = resolve_host(host, port).await?;
            subscribe(addr, sink, &config.network_config(port)).await?;
        }
        anyhow::Ok(())
    };

    tokio::select! {
        result = subscription => {
            result?;
            println!("Stream ended.");
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nDisconnecting...");
        }
    }

    Ok(())
}

fn print_event(event: &GraphEvent, json: bool) {
    if !json {
        println!("{}", event);
        return;
    }

    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!("Cannot render {} as JSON: {}", event, e),
    }
}

/// Publish a ring graph to a relay's ingest port
async fn run_demo(config: &Config, host: &str, port: u16, nodes: usize) -> anyhow::Result<()> {
    let addr = resolve_host(host, port).await?;
    let publisher = Publisher::connect(addr, &config.network_config(port)).await?;

    let mut encoder = EventEncoder::new(publisher);
    let sent = publish_ring(&mut encoder, &config.general.source_id, nodes);
    encoder.into_transport().finish().await?;

    println!("Published {} events to {}", sent, addr);
    Ok(())
}

/// Feed a ring of `nodes` nodes into `sink`, returning the number of events
fn publish_ring<S: Sink>(sink: &mut S, source_id: &str, nodes: usize) -> u64 {
    let mut time_id = 0u64;
    let mut next = || {
        time_id += 1;
        time_id - 1
    };

    sink.graph_attribute_added(source_id, next(), "ui.title", &Value::from("ring"));
    for i in 0..nodes {
        let node = format!("n{}", i);
        sink.node_added(source_id, next(), &node);
        sink.node_attribute_added(source_id, next(), &node, "ui.label", &Value::from(i as i32));
    }
    for i in 0..nodes {
        let from = format!("n{}", i);
        let to = format!("n{}", (i + 1) % nodes);
        sink.edge_added(source_id, next(), &format!("{}-{}", from, to), &from, &to, false);
    }
    sink.step_begins(source_id, next(), 1.0);

    next()
}
