//! meshsim CLI - Run trace propagation simulations from the terminal
//!
//! - Run any topology pattern and print the aggregate response
//! - Continue an existing trace with inbound trace headers
//! - Drive the eventual-consistency writer and reader
//! - Record events to a JSON-lines file

use anyhow::Context;
use clap::{Parser, Subcommand};
use meshsim_engine::{
    init_tracing, CompositeSink, EventSink, FileEventSink, MemoryEventSink, Simulator,
    SimulatorConfig, TracingEventSink,
};
use meshsim_types::{Pattern, TraceHeaders};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

mod output;

use output::OutputFormat;

/// meshsim CLI application
#[derive(Parser)]
#[command(name = "meshsim")]
#[command(about = "meshsim - Trace propagation through microservice anti-patterns", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MESHSIM_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "MESHSIM_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json: bool,

    /// Append recorded events to this JSON-lines file
    #[arg(long, global = true)]
    events: Option<PathBuf>,

    /// Leave the interim status off start events
    #[arg(long, global = true)]
    no_status_codes: bool,

    /// Print every recorded event after the response
    #[arg(long, global = true)]
    show_events: bool,

    /// Format used by --show-events
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run a topology pattern
    Run {
        /// Pattern name (see `meshsim patterns`)
        pattern: Pattern,

        /// Request payload
        #[arg(short, long, default_value = "test")]
        input: String,

        /// Continue this trace instead of starting a new one
        #[arg(long)]
        trace_id: Option<String>,

        /// Span of the upstream caller
        #[arg(long)]
        parent_span_id: Option<String>,

        /// Starting depth; malformed values count as 0
        #[arg(long)]
        depth: Option<String>,
    },

    /// Submit an eventual-consistency write
    Write {
        /// Value to store
        input: String,

        /// Wait for the write to be applied before exiting
        #[arg(long)]
        wait: bool,
    },

    /// Read the eventual-consistency database
    Read,

    /// List the available patterns
    Patterns,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        SimulatorConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json {
        config.logging.json = true;
    }
    if cli.no_status_codes {
        config.include_status_codes = false;
    }

    init_tracing(&config.logging)?;

    let memory = Arc::new(MemoryEventSink::new());
    let mut sink = CompositeSink::new(vec![memory.clone(), Arc::new(TracingEventSink)]);
    let file = match &cli.events {
        Some(path) => {
            let file = Arc::new(
                FileEventSink::open(path)
                    .await
                    .with_context(|| format!("failed to open {}", path.display()))?,
            );
            sink.add(file.clone());
            Some(file)
        }
        None => None,
    };
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    let simulator = Simulator::builder(config).sink(sink).build()?;

    match cli.command {
        Commands::Run {
            pattern,
            input,
            trace_id,
            parent_span_id,
            depth,
        } => {
            let headers = TraceHeaders {
                trace_id,
                span_id: parent_span_id,
                depth,
            };
            let inbound = (!headers.is_empty()).then_some(&headers);
            debug!(pattern = %pattern, inbound = inbound.is_some(), "Running pattern");

            let outcome = simulator.run(pattern, &input, inbound).await?;
            output::print_field("Response", &outcome.response);
            output::print_field("Trace", outcome.trace_id.as_str());
        }

        Commands::Write { input, wait } => {
            let ack = simulator.write(&input, None);
            output::print_field("Response", &ack);

            if wait {
                let consistency = simulator.eventual_consistency();
                while consistency.pending_writes() > 0 {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                output::print_success("Write applied");
            }
        }

        Commands::Read => {
            let value = simulator.read(None).await;
            output::print_field("Response", &value);
        }

        Commands::Patterns => {
            for pattern in Pattern::ALL {
                println!("{}", pattern);
            }
            return Ok(());
        }
    }

    if let Some(file) = file {
        file.flush().await?;
        output::print_success(&format!("Events written to {}", file.path().display()));
    }

    if cli.show_events {
        output::print_events(&memory.events(), cli.output)?;
    }

    Ok(())
}
