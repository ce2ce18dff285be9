//! Output formatting utilities

use colored::*;
use meshsim_types::{HopPhase, TraceEvent};
use tabled::{Table, Tabled};

/// Output format for recorded events
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// One JSON object per line
    Json,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Span")]
    span: String,
    #[tabled(rename = "Parent")]
    parent: String,
    #[tabled(rename = "Depth")]
    depth: u32,
}

impl From<&TraceEvent> for EventRow {
    fn from(event: &TraceEvent) -> Self {
        let phase = match event.phase {
            HopPhase::Start => "start",
            HopPhase::End => "end",
        };
        Self {
            phase: phase.to_string(),
            source: event.source.clone(),
            destination: event.destination.clone().unwrap_or_else(|| "-".into()),
            operation: event.operation.clone(),
            status: event
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into()),
            span: event.context.span_id.to_string(),
            parent: event
                .context
                .parent_span_id
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into()),
            depth: event.context.depth,
        }
    }
}

/// Print recorded events in the specified format
pub fn print_events(events: &[TraceEvent], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if events.is_empty() {
                println!("{}", "No events".dimmed());
            } else {
                let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => {
            for event in events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
    }
    Ok(())
}

/// Print a labelled value
pub fn print_field(label: &str, value: &str) {
    println!("{} {}", format!("{}:", label).bold(), value);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}
