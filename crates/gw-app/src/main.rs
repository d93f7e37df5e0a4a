//! Main application entry point
//!
//! Runs one grid widget over a line protocol: every stdin line is a message
//! from the front end, every stdout line a message back to it, framed the
//! same way in both directions. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gw_data::{CsvOptions, TableData, TableOptions};
use gw_widget::{Widget, WidgetOptions};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod comm;

use comm::{write_lines, ChannelComm, Input};

/// Serve a grid widget over stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "gridwidget", version, about)]
struct Args {
    /// Widget options as a JSON object file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load a CSV file into the widget
    #[arg(long, conflicts_with = "json")]
    csv: Option<PathBuf>,

    /// Load a JSON file (records, columns or schema) into the widget
    #[arg(long)]
    json: Option<PathBuf>,

    /// Primary-key column of the loaded table
    #[arg(long, conflicts_with = "limit")]
    index: Option<String>,

    /// Row limit of the loaded table
    #[arg(long)]
    limit: Option<usize>,

    /// Plugin to render, overriding the config file
    #[arg(long)]
    plugin: Option<String>,

    /// Enable dark mode
    #[arg(long)]
    dark: bool,

    /// CSV field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl Args {
    fn widget_options(&self) -> Result<WidgetOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                let value: Value = serde_json::from_str(&text)
                    .with_context(|| format!("Config {} is not JSON", path.display()))?;
                WidgetOptions::from_json(&value)?
            }
            None => WidgetOptions::default(),
        };
        if let Some(plugin) = &self.plugin {
            options.plugin = Value::from(plugin.as_str());
        }
        if self.dark {
            options.dark = Value::Bool(true);
        }
        Ok(options)
    }

    fn table_options(&self) -> TableOptions {
        TableOptions {
            index: self.index.clone(),
            limit: self.limit,
        }
    }

    fn dataset(&self) -> Result<Option<TableData>> {
        if let Some(path) = &self.csv {
            let options = CsvOptions {
                delimiter: self.delimiter,
                ..CsvOptions::default()
            };
            return Ok(Some(TableData::Csv {
                text: read(path)?,
                options,
            }));
        }
        if let Some(path) = &self.json {
            let value: Value = serde_json::from_str(&read(path)?)
                .with_context(|| format!("{} is not JSON", path.display()))?;
            return Ok(Some(TableData::from_json(&value)?));
        }
        Ok(None)
    }
}

/// Route one front-end line into the widget
fn apply(widget: &mut Widget, input: Input) {
    match input {
        Input::Custom { content } => widget.handle_message(&content, &[]),
        Input::Update { state } => {
            for (field, value) in &state {
                if let Err(e) = widget.set_field(field, value) {
                    warn!("Rejected front-end value for `{}`: {}", field, e);
                }
            }
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting grid widget");

    let (comm, receiver) = ChannelComm::new();
    let comm = Arc::new(comm);
    let writer = tokio::spawn(write_lines(receiver));

    let mut widget = Widget::new(args.widget_options()?, comm.clone())?;
    if let Some(data) = args.dataset()? {
        let name = widget.load(data, args.table_options())?;
        if let Some(table) = widget.table() {
            match table.with_table(|t| t.pretty(10)) {
                Ok(preview) => debug!("Table `{}`:\n{}", name, preview),
                Err(e) => warn!("Could not render table preview: {}", e),
            }
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match Input::parse(&line) {
            Ok(input) => apply(&mut widget, input),
            Err(e) => warn!("Ignoring malformed input line: {}", e),
        }
    }

    info!("Input closed, shutting down");
    comm.shutdown();
    writer.await??;
    Ok(())
}
