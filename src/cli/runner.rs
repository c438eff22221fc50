//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::ConnectorConfig;
use crate::destination::Destination;
use crate::error::{Error, Result, ResultExt};
use crate::hubspot::ResourceRegistry;
use crate::iterator::{CancelHandle, CancelToken, Position, Record};
use crate::source::Source;
use crate::state::StateManager;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Sleep between reads while nothing is ready
const READ_BACKOFF: Duration = Duration::from_millis(500);

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Read {
                max_records,
                idle_timeout,
            } => {
                self.read(*max_records, idle_timeout.map(Duration::from_secs))
                    .await
            }
            Commands::Write => self.write().await,
            Commands::Resources => self.resources(),
            Commands::Position { decode } => self.position(decode),
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<ConnectorConfig> {
        // Inline config takes precedence
        if let Some(json_str) = &self.cli.config_json {
            return ConnectorConfig::from_yaml_str(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        if let Some(path) = &self.cli.config {
            return ConnectorConfig::from_file(path);
        }

        Err(Error::config("No config given, pass --config or --config-json"))
    }

    /// Load the resource table
    fn load_registry(&self) -> Result<Arc<ResourceRegistry>> {
        let registry = match &self.cli.registry {
            Some(path) => ResourceRegistry::from_file(path).context("load resource table")?,
            None => ResourceRegistry::hubspot(),
        };
        Ok(Arc::new(registry))
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        match &self.cli.state {
            Some(path) => StateManager::from_file(path),
            None => Ok(StateManager::in_memory()),
        }
    }

    /// Read records until cancelled, idle, or `max_records` is reached
    async fn read(&self, max_records: Option<usize>, idle_timeout: Option<Duration>) -> Result<()> {
        let config = self.load_config()?;
        let registry = self.load_registry()?;
        let state = self.load_state()?;

        let position = state
            .get_position(&config.resource)
            .await
            .unwrap_or_default();

        let handle = CancelHandle::new();
        let cancel = handle.token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, stopping");
                handle.cancel();
            }
        });

        let mut source = Source::connect(&config, &position, registry, &cancel).await?;
        let result = self
            .stream_records(&mut source, &state, &cancel, max_records, idle_timeout)
            .await;
        source.teardown();

        let count = result?;
        self.output_message(&json!({
            "type": "STATE",
            "state": {
                "resource": config.resource,
                "records": count,
                "position": state.state().await.get_position(&config.resource),
            }
        }));

        Ok(())
    }

    async fn stream_records(
        &self,
        source: &mut Source,
        state: &StateManager,
        cancel: &CancelToken,
        max_records: Option<usize>,
        idle_timeout: Option<Duration>,
    ) -> Result<usize> {
        let mut count = 0;
        let mut last_record = Instant::now();

        while max_records.map_or(true, |max| count < max) {
            match source.read(cancel).await {
                Ok(Some(record)) => {
                    self.output_message(&json!({
                        "type": "RECORD",
                        "resource": source.resource(),
                        "record": record,
                    }));

                    state
                        .set_position(source.resource(), &record.position)
                        .await
                        .context("checkpoint position")?;
                    source.ack(&record.position);

                    count += 1;
                    last_record = Instant::now();
                }
                Ok(None) => {
                    if idle_timeout.is_some_and(|idle| last_record.elapsed() >= idle) {
                        info!(records = count, "no records within idle timeout, stopping");
                        break;
                    }

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(READ_BACKOFF) => {}
                    }
                }
                Err(err) if err.is_cancelled() => break,
                Err(err) => return Err(err),
            }
        }

        Ok(count)
    }

    /// Apply JSON-line records from stdin
    async fn write(&self) -> Result<()> {
        let config = self.load_config()?;
        let registry = self.load_registry()?;
        let destination = Destination::open(&config, registry)?;

        let records = parse_records(BufReader::new(tokio::io::stdin())).await?;
        let (written, result) = destination.write(&records).await;

        self.output_message(&json!({
            "type": "WRITE",
            "resource": config.resource,
            "written": written,
            "total": records.len(),
        }));

        if let Err(err) = &result {
            warn!(written, error = %err, "write stopped early");
        }
        result
    }

    /// List resources and their capability
    fn resources(&self) -> Result<()> {
        let registry = self.load_registry()?;

        let resources: Vec<Value> = registry
            .iter()
            .map(|(name, definition)| {
                let capability = definition
                    .pagination
                    .as_ref()
                    .map_or("write-only", |pagination| pagination.kind());
                json!({
                    "name": name,
                    "capability": capability,
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "RESOURCES",
            "resources": resources,
        }));

        Ok(())
    }

    /// Validate and print a position
    fn position(&self, encoded: &str) -> Result<()> {
        let position = Position::parse(encoded.as_bytes()).context("decode position")?;

        self.output_message(&json!({
            "type": "POSITION",
            "position": position,
        }));

        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Parse one record per non-empty line
async fn parse_records<R: AsyncBufRead + Unpin>(reader: R) -> Result<Vec<Record>> {
    let mut lines = reader.lines();
    let mut records = Vec::new();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let record: Record = serde_json::from_str(&line)
            .map_err(Error::from)
            .with_context(|| format!("parse record on line {line_number}"))?;
        records.push(record);
    }

    Ok(records)
}
