//! Output formatting and writing utilities
//!
//! Results are written to stdout as human-readable text or JSON; logs go to
//! stderr through tracing.

use crate::cli::OutputFormat;
use crate::error::Result;
use colored::Colorize;
use morph_core::{PendingJob, TransformationEvent, TransformerResult};
use serde::Serialize;
use std::io::{self, Write};

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    quiet: bool,
    writer: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new output writer on stdout
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool) -> Self {
        Self::with_writer(format, use_color, quiet, Box::new(io::stdout()))
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(format: OutputFormat, use_color: bool, quiet: bool, writer: Box<dyn Write>) -> Self {
        Self {
            format,
            use_color,
            quiet,
            writer,
        }
    }

    fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an info message (human format only)
    pub fn info(&mut self, message: &str) -> Result<()> {
        if self.quiet || !self.is_human() {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&format!("{} {}", "ℹ".blue(), message))
        } else {
            self.writeln(&format!("INFO: {}", message))
        }
    }

    /// Write a success message (human format only)
    pub fn success(&mut self, message: &str) -> Result<()> {
        if self.quiet || !self.is_human() {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.green().to_string())
        } else {
            self.writeln(message)
        }
    }

    /// Write a section header (human format only)
    pub fn section(&mut self, title: &str) -> Result<()> {
        if self.quiet || !self.is_human() {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&format!("═══ {} ═══", title).bright_blue().to_string())
        } else {
            self.writeln(&format!("=== {} ===", title))
        }
    }

    /// Write data in the configured format
    pub fn data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let formatted = match self.format {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::JsonPretty | OutputFormat::Human => serde_json::to_string_pretty(value)?,
        };
        self.writeln(&formatted)
    }

    /// Write a transformation result
    pub fn transformer_result(&mut self, result: &TransformerResult) -> Result<()> {
        if !self.is_human() {
            return self.data(result);
        }

        if let Some(content) = result.content() {
            self.writeln(content)?;
        }

        if self.quiet {
            return Ok(());
        }

        for error in result.errors() {
            let line = if self.use_color {
                format!("{} {}", "✗".red(), error)
            } else {
                format!("ERROR: {}", error)
            };
            self.writeln(&line)?;
        }

        if let Some(metadata) = result.metadata() {
            let summary = format!(
                "{} · {} · {} · {}",
                metadata.transformer(),
                metadata.provider(),
                metadata.model(),
                metadata.timestamp().to_rfc3339()
            );
            let summary = if self.use_color {
                summary.dimmed().to_string()
            } else {
                summary
            };
            self.writeln(&summary)?;
        }
        Ok(())
    }

    /// Report a queued job
    pub fn pending_job(&mut self, job: &PendingJob) -> Result<()> {
        if self.is_human() {
            self.info(&format!(
                "Queued job {} on {}/{} for transformer '{}'",
                job.id, job.connection, job.queue, job.transformer
            ))
        } else {
            self.data(&serde_json::json!({
                "job_id": job.id,
                "queue": job.queue,
                "connection": job.connection,
                "transformer": job.transformer,
            }))
        }
    }

    /// Report a lifecycle event while waiting on a queued job
    pub fn event(&mut self, event: &TransformationEvent) -> Result<()> {
        if !self.is_human() {
            return Ok(());
        }

        match event {
            TransformationEvent::Started { job_id, .. } => self.info(&format!("Job {} started", job_id)),
            TransformationEvent::Completed { job_id, .. } => self.success(&format!("Job {} completed", job_id)),
            TransformationEvent::Failed {
                job_id,
                error,
                terminal,
                ..
            } => {
                let message = if *terminal {
                    format!("Job {} failed permanently: {}", job_id, error)
                } else {
                    format!("Job {} attempt failed: {}", job_id, error)
                };
                if self.use_color {
                    self.writeln(&message.yellow().to_string())
                } else {
                    self.writeln(&format!("WARNING: {}", message))
                }
            }
        }
    }
}
