use crate::config::OutputFormat;
use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

enum SinkWriter {
    Csv(csv::Writer<File>),
    /// The whole array is rewritten on every append so the file is always valid JSON
    Json(Vec<serde_json::Value>),
}

/// Results file that grows page by page during a run
pub struct OutputSink {
    path: PathBuf,
    writer: SinkWriter,
    rows: usize,
}

impl OutputSink {
    /// Create `<dir>/<YYYYmmdd_HHMMSS>_<suffix>.<ext>` and write the header row
    pub fn create(dir: &Path, suffix: &str, format: OutputFormat, headers: &[&str]) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let (path, writer) = match format {
            OutputFormat::Csv => {
                let path = dir.join(format!("{}_{}.csv", stamp, suffix));
                let mut writer = csv::Writer::from_path(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                writer.write_record(headers)?;
                writer.flush()?;
                (path, SinkWriter::Csv(writer))
            }
            OutputFormat::Json => {
                let path = dir.join(format!("{}_{}.json", stamp, suffix));
                std::fs::write(&path, "[]")
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                (path, SinkWriter::Json(Vec::new()))
            }
        };

        info!("💾 Writing results to {}", path.display());
        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Append `items` and flush, so an interrupted run keeps everything up to here
    pub fn append<T, F>(&mut self, items: &[T], cells: F) -> Result<()>
    where
        T: Serialize,
        F: Fn(&T) -> Vec<String>,
    {
        match &mut self.writer {
            SinkWriter::Csv(writer) => {
                for item in items {
                    writer.write_record(cells(item))?;
                }
                writer.flush()?;
            }
            SinkWriter::Json(values) => {
                for item in items {
                    values.push(serde_json::to_value(item)?);
                }
                let json = serde_json::to_string_pretty(values)?;
                std::fs::write(&self.path, json)
                    .with_context(|| format!("Failed to write {}", self.path.display()))?;
            }
        }

        self.rows += items.len();
        debug!("Flushed {} rows ({} total) to {}", items.len(), self.rows, self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// File name suffix for a run: site name plus the start URL's last path segment
pub fn file_suffix(site: &str, start_url: &str) -> String {
    let tail = start_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".html");

    let mut suffix = String::with_capacity(site.len() + tail.len() + 1);
    suffix.push_str(site);
    suffix.push('_');
    let mut last_was_sep = true;
    for c in tail.chars() {
        if c.is_ascii_alphanumeric() {
            suffix.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            suffix.push('_');
            last_was_sep = true;
        }
    }
    suffix.trim_end_matches('_').to_string()
}
