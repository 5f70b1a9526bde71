//! Output formatting for the studyhall CLI.
//!
//! Text output is one line per record with the identifying field first;
//! JSON output is pretty-printed, and lists are wrapped in a
//! `{<collection>, count, advice}` envelope.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

/// Keys rendered first, unlabeled, in text output.
const ID_KEYS: [&str; 6] = [
    "review_id",
    "flag_id",
    "question_id",
    "answer_id",
    "message_id",
    "username",
];

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Concise `key:value` lines
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format data according to the configured output format
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
            OutputFormat::Text => Ok(render_text(&serde_json::to_value(data)?)),
        }
    }

    /// Format and print data to stdout
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        let output = self.format(data)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{output}")?;
        Ok(())
    }

    /// Print a list, or `empty_message` in text mode when there is nothing
    /// to show.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_list<T: Serialize>(
        &self,
        data: &[T],
        empty_message: &str,
        collection_name: &str,
        advice: &[&str],
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let envelope = list_envelope(data, collection_name, advice)?;
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{}", serde_json::to_string_pretty(&envelope)?)?;
                Ok(())
            }
            OutputFormat::Text if data.is_empty() => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{empty_message}")?;
                Ok(())
            }
            OutputFormat::Text => self.print(&data),
        }
    }

    /// Print a one-line confirmation. JSON mode emits `{"message": ...}`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails
    pub fn print_message(&self, message: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print(&serde_json::json!({ "message": message })),
            OutputFormat::Text => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{message}")?;
                Ok(())
            }
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

fn list_envelope<T: Serialize>(
    data: &[T],
    collection_name: &str,
    advice: &[&str],
) -> Result<Value> {
    let mut envelope = serde_json::Map::new();
    envelope.insert(collection_name.to_string(), serde_json::to_value(data)?);
    envelope.insert("count".to_string(), serde_json::json!(data.len()));
    envelope.insert("advice".to_string(), serde_json::json!(advice));
    Ok(Value::Object(envelope))
}

fn render_text(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut parts = Vec::new();
            for key in ID_KEYS {
                if let Some(val) = map.get(key) {
                    parts.push(render_field_value(val));
                }
            }
            for (key, val) in map {
                if ID_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match val {
                    Value::Array(arr) if arr.is_empty() => {}
                    Value::Null => {}
                    _ => parts.push(format!("{key}:{}", render_field_value(val))),
                }
            }
            parts.join("  ")
        }
        Value::Array(arr) => arr.iter().map(render_text).collect::<Vec<_>>().join("\n"),
        _ => render_field_value(value),
    }
}

fn render_field_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains(' ') || s.contains('\n') => {
            format!("\"{}\"", s.replace('\n', "\\n"))
        }
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(render_field_value).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| format!("{k}:{}", render_field_value(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}
