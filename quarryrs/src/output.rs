//! User-visible output.
//!
//! Commands never print directly; they write through a [`LogSink`] the
//! runner owns. The binary echoes the sink to stdout while the functional
//! harness captures it as a string, so assertions see exactly what a user
//! would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use clap::ValueEnum;
use serde_json::{json, Value};

use crate::error::Result;
use crate::executor::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub struct LogSink {
    echo: bool,
    quiet: AtomicBool,
    buffer: Mutex<String>,
}

impl LogSink {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            quiet: AtomicBool::new(false),
            buffer: Mutex::new(String::new()),
        }
    }

    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    /// Status line: banners, progress, version header. Suppressed by
    /// `--quiet`.
    pub fn status(&self, line: &str) {
        if !self.quiet.load(Ordering::Relaxed) {
            self.write(line);
        }
    }

    /// Data output: rendered tables and JSON documents. Never suppressed.
    pub fn data(&self, text: &str) {
        self.write(text);
    }

    fn write(&self, text: &str) {
        if self.echo {
            println!("{text}");
        }
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_str(text);
            buffer.push('\n');
        }
    }

    pub fn captured(&self) -> String {
        self.buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }
}

/// Render a result set as a pipe-delimited, width-aligned text table.
pub fn render_table(result: &QueryResult) -> String {
    let headers: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|name| row.get(*name).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len().max(2)).collect();
    for row in &rows {
        for (idx, value) in row.iter().enumerate() {
            if value.len() > widths[idx] {
                widths[idx] = value.len();
            }
        }
    }

    let mut out = String::new();
    push_row(&mut out, &headers, &widths);
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(
        &mut out,
        &dashes.iter().map(String::as_str).collect::<Vec<_>>(),
        &widths,
    );
    for row in &rows {
        push_row(
            &mut out,
            &row.iter().map(String::as_str).collect::<Vec<_>>(),
            &widths,
        );
    }
    out.pop();
    out
}

fn push_row(out: &mut String, cells: &[&str], widths: &[usize]) {
    out.push('|');
    for (idx, cell) in cells.iter().enumerate() {
        out.push(' ');
        out.push_str(cell);
        out.push_str(&" ".repeat(widths[idx].saturating_sub(cell.len())));
        out.push_str(" |");
    }
    out.push('\n');
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render one node's preview as a pretty-printed JSON document:
/// `{"node": <display>, "show": [<rows>...]}`.
pub fn render_json(display_name: &str, result: &QueryResult) -> Result<String> {
    let rows: Vec<Value> = result
        .rows
        .iter()
        .cloned()
        .map(Value::Object)
        .collect();
    let doc = json!({ "node": display_name, "show": rows });
    Ok(serde_json::to_string_pretty(&doc)?)
}
