use std::io::Write;

use shared::{
    domain::{AnalysisResult, Label},
    error::RETRY_HINT,
};
use tracing::warn;

pub const PENDING_MESSAGE: &str = "Processing image...";

/// Sink for per-file progress. The workflow calls `show_pending` once per
/// file, followed by exactly one of `show_success` or `show_error`.
pub trait ResultRenderer: Send {
    fn reset(&mut self);
    fn show_pending(&mut self, file_name: &str);
    fn show_success(&mut self, file_name: &str, result: &AnalysisResult);
    fn show_error(&mut self, file_name: &str, message: &str);
}

impl<A: ResultRenderer, B: ResultRenderer> ResultRenderer for (A, B) {
    fn reset(&mut self) {
        self.0.reset();
        self.1.reset();
    }

    fn show_pending(&mut self, file_name: &str) {
        self.0.show_pending(file_name);
        self.1.show_pending(file_name);
    }

    fn show_success(&mut self, file_name: &str, result: &AnalysisResult) {
        self.0.show_success(file_name, result);
        self.1.show_success(file_name, result);
    }

    fn show_error(&mut self, file_name: &str, message: &str) {
        self.0.show_error(file_name, message);
        self.1.show_error(file_name, message);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    Pending,
    Success(Vec<Label>),
    Error(String),
}

impl EntryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub file_name: String,
    pub state: EntryState,
}

impl ResultEntry {
    pub fn to_html(&self) -> String {
        let name = escape_html(&self.file_name);
        match &self.state {
            EntryState::Pending => format!(
                "<div class=\"result-box\">\n  <h3>{name}</h3>\n  <p>{PENDING_MESSAGE}</p>\n</div>\n"
            ),
            EntryState::Success(labels) => {
                let mut html = format!("<div class=\"result-box\">\n  <h3>{name}</h3>\n  <ul>\n");
                for label in labels {
                    html.push_str(&format!(
                        "    <li><span class=\"label-name\">{}</span> - <span class=\"confidence\">{}</span></li>\n",
                        escape_html(&label.name),
                        label.formatted_confidence()
                    ));
                }
                html.push_str("  </ul>\n</div>\n");
                html
            }
            EntryState::Error(message) => format!(
                "<div class=\"result-box error\">\n  <h3>Error processing {name}</h3>\n  <p>{}</p>\n  <p>{RETRY_HINT}</p>\n</div>\n",
                escape_html(message)
            ),
        }
    }
}

/// In-memory results area: one entry per submitted file, in submission order.
#[derive(Debug, Clone, Default)]
pub struct ResultsBoard {
    entries: Vec<ResultEntry>,
}

impl ResultsBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from("<div id=\"results\">\n");
        for entry in &self.entries {
            html.push_str(&entry.to_html());
        }
        html.push_str("</div>\n");
        html
    }

    fn settle(&mut self, file_name: &str, state: EntryState) {
        let pending = self
            .entries
            .iter_mut()
            .rev()
            .find(|entry| entry.file_name == file_name && !entry.state.is_terminal());
        match pending {
            Some(entry) => entry.state = state,
            None => {
                warn!(file = file_name, "result arrived without a pending entry");
                self.entries.push(ResultEntry {
                    file_name: file_name.to_string(),
                    state,
                });
            }
        }
    }
}

impl ResultRenderer for ResultsBoard {
    fn reset(&mut self) {
        self.entries.clear();
    }

    fn show_pending(&mut self, file_name: &str) {
        self.entries.push(ResultEntry {
            file_name: file_name.to_string(),
            state: EntryState::Pending,
        });
    }

    fn show_success(&mut self, file_name: &str, result: &AnalysisResult) {
        self.settle(file_name, EntryState::Success(result.labels.clone()));
    }

    fn show_error(&mut self, file_name: &str, message: &str) {
        self.settle(file_name, EntryState::Error(message.to_string()));
    }
}

/// Streams transitions as plain text lines.
pub struct ConsoleRenderer<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            warn!("failed to write result output: {err}");
        }
    }
}

impl<W: Write + Send> ResultRenderer for ConsoleRenderer<W> {
    fn reset(&mut self) {}

    fn show_pending(&mut self, file_name: &str) {
        self.emit(&format!("{file_name}: {PENDING_MESSAGE}\n"));
    }

    fn show_success(&mut self, file_name: &str, result: &AnalysisResult) {
        let mut text = format!("{file_name}:\n");
        if result.labels.is_empty() {
            text.push_str("  (no labels)\n");
        }
        for label in &result.labels {
            text.push_str(&format!("  {label}\n"));
        }
        self.emit(&text);
    }

    fn show_error(&mut self, file_name: &str, message: &str) {
        self.emit(&format!(
            "Error processing {file_name}: {message}\n  {RETRY_HINT}\n"
        ));
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
