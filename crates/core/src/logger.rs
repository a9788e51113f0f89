//! Log setup: a plain-text file per run, optional stderr output and an
//! optional channel feeding formatted lines to the TUI.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{mpsc, Mutex};

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

pub const LOG_FILE: &str = "meo.log";

/// Field separator of the lines sent to the UI channel.
pub const SEP: char = '\x1f';

/// Install the global subscriber. The log file is truncated. Keep the
/// returned guard alive for as long as file output is wanted.
pub fn init(log_dir: &Path, ui: Option<mpsc::Sender<String>>, stderr: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join(LOG_FILE))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(stderr.then(|| fmt::layer().with_writer(std::io::stderr).compact()))
        .with(ui.map(ChannelLayer::new))
        .try_init()
        .ok();

    Ok(guard)
}

/// Forwards every event as `level SEP target SEP HH:MM:SS SEP message`.
pub struct ChannelLayer {
    tx: Mutex<mpsc::Sender<String>>,
}

impl ChannelLayer {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl<S: Subscriber> Layer<S> for ChannelLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let target = meta.target().rsplit("::").next().unwrap_or_default();
        let ts = Local::now().format("%H:%M:%S").to_string();
        let line = format_line(meta.level().as_str(), target, &ts, &visitor.finish());
        if let Ok(tx) = self.tx.lock() {
            tx.send(line).ok();
        }
    }
}

pub fn format_line(level: &str, target: &str, ts: &str, message: &str) -> String {
    format!("{level}{SEP}{target}{SEP}{ts}{SEP}{message}")
}

/// Message first, then the structured fields as `key=value`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            write!(self.fields, " {}={}", field.name(), value).ok();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            write!(self.message, "{:?}", value).ok();
        } else {
            write!(self.fields, " {}={:?}", field.name(), value).ok();
        }
    }
}
