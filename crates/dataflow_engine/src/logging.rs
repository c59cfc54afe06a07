// SPDX-License-Identifier: MIT OR Apache-2.0
//! Logging setup and a layer forwarding log records to a host.

use crate::error::{EngineError, Result};
use std::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber: `RUST_LOG` if set, otherwise `filter`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(filter: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(filter))
        .map_err(|e| EngineError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| EngineError::Logging(e.to_string()))
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace
    Trace,
    /// Debug
    Debug,
    /// Info
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// A tracing event captured by [`LogBridge`]
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Message followed by the other fields as `name = value`
    pub message: String,
    /// Module path of the emitter
    pub target: String,
}

/// A `tracing_subscriber::Layer` that forwards events over an `mpsc` channel.
pub struct LogBridge {
    sender: mpsc::Sender<LogRecord>,
}

impl LogBridge {
    /// Create a bridge and return `(layer, receiver)`
    pub fn new() -> (Self, mpsc::Receiver<LogRecord>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl<S> tracing_subscriber::Layer<S> for LogBridge
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        // A dropped receiver just means nobody is listening.
        let _ = self.sender.send(LogRecord {
            level: (*meta.level()).into(),
            message: visitor.finish(),
            target: meta.target().to_string(),
        });
    }
}

/// Collects the `message` field first and the remaining fields after it
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (true, true) => "(empty)".to_string(),
            (true, false) => self.fields.join(", "),
            (false, true) => self.message,
            (false, false) => format!("{} ({})", self.message, self.fields.join(", ")),
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{} = {:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{} = {}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_forwards_events() {
        let (bridge, receiver) = LogBridge::new();
        let subscriber = tracing_subscriber::registry().with(bridge);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(module = "Source:0", "module failed");
            tracing::info!("plain");
        });

        let records: Vec<LogRecord> = receiver.try_iter().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, LogLevel::Warn);
        assert_eq!(records[0].message, "module failed (module = Source:0)");
        assert_eq!(records[1].message, "plain");
        assert!(records[1].target.starts_with("dataflow_engine"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(
                init_logging("dataflow_engine=notalevel"),
                Err(EngineError::Logging(_))
            ));
        }
    }
}
