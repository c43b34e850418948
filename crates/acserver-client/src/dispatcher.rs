//! In-order fan-out to plugins and report sinks with per-callee isolation.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use openracing_acserver_protocol::Message;
use openracing_acserver_session::SessionReport;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::plugin::{PluginContext, ReportSink, SessionEvent, SessionPlugin};

/// Delivery counters for one registered plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginStats {
    pub name: String,
    pub delivered: u64,
    pub failed: u64,
}

struct PluginEntry {
    plugin: Arc<dyn SessionPlugin>,
    stats: PluginStats,
}

#[derive(Default)]
pub struct EventDispatcher {
    plugins: Vec<PluginEntry>,
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("plugins", &self.plugins.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

enum Outcome {
    Ok,
    Failed,
}

/// Run one callback, turning both errors and panics into a logged failure.
fn isolate(callee: &str, what: &str, f: impl FnOnce() -> anyhow::Result<()>) -> Outcome {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Outcome::Ok,
        Ok(Err(e)) => {
            warn!(callee, callback = what, error = %e, "Callback failed");
            Outcome::Failed
        }
        Err(payload) => {
            error!(
                callee,
                callback = what,
                panic = panic_message(payload.as_ref()),
                "Callback panicked"
            );
            Outcome::Failed
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn SessionPlugin>) {
        let name = plugin.name().to_string();
        info!(plugin = %name, "Plugin registered");
        self.plugins.push(PluginEntry {
            plugin,
            stats: PluginStats {
                name,
                ..PluginStats::default()
            },
        });
    }

    pub fn register_sink(&mut self, sink: Arc<dyn ReportSink>) {
        info!(sink = sink.name(), "Report sink registered");
        self.sinks.push(sink);
    }

    pub fn dispatch_message(&mut self, message: &Message, ctx: &PluginContext<'_>) {
        let what = message.kind().name();
        for entry in &mut self.plugins {
            let plugin = &entry.plugin;
            let outcome = isolate(&entry.stats.name, what, || plugin.on_message(message, ctx));
            entry.record(outcome);
        }
    }

    pub fn dispatch_event(&mut self, event: &SessionEvent, ctx: &PluginContext<'_>) {
        let what = event.name();
        for entry in &mut self.plugins {
            let plugin = &entry.plugin;
            let outcome = isolate(&entry.stats.name, what, || plugin.on_event(event, ctx));
            entry.record(outcome);
        }
    }

    /// Hand a report to every sink. Returns how many accepted it.
    pub fn publish_report(&self, report: &SessionReport) -> usize {
        self.sinks
            .iter()
            .filter(|sink| {
                matches!(
                    isolate(sink.name(), "report", || sink.accept(report)),
                    Outcome::Ok
                )
            })
            .count()
    }

    #[must_use]
    pub fn stats(&self) -> Vec<PluginStats> {
        self.plugins.iter().map(|entry| entry.stats.clone()).collect()
    }
}

impl PluginEntry {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Ok => self.stats.delivered = self.stats.delivered.saturating_add(1),
            Outcome::Failed => self.stats.failed = self.stats.failed.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::ServerRequests;
    use openracing_acserver_session::SessionInfo;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        seen: Mutex<Vec<&'static str>>,
    }

    impl SessionPlugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn on_event(&self, event: &SessionEvent, _ctx: &PluginContext<'_>) -> anyhow::Result<()> {
            self.seen.lock().push(event.name());
            Ok(())
        }
    }

    struct Panicker;

    impl SessionPlugin for Panicker {
        fn name(&self) -> &str {
            "panicker"
        }

        #[expect(
            clippy::panic,
            clippy::panic_in_result_fn,
            reason = "exercises panic containment"
        )]
        fn on_event(&self, _event: &SessionEvent, _ctx: &PluginContext<'_>) -> anyhow::Result<()> {
            panic!("plugin blew up");
        }
    }

    #[test]
    fn test_panicking_plugin_is_contained() {
        let (requests, _rx) = ServerRequests::channel(false);
        let session = SessionInfo::new(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH, 1000, 8);
        let ctx = PluginContext {
            requests: &requests,
            session: &session,
        };
        let recorder = Arc::new(Recorder {
            name: "recorder",
            seen: Mutex::new(Vec::new()),
        });

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_plugin(Arc::new(Panicker));
        dispatcher.register_plugin(recorder.clone());

        dispatcher.dispatch_event(&SessionEvent::Connected, &ctx);
        dispatcher.dispatch_event(&SessionEvent::ServerAlive, &ctx);

        assert_eq!(*recorder.seen.lock(), vec!["connected", "server_alive"]);
        let stats = dispatcher.stats();
        assert_eq!(stats.first().map(|s| (s.delivered, s.failed)), Some((0, 2)));
        assert_eq!(stats.get(1).map(|s| (s.delivered, s.failed)), Some((2, 0)));
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
