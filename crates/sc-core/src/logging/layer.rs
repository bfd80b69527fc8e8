//! JSONL tracing layer.
//!
//! Writes one [`LogEvent`] per line to stderr so stdout stays reserved for
//! command payloads.

use std::io::{self, Write};
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::{Level, LogEvent};

/// Correlation fields captured from `pass` and `node` spans.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    pass_id: Option<String>,
    stage: Option<String>,
    node: Option<String>,
}

impl SpanContext {
    fn record(&mut self, name: &str, value: String) {
        match name {
            "pass_id" => self.pass_id = Some(value),
            "stage" => self.stage = Some(value),
            "node" => self.node = Some(value),
            _ => {}
        }
    }
}

struct SpanContextVisitor(SpanContext);

impl Visit for SpanContextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.record(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.record(field.name(), format!("{:?}", value));
    }
}

/// Pulls `message`, `event`, and correlation overrides out of an event;
/// everything else lands in `fields`.
#[derive(Default)]
struct JsonFieldVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
    event: Option<String>,
    context: SpanContext,
}

impl JsonFieldVisitor {
    fn record_string(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "event" => self.event = Some(value),
            name @ ("pass_id" | "stage" | "node") => self.context.record(name, value),
            name => {
                self.fields
                    .insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_string(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_string(field, format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanContextVisitor(SpanContext::default());
        attrs.record(&mut visitor);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.0);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        // Event fields win, then the innermost span that sets a value.
        let mut context = visitor.context;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    if context.pass_id.is_none() {
                        context.pass_id.clone_from(&span_ctx.pass_id);
                    }
                    if context.stage.is_none() {
                        context.stage.clone_from(&span_ctx.stage);
                    }
                    if context.node.is_none() {
                        context.node.clone_from(&span_ctx.node);
                    }
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let name = visitor
            .event
            .unwrap_or_else(|| event.metadata().target().to_string());
        let mut line = LogEvent::new(level, name, visitor.message.unwrap_or_default());
        line.pass_id = context.pass_id;
        line.stage = context.stage;
        line.node = context.node;
        line.fields = visitor.fields.into_iter().collect();

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line.to_jsonl());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::event_names;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<serde_json::Value> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);

        let output = buffer.lock().unwrap();
        String::from_utf8_lossy(&output)
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid json line"))
            .collect()
    }

    // ==========================================================================
    // Event naming
    // ==========================================================================

    #[test]
    fn test_event_field_names_the_line() {
        let lines = capture(|| {
            tracing::info!(event = event_names::PASS_STARTED, nodes = 3u64, "capability pass");
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["event"], "pass.started");
        assert_eq!(lines[0]["message"], "capability pass");
        assert_eq!(lines[0]["fields"]["nodes"], 3);
        assert!(lines[0]["fields"].get("event").is_none());
    }

    #[test]
    fn test_target_is_fallback_name() {
        let lines = capture(|| {
            tracing::warn!(target: "sc_core::custom", "danger");
        });
        assert_eq!(lines[0]["event"], "sc_core::custom");
        assert_eq!(lines[0]["level"], "warn");
    }

    // ==========================================================================
    // Span correlation
    // ==========================================================================

    #[test]
    fn test_span_context_propagates() {
        let lines = capture(|| {
            let pass = tracing::info_span!("pass", pass_id = "sc-20261019-000000-abcd", stage = "probe");
            let _p = pass.enter();
            let node = tracing::info_span!("node", node = "dn-2");
            let _n = node.enter();
            tracing::debug!(event = event_names::NODE_PROBED, "ok");
        });
        assert_eq!(lines[0]["pass_id"], "sc-20261019-000000-abcd");
        assert_eq!(lines[0]["stage"], "probe");
        assert_eq!(lines[0]["node"], "dn-2");
    }

    #[test]
    fn test_event_stage_overrides_span() {
        let lines = capture(|| {
            let pass = tracing::info_span!("pass", stage = "probe");
            let _p = pass.enter();
            tracing::info!(stage = "publish", "swapped");
        });
        assert_eq!(lines[0]["stage"], "publish");
    }

    // ==========================================================================
    // Field types
    // ==========================================================================

    #[test]
    fn test_typed_fields() {
        let lines = capture(|| {
            tracing::error!(count = -4i64, ratio = 0.5f64, ok = false, who = %"dn-0", "mixed");
        });
        let fields = &lines[0]["fields"];
        assert_eq!(fields["count"], -4);
        assert_eq!(fields["ratio"], 0.5);
        assert_eq!(fields["ok"], false);
        assert_eq!(fields["who"], "dn-0");
        assert!(lines[0]["ts"].is_string());
    }

    #[test]
    fn test_no_fields_omits_key() {
        let lines = capture(|| tracing::info!("bare"));
        assert!(lines[0].get("fields").is_none());
        assert!(lines[0].get("node").is_none());
    }

    // ==========================================================================
    // Pass stages
    // ==========================================================================

    #[test]
    fn test_fold_step_is_tagged() {
        use crate::aggregate::{CapabilityAggregator, GlobalContext};
        use crate::mock_node::{MockNodeBuilder, MockTopology};
        use crate::snapshot::ProbeOptions;
        use crate::topology::EngineType;

        let topology = MockTopology::new()
            .node(MockNodeBuilder::new("dn-0").version("8.0.32").build())
            .node_with_engine(MockNodeBuilder::new("col-0").build(), EngineType::Columnar);
        let aggregator = CapabilityAggregator::new(Arc::new(topology), ProbeOptions::default());

        let lines = capture(|| {
            aggregator.run(&GlobalContext::default()).unwrap();
        });
        let folded: Vec<_> = lines
            .iter()
            .filter(|l| l["event"] == event_names::CLUSTER_FOLDED)
            .collect();
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0]["stage"], "fold");
        assert_eq!(folded[0]["fields"]["nodes"], 1);
        assert_eq!(folded[0]["fields"]["skipped"], 1);
    }
}
