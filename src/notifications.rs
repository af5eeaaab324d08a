//! Fire-and-forget notification sink. The dispatcher spawns these as
//! background tasks; a delivery failure here must never affect the
//! handler's result, so every method returns nothing and never panics.

use std::time::Duration;

pub trait NotificationSink: Send + Sync {
    fn on_start(&self, tool_name: &str);
    fn on_success(&self, tool_name: &str, elapsed: Duration);
    fn on_error(&self, tool_name: &str, error_kind: &str);
    fn on_business_event(&self, event: &str, detail: &str);
}

/// Default sink: structured log lines. Good enough to watch tool traffic
/// without standing up a separate metrics backend.
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn on_start(&self, tool_name: &str) {
        tracing::debug!(tool = tool_name, "tool invocation started");
    }

    fn on_success(&self, tool_name: &str, elapsed: Duration) {
        tracing::info!(tool = tool_name, elapsed_ms = elapsed.as_millis() as u64, "tool invocation succeeded");
    }

    fn on_error(&self, tool_name: &str, error_kind: &str) {
        tracing::warn!(tool = tool_name, error_kind, "tool invocation failed");
    }

    fn on_business_event(&self, event: &str, detail: &str) {
        tracing::info!(event, detail, "business event");
    }
}

/// TAM values above this threshold and forecast CAGRs above this rate are
/// surfaced as business events, not just successful calls.
pub const LARGE_TAM_THRESHOLD: f64 = 1e12;
pub const LARGE_CAGR_THRESHOLD: f64 = 0.5;
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        errors: Arc<AtomicUsize>,
    }

    impl NotificationSink for CountingSink {
        fn on_start(&self, _tool_name: &str) {}
        fn on_success(&self, _tool_name: &str, _elapsed: Duration) {}
        fn on_error(&self, _tool_name: &str, _error_kind: &str) {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        fn on_business_event(&self, _event: &str, _detail: &str) {}
    }

    #[test]
    fn sink_is_object_safe_and_invocable_through_a_trait_object() {
        let errors = Arc::new(AtomicUsize::new(0));
        let sink: Box<dyn NotificationSink> = Box::new(CountingSink { errors: errors.clone() });
        sink.on_error("tam_calculator", "Internal");
        assert_eq!(errors.load(Ordering::Relaxed), 1);
    }
}
