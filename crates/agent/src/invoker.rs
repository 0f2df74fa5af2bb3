//! Tool invocation under a deadline.
//!
//! Each call runs in its own task so a panicking tool cannot take the
//! session down with it. Calls are never retried.

use chrono::Utc;
use jarvis_core::event::{DomainEvent, EventBus};
use jarvis_core::intent::ResolvedIntent;
use jarvis_core::tool::{ToolErrorKind, ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the tool named by `intent` and normalize the outcome.
    ///
    /// Never returns an error: timeouts, panics and tool failures all come
    /// back as `ToolResult::Failure`.
    pub async fn invoke(&self, intent: &ResolvedIntent) -> ToolResult {
        let ResolvedIntent::ToolCall {
            tool_name, arguments, ..
        } = intent
        else {
            return ToolResult::failure(ToolErrorKind::UnknownTool, "no tool was requested");
        };

        let descriptor = match self.registry.lookup(tool_name) {
            Ok(d) => d,
            Err(e) => return e.into(),
        };

        let arguments = descriptor.schema.apply_defaults(arguments);
        let handle = descriptor.handle.clone();
        let start = Instant::now();

        let mut task = tokio::spawn(async move { handle.invoke(arguments).await });

        let result = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Ok(payload))) => ToolResult::success(payload),
            Ok(Ok(Err(e))) => {
                warn!(tool = %tool_name, error = %e, "Tool execution failed");
                e.into()
            }
            Ok(Err(join_err)) => {
                warn!(tool = %tool_name, error = %join_err, "Tool task aborted");
                let reason = if join_err.is_panic() {
                    "the tool panicked"
                } else {
                    "the tool task was cancelled"
                };
                ToolResult::failure(ToolErrorKind::ExecutionFailed, format!("{tool_name}: {reason}"))
            }
            Err(_) => {
                task.abort();
                warn!(tool = %tool_name, timeout_ms = self.timeout.as_millis() as u64, "Tool timed out");
                ToolResult::failure(
                    ToolErrorKind::Timeout,
                    format!("{tool_name} did not finish within {} ms", self.timeout.as_millis()),
                )
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(tool = %tool_name, success = result.is_success(), duration_ms, "Tool invoked");

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolInvoked {
                tool_name: tool_name.clone(),
                success: result.is_success(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }

        result
    }
}
