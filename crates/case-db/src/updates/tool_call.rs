//! Tool call update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;

use case_core::entities::ToolCall;
use case_core::enums::ToolCallStatus;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCallUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Option<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCallUpdate {
    /// A finished status stamps `completed_at`; if no duration was given it
    /// is derived from `started_at`.
    pub(crate) fn apply(&self, call: &mut ToolCall, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            call.status = status;
            if status.is_finished() {
                call.completed_at.get_or_insert(now);
                if self.duration_ms.is_none() && call.duration_ms.is_none() {
                    let elapsed = now.signed_duration_since(call.started_at).num_milliseconds();
                    call.duration_ms = u64::try_from(elapsed).ok();
                }
            }
        }
        if let Some(ref output) = self.output {
            call.output.clone_from(output);
        }
        if let Some(ref error) = self.error_message {
            call.error_message.clone_from(error);
        }
        if let Some(duration) = self.duration_ms {
            call.duration_ms = Some(duration);
        }
    }
}

pub struct ToolCallUpdateBuilder(ToolCallUpdate);

impl ToolCallUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(ToolCallUpdate::default())
    }

    #[must_use]
    pub const fn status(mut self, status: ToolCallStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn output(mut self, output: Option<serde_json::Value>) -> Self {
        self.0.output = Some(output);
        self
    }

    #[must_use]
    pub fn error_message(mut self, error: Option<String>) -> Self {
        self.0.error_message = Some(error);
        self
    }

    #[must_use]
    pub const fn duration_ms(mut self, duration: u64) -> Self {
        self.0.duration_ms = Some(duration);
        self
    }

    #[must_use]
    pub fn build(self) -> ToolCallUpdate {
        self.0
    }
}

impl Default for ToolCallUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
