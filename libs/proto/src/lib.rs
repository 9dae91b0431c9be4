//! Status notification protocol.
//!
//! Messages and client for `statusnotify.StatusNotify`, the orchestrator's
//! server-streaming status service. The code under `src/gen` is generated
//! from `proto/statusnotify.proto` by the build script.

pub mod statusnotify {
    include!("gen/statusnotify.rs");

    pub use status_notify_client::StatusNotifyClient;
}

mod error;
mod source;

pub use error::StatusStreamError;
pub use source::{GrpcStatusSource, NotificationStream, StatusSource};

impl statusnotify::StatusNotification {
    /// Notification carrying `value`.
    pub fn with_value(value: statusnotify::StatusValue) -> Self {
        Self {
            status_value: value.into(),
        }
    }

    /// Canonical name of the reported status, e.g. `"READY"`.
    ///
    /// Values this client does not know are reported as `"UNKNOWN"`.
    pub fn status_name(&self) -> &'static str {
        statusnotify::StatusValue::try_from(self.status_value)
            .map(|value| value.as_str_name())
            .unwrap_or("UNKNOWN")
    }
}
