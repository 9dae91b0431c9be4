//! Status notification sources.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use tonic::transport::Endpoint;
use tracing::debug;

use crate::error::StatusStreamError;
use crate::statusnotify::{StatusNotification, StatusNotifyClient, StatusRegistration};

/// Notifications of one registration, in server order.
///
/// Dropping the stream closes the registration and its connection.
pub type NotificationStream =
    Pin<Box<dyn Stream<Item = Result<StatusNotification, tonic::Status>> + Send>>;

/// Opens status notification streams.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Open a connection and register for notifications.
    async fn register(
        &self,
        registration: StatusRegistration,
    ) -> Result<NotificationStream, StatusStreamError>;
}

/// [`StatusSource`] backed by the orchestrator's gRPC status service.
///
/// Each registration uses its own connection.
#[derive(Debug, Clone)]
pub struct GrpcStatusSource {
    endpoint: String,
    connect_timeout: Duration,
}

impl GrpcStatusSource {
    /// `endpoint` must carry a scheme, e.g. `http://orchestrator:9081`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StatusSource for GrpcStatusSource {
    async fn register(
        &self,
        registration: StatusRegistration,
    ) -> Result<NotificationStream, StatusStreamError> {
        let endpoint = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|source| StatusStreamError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                source,
            })?
            .connect_timeout(self.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|source| StatusStreamError::Connect {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        debug!(
            endpoint = %self.endpoint,
            client_id = %registration.client_id,
            "Registering for status notifications"
        );

        let response = StatusNotifyClient::new(channel)
            .status_register(registration)
            .await
            .map_err(StatusStreamError::Register)?;

        Ok(Box::pin(response.into_inner()))
    }
}
