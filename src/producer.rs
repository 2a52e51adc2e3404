//! NATS reply publisher

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::response::Reply;

/// Publishes replies to the inbox a request named
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a reply.
    ///
    /// Requests sent without a reply subject are fire-and-forget; their
    /// reply is dropped.
    pub async fn publish<T: Serialize>(
        &self,
        reply_to: Option<Subject>,
        reply: &Reply<T>,
    ) -> Result<()> {
        let Some(subject) = reply_to else {
            warn!(request_id = %reply.request_id, "Request had no reply subject, dropping reply");
            return Ok(());
        };

        let payload = serde_json::to_vec(reply)?;
        self.client.publish(subject, payload.into()).await?;

        debug!(
            request_id = %reply.request_id,
            ok = reply.is_ok(),
            "Published reply"
        );

        Ok(())
    }
}
