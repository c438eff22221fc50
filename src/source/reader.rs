//! Source host over the combined iterator

use crate::config::ConnectorConfig;
use crate::error::{Error, Result, ResultExt};
use crate::hubspot::{HubSpotClient, ResourceApi, ResourceRegistry};
use crate::iterator::{CancelToken, Combined, CombinedParams, Position, Record};
use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Reads change records of one resource
pub struct Source {
    resource: String,
    iterator: Option<Combined>,
}

impl Source {
    /// Validate the config, parse the position and start iterating.
    ///
    /// An empty position starts fresh, a malformed one is an error. Firing
    /// `cancel` abandons the first page load.
    pub async fn open(
        config: &ConnectorConfig,
        position: &[u8],
        registry: Arc<ResourceRegistry>,
        api: Arc<dyn ResourceApi>,
        cancel: &CancelToken,
    ) -> Result<Self> {
        config.validate(&registry).context("validate config")?;
        let position = Position::parse_optional(position).context("parse position")?;

        let params = CombinedParams {
            registry,
            api,
            resource: config.resource.clone(),
            buffer_size: config.source.buffer_size,
            poll_period: config.source.poll_period(),
            extra_properties: config.source.extra_properties.clone(),
            position,
            snapshot: config.source.snapshot,
        };
        let iterator = Combined::new(params, cancel)
            .await
            .context("create combined iterator")?;

        info!(resource = %config.resource, "source opened");

        Ok(Self {
            resource: config.resource.clone(),
            iterator: Some(iterator),
        })
    }

    /// Open against the HubSpot API
    pub async fn connect(
        config: &ConnectorConfig,
        position: &[u8],
        registry: Arc<ResourceRegistry>,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let client = HubSpotClient::new(config.client_config(), registry.clone())
            .context("create api client")?;

        Self::open(config, position, registry, Arc::new(client), cancel).await
    }

    /// Resource this source reads
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Next record, or `None` when nothing is ready and the caller should
    /// back off before asking again
    pub async fn read(&mut self, cancel: &CancelToken) -> Result<Option<Record>> {
        let iterator = self.iterator.as_mut().ok_or(Error::NoInitializedIterator)?;

        if !iterator.has_next(cancel).await.context("has next")? {
            return Ok(None);
        }

        iterator.next(cancel).await.context("next").map(Some)
    }

    /// Acknowledge a delivered position. Nothing is committed upstream.
    pub fn ack(&self, position: &[u8]) {
        debug!(
            resource = %self.resource,
            position = %String::from_utf8_lossy(position),
            "got ack"
        );
    }

    /// Stop the iterator. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut iterator) = self.iterator.take() {
            iterator.stop();
            info!(resource = %self.resource, "source stopped");
        }
    }

    /// Stream records, sleeping `backoff` whenever nothing is ready.
    ///
    /// The stream ends on cancellation and after yielding the first error.
    pub fn into_stream(
        self,
        cancel: CancelToken,
        backoff: Duration,
    ) -> impl Stream<Item = Result<Record>> {
        stream::unfold(Some((self, cancel)), move |state| async move {
            let (mut source, cancel) = state?;

            loop {
                match source.read(&cancel).await {
                    Ok(Some(record)) => return Some((Ok(record), Some((source, cancel)))),
                    Ok(None) => {
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => return None,
                            () = tokio::time::sleep(backoff) => {}
                        }
                    }
                    Err(err) if err.is_cancelled() => return None,
                    Err(err) => return Some((Err(err), None)),
                }
            }
        })
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        self.teardown();
    }
}
