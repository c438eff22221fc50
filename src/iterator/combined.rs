//! Combined iterator
//!
//! Single entry point for the host. Starts in snapshot mode unless told
//! otherwise and hands over to CDC, once, when the snapshot is exhausted.

use super::cancel::CancelToken;
use super::cdc::{Cdc, CdcParams};
use super::position::{Position, PositionMode};
use super::record::Record;
use super::snapshot::{Snapshot, SnapshotParams};
use crate::error::{Error, Result, ResultExt};
use crate::hubspot::{ResourceApi, ResourceRegistry};
use crate::pagination::Pagination;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Parameters of [`Combined::new`]
#[derive(Clone)]
pub struct CombinedParams {
    pub registry: Arc<ResourceRegistry>,
    pub api: Arc<dyn ResourceApi>,
    pub resource: String,
    pub buffer_size: usize,
    pub poll_period: Duration,
    pub extra_properties: Vec<String>,
    pub position: Option<Position>,
    pub snapshot: bool,
}

enum Active {
    Snapshot(Snapshot),
    Cdc(Cdc),
}

/// Combined snapshot and CDC iterator
pub struct Combined {
    active: Option<Active>,
    pagination: Pagination,
    buffer_size: usize,
    poll_period: Duration,
}

impl Combined {
    /// Pick the starting mode from the position and the snapshot flag. The
    /// first page is loaded before this returns, `cancel` abandons it.
    pub async fn new(params: CombinedParams, cancel: &CancelToken) -> Result<Self> {
        let pagination = Pagination::for_resource(
            &params.registry,
            &params.resource,
            params.api,
            params.buffer_size,
            params.extra_properties,
        )?;

        let mode = params.position.as_ref().map(|p| p.mode);
        let active = match (params.snapshot, mode) {
            (true, None | Some(PositionMode::Snapshot)) => {
                let params = SnapshotParams {
                    pagination: pagination.clone(),
                    buffer_size: params.buffer_size,
                    poll_period: params.poll_period,
                    position: params.position,
                };
                let snapshot = Snapshot::new(params, cancel)
                    .await
                    .context("init snapshot iterator")?;
                Active::Snapshot(snapshot)
            }
            (false, _) | (_, Some(PositionMode::Cdc)) => {
                let params = CdcParams {
                    pagination: pagination.clone(),
                    buffer_size: params.buffer_size,
                    poll_period: params.poll_period,
                    watermark: params.position.as_ref().and_then(cdc_watermark),
                };
                let cdc = Cdc::new(params, cancel)
                    .await
                    .context("init cdc iterator")?;
                Active::Cdc(cdc)
            }
        };

        debug!(
            resource = pagination.resource(),
            pagination = pagination.kind(),
            mode = active.mode().as_str(),
            "iterator initialized"
        );

        Ok(Self {
            active: Some(active),
            pagination,
            buffer_size: params.buffer_size,
            poll_period: params.poll_period,
        })
    }

    /// Check if a record can be taken. Switches to CDC when the snapshot is
    /// exhausted.
    pub async fn has_next(&mut self, cancel: &CancelToken) -> Result<bool> {
        if let Some(Active::Snapshot(snapshot)) = &mut self.active {
            if snapshot.has_next().context("snapshot has next")? {
                return Ok(true);
            }

            debug!("switching to the CDC mode");
            let initial_timestamp = snapshot.initial_timestamp();
            self.switch_to_cdc(initial_timestamp, cancel)
                .await
                .context("switch to cdc iterator")?;
        }

        match &mut self.active {
            Some(Active::Cdc(cdc)) => cdc.has_next().context("cdc has next"),
            Some(Active::Snapshot(_)) | None => Ok(false),
        }
    }

    /// Wait for the next record. Reaching the end of the snapshot while
    /// waiting switches to CDC and keeps waiting there.
    pub async fn next(&mut self, cancel: &CancelToken) -> Result<Record> {
        if let Some(Active::Snapshot(snapshot)) = &mut self.active {
            match snapshot.next(cancel).await {
                Ok(record) => return Ok(record),
                Err(Error::SnapshotExhausted) => {
                    debug!("switching to the CDC mode");
                    let initial_timestamp = snapshot.initial_timestamp();
                    self.switch_to_cdc(initial_timestamp, cancel)
                        .await
                        .context("switch to cdc iterator")?;
                }
                Err(err) => return Err(err.wrap("snapshot next")),
            }
        }

        match &mut self.active {
            Some(Active::Cdc(cdc)) => cdc.next(cancel).await.context("cdc next"),
            Some(Active::Snapshot(_)) | None => Err(Error::NoInitializedIterator),
        }
    }

    /// Stop the active sub-iterator. Idempotent.
    pub fn stop(&mut self) {
        match self.active.take() {
            Some(Active::Snapshot(mut snapshot)) => snapshot.stop(),
            Some(Active::Cdc(mut cdc)) => cdc.stop(),
            None => {}
        }
    }

    /// Mode of the active sub-iterator, `None` once stopped
    pub fn mode(&self) -> Option<PositionMode> {
        self.active.as_ref().map(Active::mode)
    }

    async fn switch_to_cdc(
        &mut self,
        initial_timestamp: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let params = CdcParams {
            pagination: self.pagination.clone(),
            buffer_size: self.buffer_size,
            poll_period: self.poll_period,
            watermark: Some(initial_timestamp),
        };

        let cdc = Cdc::new(params, cancel)
            .await
            .context("init cdc iterator")?;

        if let Some(Active::Snapshot(mut snapshot)) = self.active.replace(Active::Cdc(cdc)) {
            snapshot.stop();
        }

        Ok(())
    }
}

impl Active {
    fn mode(&self) -> PositionMode {
        match self {
            Self::Snapshot(_) => PositionMode::Snapshot,
            Self::Cdc(_) => PositionMode::Cdc,
        }
    }
}

impl Drop for Combined {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watermark a CDC iterator resumes from. A snapshot position resumes from
/// its cut.
fn cdc_watermark(position: &Position) -> Option<DateTime<Utc>> {
    match position.mode {
        PositionMode::Cdc => position.timestamp,
        PositionMode::Snapshot => position.initial_timestamp,
    }
}
