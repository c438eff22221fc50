//! Snapshot iterator
//!
//! Enumerates every item created before a fixed cut, once each. Items created
//! after the cut are left for the CDC iterator.

use super::cancel::CancelToken;
use super::poller::{Availability, Feed, LoadOutcome, Loader, Sink};
use super::position::{Position, PositionMode};
use super::record::Record;
use crate::error::{Result, ResultExt};
use crate::pagination::{Cursor, ItemFields, Pagination, SnapshotQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::warn;

/// Parameters of [`Snapshot::new`]
#[derive(Debug, Clone)]
pub struct SnapshotParams {
    pub pagination: Pagination,
    pub buffer_size: usize,
    pub poll_period: Duration,
    /// Resume point, only used when it is a snapshot position with a cut
    pub position: Option<Position>,
}

/// Snapshot iterator
pub struct Snapshot {
    feed: Feed,
    initial_timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Resolve the cut, run the first load, and start polling
    pub async fn new(params: SnapshotParams, cancel: &CancelToken) -> Result<Self> {
        let resumed = params
            .position
            .filter(|p| p.mode == PositionMode::Snapshot)
            .and_then(|p| p.initial_timestamp.map(|cut| (cut, p)));

        let (initial_timestamp, position) = match resumed {
            Some(resumed) => resumed,
            None => {
                let now = Utc::now();
                (now, Position::snapshot(now))
            }
        };

        let loader = SnapshotLoader {
            fields: params.pagination.fields(),
            pagination: params.pagination,
            position,
            initial_timestamp,
            cursor: None,
        };

        let feed = Feed::start(loader, params.buffer_size, params.poll_period, cancel).await?;

        Ok(Self {
            feed,
            initial_timestamp,
        })
    }

    /// True while records are queued or the final page has not been queued yet
    pub fn has_next(&mut self) -> Result<bool> {
        Ok(self.feed.availability()? != Availability::Exhausted)
    }

    /// Wait for the next record
    pub async fn next(&mut self, cancel: &CancelToken) -> Result<Record> {
        self.feed.next(cancel).await
    }

    /// Stop polling
    pub fn stop(&mut self) {
        self.feed.stop();
    }

    /// The snapshot cut
    pub fn initial_timestamp(&self) -> DateTime<Utc> {
        self.initial_timestamp
    }
}

struct SnapshotLoader {
    pagination: Pagination,
    fields: ItemFields,
    /// Position of the last pushed record
    position: Position,
    initial_timestamp: DateTime<Utc>,
    cursor: Option<Cursor>,
}

#[async_trait]
impl Loader for SnapshotLoader {
    async fn load(&mut self, sink: &Sink) -> Result<LoadOutcome> {
        let query = SnapshotQuery {
            created_before: self.initial_timestamp,
            created_after: if self.cursor.is_none() {
                self.position.timestamp
            } else {
                None
            },
            last_item_id: self.position.last_item_id(),
            cursor: self.cursor.clone(),
        };

        let page = self
            .pagination
            .fetch_snapshot_page(&query)
            .await
            .with_context(|| format!("list {:?} items", self.pagination.resource()))?;

        for item in page.items {
            let id = item.id().context("get item's position")?;
            let created_at = match item.time_field(&self.fields.created_at) {
                Ok(created_at) => Some(created_at),
                Err(err) => {
                    warn!(
                        id,
                        error = %err,
                        "item has no usable creation date, using current time"
                    );
                    None
                }
            };

            let mut position = self.position.clone();
            position.item_id = Some(id.into());
            if created_at.is_some() {
                position.timestamp = created_at;
            }

            let record = Record::snapshot(
                position.marshal()?,
                id,
                item.into_inner(),
                created_at.unwrap_or_else(Utc::now),
            );
            sink.push(record).await?;

            self.position = position;
        }

        match page.next {
            Some(cursor) => {
                self.cursor = Some(cursor);
                Ok(LoadOutcome::More)
            }
            None => {
                sink.finish().await?;
                Ok(LoadOutcome::Finished)
            }
        }
    }
}
