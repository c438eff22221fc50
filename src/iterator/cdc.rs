//! CDC iterator
//!
//! Polls for items changed after a watermark and classifies each one as a
//! create, update or delete.

use super::cancel::CancelToken;
use super::poller::{Availability, Feed, LoadOutcome, Loader, Sink};
use super::position::{Position, PositionMode};
use super::record::{Operation, Record};
use crate::error::{Result, ResultExt};
use crate::pagination::{Cursor, ItemFields, Pagination};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Parameters of [`Cdc::new`]
#[derive(Debug, Clone)]
pub struct CdcParams {
    pub pagination: Pagination,
    pub buffer_size: usize,
    pub poll_period: Duration,
    /// Starting watermark, now when absent
    pub watermark: Option<DateTime<Utc>>,
}

/// CDC iterator
pub struct Cdc {
    feed: Feed,
}

impl Cdc {
    /// Seed the watermark, run the first load, and start polling
    pub async fn new(params: CdcParams, cancel: &CancelToken) -> Result<Self> {
        let watermark = params.watermark.unwrap_or_else(Utc::now);

        let loader = CdcLoader {
            fields: params.pagination.fields(),
            pagination: params.pagination,
            watermark,
            pending: None,
        };

        let feed = Feed::start(loader, params.buffer_size, params.poll_period, cancel).await?;

        Ok(Self { feed })
    }

    /// True while records are queued
    pub fn has_next(&mut self) -> Result<bool> {
        Ok(self.feed.availability()? == Availability::Ready)
    }

    /// Wait for the next record
    pub async fn next(&mut self, cancel: &CancelToken) -> Result<Record> {
        self.feed.next(cancel).await
    }

    /// Stop polling
    pub fn stop(&mut self) {
        self.feed.stop();
    }
}

/// Decide the operation of a changed item.
///
/// A non-epoch deletion time wins, then creation strictly after the
/// watermark the query started from, otherwise it is an update.
pub fn classify(
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    watermark: DateTime<Utc>,
) -> Operation {
    if deleted_at.is_some_and(|deleted_at| deleted_at.timestamp_millis() > 0) {
        return Operation::Delete;
    }

    if created_at > watermark {
        return Operation::Create;
    }

    Operation::Update
}

struct CdcLoader {
    pagination: Pagination,
    fields: ItemFields,
    /// Update time of the last pushed record
    watermark: DateTime<Utc>,
    /// Rest of an unfinished changes query and the watermark it started from
    pending: Option<(Cursor, DateTime<Utc>)>,
}

#[async_trait]
impl Loader for CdcLoader {
    async fn load(&mut self, sink: &Sink) -> Result<LoadOutcome> {
        // a query is paged to its end before the watermark is used again, so
        // items sharing an update time across a page boundary are not skipped
        let (watermark, cursor) = match &self.pending {
            Some((cursor, started)) => (*started, Some(cursor)),
            None => (self.watermark, None),
        };
        // the boundary item of the previous query is excluded this way
        let updated_after = watermark + chrono::Duration::milliseconds(1);

        let page = self
            .pagination
            .fetch_changes(updated_after, cursor)
            .await
            .context("process updated items")?;

        for item in page.items {
            let created_at = item
                .time_field(&self.fields.created_at)
                .context("get item's creation date")?;
            let updated_at = item
                .time_field(&self.fields.updated_at)
                .context("get item's update date")?;
            let deleted_at = match &self.fields.deleted_at {
                Some(field) => item
                    .optional_time_field(field)
                    .context("get item's deleted date")?,
                None => None,
            };
            let id = item.id().context("get item's position")?;
            let advanced = self.watermark.max(updated_at);

            let position = Position {
                mode: PositionMode::Cdc,
                item_id: Some(id.into()),
                initial_timestamp: None,
                timestamp: Some(advanced),
            };
            let bytes = position.marshal()?;

            let record = match classify(created_at, deleted_at, watermark) {
                Operation::Delete => Record::delete(bytes, id, created_at),
                Operation::Create => Record::create(bytes, id, item.into_inner(), created_at),
                _ => Record::update(bytes, id, item.into_inner(), created_at),
            };
            sink.push(record).await?;

            self.watermark = advanced;
        }

        self.pending = page.next.map(|cursor| (cursor, watermark));
        Ok(LoadOutcome::More)
    }
}
