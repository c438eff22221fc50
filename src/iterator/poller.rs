//! Background polling shared by the snapshot and CDC iterators
//!
//! A [`Loader`] fetches one batch per tick and pushes records through a
//! [`Sink`]. The consumer side, [`Feed`], owns the bounded record queue, the
//! one-slot error channel and the stop signal. Exactly one producer task and
//! one consumer exist per feed.

use super::cancel::CancelToken;
use super::record::Record;
use crate::error::{Error, Result, ResultExt};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Shortest poll period, `tokio::time::interval` rejects zero
const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Queue entry
#[derive(Debug)]
pub(crate) enum Event {
    Record(Record),
    /// No record will follow
    Exhausted,
}

/// What a load step leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadOutcome {
    /// Keep polling
    More,
    /// The end marker has been pushed, stop polling
    Finished,
}

/// One load step of a sub-iterator
#[async_trait]
pub(crate) trait Loader: Send + 'static {
    async fn load(&mut self, sink: &Sink) -> Result<LoadOutcome>;
}

/// Producer side of the record queue
pub(crate) struct Sink {
    records: mpsc::Sender<Event>,
    stop: watch::Receiver<bool>,
}

impl Sink {
    /// Push a record, waiting while the queue is full
    pub(crate) async fn push(&self, record: Record) -> Result<()> {
        self.send(Event::Record(record)).await
    }

    /// Push the end marker
    pub(crate) async fn finish(&self) -> Result<()> {
        self.send(Event::Exhausted).await
    }

    async fn send(&self, event: Event) -> Result<()> {
        let mut stop = self.stop.clone();
        tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => Err(Error::Stopped),
            sent = self.records.send(event) => sent.map_err(|_| Error::Stopped),
        }
    }
}

/// What the queue can tell without waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Availability {
    /// A record is ready
    Ready,
    /// Nothing queued yet, the producer is still running
    Pending,
    /// The end marker was reached
    Exhausted,
}

enum Received {
    Record(Record),
    Exhausted,
    Closed,
    Error(Error),
    Cancelled,
}

/// Consumer side of a polling sub-iterator
pub(crate) struct Feed {
    records: mpsc::Receiver<Event>,
    errors: mpsc::Receiver<Error>,
    peeked: Option<Record>,
    exhausted: bool,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Feed {
    /// Run one load synchronously, then keep loading every `period` in a
    /// background task until stopped or finished. Firing `cancel` abandons
    /// the first load with [`Error::Cancelled`].
    ///
    /// The queue holds `capacity` records plus the end marker, so a first page
    /// of at most `capacity` items never blocks the caller.
    pub(crate) async fn start<L: Loader>(
        mut loader: L,
        capacity: usize,
        period: Duration,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let (records_tx, records_rx) = mpsc::channel(capacity.max(1) + 1);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let sink = Sink {
            records: records_tx,
            stop: stop_rx.clone(),
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = loader.load(&sink) => outcome.context("initial load records")?,
        };
        let task = match outcome {
            LoadOutcome::More => Some(tokio::spawn(poll(
                loader,
                sink,
                errors_tx,
                stop_rx,
                period.max(MIN_POLL_PERIOD),
            ))),
            LoadOutcome::Finished => None,
        };

        Ok(Self {
            records: records_rx,
            errors: errors_rx,
            peeked: None,
            exhausted: false,
            stop: stop_tx,
            task,
        })
    }

    /// Peek at the queue. A pending async error surfaces here once every
    /// record queued before it has been taken.
    pub(crate) fn availability(&mut self) -> Result<Availability> {
        if self.peeked.is_some() {
            return Ok(Availability::Ready);
        }
        if self.exhausted {
            return Ok(Availability::Exhausted);
        }

        match self.records.try_recv() {
            Ok(Event::Record(record)) => {
                self.peeked = Some(record);
                return Ok(Availability::Ready);
            }
            Ok(Event::Exhausted) => {
                self.exhausted = true;
                return Ok(Availability::Exhausted);
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }

        match self.errors.try_recv() {
            Ok(err) => Err(err.wrap("async error")),
            Err(_) => Ok(Availability::Pending),
        }
    }

    /// Wait for the next record, an async error, or cancellation
    pub(crate) async fn next(&mut self, cancel: &CancelToken) -> Result<Record> {
        if let Some(record) = self.peeked.take() {
            return Ok(record);
        }
        if self.exhausted {
            return Err(Error::SnapshotExhausted);
        }

        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => Received::Cancelled,
            event = self.records.recv() => match event {
                Some(Event::Record(record)) => Received::Record(record),
                Some(Event::Exhausted) => Received::Exhausted,
                None => Received::Closed,
            },
            Some(err) = self.errors.recv() => Received::Error(err),
        };

        match received {
            Received::Record(record) => Ok(record),
            Received::Exhausted => {
                self.exhausted = true;
                Err(Error::SnapshotExhausted)
            }
            Received::Closed => Err(Error::Stopped),
            Received::Error(err) => Err(err.wrap("async error")),
            Received::Cancelled => Err(Error::Cancelled),
        }
    }

    /// Signal the poll task to exit. Idempotent.
    pub(crate) fn stop(&mut self) {
        self.stop.send_replace(true);
        if self.task.take().is_some() {
            debug!("stop signal sent to poll loop");
        }
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}

async fn poll<L: Loader>(
    mut loader: L,
    sink: Sink,
    errors: mpsc::Sender<Error>,
    mut stop: watch::Receiver<bool>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately and the initial load already ran
    ticker.tick().await;

    debug!(?period, "poll loop started");

    loop {
        tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break,
            result = loader.load(&sink) => result,
        };

        match result {
            Ok(LoadOutcome::More) => {}
            Ok(LoadOutcome::Finished) => break,
            Err(err) if err.is_cancelled() => break,
            Err(err) => {
                tokio::select! {
                    biased;
                    _ = stop.wait_for(|stopped| *stopped) => break,
                    _ = errors.send(err.wrap("load records")) => {}
                }
            }
        }
    }

    debug!("poll loop stopped");
}
