//! Writing orders.
//!
//! [`Writer`] is the seam between the order loop and the store: anything that
//! can accept a `WriteRecords` request. [`OrderWriter`] turns one [`Order`]
//! into a single-record request for a fixed database and table and hands it
//! to its writer, surfacing any failure unchanged. It never retries.

use std::{fmt, io, sync::Mutex};

use async_trait::async_trait;

use crate::{
    order::Order,
    record::{Record, WriteRecords},
    timestream,
};

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Writer`] implementations.
pub enum Error {
    /// See [`crate::timestream::Error`] for details.
    #[error(transparent)]
    Timestream(#[from] timestream::Error),
    /// Wrapper around [`std::io::Error`].
    #[error("Io error: {0}")]
    Io(#[from] io::Error),
    /// Wrapper around [`serde_json::Error`].
    #[error("Failed to serialize request: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
/// A destination for `WriteRecords` requests.
pub trait Writer: fmt::Debug + Send + Sync {
    /// Submit `request`, returning once the destination has accepted it.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination rejects or cannot receive the
    /// request.
    async fn write_records(&self, request: &WriteRecords) -> Result<(), Error>;
}

#[async_trait]
impl<W> Writer for Box<W>
where
    W: Writer + ?Sized,
{
    async fn write_records(&self, request: &WriteRecords) -> Result<(), Error> {
        (**self).write_records(request).await
    }
}

#[async_trait]
impl<W> Writer for &W
where
    W: Writer + ?Sized,
{
    async fn write_records(&self, request: &WriteRecords) -> Result<(), Error> {
        (**self).write_records(request).await
    }
}

/// Writes [`Order`] instances, one record per request.
#[derive(Debug)]
pub struct OrderWriter<W> {
    writer: W,
    database: String,
    table: String,
}

impl<W> OrderWriter<W>
where
    W: Writer,
{
    /// Create a new [`OrderWriter`] targeting `database` and `table`.
    #[must_use]
    pub fn new(writer: W, database: &str, table: &str) -> Self {
        Self {
            writer,
            database: database.to_string(),
            table: table.to_string(),
        }
    }

    /// Write `order` as a single record.
    ///
    /// # Errors
    ///
    /// Returns the writer's error unchanged.
    pub async fn insert(&self, order: &Order) -> Result<(), Error> {
        let request =
            WriteRecords::single(&self.database, &self.table, Record::from_order(order));
        self.writer.write_records(&request).await
    }
}

/// A [`Writer`] that prints each request as a line of JSON instead of sending
/// it anywhere.
#[derive(Debug)]
pub struct DryRun<O> {
    out: Mutex<O>,
}

impl<O> DryRun<O> {
    /// Create a new [`DryRun`] writing to `out`.
    #[must_use]
    pub fn new(out: O) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the sink.
    #[must_use]
    pub fn into_inner(self) -> O {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl<O> Writer for DryRun<O>
where
    O: io::Write + fmt::Debug + Send,
{
    async fn write_records(&self, request: &WriteRecords) -> Result<(), Error> {
        let line = serde_json::to_string(request)?;
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}
