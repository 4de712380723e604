//! The counted generation loop.
//!
//! Each iteration generates one order, prints it to the console and writes it,
//! awaiting the write before the next order is generated. The first failure
//! ends the run; nothing is retried at this level.

use std::io;

use time::OffsetDateTime;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    order::Generator,
    writer::{self, OrderWriter, Writer},
};

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`run`].
pub enum Error {
    /// Writing an order failed.
    #[error("Failed to write order {index} ({id}): {source}")]
    Write {
        /// Index of the order in the run
        index: u64,
        /// Id of the order
        id: Uuid,
        /// Underlying writer error
        #[source]
        source: writer::Error,
    },
    /// The console could not be written to.
    #[error("Failed to print order: {0}")]
    Console(#[from] io::Error),
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Orders written
    pub written: u64,
}

/// Generate and write `count` orders, printing each to `console` before it is
/// submitted.
///
/// # Errors
///
/// Returns the first write or console error. Orders after the failing one are
/// never generated.
pub async fn run<W, O>(
    writer: &OrderWriter<W>,
    generator: &mut Generator,
    count: u64,
    console: &mut O,
) -> Result<Summary, Error>
where
    W: Writer,
    O: io::Write,
{
    info!(count, "writing orders");
    let mut written = 0;
    for _ in 0..count {
        let index = generator.index();
        let order = generator.next_order(OffsetDateTime::now_utc());
        writeln!(console, "{order}")?;

        if let Err(source) = writer.insert(&order).await {
            error!(index, id = %order.id, "write failed: {source}");
            return Err(Error::Write {
                index,
                id: order.id,
                source,
            });
        }
        debug!(index, id = %order.id, "order written");
        written += 1;
    }
    info!(written, "all orders written");
    Ok(Summary { written })
}
