//! The ordergen synthetic order writer.
//!
//! This library supports the ordergen binary found elsewhere in this
//! project. It generates synthetic retail check-in orders, maps each one onto
//! a Timestream multi-measure record and submits them one at a time through
//! the AWS SDK, carried over a pooled HTTP/2 client.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod credentials;
pub mod order;
pub mod record;
pub mod retry;
pub mod run;
pub mod timestream;
pub mod transport;
pub mod writer;
