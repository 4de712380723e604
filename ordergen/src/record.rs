//! Timestream wire records.
//!
//! The types here mirror the JSON shapes of the Timestream `WriteRecords`
//! request. [`Record::from_order`] is the single mapping from an [`Order`] to
//! the wire: two text dimensions, one multi-measure group holding the location
//! as VARCHAR and the subtotal as DOUBLE, and a millisecond timestamp. The
//! mapping is pure and can be reversed with `Order::try_from(&Record)`.

use std::num::{ParseFloatError, ParseIntError};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::order::{self, Location, Order};

/// Name of the multi-measure group every order is written under.
pub const MEASURE_NAME: &str = "OrderMeasures";
/// Dimension carrying the order id.
pub const ORDER_ID_DIMENSION: &str = "OrderId";
/// Dimension carrying the location code.
pub const LOCATION_DIMENSION: &str = "Dim2";
/// Measure carrying the location code.
pub const LOCATION_MEASURE: &str = "locationNum";
/// Measure carrying the subtotal.
pub const SUBTOTAL_MEASURE: &str = "orderSubTotal";

const NANOS_PER_MILLI: i128 = 1_000_000;

#[derive(thiserror::Error, Debug)]
/// Errors produced when reading an [`Order`] back out of a [`Record`].
pub enum Error {
    /// A required dimension is absent.
    #[error("Record has no {0} dimension")]
    MissingDimension(&'static str),
    /// A required measure is absent or has the wrong type.
    #[error("Record has no {0} measure of the expected type")]
    MissingMeasure(&'static str),
    /// The record is not an order multi-measure record.
    #[error("Record is not an OrderMeasures multi-measure record: {0}")]
    NotAnOrder(String),
    /// The order id dimension is not a UUID.
    #[error("Invalid order id: {0}")]
    Id(#[from] uuid::Error),
    /// The location is not a known code.
    #[error(transparent)]
    Location(#[from] order::Error),
    /// The record time is not an integer.
    #[error("Invalid record time: {0}")]
    Time(#[from] ParseIntError),
    /// The record time is out of range.
    #[error("Record time out of range: {0}")]
    TimeRange(#[from] time::error::ComponentRange),
    /// The subtotal is not a floating point number.
    #[error("Invalid subtotal: {0}")]
    Subtotal(#[from] ParseFloatError),
}

/// A named text attribute of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    /// Dimension name
    pub name: String,
    /// Dimension value
    pub value: String,
}

/// The type of a measure value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasureValueType {
    /// 64-bit floating point
    Double,
    /// 64-bit integer
    Bigint,
    /// Text
    Varchar,
    /// Boolean
    Boolean,
    /// Timestamp
    Timestamp,
    /// Marks a record carrying several named measures
    Multi,
}

/// Unit of a record's `Time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    /// Milliseconds since the Unix epoch
    Milliseconds,
}

/// A single named, typed value inside a multi-measure record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeasureValue {
    /// Measure name
    pub name: String,
    /// Measure value, always string encoded on the wire
    pub value: String,
    /// Type of `value`
    #[serde(rename = "Type")]
    pub value_type: MeasureValueType,
}

/// A timestamped time-series record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Record {
    /// Record dimensions
    pub dimensions: Vec<Dimension>,
    /// Name of the measure group
    pub measure_name: String,
    /// Values in the measure group
    pub measure_values: Vec<MeasureValue>,
    /// Always [`MeasureValueType::Multi`] for records built here
    pub measure_value_type: MeasureValueType,
    /// Record time, decimal encoded
    pub time: String,
    /// Unit of `time`
    pub time_unit: TimeUnit,
}

/// The body of a `WriteRecords` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRecords {
    /// Target database
    pub database_name: String,
    /// Target table
    pub table_name: String,
    /// Records to write
    pub records: Vec<Record>,
}

impl WriteRecords {
    /// A request carrying exactly one record.
    #[must_use]
    pub fn single(database_name: &str, table_name: &str, record: Record) -> Self {
        Self {
            database_name: database_name.to_string(),
            table_name: table_name.to_string(),
            records: vec![record],
        }
    }
}

/// Milliseconds since the Unix epoch, truncated toward zero.
#[must_use]
pub fn unix_millis(at: OffsetDateTime) -> i128 {
    at.unix_timestamp_nanos() / NANOS_PER_MILLI
}

impl Record {
    /// Map an [`Order`] onto its wire record.
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        let location = order.location.to_string();
        Self {
            dimensions: vec![
                Dimension {
                    name: ORDER_ID_DIMENSION.to_string(),
                    value: order.id.to_string(),
                },
                Dimension {
                    name: LOCATION_DIMENSION.to_string(),
                    value: location.clone(),
                },
            ],
            measure_name: MEASURE_NAME.to_string(),
            measure_values: vec![
                MeasureValue {
                    name: LOCATION_MEASURE.to_string(),
                    value: location,
                    value_type: MeasureValueType::Varchar,
                },
                MeasureValue {
                    name: SUBTOTAL_MEASURE.to_string(),
                    value: format!("{:.6}", order.subtotal),
                    value_type: MeasureValueType::Double,
                },
            ],
            measure_value_type: MeasureValueType::Multi,
            time: unix_millis(order.check_in).to_string(),
            time_unit: TimeUnit::Milliseconds,
        }
    }

    fn dimension(&self, name: &'static str) -> Result<&str, Error> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
            .ok_or(Error::MissingDimension(name))
    }

    fn measure(&self, name: &'static str, value_type: MeasureValueType) -> Result<&str, Error> {
        self.measure_values
            .iter()
            .find(|m| m.name == name && m.value_type == value_type)
            .map(|m| m.value.as_str())
            .ok_or(Error::MissingMeasure(name))
    }
}

impl TryFrom<&Record> for Order {
    type Error = Error;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        if record.measure_name != MEASURE_NAME
            || record.measure_value_type != MeasureValueType::Multi
        {
            return Err(Error::NotAnOrder(record.measure_name.clone()));
        }

        let id = Uuid::parse_str(record.dimension(ORDER_ID_DIMENSION)?)?;
        let location: Location = record
            .measure(LOCATION_MEASURE, MeasureValueType::Varchar)?
            .parse()?;
        let subtotal: f64 = record
            .measure(SUBTOTAL_MEASURE, MeasureValueType::Double)?
            .parse()?;
        let millis: i128 = record.time.parse()?;
        let check_in = OffsetDateTime::from_unix_timestamp_nanos(millis * NANOS_PER_MILLI)?;

        Ok(Order {
            id,
            location,
            check_in,
            subtotal,
        })
    }
}
