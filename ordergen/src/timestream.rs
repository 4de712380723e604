//! The Timestream write client.
//!
//! A thin wrapper over `aws-sdk-timestreamwrite`. The SDK signs each request,
//! retries with its standard strategy and, unless an endpoint is configured,
//! discovers the ingest endpoint with `DescribeEndpoints` and keeps it fresh
//! in a background task. Requests travel over [`crate::transport::Transport`].

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::{Credentials as AwsCredentials, provider::SharedCredentialsProvider};
use aws_sdk_timestreamwrite::{
    Client,
    error::{BuildError, DisplayErrorContext, SdkError},
    operation::write_records::WriteRecordsError,
    types,
};
use aws_smithy_runtime_api::box_error::BoxError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    config::Config,
    credentials::{self, Credentials},
    record::{self, MeasureValueType, TimeUnit, WriteRecords},
    transport::{self, Transport},
    writer::{self, Writer},
};

/// Name the resolved credentials are reported under.
pub const PROVIDER_NAME: &str = "ordergen";

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Timestream`].
pub enum Error {
    /// See [`crate::credentials::Error`] for details.
    #[error(transparent)]
    Credentials(#[from] credentials::Error),
    /// See [`crate::transport::Error`] for details.
    #[error(transparent)]
    Transport(#[from] transport::Error),
    /// The initial `DescribeEndpoints` call failed.
    #[error("Endpoint discovery failed: {0}")]
    Discovery(BoxError),
    /// A record could not be expressed as an SDK record.
    #[error("Invalid record: {0}")]
    Build(#[from] BuildError),
    /// `WriteRecords` failed after the SDK exhausted its retries.
    #[error("WriteRecords failed: {}", DisplayErrorContext(.0.as_ref()))]
    WriteRecords(Box<SdkError<WriteRecordsError>>),
}

impl From<SdkError<WriteRecordsError>> for Error {
    fn from(err: SdkError<WriteRecordsError>) -> Self {
        Error::WriteRecords(Box::new(err))
    }
}

/// Counts of records the service ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordsIngested {
    /// Records ingested in total
    pub total: i32,
    /// Records ingested into the memory store
    pub memory_store: i32,
    /// Records ingested into the magnetic store
    pub magnetic_store: i32,
}

/// A signed, retrying Timestream client.
#[derive(Debug)]
pub struct Timestream {
    client: Client,
    reload: Option<JoinHandle<()>>,
}

impl Timestream {
    /// Build a client from `config`.
    ///
    /// With a configured endpoint no connection is made until the first
    /// write. Otherwise the ingest endpoint is discovered here and refreshed
    /// in the background for the life of the client.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials cannot be resolved, if the transport
    /// cannot be built or if endpoint discovery fails.
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let credentials = Credentials::resolve(config.credentials.as_ref())?;
        let transport = Transport::new(&config.transport)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(SharedCredentialsProvider::new(sdk_credentials(
                &credentials,
            )))
            .retry_config(config.retry.sdk_config())
            .timeout_config(config.transport.sdk_timeouts())
            .http_client(transport);
        if let Some(endpoint) = &config.endpoint {
            info!(endpoint = %endpoint, "using configured endpoint");
            loader = loader.endpoint_url(endpoint.to_string().trim_end_matches('/'));
        }
        let client = Client::new(&loader.load().await);

        if config.endpoint.is_some() {
            return Ok(Self {
                client,
                reload: None,
            });
        }

        let (client, reload) = client
            .with_endpoint_discovery_enabled()
            .await
            .map_err(Error::Discovery)?;
        info!(region = %config.region, "discovered ingest endpoint");
        Ok(Self {
            client,
            reload: Some(tokio::spawn(reload.reload_task())),
        })
    }

    /// Submit a `WriteRecords` request.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be converted or if the write fails
    /// after retries are exhausted.
    pub async fn write_records(&self, request: &WriteRecords) -> Result<RecordsIngested, Error> {
        let records = request
            .records
            .iter()
            .map(sdk_record)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .write_records()
            .database_name(&request.database_name)
            .table_name(&request.table_name)
            .set_records(Some(records))
            .send()
            .await?;

        let ingested = output
            .records_ingested()
            .map(|ingested| RecordsIngested {
                total: ingested.total(),
                memory_store: ingested.memory_store(),
                magnetic_store: ingested.magnetic_store(),
            })
            .unwrap_or_default();
        debug!(
            total = ingested.total,
            memory_store = ingested.memory_store,
            magnetic_store = ingested.magnetic_store,
            "records ingested"
        );
        Ok(ingested)
    }
}

impl Drop for Timestream {
    fn drop(&mut self) {
        if let Some(reload) = self.reload.take() {
            reload.abort();
        }
    }
}

fn sdk_credentials(credentials: &Credentials) -> AwsCredentials {
    AwsCredentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        credentials.session_token().map(str::to_string),
        None,
        PROVIDER_NAME,
    )
}

fn sdk_value_type(value_type: MeasureValueType) -> types::MeasureValueType {
    match value_type {
        MeasureValueType::Double => types::MeasureValueType::Double,
        MeasureValueType::Bigint => types::MeasureValueType::Bigint,
        MeasureValueType::Varchar => types::MeasureValueType::Varchar,
        MeasureValueType::Boolean => types::MeasureValueType::Boolean,
        MeasureValueType::Timestamp => types::MeasureValueType::Timestamp,
        MeasureValueType::Multi => types::MeasureValueType::Multi,
    }
}

fn sdk_time_unit(time_unit: TimeUnit) -> types::TimeUnit {
    match time_unit {
        TimeUnit::Milliseconds => types::TimeUnit::Milliseconds,
    }
}

/// Express `record` as the SDK's record type.
///
/// # Errors
///
/// Returns an error if a dimension or measure lacks a required field.
pub fn sdk_record(record: &record::Record) -> Result<types::Record, BuildError> {
    let dimensions = record
        .dimensions
        .iter()
        .map(|dimension| {
            types::Dimension::builder()
                .name(&dimension.name)
                .value(&dimension.value)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;
    let measure_values = record
        .measure_values
        .iter()
        .map(|measure| {
            types::MeasureValue::builder()
                .name(&measure.name)
                .value(&measure.value)
                .r#type(sdk_value_type(measure.value_type))
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(types::Record::builder()
        .set_dimensions(Some(dimensions))
        .measure_name(&record.measure_name)
        .set_measure_values(Some(measure_values))
        .measure_value_type(sdk_value_type(record.measure_value_type))
        .time(&record.time)
        .time_unit(sdk_time_unit(record.time_unit))
        .build())
}

#[async_trait::async_trait]
impl Writer for Timestream {
    async fn write_records(&self, request: &WriteRecords) -> Result<(), writer::Error> {
        Timestream::write_records(self, request).await?;
        Ok(())
    }
}
