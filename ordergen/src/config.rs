//! This module controls configuration parsing from the end user. Every field
//! has a default so an empty document, or no document at all, describes the
//! stock run: fifteen orders into `orders.checkins` in `us-east-2`.

use http::Uri;
use serde::Deserialize;

use crate::{credentials::Credentials, retry, transport};

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// A required text field is empty.
    #[error("Configuration field {0} must not be empty")]
    EmptyField(&'static str),
    /// The region cannot form a host name.
    #[error("Region {0:?} must be lowercase ASCII letters, digits and dashes")]
    InvalidRegion(String),
    /// The endpoint is not an absolute http or https URI.
    #[error("Endpoint {0} must be an absolute http or https URI")]
    InvalidEndpoint(Uri),
    /// See [`crate::retry::Error`] for details.
    #[error("Invalid retry policy: {0}")]
    Retry(#[from] retry::Error),
}

fn default_region() -> String {
    "us-east-2".to_string()
}

fn default_database() -> String {
    "orders".to_string()
}

fn default_table() -> String {
    "checkins".to_string()
}

fn default_record_count() -> u64 {
    15
}

/// Main configuration struct for this program
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The region requests are signed for and endpoints discovered in
    #[serde(default = "default_region")]
    pub region: String,
    /// The database orders are written to
    #[serde(default = "default_database")]
    pub database: String,
    /// The table orders are written to
    #[serde(default = "default_table")]
    pub table: String,
    /// The number of orders to generate and write
    #[serde(default = "default_record_count")]
    pub record_count: u64,
    /// The seed for order ids. A fresh seed is drawn when absent.
    #[serde(default)]
    pub seed: Option<[u8; 32]>,
    /// A fixed ingest endpoint. Endpoint discovery is used when absent.
    #[serde(default, with = "http_serde::option::uri")]
    pub endpoint: Option<Uri>,
    /// Static credentials. Read from the environment when absent.
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// HTTP transport tuning
    #[serde(default)]
    pub transport: transport::Config,
    /// Retry policy for failed requests
    #[serde(default)]
    pub retry: retry::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            database: default_database(),
            table: default_table(),
            record_count: default_record_count(),
            seed: None,
            endpoint: None,
            credentials: None,
            transport: transport::Config::default(),
            retry: retry::Config::default(),
        }
    }
}

impl Config {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for this struct or
    /// if [`Config::validate`] rejects it.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        // serde_yaml reads an empty document as null, not an empty mapping
        let config: Self = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if the database, table or region is empty, if the
    /// region contains characters not allowed in a host name, if the
    /// endpoint is not an absolute http or https URI, or if the retry backoff
    /// is out of bounds.
    pub fn validate(&self) -> Result<(), Error> {
        if self.region.is_empty() {
            return Err(Error::EmptyField("region"));
        }
        if self.database.is_empty() {
            return Err(Error::EmptyField("database"));
        }
        if self.table.is_empty() {
            return Err(Error::EmptyField("table"));
        }
        if !self
            .region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(Error::InvalidRegion(self.region.clone()));
        }
        if let Some(endpoint) = &self.endpoint {
            let scheme_ok = matches!(endpoint.scheme_str(), Some("http" | "https"));
            if !scheme_ok || endpoint.host().is_none() {
                return Err(Error::InvalidEndpoint(endpoint.clone()));
            }
        }
        self.retry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Error};
    use crate::{credentials::Credentials, retry, transport};

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_yaml("").expect("valid");
        assert_eq!(config, Config::default());
        assert_eq!(config.region, "us-east-2");
        assert_eq!(config.database, "orders");
        assert_eq!(config.table, "checkins");
        assert_eq!(config.record_count, 15);
        assert_eq!(config.seed, None);
        assert_eq!(config.endpoint, None);
        assert_eq!(config.credentials, None);
        assert_eq!(config.transport, transport::Config::default());
        assert_eq!(config.retry, retry::Config::default());
        assert_eq!(config.retry.max_retries, 10);
    }

    #[test]
    fn config_deserializes() {
        let contents = r#"
region: eu-west-1
database: shop
table: visits
record_count: 3
seed: [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131]
endpoint: "https://ingest-cell1.timestream.eu-west-1.amazonaws.com"
credentials:
  access_key_id: AKIDEXAMPLE
  secret_access_key: secret
  session_token: token
transport:
  idle_timeout_seconds: 10
  max_idle_connections: 4
retry:
  max_retries: 2
  max_backoff_milliseconds: 1000
"#;
        let config = Config::from_yaml(contents).expect("valid");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.database, "shop");
        assert_eq!(config.table, "visits");
        assert_eq!(config.record_count, 3);
        assert_eq!(config.seed.map(|seed| seed[31]), Some(131));
        assert_eq!(
            config.endpoint.as_ref().and_then(http::Uri::host),
            Some("ingest-cell1.timestream.eu-west-1.amazonaws.com")
        );
        assert_eq!(
            config.credentials,
            Some(Credentials::new(
                "AKIDEXAMPLE",
                "secret",
                Some("token".to_string())
            ))
        );
        assert_eq!(config.transport.idle_timeout_seconds, 10);
        assert_eq!(config.transport.max_idle_connections, 4);
        assert_eq!(config.transport.dial_timeout_seconds, 30);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_backoff_milliseconds, 30);
        assert_eq!(config.retry.max_backoff_milliseconds, 1000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            Config::from_yaml("regoin: us-east-2\n"),
            Err(Error::SerdeYaml(_))
        ));
        assert!(matches!(
            Config::from_yaml("transport:\n  idle_timeout: 3\n"),
            Err(Error::SerdeYaml(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_yaml("table: \"\"\n"),
            Err(Error::EmptyField("table"))
        ));
        assert!(matches!(
            Config::from_yaml("region: us-east-2.evil.com/\n"),
            Err(Error::InvalidRegion(_))
        ));
        assert!(matches!(
            Config::from_yaml("endpoint: /just/a/path\n"),
            Err(Error::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Config::from_yaml("endpoint: \"ftp://example.com/\"\n"),
            Err(Error::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn unbounded_backoff_is_rejected() {
        assert!(matches!(
            Config::from_yaml("retry:\n  initial_backoff_milliseconds: 18446744073709551615\n"),
            Err(Error::Retry(retry::Error::BackoffOrder { .. }))
        ));
        assert!(matches!(
            Config::from_yaml("retry:\n  max_backoff_milliseconds: 18446744073709551615\n"),
            Err(Error::Retry(retry::Error::BackoffCeiling(u64::MAX)))
        ));
        assert!(matches!(
            Config::from_yaml("retry:\n  initial_backoff_milliseconds: 0\n"),
            Err(Error::Retry(retry::Error::ZeroInitialBackoff))
        ));
    }
}
