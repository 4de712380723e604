//! Static AWS credentials.
//!
//! Credentials come from the configuration file when present and otherwise
//! from the standard `AWS_*` environment variables. Nothing is embedded in the
//! binary.

use std::{env, fmt};

use serde::Deserialize;

/// Environment variable holding the access key id.
pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable holding the secret access key.
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
/// Environment variable holding the optional session token.
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors produced by [`Credentials`].
pub enum Error {
    /// A required credential is neither configured nor in the environment.
    #[error("No {0} configured and none found in the environment")]
    Missing(&'static str),
    /// A configured credential is the empty string.
    #[error("Configured {0} is empty")]
    Empty(&'static str),
}

/// The static credential triple used to sign requests.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .finish()
    }
}

impl Credentials {
    /// Create a new [`Credentials`] instance.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Resolve credentials from `configured`, falling back to the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the access key or secret key cannot be found, or if
    /// a configured value is empty.
    pub fn resolve(configured: Option<&Credentials>) -> Result<Self, Error> {
        Self::resolve_with(configured, |key| env::var(key).ok())
    }

    /// As [`Credentials::resolve`] but reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`Credentials::resolve`].
    pub fn resolve_with<F>(configured: Option<&Credentials>, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(configured) = configured {
            if configured.access_key_id.is_empty() {
                return Err(Error::Empty("access_key_id"));
            }
            if configured.secret_access_key.is_empty() {
                return Err(Error::Empty("secret_access_key"));
            }
            return Ok(configured.clone());
        }

        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let access_key_id =
            non_empty(ACCESS_KEY_ID_VAR).ok_or(Error::Missing(ACCESS_KEY_ID_VAR))?;
        let secret_access_key =
            non_empty(SECRET_ACCESS_KEY_VAR).ok_or(Error::Missing(SECRET_ACCESS_KEY_VAR))?;
        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty(SESSION_TOKEN_VAR),
        })
    }

    /// The access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// The session token, if any.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}
