//! Request context and gNMI credential metadata.
//!
//! gNMI targets authenticate clients from plain `username` and `password`
//! metadata headers sent with each RPC (openconfig gnmi-authentication).

use std::time::Duration;

use tokio::time::Instant;
use tonic::Request;
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};

use crate::error::{GnmiError, Result};

/// Metadata key carrying the username.
pub const USERNAME_KEY: &str = "username";

/// Metadata key carrying the password.
pub const PASSWORD_KEY: &str = "password";

/// Username/password pair attached to outgoing requests.
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

impl UserCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outgoing metadata plus an optional absolute deadline for one RPC.
///
/// Derivations return new contexts; an existing context is never modified.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    metadata: MetadataMap,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without metadata or deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            metadata: MetadataMap::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Copy of this context carrying `metadata` instead.
    pub fn with_metadata(&self, metadata: MetadataMap) -> Self {
        Self {
            metadata,
            deadline: self.deadline,
        }
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Wrap `message` in a request carrying this context's metadata and the
    /// remaining time as `grpc-timeout`.
    pub fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        *request.metadata_mut() = self.metadata.clone();
        if let Some(remaining) = self.remaining() {
            request.set_timeout(remaining);
        }
        request
    }
}

/// Return a new context whose metadata carries `credentials`.
///
/// Existing metadata is kept. `username` is always set (replacing an earlier
/// value); `password` only when non-empty.
pub fn attach_credentials(
    ctx: &RequestContext,
    credentials: &UserCredentials,
) -> Result<RequestContext> {
    if credentials.username.is_empty() {
        return Err(GnmiError::Credentials(
            "username must be provided".to_string(),
        ));
    }

    let mut metadata = ctx.metadata().clone();

    let username = MetadataValue::<Ascii>::try_from(credentials.username.as_str()).map_err(|_| {
        GnmiError::Credentials("username is not a valid metadata value".to_string())
    })?;
    metadata.insert(USERNAME_KEY, username);

    if !credentials.password.is_empty() {
        let password = MetadataValue::<Ascii>::try_from(credentials.password.as_str()).map_err(|_| {
            GnmiError::Credentials("password is not a valid metadata value".to_string())
        })?;
        metadata.insert(PASSWORD_KEY, password);
    }

    Ok(ctx.with_metadata(metadata))
}
