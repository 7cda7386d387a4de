//! Profile configuration and the resolved per-run settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gnmi_common::LoggingConfig;
use serde::Deserialize;

use crate::credentials::UserCredentials;
use crate::error::Result;
use crate::transport::TlsSetup;

/// Timeout applied when neither flag nor profile sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Username used when neither flag nor profile sets one.
pub const DEFAULT_USERNAME: &str = "admin";

/// Password used when neither flag nor profile sets one.
pub const DEFAULT_PASSWORD: &str = "admin";

/// Optional JSON5 profile holding connection defaults for a target.
///
/// ```json5
/// {
///   target: { addr: "10.0.0.1", hostname: "router1", timeout: "5s" },
///   tls: { root_ca: "ca.pem", cert: "client.pem", key: "client.key" },
///   credentials: { username: "ops", password: "secret" },
///   logging: { level: "debug" },
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    #[serde(default)]
    pub target: TargetProfile,

    #[serde(default)]
    pub tls: TlsProfile,

    #[serde(default)]
    pub credentials: CredentialsProfile,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Target connectivity section of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetProfile {
    /// `host` or `host:port`.
    #[serde(default)]
    pub addr: Option<String>,

    /// Name expected in the server certificate.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Go-style duration such as "10s" or "1m30s".
    #[serde(default)]
    pub timeout: Option<String>,
}

/// TLS section of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsProfile {
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub skip_verify: bool,

    #[serde(default)]
    pub root_ca: Option<PathBuf>,

    #[serde(default)]
    pub cert: Option<PathBuf>,

    #[serde(default)]
    pub key: Option<PathBuf>,
}

/// Credentials section of a profile.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsProfile {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for CredentialsProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsProfile")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProfileConfig {
    /// Load a profile from a JSON5 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(gnmi_common::load_config(path)?)
    }

    /// Parse a profile from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(gnmi_common::parse_config(content)?)
    }
}

/// Everything one tool run needs, resolved once from flags and profile.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Dialable `host:port`.
    pub addr: String,
    pub tls: TlsSetup,
    pub credentials: UserCredentials,
    /// Deadline for dial and RPC together.
    pub timeout: Duration,
    pub logging: LoggingConfig,
}

impl SessionConfig {
    /// Plaintext session to `addr` with default credentials and timeout.
    pub fn insecure(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            tls: TlsSetup {
                insecure: true,
                ..Default::default()
            },
            credentials: UserCredentials::new(DEFAULT_USERNAME, DEFAULT_PASSWORD),
            timeout: DEFAULT_TIMEOUT,
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: UserCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
