//! Command-line arguments shared by the gNMI tools.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, CommandFactory, Parser};

use crate::config::{
    DEFAULT_PASSWORD, DEFAULT_TIMEOUT, DEFAULT_USERNAME, ProfileConfig, SessionConfig,
};
use crate::credentials::UserCredentials;
use crate::error::{GnmiError, Result};
use crate::target::resolve_target;
use crate::transport::TlsSetup;

/// Connection, TLS and credential flags common to every tool.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// CA certificate file in PEM format.
    #[arg(long = "rootCA", value_name = "FILE")]
    pub root_ca: Option<PathBuf>,

    /// Client certificate file in PEM format.
    #[arg(long, value_name = "FILE")]
    pub cert: Option<PathBuf>,

    /// Client private key file.
    #[arg(long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// The username to authenticate against target [default: admin].
    #[arg(long)]
    pub username: Option<String>,

    /// The password to authenticate against target [default: admin].
    #[arg(long)]
    pub password: Option<String>,

    /// The target hostname used to verify the hostname returned by TLS handshake.
    #[arg(long)]
    pub hostname: Option<String>,

    /// The target address in the format of host[:port], by default port is 57400.
    #[arg(long)]
    pub addr: Option<String>,

    /// Insecure connection.
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        default_value_t = false
    )]
    pub insecure: bool,

    /// Disable certificate validation during TLS session ramp-up.
    #[arg(
        long = "skip_verify",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        default_value_t = false
    )]
    pub skip_verify: bool,

    /// Connection timeout, e.g. 10s, 1m30s, 500ms [default: 10s].
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// JSON5 profile with target, TLS, credential and logging defaults.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl ConnectionArgs {
    /// Merge flags with the optional profile into a [`SessionConfig`].
    ///
    /// Flags win over profile values, which win over built-in defaults.
    /// Boolean switches are enabled if either source enables them.
    pub fn resolve(&self) -> Result<SessionConfig> {
        let profile = match &self.config {
            Some(path) => ProfileConfig::load(path)?,
            None => ProfileConfig::default(),
        };
        self.resolve_with(profile)
    }

    /// Like [`resolve`](Self::resolve) with an already-loaded profile.
    pub fn resolve_with(&self, profile: ProfileConfig) -> Result<SessionConfig> {
        let ProfileConfig {
            target,
            tls,
            credentials,
            logging,
        } = profile;

        let addr = self.addr.clone().or(target.addr).unwrap_or_default();
        let addr = resolve_target(&addr)?;

        let timeout = match (self.timeout, target.timeout) {
            (Some(timeout), _) => timeout,
            (None, Some(raw)) => parse_duration(&raw).map_err(|e| {
                GnmiError::Config(gnmi_common::Error::Config(format!(
                    "invalid target timeout in profile: {}",
                    e
                )))
            })?,
            (None, None) => DEFAULT_TIMEOUT,
        };

        let tls = TlsSetup {
            insecure: self.insecure || tls.insecure,
            skip_verify: self.skip_verify || tls.skip_verify,
            target_hostname: self.hostname.clone().or(target.hostname).unwrap_or_default(),
            root_ca: self.root_ca.clone().or(tls.root_ca),
            cert: self.cert.clone().or(tls.cert),
            key: self.key.clone().or(tls.key),
        };

        let credentials = UserCredentials::new(
            self.username
                .clone()
                .or(credentials.username)
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            self.password
                .clone()
                .or(credentials.password)
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        );

        Ok(SessionConfig {
            addr,
            tls,
            credentials,
            timeout,
            logging: logging.with_level_override(self.log_level.as_deref()),
        })
    }
}

/// Rewrite Go-style single-dash long flags (`-addr`, `-skip_verify=true`)
/// into the `--` form clap expects.
///
/// Only names that `command` defines as long flags are rewritten; the first
/// item (program name), short flags, and values are passed through. As with
/// Go's flag package, the token after a value-taking flag is always its
/// value: `-username -insecure` sets the username to "-insecure". Such pairs
/// are joined into `--name=value` so clap accepts values starting with `-`.
pub fn normalize_go_flags<I, T>(args: I, command: &clap::Command) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let longs: Vec<&str> = command
        .get_arguments()
        .filter_map(|a| a.get_long())
        .chain(["help", "version"])
        .collect();
    // Switches with an optional `=value` never consume the next token.
    let with_value: Vec<&str> = command
        .get_arguments()
        .filter(|a| a.get_action().takes_values() && !a.is_require_equals_set())
        .filter_map(|a| a.get_long())
        .collect();

    let mut args = args.into_iter().map(Into::into);
    let mut normalized: Vec<OsString> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        let Some(s) = arg.to_str() else {
            normalized.push(arg);
            continue;
        };
        if s == "--" {
            normalized.push(arg);
            normalized.extend(args.by_ref());
            break;
        }

        let Some(name) = long_flag_name(s, &longs) else {
            normalized.push(arg);
            continue;
        };

        let mut flag = OsString::from(format!("--{}", name));
        if !s.contains('=') && with_value.contains(&name) {
            if let Some(value) = args.next() {
                flag.push("=");
                flag.push(value);
            }
        } else if let Some((_, value)) = s.split_once('=') {
            flag.push("=");
            flag.push(value);
        }
        normalized.push(flag);
    }
    normalized
}

/// Parse the process arguments into `P`, accepting Go-style flags.
///
/// Exits with clap's usage output on error.
pub fn parse_go_args<P: Parser>() -> P {
    let command = P::command();
    P::parse_from(normalize_go_flags(std::env::args_os(), &command))
}

/// Name of a known long flag written as `-name`, `--name` or either with
/// `=value`.
fn long_flag_name<'a>(arg: &'a str, longs: &[&str]) -> Option<&'a str> {
    let rest = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))?;
    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
    (name.len() > 1 && longs.contains(&name)).then_some(name)
}

/// Parse a Go-style duration: a sequence of decimal numbers with units
/// `ns`, `us`/`µs`, `ms`, `s`, `m`, `h` (e.g. "10s", "1m30s", "1.5h").
/// A bare "0" is accepted.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(format!("invalid duration {:?}", s));
        }
        let value: f64 = rest[..num_len]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", s))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration {:?}", s)),
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, s)),
        };
        nanos += value * scale;
        rest = &rest[unit_len..];
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}
