//! gNMI Get client.
//!
//! Builds a `GetRequest` from xpath expressions, sends it to the target and
//! prints every returned update.

pub mod render;

use std::io::Write;

use clap::Parser;
use tracing::info;

use gnmi_lib::gnmi::get_request::DataType;
use gnmi_lib::gnmi::{Encoding, GetRequest, GetResponse};
use gnmi_lib::{ConnectionArgs, GnmiError, GnmiSession, Result, SessionConfig};
use gnmi_lib::{to_gnmi_path, to_gnmi_paths};

pub use render::{pretty_json, render_response};

/// Send a gNMI GetRequest to a target and print the response.
#[derive(Parser, Debug)]
#[command(name = "gnmi-get", version, about)]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// The prefix is applied to all paths within the GetRequest message.
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Path to retrieve, e.g. /interfaces/interface[name=eth0]/state. Repeatable.
    #[arg(long, required = true)]
    pub xpath: Vec<String>,

    /// Encoding: 0-4 or JSON, BYTES, PROTO, ASCII, JSON_IETF.
    #[arg(long, default_value = "4", value_parser = parse_encoding)]
    pub encoding: Encoding,

    /// Data type: 0-3 or ALL, CONFIG, STATE, OPERATIONAL.
    #[arg(long, default_value = "0", value_parser = parse_data_type)]
    pub dtype: DataType,
}

impl Args {
    pub fn options(&self) -> GetOptions {
        GetOptions {
            prefix: self.prefix.clone(),
            xpaths: self.xpath.clone(),
            encoding: self.encoding,
            data_type: self.dtype,
        }
    }
}

/// What to ask the target for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    pub prefix: String,
    pub xpaths: Vec<String>,
    pub encoding: Encoding,
    pub data_type: DataType,
}

impl GetOptions {
    pub fn new<S: Into<String>>(xpaths: impl IntoIterator<Item = S>) -> Self {
        Self {
            prefix: String::new(),
            xpaths: xpaths.into_iter().map(Into::into).collect(),
            encoding: Encoding::JsonIetf,
            data_type: DataType::All,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

/// Parse an encoding given as its number or name (case-insensitive).
pub fn parse_encoding(s: &str) -> std::result::Result<Encoding, String> {
    let s = s.trim();
    let parsed = match s.parse::<i32>() {
        Ok(n) => Encoding::try_from(n).ok(),
        Err(_) => Encoding::from_str_name(&enum_name(s)),
    };
    parsed.ok_or_else(|| {
        format!(
            "unknown encoding {:?}, expected 0-4 or one of JSON, BYTES, PROTO, ASCII, JSON_IETF",
            s
        )
    })
}

/// Parse a data type given as its number or name (case-insensitive).
pub fn parse_data_type(s: &str) -> std::result::Result<DataType, String> {
    let s = s.trim();
    let parsed = match s.parse::<i32>() {
        Ok(n) => DataType::try_from(n).ok(),
        Err(_) => DataType::from_str_name(&enum_name(s)),
    };
    parsed.ok_or_else(|| {
        format!(
            "unknown data type {:?}, expected 0-3 or one of ALL, CONFIG, STATE, OPERATIONAL",
            s
        )
    })
}

fn enum_name(s: &str) -> String {
    s.to_ascii_uppercase().replace('-', "_")
}

/// Build the GetRequest, validating every path expression.
pub fn build_get_request(options: &GetOptions) -> Result<GetRequest> {
    if options.xpaths.is_empty() {
        return Err(GnmiError::usage("at least one xpath must be provided"));
    }

    let prefix = to_gnmi_path(&options.prefix)?;
    let path = to_gnmi_paths(&options.xpaths)?;

    Ok(GetRequest {
        prefix: Some(prefix),
        path,
        r#type: options.data_type as i32,
        encoding: options.encoding as i32,
        ..Default::default()
    })
}

/// Validate paths, connect, issue Get and write the rendered response to `out`.
pub async fn run(
    config: &SessionConfig,
    options: &GetOptions,
    out: &mut impl Write,
) -> Result<GetResponse> {
    // Paths are checked before any network I/O.
    let request = build_get_request(options)?;

    let mut session = GnmiSession::connect(config).await?;
    let response = session.get(request).await?;
    info!(
        notifications = response.notification.len(),
        "Get response received"
    );

    render_response(out, &response)?;
    Ok(response)
}
