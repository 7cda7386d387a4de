//! gNMI Capabilities client.
//!
//! Sends an empty `CapabilityRequest` and prints the response followed by a
//! short summary of what the target supports.

use std::io::Write;

use clap::Parser;
use tracing::info;

use gnmi_lib::gnmi::{CapabilityResponse, Encoding};
use gnmi_lib::{ConnectionArgs, GnmiSession, Result, SessionConfig, TextFormat};

/// Send a gNMI CapabilityRequest to a target and print the response.
#[derive(Parser, Debug)]
#[command(name = "gnmi-capability", version, about)]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Connect, issue Capabilities and write the rendered response to `out`.
pub async fn run(config: &SessionConfig, out: &mut impl Write) -> Result<CapabilityResponse> {
    let mut session = GnmiSession::connect(config).await?;
    let response = session.capabilities().await?;
    info!(
        version = %response.g_nmi_version,
        models = response.supported_models.len(),
        "Capabilities received"
    );

    write_response(out, &response)?;
    Ok(response)
}

/// Print the response in text format, then the summary.
pub fn write_response(out: &mut impl Write, response: &CapabilityResponse) -> Result<()> {
    writeln!(out, "Capabilities Response:")?;
    writeln!(out, "{}", response.to_text_format()?)?;
    writeln!(out)?;

    writeln!(out, "gNMI version: {}", response.g_nmi_version)?;

    let encodings: Vec<String> = response
        .supported_encodings
        .iter()
        .map(|&e| encoding_name(e))
        .collect();
    writeln!(out, "Supported encodings: {}", encodings.join(", "))?;

    writeln!(out, "Supported models ({}):", response.supported_models.len())?;
    for model in &response.supported_models {
        writeln!(
            out,
            "  {} {} {}",
            model.name, model.organization, model.version
        )?;
    }
    Ok(())
}

fn encoding_name(value: i32) -> String {
    Encoding::try_from(value)
        .map(|e| e.as_str_name().to_string())
        .unwrap_or_else(|_| format!("UNKNOWN({})", value))
}
