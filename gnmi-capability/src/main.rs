//! gnmi-capability: print the capabilities of a gNMI target.

use std::process::ExitCode;

use anyhow::Result;
use clap::CommandFactory;

use gnmi_capability::Args;
use gnmi_lib::GnmiError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Args = gnmi_lib::parse_go_args();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<GnmiError>().is_some_and(GnmiError::is_usage) {
                eprintln!("{}", Args::command().render_usage());
            }
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.connection.resolve()?;
    gnmi_common::init_tracing(&config.logging)?;

    let mut stdout = std::io::stdout().lock();
    gnmi_capability::run(&config, &mut stdout).await?;
    Ok(())
}
