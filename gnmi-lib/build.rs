use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_client(true)
        // The server side backs the mock target used in tests
        .build_server(true)
        .file_descriptor_set_path(out_dir.join("gnmi_descriptor.bin"))
        .compile_protos(
            &["proto/gnmi_ext.proto", "proto/gnmi.proto"],
            &["proto/", "/usr/include"],
        )?;
    Ok(())
}
