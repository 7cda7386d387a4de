//! Client helpers for gNMI (gRPC Network Management Interface) targets.
//!
//! Shared by the `gnmi-capability` and `gnmi-get` tools:
//!
//! - [`transport`] - TLS or plaintext channel setup and dialing
//! - [`credentials`] - Username/password metadata and request deadlines
//! - [`xpath`] - Xpath expressions to gNMI paths and back
//! - [`args`] / [`config`] - Common flags and JSON5 profiles
//! - [`session`] - A connected client bound to one deadline
//! - [`text`] - Protobuf text format dumps of responses

pub mod args;
pub mod config;
pub mod credentials;
pub mod error;
pub mod session;
pub mod target;
pub mod text;
pub mod transport;
pub mod xpath;

#[cfg(feature = "test-util")]
pub mod testing;

// Include the generated protobuf code
pub mod gnmi_ext {
    tonic::include_proto!("gnmi_ext");
}

pub mod gnmi {
    tonic::include_proto!("gnmi");
}

/// Encoded descriptors of the gNMI protos, used for text format output.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("gnmi_descriptor");

pub use args::{ConnectionArgs, normalize_go_flags, parse_duration, parse_go_args};
pub use config::{ProfileConfig, SessionConfig};
pub use credentials::{RequestContext, UserCredentials, attach_credentials};
pub use error::{GnmiError, Result};
pub use session::GnmiSession;
pub use target::{DEFAULT_PORT, resolve_target};
pub use text::TextFormat;
pub use transport::{TlsSetup, TransportOptions, dial, setup_transport};
pub use xpath::{path_to_xpath, to_gnmi_path, to_gnmi_paths};
