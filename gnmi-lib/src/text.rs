//! Protobuf text format rendering of gNMI messages.
//!
//! Generated prost types carry no reflection data, so the message is
//! re-decoded as a [`DynamicMessage`] against [`crate::FILE_DESCRIPTOR_SET`]
//! and printed from there. `bytes` fields (JSON values among them) come out
//! as escaped strings.

use prost::Message;
use prost_reflect::text_format::FormatOptions;
use prost_reflect::{DescriptorPool, DynamicMessage};

use crate::error::{GnmiError, Result};
use crate::gnmi::{CapabilityRequest, CapabilityResponse, GetRequest, GetResponse};

/// A gNMI message that can be dumped in multi-line text format.
pub trait TextFormat: Message + Sized {
    /// Fully-qualified protobuf name, e.g. `gnmi.GetResponse`.
    const FULL_NAME: &'static str;

    fn to_text_format(&self) -> Result<String> {
        let err = |reason: String| GnmiError::TextFormat {
            message: Self::FULL_NAME,
            reason,
        };

        let pool = DescriptorPool::decode(crate::FILE_DESCRIPTOR_SET).map_err(|e| err(e.to_string()))?;
        let descriptor = pool
            .get_message_by_name(Self::FULL_NAME)
            .ok_or_else(|| err("no descriptor".to_string()))?;
        let message = DynamicMessage::decode(descriptor, self.encode_to_vec().as_slice())
            .map_err(|e| err(e.to_string()))?;

        let text = message.to_text_format_with_options(&FormatOptions::new().pretty(true));
        Ok(text.trim_end().to_string())
    }
}

impl TextFormat for CapabilityRequest {
    const FULL_NAME: &'static str = "gnmi.CapabilityRequest";
}

impl TextFormat for CapabilityResponse {
    const FULL_NAME: &'static str = "gnmi.CapabilityResponse";
}

impl TextFormat for GetRequest {
    const FULL_NAME: &'static str = "gnmi.GetRequest";
}

impl TextFormat for GetResponse {
    const FULL_NAME: &'static str = "gnmi.GetResponse";
}
