//! Connected gNMI client bound to one deadline and one set of credentials.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tonic::transport::Channel;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::credentials::{RequestContext, attach_credentials};
use crate::error::{GnmiError, Result};
use crate::gnmi::g_nmi_client::GNmiClient;
use crate::gnmi::{CapabilityRequest, CapabilityResponse, GetRequest, GetResponse};
use crate::transport::{dial, setup_transport};

/// A client session to a single gNMI target.
///
/// The timeout from [`SessionConfig`] becomes one absolute deadline at
/// connect time; it bounds the dial and every RPC issued afterwards.
pub struct GnmiSession {
    client: GNmiClient<Channel>,
    ctx: RequestContext,
    addr: String,
    timeout: Duration,
}

impl GnmiSession {
    /// Build the transport, dial the target and prepare credential metadata.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let transport = setup_transport(&config.tls)?;
        let ctx = attach_credentials(
            &RequestContext::with_timeout(config.timeout),
            &config.credentials,
        )?;

        let channel = within(
            ctx.deadline(),
            config.timeout,
            dial(&config.addr, &transport, Some(config.timeout)),
        )
        .await??;

        info!(addr = %config.addr, username = %config.credentials.username, "Connected");

        Ok(Self {
            client: GNmiClient::new(channel),
            ctx,
            addr: config.addr.clone(),
            timeout: config.timeout,
        })
    }

    /// Issue a Capabilities RPC.
    pub async fn capabilities(&mut self) -> Result<CapabilityResponse> {
        debug!(addr = %self.addr, "Sending CapabilityRequest");
        let request = self.ctx.request(CapabilityRequest::default());
        let result = within(
            self.ctx.deadline(),
            self.timeout,
            self.client.capabilities(request),
        )
        .await?;
        into_message("Capabilities", result)
    }

    /// Issue a Get RPC.
    pub async fn get(&mut self, get: GetRequest) -> Result<GetResponse> {
        debug!(addr = %self.addr, paths = get.path.len(), "Sending GetRequest");
        let request = self.ctx.request(get);
        let result = within(self.ctx.deadline(), self.timeout, self.client.get(request)).await?;
        into_message("Get", result)
    }
}

/// Run `fut` until `deadline`, reporting expiry as [`GnmiError::Timeout`].
async fn within<F: Future>(
    deadline: Option<Instant>,
    timeout: Duration,
    fut: F,
) -> Result<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| GnmiError::Timeout(timeout)),
        None => Ok(fut.await),
    }
}

fn into_message<T>(
    rpc: &'static str,
    result: std::result::Result<tonic::Response<T>, tonic::Status>,
) -> Result<T> {
    result
        .map(tonic::Response::into_inner)
        .map_err(|status| GnmiError::rpc(rpc, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_deadline() {
        let deadline = Some(Instant::now() + Duration::from_secs(5));
        let value = within(deadline, Duration::from_secs(5), async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_within_expired() {
        let timeout = Duration::from_millis(20);
        let deadline = Some(Instant::now() + timeout);
        let err = within(deadline, timeout, std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, GnmiError::Timeout(t) if t == timeout));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_into_message_maps_status() {
        let err = into_message::<()>("Get", Err(tonic::Status::not_found("no such path")))
            .unwrap_err();
        assert_eq!(err.to_string(), "Get RPC failed: NotFound: no such path");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_credentials_before_dial() {
        let config = SessionConfig::insecure("127.0.0.1:1")
            .with_credentials(crate::credentials::UserCredentials::new("", "x"));
        let err = GnmiSession::connect(&config).await.err().unwrap();
        assert!(matches!(err, GnmiError::Credentials(_)));
    }
}
