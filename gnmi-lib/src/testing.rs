//! In-process gNMI target for integration tests.
//!
//! [`MockGnmi`] answers Capabilities and Get with canned responses and
//! records what it received, so tests can assert on credential metadata and
//! request contents.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::metadata::MetadataMap;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

use crate::gnmi::g_nmi_server::{GNmi, GNmiServer};
use crate::gnmi::{
    CapabilityRequest, CapabilityResponse, GetRequest, GetResponse, SetRequest, SetResponse,
    SubscribeRequest, SubscribeResponse,
};

#[derive(Debug, Default)]
struct Recorded {
    metadata: Vec<MetadataMap>,
    get_requests: Vec<GetRequest>,
}

/// Canned gNMI service.
#[derive(Debug, Clone, Default)]
pub struct MockGnmi {
    capabilities: CapabilityResponse,
    get: GetResponse,
    get_error: Option<Status>,
    delay: Duration,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockGnmi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(mut self, response: CapabilityResponse) -> Self {
        self.capabilities = response;
        self
    }

    pub fn with_get_response(mut self, response: GetResponse) -> Self {
        self.get = response;
        self
    }

    /// Fail every Get with `status`.
    pub fn with_get_error(mut self, status: Status) -> Self {
        self.get_error = Some(status);
        self
    }

    /// Sleep before answering any RPC.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Metadata of every request received so far, in arrival order.
    pub fn received_metadata(&self) -> Vec<MetadataMap> {
        self.recorded().metadata.clone()
    }

    /// The most recent GetRequest received.
    pub fn last_get_request(&self) -> Option<GetRequest> {
        self.recorded().get_requests.last().cloned()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        // A poisoned lock only means another test thread panicked.
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn receive<T>(&self, request: &Request<T>) {
        self.recorded().metadata.push(request.metadata().clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

type ResponseStream = Pin<Box<dyn Stream<Item = Result<SubscribeResponse, Status>> + Send>>;

#[tonic::async_trait]
impl GNmi for MockGnmi {
    async fn capabilities(
        &self,
        request: Request<CapabilityRequest>,
    ) -> Result<Response<CapabilityResponse>, Status> {
        self.receive(&request).await;
        Ok(Response::new(self.capabilities.clone()))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        self.receive(&request).await;
        self.recorded().get_requests.push(request.into_inner());
        match &self.get_error {
            Some(status) => Err(status.clone()),
            None => Ok(Response::new(self.get.clone())),
        }
    }

    async fn set(&self, _request: Request<SetRequest>) -> Result<Response<SetResponse>, Status> {
        Err(Status::unimplemented("Set is not supported by the mock target"))
    }

    type SubscribeStream = ResponseStream;

    async fn subscribe(
        &self,
        _request: Request<Streaming<SubscribeRequest>>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        Err(Status::unimplemented(
            "Subscribe is not supported by the mock target",
        ))
    }
}

/// A running mock target; the server stops when this is dropped.
#[derive(Debug)]
pub struct MockTarget {
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl MockTarget {
    /// Serve `service` in plaintext on an ephemeral loopback port.
    pub async fn spawn(service: MockGnmi) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let incoming = TcpListenerStream::new(listener);

        let server = tokio::spawn(async move {
            if let Err(e) = Server::builder()
                .add_service(GNmiServer::new(service))
                .serve_with_incoming(incoming)
                .await
            {
                tracing::error!("Mock gNMI target failed: {}", e);
            }
        });

        Ok(Self { addr, server })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for MockTarget {
    fn drop(&mut self) {
        self.server.abort();
    }
}
