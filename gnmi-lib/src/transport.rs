//! Channel security setup and dialing.
//!
//! [`setup_transport`] turns [`TlsSetup`] into [`TransportOptions`] using
//! only local file reads; [`dial`] opens the channel. TLS channels go through
//! a tokio-rustls connector so the rustls configuration (client identity,
//! trust store, verification policy) is used exactly as built here.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::{debug, info, warn};

use crate::error::{GnmiError, Result};
use crate::target::target_host;

/// Security parameters for the channel to a gNMI target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSetup {
    /// Plaintext HTTP/2, every other field ignored.
    pub insecure: bool,
    /// Accept any server certificate and hostname.
    pub skip_verify: bool,
    /// Name expected in the server certificate.
    pub target_hostname: String,
    /// PEM bundle of trusted CA certificates.
    pub root_ca: Option<PathBuf>,
    /// PEM client certificate chain, leaf first.
    pub cert: Option<PathBuf>,
    /// PEM client private key.
    pub key: Option<PathBuf>,
}

/// How to secure the channel.
#[derive(Debug, Clone)]
pub enum TransportOptions {
    /// No transport security.
    Insecure,
    /// TLS with the contained client configuration.
    Tls(TlsTransport),
}

impl TransportOptions {
    pub fn is_insecure(&self) -> bool {
        matches!(self, Self::Insecure)
    }

    pub fn tls(&self) -> Option<&TlsTransport> {
        match self {
            Self::Insecure => None,
            Self::Tls(tls) => Some(tls),
        }
    }
}

/// A ready-to-use rustls client configuration.
#[derive(Debug, Clone)]
pub struct TlsTransport {
    config: Arc<ClientConfig>,
    server_name: Option<ServerName<'static>>,
    verify: bool,
    client_subject: Option<String>,
}

impl TlsTransport {
    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    /// Whether the server chain and hostname are verified.
    pub fn verifies_server(&self) -> bool {
        self.verify
    }

    /// Explicit server name; `None` means the target host is used for SNI.
    pub fn server_name(&self) -> Option<&ServerName<'static>> {
        self.server_name.as_ref()
    }

    /// Subject of the client certificate presented to the target, if any.
    pub fn client_subject(&self) -> Option<&str> {
        self.client_subject.as_deref()
    }
}

/// Build channel options from the TLS setup parameters.
///
/// With `insecure` nothing else is looked at. Otherwise TLS 1.2 is the floor
/// and, unless `skip_verify` is set, hostname, root CA, certificate and key
/// are all mandatory.
pub fn setup_transport(setup: &TlsSetup) -> Result<TransportOptions> {
    if setup.insecure {
        debug!("Using insecure transport, TLS settings ignored");
        return Ok(TransportOptions::Insecure);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| GnmiError::tls(format!("unsupported TLS versions: {}", e)))?;

    let cert = non_empty(&setup.cert);
    let key = non_empty(&setup.key);

    let (builder, server_name) = if setup.skip_verify {
        warn!("TLS verification disabled - not recommended for production");
        let server_name = if setup.target_hostname.is_empty() {
            None
        } else {
            Some(parse_server_name(&setup.target_hostname)?)
        };
        let builder = builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)));
        (builder, server_name)
    } else {
        let root_ca = require_verification_material(setup)?;
        let roots = load_root_store(root_ca)?;
        let server_name = parse_server_name(&setup.target_hostname)?;
        (builder.with_root_certificates(roots), Some(server_name))
    };

    let (mut config, client_subject) = match (cert, key) {
        (Some(cert), Some(key)) => {
            let identity = load_identity(cert, key)?;
            let config = builder
                .with_client_auth_cert(identity.chain, identity.key)
                .map_err(|e| GnmiError::tls(format!("can't load certificate keypair: {}", e)))?;
            (config, Some(identity.subject))
        }
        (None, None) => (builder.with_no_client_auth(), None),
        _ => {
            return Err(GnmiError::tls(
                "client certificate and key must be provided together",
            ));
        }
    };
    config.alpn_protocols = vec![b"h2".to_vec()];

    Ok(TransportOptions::Tls(TlsTransport {
        config: Arc::new(config),
        server_name,
        verify: !setup.skip_verify,
        client_subject,
    }))
}

/// Open a channel to `addr` (`host:port`).
pub async fn dial(
    addr: &str,
    options: &TransportOptions,
    connect_timeout: Option<Duration>,
) -> Result<Channel> {
    // The scheme stays http: TLS, when enabled, is done by our own connector.
    let mut endpoint =
        Endpoint::from_shared(format!("http://{}", addr)).map_err(|e| GnmiError::dial(addr, &e))?;
    if let Some(timeout) = connect_timeout {
        endpoint = endpoint.connect_timeout(timeout);
    }

    info!(addr, tls = !options.is_insecure(), "Connecting to gNMI target");

    let channel = match options {
        TransportOptions::Insecure => endpoint.connect().await,
        TransportOptions::Tls(tls) => {
            let server_name = match tls.server_name.clone() {
                Some(name) => name,
                None => parse_server_name(target_host(addr))?,
            };
            let connector = TlsConnector::from(tls.config.clone());

            endpoint
                .connect_with_connector(tower::service_fn(move |uri: Uri| {
                    let connector = connector.clone();
                    let server_name = server_name.clone();
                    async move {
                        let authority = uri.authority().map(|a| a.to_string()).ok_or_else(|| {
                            io::Error::new(io::ErrorKind::InvalidInput, "target URI has no authority")
                        })?;
                        let tcp = TcpStream::connect(authority).await?;
                        tcp.set_nodelay(true)?;
                        let stream = connector.connect(server_name, tcp).await?;
                        Ok::<_, io::Error>(TokioIo::new(stream))
                    }
                }))
                .await
        }
    };

    let channel = channel.map_err(|e| GnmiError::dial(addr, &e))?;
    debug!(addr, "Channel established");
    Ok(channel)
}

fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

/// Check that everything needed for a verified session is present and
/// return the root CA path.
fn require_verification_material(setup: &TlsSetup) -> Result<&Path> {
    let root_ca = non_empty(&setup.root_ca);

    let mut missing = Vec::new();
    if setup.target_hostname.is_empty() {
        missing.push("hostname");
    }
    if root_ca.is_none() {
        missing.push("rootCA");
    }
    if non_empty(&setup.cert).is_none() {
        missing.push("certificate");
    }
    if non_empty(&setup.key).is_none() {
        missing.push("key");
    }

    match root_ca {
        Some(root_ca) if missing.is_empty() => Ok(root_ca),
        _ => Err(GnmiError::tls(format!(
            "{} not specified (required unless skip_verify or insecure is set)",
            missing.join(" / ")
        ))),
    }
}

fn parse_server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|e| GnmiError::tls(format!("invalid hostname {:?}: {}", host, e)))
}

fn tls_file(what: &'static str, path: &Path, source: io::Error) -> GnmiError {
    GnmiError::TlsFile {
        what,
        path: path.to_path_buf(),
        source,
    }
}

fn read_certs(path: &Path, what: &'static str) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|e| tls_file(what, path, e))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| tls_file(what, path, e))
}

fn load_root_store(path: &Path) -> Result<RootCertStore> {
    let certs = read_certs(path, "root CA")?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(GnmiError::tls(format!(
            "no valid PEM certificate in root CA file '{}'",
            path.display()
        )));
    }

    debug!(added, ignored, path = %path.display(), "Loaded root CA pool");
    Ok(roots)
}

struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    subject: String,
}

fn load_identity(cert_path: &Path, key_path: &Path) -> Result<ClientIdentity> {
    let chain = read_certs(cert_path, "client certificate")?;
    let leaf = chain.first().ok_or_else(|| {
        GnmiError::tls(format!(
            "no certificate found in '{}'",
            cert_path.display()
        ))
    })?;

    // Parsed once here so a broken leaf fails setup instead of the handshake.
    let (_, parsed) = x509_parser::parse_x509_certificate(leaf.as_ref())
        .map_err(|e| GnmiError::tls(format!("cert parsing error: {}", e)))?;
    let subject = parsed.subject().to_string();

    let file = File::open(key_path).map_err(|e| tls_file("private key", key_path, e))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| tls_file("private key", key_path, e))?
        .ok_or_else(|| {
            GnmiError::tls(format!(
                "no private key found in '{}'",
                key_path.display()
            ))
        })?;

    debug!(%subject, chain_len = chain.len(), "Loaded client certificate");

    Ok(ClientIdentity {
        chain,
        key,
        subject,
    })
}

/// Accepts any server certificate. Handshake signatures are still checked
/// against the presented key.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rustls::pki_types::PrivatePkcs8KeyDer;
    use rustls::server::WebPkiClientVerifier;
    use rustls::{ServerConfig, ServerConnection};
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    struct Fixtures {
        _dir: tempfile::TempDir,
        root_ca: PathBuf,
        cert: PathBuf,
        key: PathBuf,
        ca: rcgen::Certificate,
        ca_key: rcgen::KeyPair,
    }

    fn ca_cert(name: &str) -> (rcgen::Certificate, rcgen::KeyPair) {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.distinguished_name.push(rcgen::DnType::CommonName, name);
        (params.self_signed(&key).unwrap(), key)
    }

    fn leaf_cert(
        name: &str,
        usage: rcgen::ExtendedKeyUsagePurpose,
        ca: &rcgen::Certificate,
        ca_key: &rcgen::KeyPair,
    ) -> (rcgen::Certificate, rcgen::KeyPair) {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(vec![name.to_string()]).unwrap();
        params.distinguished_name.push(rcgen::DnType::CommonName, name);
        params.extended_key_usages = vec![usage];
        (params.signed_by(&key, ca, ca_key).unwrap(), key)
    }

    fn write_fixtures() -> Fixtures {
        let dir = tempfile::tempdir().unwrap();

        let (ca, ca_key) = ca_cert("gnmi-ca");
        let (client, client_key) = leaf_cert(
            "gnmi-client",
            rcgen::ExtendedKeyUsagePurpose::ClientAuth,
            &ca,
            &ca_key,
        );

        let root_ca = dir.path().join("ca.pem");
        let cert = dir.path().join("client.pem");
        let key = dir.path().join("client.key");
        std::fs::write(&root_ca, ca.pem()).unwrap();
        std::fs::write(&cert, client.pem()).unwrap();
        std::fs::write(&key, client_key.serialize_pem()).unwrap();

        Fixtures {
            _dir: dir,
            root_ca,
            cert,
            key,
            ca,
            ca_key,
        }
    }

    /// A target for `router1`, signed by `ca`. With `client_ca` set, client
    /// certificates are required and checked against it.
    fn server_config(
        ca: &rcgen::Certificate,
        ca_key: &rcgen::KeyPair,
        client_ca: Option<&rcgen::Certificate>,
    ) -> Arc<ServerConfig> {
        let (cert, key) = leaf_cert(
            "router1",
            rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            ca,
            ca_key,
        );
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
            .unwrap();

        let builder = match client_ca {
            Some(client_ca) => {
                let mut roots = RootCertStore::empty();
                roots.add(client_ca.der().clone()).unwrap();
                let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                    .build()
                    .unwrap();
                builder.with_client_cert_verifier(verifier)
            }
            None => builder.with_no_client_auth(),
        };

        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));
        Arc::new(builder.with_single_cert(vec![cert.der().clone()], key).unwrap())
    }

    /// Run one handshake over loopback. Returns the client outcome and, for
    /// the server, how many certificates the client presented.
    async fn handshake(
        server: Arc<ServerConfig>,
        options: &TransportOptions,
    ) -> (io::Result<()>, io::Result<usize>) {
        let tls = options.tls().expect("TLS options");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let acceptor = TlsAcceptor::from(server);
        let server_side = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await?;
            let stream = acceptor.accept(tcp).await?;
            let (_, conn): (_, &ServerConnection) = stream.get_ref();
            Ok::<_, io::Error>(conn.peer_certificates().map_or(0, |c| c.len()))
        });

        let server_name = tls
            .server_name()
            .cloned()
            .unwrap_or_else(|| ServerName::try_from("127.0.0.1").unwrap());
        let tcp = TcpStream::connect(addr).await.unwrap();
        let client = TlsConnector::from(tls.config().clone())
            .connect(server_name, tcp)
            .await;

        let server_result = server_side.await.unwrap();
        (client.map(drop), server_result)
    }

    fn verified_setup(f: &Fixtures) -> TlsSetup {
        TlsSetup {
            insecure: false,
            skip_verify: false,
            target_hostname: "router1".to_string(),
            root_ca: Some(f.root_ca.clone()),
            cert: Some(f.cert.clone()),
            key: Some(f.key.clone()),
        }
    }

    #[test]
    fn test_insecure_ignores_tls_fields() {
        let setup = TlsSetup {
            insecure: true,
            skip_verify: false,
            target_hostname: String::new(),
            root_ca: Some(PathBuf::from("/nonexistent/ca.pem")),
            cert: None,
            key: Some(PathBuf::from("/nonexistent/key.pem")),
        };
        let options = setup_transport(&setup).unwrap();
        assert!(options.is_insecure());
        assert!(options.tls().is_none());
    }

    #[test]
    fn test_missing_material_rejected() {
        let f = write_fixtures();
        let complete = verified_setup(&f);

        let mut no_ca = complete.clone();
        no_ca.root_ca = None;
        let mut no_cert = complete.clone();
        no_cert.cert = Some(PathBuf::new());
        let mut no_key = complete.clone();
        no_key.key = None;
        let mut no_hostname = complete.clone();
        no_hostname.target_hostname.clear();

        for (setup, missing) in [
            (no_ca, "rootCA"),
            (no_cert, "certificate"),
            (no_key, "key"),
            (no_hostname, "hostname"),
        ] {
            match setup_transport(&setup) {
                Err(GnmiError::Tls(msg)) => assert!(msg.contains(missing), "{msg}"),
                other => panic!("expected TLS error for missing {missing}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_verified_setup_with_valid_files() {
        let f = write_fixtures();
        let options = setup_transport(&verified_setup(&f)).unwrap();

        let tls = options.tls().expect("TLS options");
        assert!(tls.verifies_server());
        assert!(tls.server_name().is_some());
        assert_eq!(tls.client_subject(), Some("CN=gnmi-client"));
        assert_eq!(tls.config().alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[test]
    fn test_skip_verify_needs_nothing() {
        let setup = TlsSetup {
            skip_verify: true,
            ..Default::default()
        };
        let options = setup_transport(&setup).unwrap();

        let tls = options.tls().expect("TLS options");
        assert!(!tls.verifies_server());
        assert!(tls.server_name().is_none());
        assert!(tls.client_subject().is_none());
    }

    #[test]
    fn test_skip_verify_still_presents_identity() {
        let f = write_fixtures();
        let setup = TlsSetup {
            skip_verify: true,
            root_ca: None,
            ..verified_setup(&f)
        };
        let options = setup_transport(&setup).unwrap();
        assert_eq!(
            options.tls().and_then(|t| t.client_subject()),
            Some("CN=gnmi-client")
        );
    }

    #[test]
    fn test_cert_without_key_rejected() {
        let f = write_fixtures();
        let setup = TlsSetup {
            skip_verify: true,
            cert: Some(f.cert.clone()),
            ..Default::default()
        };
        assert!(matches!(setup_transport(&setup), Err(GnmiError::Tls(_))));
    }

    #[test]
    fn test_unreadable_root_ca() {
        let f = write_fixtures();
        let setup = TlsSetup {
            root_ca: Some(f.root_ca.with_file_name("missing.pem")),
            ..verified_setup(&f)
        };
        match setup_transport(&setup) {
            Err(GnmiError::TlsFile { what, .. }) => assert_eq!(what, "root CA"),
            other => panic!("expected file error, got {other:?}"),
        }
    }

    #[test]
    fn test_root_ca_without_certificates() {
        let f = write_fixtures();
        std::fs::write(&f.root_ca, "not a certificate\n").unwrap();
        match setup_transport(&verified_setup(&f)) {
            Err(GnmiError::Tls(msg)) => assert!(msg.contains("root CA"), "{msg}"),
            other => panic!("expected TLS error, got {other:?}"),
        }
    }

    #[test]
    fn test_key_file_without_key() {
        let f = write_fixtures();
        std::fs::write(&f.key, "").unwrap();
        match setup_transport(&verified_setup(&f)) {
            Err(GnmiError::Tls(msg)) => assert!(msg.contains("private key"), "{msg}"),
            other => panic!("expected TLS error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handshake_verified_presents_client_cert() {
        let f = write_fixtures();
        let options = setup_transport(&verified_setup(&f)).unwrap();
        let server = server_config(&f.ca, &f.ca_key, Some(&f.ca));

        let (client, server) = handshake(server, &options).await;
        client.unwrap();
        assert_eq!(server.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_handshake_wrong_hostname_rejected() {
        let f = write_fixtures();
        let setup = TlsSetup {
            target_hostname: "router2".to_string(),
            ..verified_setup(&f)
        };
        let options = setup_transport(&setup).unwrap();
        let server = server_config(&f.ca, &f.ca_key, None);

        let (client, server) = handshake(server, &options).await;
        let err = client.unwrap_err();
        assert!(err.to_string().contains("certificate"), "{err}");
        assert!(server.is_err());
    }

    #[tokio::test]
    async fn test_handshake_untrusted_ca_rejected() {
        let f = write_fixtures();
        let options = setup_transport(&verified_setup(&f)).unwrap();
        let (other_ca, other_key) = ca_cert("other-ca");
        let server = server_config(&other_ca, &other_key, None);

        let (client, _) = handshake(server, &options).await;
        assert!(client.is_err());
    }

    #[tokio::test]
    async fn test_handshake_skip_verify_accepts_untrusted_ca() {
        let f = write_fixtures();
        let setup = TlsSetup {
            skip_verify: true,
            target_hostname: "router2".to_string(),
            root_ca: None,
            ..verified_setup(&f)
        };
        let options = setup_transport(&setup).unwrap();
        let (other_ca, other_key) = ca_cert("other-ca");
        let server = server_config(&other_ca, &other_key, Some(&f.ca));

        let (client, server) = handshake(server, &options).await;
        client.unwrap();
        assert_eq!(server.unwrap(), 1);
    }

    #[test]
    fn test_mismatched_keypair_rejected() {
        let f = write_fixtures();
        let other_key = rcgen::KeyPair::generate().unwrap();
        std::fs::write(&f.key, other_key.serialize_pem()).unwrap();

        match setup_transport(&verified_setup(&f)) {
            Err(GnmiError::Tls(msg)) => assert!(msg.contains("keypair"), "{msg}"),
            other => panic!("expected TLS error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dial_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = dial(&addr, &TransportOptions::Insecure, Some(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, GnmiError::Dial { .. }), "{err:?}");
    }
}
