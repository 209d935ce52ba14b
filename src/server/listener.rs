//! WebSocket server listener
//!
//! Handles the TCP accept loop, performs the WebSocket upgrade with admission
//! checks, and runs one client session per admitted connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::error::Result;
use crate::events::EventPublisher;
use crate::hub::Hub;
use crate::server::admission::{AdmissionHandler, AdmissionRequest};
use crate::server::config::ServerConfig;
use crate::session::{ClientSession, Identity};
use crate::transport::WebSocketConnection;

/// Real-time event server
pub struct HubServer<H: AdmissionHandler> {
    config: ServerConfig,
    admission: Arc<H>,
    hub: Arc<Hub>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<H: AdmissionHandler> HubServer<H> {
    /// Create a new server with its own hub
    pub fn new(config: ServerConfig, admission: H) -> Self {
        let hub = Arc::new(Hub::with_config(config.hub.clone()));
        Self::with_hub(config, admission, hub)
    }

    /// Create a server around an existing hub
    ///
    /// The hub's own configuration governs sessions; `config.hub` is ignored.
    pub fn with_hub(config: ServerConfig, admission: H, hub: Arc<Hub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            admission: Arc::new(admission),
            hub,
            connection_semaphore,
        }
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Publisher routing through this server's hub
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher::new(Arc::clone(&self.hub))
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown every live session is asked to close, and connections still
    /// in their handshake close as soon as they register.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            addr = %listener.local_addr()?,
            path = %self.config.path,
            "Event hub listening"
        );

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        self.hub.shutdown().await;
        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        tracing::debug!(peer = %peer_addr, "New connection");

        let upgrade = Upgrade {
            path: self.config.path.clone(),
            handshake_timeout: self.config.handshake_timeout,
            admission: Arc::clone(&self.admission),
            hub: Arc::clone(&self.hub),
        };
        tokio::spawn(upgrade.run(socket, peer_addr, permit));
    }
}

/// Everything one connection task needs from the server
struct Upgrade<H> {
    path: String,
    handshake_timeout: Duration,
    admission: Arc<H>,
    hub: Arc<Hub>,
}

impl<H: AdmissionHandler> Upgrade<H> {
    async fn run(self, socket: TcpStream, peer_addr: SocketAddr, _permit: Option<OwnedSemaphorePermit>) {
        let mut admitted: Option<Identity> = None;
        let callback = |request: &Request, response: Response| {
            if request.uri().path() != self.path {
                return Err(reject(StatusCode::NOT_FOUND, "not found"));
            }
            let request = admission_request(request, peer_addr);
            match self.admission.admit(&request) {
                Some(identity) => {
                    admitted = Some(identity);
                    Ok(response)
                }
                None => Err(reject(StatusCode::UNAUTHORIZED, "unauthorized")),
            }
        };

        let handshake = tokio::time::timeout(
            self.handshake_timeout,
            tokio_tungstenite::accept_hdr_async(socket, callback),
        )
        .await;

        let stream = match handshake {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(peer = %peer_addr, error = %e, "Handshake failed");
                return;
            }
            Err(_) => {
                tracing::debug!(peer = %peer_addr, "Handshake timed out");
                return;
            }
        };
        let Some(identity) = admitted else {
            return;
        };

        let registration = self.hub.register(identity).await;
        tracing::debug!(
            session_id = %registration.context.id,
            peer = %peer_addr,
            "Connection admitted"
        );
        ClientSession::new(self.hub, registration, WebSocketConnection::new(stream))
            .run()
            .await;
    }
}

fn admission_request(request: &Request, peer_addr: SocketAddr) -> AdmissionRequest {
    let mut admission = AdmissionRequest::new(peer_addr, request.uri().path());
    admission.query = request.uri().query().map(str::to_string);
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            admission
                .headers
                .insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }
    admission
}

fn reject(status: StatusCode, body: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(body.to_string()));
    *response.status_mut() = status;
    response
}
