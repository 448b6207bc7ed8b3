//! HTTP server implementation.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::signal;
use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;

use crate::parser::{read_request, Error as ParserError, HttpRequest};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::{HandlerFn, RouteMatch, Router};
use crate::server::response::{write_response, HttpResponse, StatusCode};

/// An HTTP server.
///
/// Serves exactly one request per connection, each connection on its own task.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    router: Router,
    shutdown: Arc<Notify>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// The route registry of this server.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Register a handler for a pattern such as `"/"` or `"POST /users"`.
    pub async fn handle_func<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut HttpResponse, &mut HttpRequest) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.router.register(pattern, handler).await
    }

    /// Ask a running server to stop accepting connections and shut down.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Display the registered endpoints.
    async fn display_server_info(&self) {
        info!("Registered endpoints:");
        for (path, methods) in self.router.endpoints().await {
            let methods = methods
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<String>>()
                .join(", ");
            info!("  {methods} {path}");
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener<A>(addr: A) -> Result<TcpListener, Error>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let display = addr.to_string();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr: display, source })?;
        if let Ok(local) = listener.local_addr() {
            info!("Server listening on http://{local}");
        }
        Ok(listener)
    }

    /// Set up a Ctrl+C handler for graceful shutdown.
    fn setup_ctrl_c_handler(shutdown: Arc<Notify>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    shutdown.notify_one();
                }
                Err(e) => {
                    error!("Error setting up Ctrl+C handler: {e}");
                }
            }
        })
    }

    /// Hand an accepted connection to its own task.
    ///
    /// Connections beyond `max_connections` are answered with a 503 from their own
    /// task too, so the accept loop never waits on a client.
    fn handle_new_connection(
        &self,
        socket: TcpStream,
        addr: SocketAddr,
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) {
        let config = self.config.clone();

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                tasks.spawn(Self::reject_connection(socket, config));
                return;
            }
        };

        let router = self.router.clone();
        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;

            debug!("Accepted connection from {addr}");
            if let Err(e) = Self::handle_connection(socket, &router, &config).await {
                Self::log_connection_error(addr, &e);
            }
        });
    }

    /// Answer a connection that exceeds the limit with a 503 and close it.
    async fn reject_connection(mut socket: TcpStream, config: ServerConfig) {
        let mut response = HttpResponse::bare(StatusCode::SERVICE_UNAVAILABLE)
            .with_content_type("text/plain")
            .with_body_string("Server is at capacity, please try again later");
        if let Err(e) = Self::send(&mut socket, &mut response, &config).await {
            debug!("Failed to send 503 response: {e}");
        }
        let _ = socket.shutdown().await;
    }

    fn log_connection_error(addr: SocketAddr, e: &Error) {
        match e {
            Error::ParseError(ParserError::EmptyRequest) => {
                debug!("{addr} closed the connection without sending a request");
            }
            Error::ParseError(e) => warn!("Malformed request from {addr}: {e}"),
            Error::Timeout { .. } => warn!("Connection from {addr}: {e}"),
            e => error!("Error handling connection from {addr}: {e}"),
        }
    }

    /// Log the outcome of a finished connection task.
    fn reap(joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("Connection task panicked: {e}");
            }
        }
    }

    /// Handle connection errors.
    async fn handle_accept_error(e: std::io::Error) {
        error!("Error accepting connection: {e}");

        // Wait a bit before retrying, accept errors are usually resource exhaustion
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>, shutdown_timeout: Duration) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let drained = timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                Self::reap(res);
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timeout elapsed, aborting {len} connections", len = tasks.len());
            tasks.abort_all();
        }

        info!("Server shutdown complete");
    }

    /// Start the server on the configured address.
    pub async fn start(&self) -> Result<(), Error> {
        self.serve(self.config.addr).await
    }

    /// Bind `addr` and serve connections until shutdown.
    ///
    /// Failing to bind is returned as [`Error::Bind`]; everything after that is
    /// handled per connection and never ends the loop.
    pub async fn serve<A>(&self, addr: A) -> Result<(), Error>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let listener = Self::setup_listener(addr).await?;
        self.run(listener).await
    }

    /// Accept connections from `listener` until shutdown.
    pub async fn run(&self, listener: TcpListener) -> Result<(), Error> {
        self.display_server_info().await;

        // Create a semaphore to limit concurrent connections
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));

        // Use JoinSet to keep track of all spawned tasks
        let mut tasks = JoinSet::new();

        let ctrl_c = Self::setup_ctrl_c_handler(self.shutdown.clone());

        loop {
            tokio::select! {
                // Check for shutdown signal
                _ = self.shutdown.notified() => {
                    info!("Shutting down server...");
                    break;
                }

                // Reap finished connections
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::reap(joined);
                }

                // Accept new connections
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            self.handle_new_connection(socket, addr, &semaphore, &mut tasks);
                        }
                        Err(e) => Self::handle_accept_error(e).await,
                    }
                }
            }
        }

        ctrl_c.abort();
        Self::perform_shutdown(&mut tasks, self.config.shutdown_timeout).await;

        Ok(())
    }

    /// Handle a single connection: decode, route, invoke, encode, close.
    ///
    /// A request that cannot be decoded is answered with nothing. A failing handler,
    /// whether it returns an error or panics, is answered with a bare 500 and its
    /// error is returned after the response has been sent.
    pub async fn handle_connection<S>(socket: S, router: &Router, config: &ServerConfig) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufReader::with_capacity(config.read_buffer_size, socket);

        let request = timeout(config.read_timeout, read_request(&mut stream, config.max_body_size))
            .await
            .map_err(|_| Error::Timeout {
                operation: "reading the request",
                duration: config.read_timeout,
            })??;
        debug!("{} {}", request.method, request.uri);

        let (mut response, failure) = match Self::dispatch(request, router).await {
            Ok(response) => (response, None),
            Err(e) => {
                error!("Handler failed: {e}");
                (HttpResponse::bare(StatusCode::INTERNAL_SERVER_ERROR), Some(e))
            }
        };

        let sent = Self::send(&mut stream, &mut response, config).await;
        let _ = stream.shutdown().await;

        match failure {
            Some(e) => Err(e),
            None => sent,
        }
    }

    /// Resolve the request and produce its response.
    async fn dispatch(mut request: HttpRequest, router: &Router) -> Result<HttpResponse, Error> {
        match router.lookup(request.path(), &request.method).await {
            RouteMatch::NotFound => {
                debug!("No route for {}", request.path());
                Ok(HttpResponse::bare(StatusCode::NOT_FOUND))
            }
            RouteMatch::MethodNotAllowed => {
                debug!("Method {} not allowed for {}", request.method, request.path());
                Ok(HttpResponse::bare(StatusCode::METHOD_NOT_ALLOWED))
            }
            RouteMatch::Found(handler) => Self::invoke(&handler, &mut request),
        }
    }

    /// Run a handler on a fresh response, turning a panic into an error.
    fn invoke(handler: &HandlerFn, request: &mut HttpRequest) -> Result<HttpResponse, Error> {
        let mut response = HttpResponse::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut response, request)));

        match outcome {
            Ok(Ok(())) => Ok(response),
            Ok(Err(e)) => Err(e),
            Err(payload) => Err(Error::HandlerPanic(panic_message(&*payload))),
        }
    }

    async fn send<W>(writer: &mut W, response: &mut HttpResponse, config: &ServerConfig) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        timeout(config.write_timeout, write_response(writer, response))
            .await
            .map_err(|_| Error::Timeout {
                operation: "writing the response",
                duration: config.write_timeout,
            })?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
