//! Tests for the HTTP server implementation.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor, Write};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
    use tokio::net::{TcpListener, TcpStream};

    use crate::parser::{Error as ParserError, Method};
    use crate::server::{Error, HttpServer, Pattern, RouteMatch, Router, ServerConfig};

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
    }

    impl MockTcpStream {
        fn new(read_data: impl Into<Vec<u8>>) -> Self {
            Self {
                read_data: Cursor::new(read_data.into()),
                write_data: Vec::new(),
            }
        }

        fn written(&self) -> String {
            String::from_utf8_lossy(&self.write_data).into_owned()
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let n = std::io::Read::read(&mut this.read_data, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    // Stream whose writes always fail
    struct BrokenPipeStream {
        read_data: Cursor<Vec<u8>>,
    }

    impl AsyncRead for BrokenPipeStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let n = std::io::Read::read(&mut this.read_data, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for BrokenPipeStream {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn hello_router() -> Router {
        let router = Router::new();
        router
            .register("/", |res, _req| {
                res.write_body("hello world\n");
                Ok(())
            })
            .await
            .unwrap();
        router
    }

    async fn serve_mock(router: &Router, request: &[u8]) -> (Result<(), Error>, String) {
        let mut stream = MockTcpStream::new(request);
        let result = HttpServer::handle_connection(&mut stream, router, &ServerConfig::default()).await;
        (result, stream.written())
    }

    #[test]
    fn test_pattern_parsing() {
        let pattern = Pattern::parse("/users").unwrap();
        assert_eq!(pattern.path, "/users");
        assert_eq!(pattern.methods, Method::ALL.to_vec());

        let pattern = Pattern::parse("DELETE /users").unwrap();
        assert_eq!(pattern.path, "/users");
        assert_eq!(pattern.methods, vec![Method::DELETE]);

        assert!(matches!(Pattern::parse(""), Err(Error::EmptyPattern)));
        assert!(matches!(Pattern::parse("GET /a /b"), Err(Error::InvalidPattern(_))));
        assert!(matches!(Pattern::parse("GET "), Err(Error::InvalidPattern(_))));
        assert!(matches!(Pattern::parse("HEAD /users"), Err(Error::UnsupportedMethod(ref m)) if m == "HEAD"));
        assert!(matches!(Pattern::parse("get /users"), Err(Error::UnsupportedMethod(_))));
    }

    #[tokio::test]
    async fn test_register_merges_methods() {
        let router = Router::new();
        router.register("GET /x", |_res, _req| Ok(())).await.unwrap();
        router.register("POST /x", |_res, _req| Ok(())).await.unwrap();

        let endpoints = router.endpoints().await;
        assert_eq!(endpoints, vec![("/x".to_string(), vec![Method::GET, Method::POST])]);
    }

    #[tokio::test]
    async fn test_register_duplicate_method_fails() {
        let router = Router::new();
        router.register("GET /x", |_res, _req| Ok(())).await.unwrap();

        let result = router.register("GET /x", |_res, _req| Ok(())).await;
        assert!(matches!(result, Err(Error::DuplicateRoute { method: Method::GET, ref path }) if path == "/x"));

        // A bare path overlaps every method, so nothing of it is registered
        let result = router.register("/x", |_res, _req| Ok(())).await;
        assert!(matches!(result, Err(Error::DuplicateRoute { .. })));
        assert_eq!(router.endpoints().await, vec![("/x".to_string(), vec![Method::GET])]);
    }

    #[tokio::test]
    async fn test_lookup_outcomes() {
        let router = Router::new();
        router.register("GET /users", |_res, _req| Ok(())).await.unwrap();
        router.register("/all", |_res, _req| Ok(())).await.unwrap();

        assert!(matches!(router.lookup("/users", "GET").await, RouteMatch::Found(_)));
        assert!(matches!(router.lookup("/users", "POST").await, RouteMatch::MethodNotAllowed));
        assert!(matches!(router.lookup("/users", "HEAD").await, RouteMatch::MethodNotAllowed));
        assert!(matches!(router.lookup("/users/", "GET").await, RouteMatch::NotFound));
        assert!(matches!(router.lookup("/missing", "GET").await, RouteMatch::NotFound));

        for method in Method::ALL {
            assert!(matches!(router.lookup("/all", method.as_str()).await, RouteMatch::Found(_)));
        }
    }

    #[tokio::test]
    async fn test_each_method_gets_its_own_handler() {
        let router = Router::new();
        router
            .register("GET /users", |res, _req| {
                res.write_body("list");
                Ok(())
            })
            .await
            .unwrap();
        router
            .register("POST /users", |res, req| {
                res.set_status(201);
                res.write_body(req.body.read_all());
                Ok(())
            })
            .await
            .unwrap();

        let (_, get) = serve_mock(&router, b"GET /users HTTP/1.1\r\n\r\n").await;
        assert_eq!(get, "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nlist");

        let (_, post) = serve_mock(&router, b"POST /users HTTP/1.1\r\nContent-Length: 3\r\n\r\nbob").await;
        assert_eq!(post, "HTTP/1.1 201 Created\r\nContent-Length: 3\r\n\r\nbob");
    }

    #[tokio::test]
    async fn test_hello_world_response_bytes() {
        let router = hello_router().await;
        let (result, written) = serve_mock(&router, b"GET / HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(written.starts_with("HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nhello world\n"));
    }

    #[tokio::test]
    async fn test_query_does_not_affect_routing() {
        let router = hello_router().await;
        let (result, written) = serve_mock(&router, b"GET /?name=world HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let router = hello_router().await;
        let (result, written) = serve_mock(&router, b"GET /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(written, "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let router = Router::new();
        router.register("GET /test", |_res, _req| Ok(())).await.unwrap();

        let (result, written) = serve_mock(&router, b"POST /test HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(result.is_ok());
        assert_eq!(written, "HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");

        let (_, written) = serve_mock(&router, b"OPTIONS /test HTTP/1.1\r\n\r\n").await;
        assert_eq!(written, "HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_malformed_request_gets_no_response() {
        let router = hello_router().await;

        let (result, written) = serve_mock(&router, b"INVALID REQUEST\r\n\r\n").await;
        assert!(matches!(result, Err(Error::ParseError(ParserError::MalformedRequestLine(_)))));
        assert!(written.is_empty());

        let (result, written) = serve_mock(&router, b"GET / HTTP/1.1\r\nNoColon\r\n\r\n").await;
        assert!(matches!(result, Err(Error::ParseError(ParserError::InvalidHeaderFormat(_)))));
        assert!(written.is_empty());

        let (result, written) = serve_mock(&router, b"GET / HTTP/1.1\r\nContent-Length: x\r\n\r\n").await;
        assert!(matches!(result, Err(Error::ParseError(ParserError::InvalidContentLength(_)))));
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_empty_connection() {
        let router = hello_router().await;
        let (result, written) = serve_mock(&router, b"").await;
        assert!(matches!(result, Err(Error::ParseError(ParserError::EmptyRequest))));
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected() {
        let router = hello_router().await;
        let config = ServerConfig {
            max_body_size: 4,
            ..ServerConfig::default()
        };
        let mut stream = MockTcpStream::new(&b"GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello"[..]);
        let result = HttpServer::handle_connection(&mut stream, &router, &config).await;

        assert!(matches!(result, Err(Error::ParseError(ParserError::BodyTooLarge { limit: 4 }))));
        assert!(stream.written().is_empty());
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_500() {
        let router = Router::new();
        router
            .register("/boom", |res, _req| {
                res.write_body("partial output");
                panic!("handler exploded");
            })
            .await
            .unwrap();

        let (result, written) = serve_mock(&router, b"GET /boom HTTP/1.1\r\n\r\n").await;
        assert!(matches!(result, Err(Error::HandlerPanic(ref msg)) if msg == "handler exploded"));
        assert_eq!(written, "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_500() {
        let router = Router::new();
        router
            .register("/fail", |_res, _req| Err(Error::InternalError("database unavailable".to_string())))
            .await
            .unwrap();

        let (result, written) = serve_mock(&router, b"GET /fail HTTP/1.1\r\n\r\n").await;
        assert!(matches!(result, Err(Error::InternalError(_))));
        assert_eq!(written, "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_out_of_range_status_becomes_500() {
        let router = Router::new();
        router
            .register("/status", |res, _req| {
                res.set_status(1000);
                Ok(())
            })
            .await
            .unwrap();

        let (result, written) = serve_mock(&router, b"GET /status HTTP/1.1\r\n\r\n").await;
        assert!(matches!(result, Err(Error::HandlerPanic(ref msg)) if msg.contains("1000")));
        assert_eq!(written, "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_unknown_status_phrase() {
        let router = Router::new();
        router
            .register("/teapot", |res, _req| {
                res.try_set_status(799)?;
                Ok(())
            })
            .await
            .unwrap();

        let (result, written) = serve_mock(&router, b"GET /teapot HTTP/1.1\r\n\r\n").await;
        assert!(result.is_ok());
        assert_eq!(written, "HTTP/1.1 799 Unknown Status\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_response_headers_are_written_per_value() {
        let router = Router::new();
        router
            .register("GET /cookies", |res, _req| {
                res.headers_mut().add("Set-Cookie", "a=1");
                res.headers_mut().add("Set-Cookie", "b=2");
                res.headers_mut().set("Content-Length", "999");
                write!(res, "ok")?;
                Ok(())
            })
            .await
            .unwrap();

        let (_, written) = serve_mock(&router, b"GET /cookies HTTP/1.1\r\n\r\n").await;
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.contains("Set-Cookie: a=1\r\n"));
        assert!(written.contains("Set-Cookie: b=2\r\n"));
        assert!(written.contains("Content-Length: 2\r\n"));
        assert!(!written.contains("999"));
        assert!(written.ends_with("\r\n\r\nok"));
    }

    #[tokio::test]
    async fn test_handler_reads_request() {
        let router = Router::new();
        router
            .register("POST /echo", |res, req| {
                let body = req.body.read_to_string_lossy();
                let agent = req.get_header("user-agent").unwrap_or("unknown").to_string();
                let name = req.get_query_param("name").unwrap_or_default();
                write!(res, "{agent}|{name}|{body}")?;
                Ok(())
            })
            .await
            .unwrap();

        let request = b"POST /echo?name=tiny%20http HTTP/1.1\r\n\
            User-Agent: test-client\r\n\
            Transfer-Encoding: chunked\r\n\
            \r\n\
            3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n";
        let (result, written) = serve_mock(&router, request).await;
        assert!(result.is_ok());
        assert!(written.ends_with("\r\n\r\ntest-client|tiny http|abcdef"));
    }

    #[tokio::test]
    async fn test_json_response() {
        #[derive(serde::Serialize)]
        struct User {
            name: &'static str,
        }

        let router = Router::new();
        router
            .register("GET /user", |res, _req| res.json(&User { name: "bob" }))
            .await
            .unwrap();

        let (_, written) = serve_mock(&router, b"GET /user HTTP/1.1\r\n\r\n").await;
        assert!(written.contains("Content-Type: application/json\r\n"));
        assert!(written.contains("Content-Length: 14\r\n"));
        assert!(written.ends_with("{\"name\":\"bob\"}"));
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let router = hello_router().await;
        let mut stream = BrokenPipeStream {
            read_data: Cursor::new(b"GET / HTTP/1.1\r\n\r\n".to_vec()),
        };

        let result = HttpServer::handle_connection(&mut stream, &router, &ServerConfig::default()).await;
        assert!(matches!(result, Err(Error::IoError(ref e)) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let router = hello_router().await;
        let config = ServerConfig {
            read_timeout: Duration::from_millis(50),
            ..ServerConfig::default()
        };

        // The client sends half a request and then stalls
        let (mut client, server_side) = tokio::io::duplex(1024);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        let result = HttpServer::handle_connection(server_side, &router, &config).await;
        assert!(matches!(result, Err(Error::Timeout { operation: "reading the request", .. })));

        let mut written = Vec::new();
        client.read_to_end(&mut written).await.unwrap();
        assert!(written.is_empty());
    }

    async fn start_server(server: HttpServer) -> (Arc<HttpServer>, std::net::SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(server);

        let running = server.clone();
        tokio::spawn(async move { running.run(listener).await });

        (server, addr)
    }

    async fn roundtrip(addr: std::net::SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn test_server_survives_handler_panic() {
        let server = HttpServer::new(ServerConfig::default());
        server
            .handle_func("/", |res, _req| {
                res.write_body("hello world\n");
                Ok(())
            })
            .await
            .unwrap();
        server
            .handle_func("GET /panic", |_res, _req| panic!("boom"))
            .await
            .unwrap();

        let (server, addr) = start_server(server).await;

        let response = roundtrip(addr, b"GET /panic HTTP/1.1\r\n\r\n").await;
        assert_eq!(response, "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");

        let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(response, "HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nhello world\n");

        let response = roundtrip(addr, b"DELETE /panic HTTP/1.1\r\n\r\n").await;
        assert_eq!(response, "HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");

        server.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_request_closes_connection_silently() {
        let server = HttpServer::new(ServerConfig::default());
        server.handle_func("/", |_res, _req| Ok(())).await.unwrap();
        let (server, addr) = start_server(server).await;

        let response = roundtrip(addr, b"GARBAGE\r\n").await;
        assert!(response.is_empty());

        let response = roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_concurrent_connections() {
        let server = HttpServer::new(ServerConfig::default());
        server
            .handle_func("POST /echo", |res, req| {
                res.write_body(req.body.read_all());
                Ok(())
            })
            .await
            .unwrap();
        let (server, addr) = start_server(server).await;

        let mut clients = Vec::new();
        for i in 0..16 {
            clients.push(tokio::spawn(async move {
                let body = format!("client-{i}");
                let request = format!("POST /echo HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}", body.len());
                let response = roundtrip(addr, request.as_bytes()).await;
                (body, response)
            }));
        }

        for client in clients {
            let (body, response) = client.await.unwrap();
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(response.ends_with(&format!("\r\n\r\n{body}")));
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_connection_limit_response() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        let server = HttpServer::new(config);
        server.handle_func("/", |_res, _req| Ok(())).await.unwrap();
        let (server, addr) = start_server(server).await;

        // The request is never read, so the client sends nothing and just listens
        let response = roundtrip(addr, b"").await;
        assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(response.ends_with("Server is at capacity, please try again later"));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Arc::new(HttpServer::new(ServerConfig::default()));

        let running = server.clone();
        let handle = tokio::spawn(async move { running.run(listener).await });

        server.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let server = HttpServer::new(ServerConfig::default());
        let result = server.serve(addr).await;
        assert!(matches!(result, Err(Error::Bind { .. })));
    }
}

#[cfg(test)]
mod response_tests {
    use std::io::Write;

    use crate::server::{write_response, Error, HttpResponse, StatusCode};

    #[test]
    fn test_encode_round_trip() {
        let mut response = HttpResponse::new();
        response.write_body("ok");
        let bytes = response.encode();
        let text = String::from_utf8(bytes).unwrap();

        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        let mut lines = head.split("\r\n");
        assert_eq!(lines.next(), Some("HTTP/1.1 200 OK"));
        assert_eq!(lines.collect::<Vec<_>>(), vec!["Content-Length: 2"]);
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_bare_response() {
        let mut response = HttpResponse::bare(StatusCode::NOT_FOUND);
        assert_eq!(response.encode(), b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn test_status_range() {
        let mut response = HttpResponse::new();
        assert_eq!(response.status(), StatusCode::OK);

        response.try_set_status(100).unwrap();
        response.try_set_status(999).unwrap();
        assert_eq!(response.status().as_u16(), 999);

        assert!(matches!(response.try_set_status(99), Err(Error::InvalidStatus(99))));
        assert!(matches!(response.try_set_status(1000), Err(Error::InvalidStatus(1000))));
        assert_eq!(response.status().as_u16(), 999);
    }

    #[test]
    #[should_panic(expected = "Invalid status code: 1000")]
    fn test_set_status_panics_out_of_range() {
        HttpResponse::new().set_status(1000);
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(StatusCode::OK.reason_phrase(), "OK");
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED.reason_phrase(), "Method Not Allowed");
        assert_eq!(StatusCode::from_u16(418).unwrap().reason_phrase(), "I'm a teapot");
        assert_eq!(StatusCode::from_u16(299).unwrap().reason_phrase(), "Unknown Status");
        assert_eq!(StatusCode::from_u16(299).unwrap().canonical_reason(), None);
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE.to_string(), "503 Service Unavailable");
    }

    #[test]
    fn test_builders() {
        let mut response = HttpResponse::bare(StatusCode::CREATED)
            .with_content_type("text/plain")
            .with_header("X-Request-Id", "42")
            .with_body_string("made");
        write!(response, " it").unwrap();

        assert_eq!(response.body(), b"made it");
        assert_eq!(response.headers().get("content-type"), Some("text/plain"));
        assert_eq!(
            response.encode(),
            b"HTTP/1.1 201 Created\r\nContent-Type: text/plain\r\nX-Request-Id: 42\r\nContent-Length: 7\r\n\r\nmade it"
        );
    }

    #[tokio::test]
    async fn test_write_response() {
        let mut response = HttpResponse::new();
        response.write_body("hello world\n");

        let mut out = Vec::new();
        write_response(&mut out, &mut response).await.unwrap();
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nhello world\n");
    }
}
