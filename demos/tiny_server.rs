//! A small server demonstrating route registration with tinyhttp-rs.
//!
//! Run with `RUST_LOG=debug cargo run --example tiny_server`, then try
//! `curl -d 'some data' 'http://127.0.0.1:8888/users?name=ann'`.

use std::io::Write;

use log::info;
use tinyhttp_rs::{HttpRequest, HttpResponse, HttpServer, ServerConfig, ServerError};

fn hello_handler(res: &mut HttpResponse, req: &mut HttpRequest) -> Result<(), ServerError> {
    info!("{} {}", req.method, req.uri);
    for (name, value) in req.headers.iter() {
        info!("  {name}: {value}");
    }
    info!("  query: {:?}", req.query_params()?);

    res.write_all(b"hello world\n")?;

    let body = req.body.read_all();
    write!(res, "Request body: {}", String::from_utf8_lossy(&body))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let server = HttpServer::new(ServerConfig::default());

    server.handle_func("/", hello_handler).await?;
    server.handle_func("GET /users", hello_handler).await?;
    server.handle_func("POST /users", hello_handler).await?;

    server.serve("127.0.0.1:8888").await?;

    Ok(())
}
