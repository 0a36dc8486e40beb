use log::{error, info};
use std::env;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use webrelay::{logging, Request, Response, Router, Server, ServerConfig, ServerResult};

fn main() -> ServerResult<()> {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let config = if args.len() > 1 && Path::new(&args[1]).exists() {
        // Load configuration from file
        ServerConfig::from_json_file(&args[1])?
    } else {
        // Use default configuration
        ServerConfig::new()
    };
    logging::init(&config)?;

    let mut server = Server::new(config, Arc::new(demo_router()));
    if let Err(e) = server.run() {
        error!("server failed to start: {}", e);
        return Err(e);
    }

    // Block until Ctrl-C, then stop accepting
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| webrelay::ServerError::Config(format!("cannot install signal handler: {}", e)))?;
    let _ = rx.recv();

    info!("received shutdown signal, stopping server");
    server.close();
    Ok(())
}

fn demo_router() -> Router {
    let mut router = Router::new();

    router.get("/", |_| Ok(Response::text("webrelay is running")));

    router.post("/echo", |req: &Request| {
        let mut response = Response::ok();
        if let Some(content_type) = req.header("Content-Type") {
            response.set_header("Content-Type", content_type);
        }
        response.set_body(req.body().to_vec());
        Ok(response)
    });

    router
}
