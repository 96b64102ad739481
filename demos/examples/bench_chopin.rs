// examples/bench_chopin.rs
use viaduct::{Context, Router, Server};

fn json_handler(ctx: &mut Context) {
    ctx.response_headers.push(("Server", "Example".to_string()));
    ctx.response_headers.push(("Date", "Wed, 17 Apr 2013 12:00:00 GMT".to_string()));
    ctx.json(200, &serde_json::json!({"message": "Hello, World!"}));
}

fn plain_handler(ctx: &mut Context) {
    ctx.response_headers.push(("Server", "Example".to_string()));
    ctx.response_headers.push(("Date", "Wed, 17 Apr 2013 12:00:00 GMT".to_string()));
    ctx.text(200, "Hello, World!");
}

fn main() {
    let router = Router::new();
    router.get("/json", json_handler);
    router.get("/plain", plain_handler);

    // Disable print statements for benchmarking by removing any logging
    // middleware and using max workers for throughput.
    Server::bind("0.0.0.0:8080")
        .workers(1) // Avoid EADDRINUSE macos issues
        .serve(router)
        .unwrap();
}
