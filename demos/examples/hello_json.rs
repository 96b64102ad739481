// examples/hello_json.rs
use viaduct::extract::{FromRequest, Json};
use viaduct::{Context, FnMiddleware, Router, Server};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct UserPayload {
    name: String,
    age: u32,
}

fn hello_json(ctx: &mut Context) {
    ctx.json(200, &serde_json::json!({"message": "Hello, World!"}));
}

fn create_user(ctx: &mut Context) {
    match Json::<UserPayload>::from_request(ctx) {
        Ok(Json(payload)) => ctx.text(200, format!("Created user '{}' age {}", payload.name, payload.age)),
        Err(response) => {
            ctx.status = response.status;
            ctx.response_body = response.body.as_bytes().to_vec();
        }
    }
}

fn hello_text(ctx: &mut Context) {
    let name = ctx.param("name").unwrap_or("World").to_string();
    let uppercase = ctx.query_param("upper").as_deref() == Some("true");
    let user_agent = ctx.header("User-Agent").unwrap_or("Unknown").to_string();

    let mut greeting = format!("Hello, {}! You are using {}.", name, user_agent);
    if uppercase {
        greeting = greeting.to_uppercase();
    }
    ctx.text(200, greeting);
}

fn panic_handler(_ctx: &mut Context) {
    panic!("This is a deliberate panic to test recovery!");
}

fn stream_handler(ctx: &mut Context) {
    // The pipeline commits a single buffered response; streaming bodies
    // are a connection-layer concern this handler doesn't reach into.
    ctx.text(200, "Chunk 0\nChunk 1\nChunk 2\nChunk 3\nChunk 4\n");
}

fn main() {
    let router = Router::new();
    router.use_middleware(std::sync::Arc::new(FnMiddleware::new(|ctx, next| {
        let method = ctx.request.method;
        let path = ctx.request.path.clone();
        let start = std::time::Instant::now();

        next(ctx);

        println!("{} {} -> {} in {:?}", method, path, ctx.status, start.elapsed());
    })));
    router.get("/hello", hello_json);
    router.get("/hello/:name", hello_text);
    router.post("/users", create_user);
    router.get("/stream", stream_handler);
    router.get("/panic", panic_handler);

    println!("Starting Chopin on 0.0.0.0:8082...");
    Server::bind("0.0.0.0:8082")
        .workers(1) // Just 1 for testing Mac
        .serve(router)
        .unwrap();
}
