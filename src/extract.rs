// src/extract.rs
use crate::context::Context;
use crate::http::Response;
use serde::de::DeserializeOwned;

pub trait FromRequest: Sized {
    type Error: Into<Response>;

    fn from_request(ctx: &Context) -> Result<Self, Self::Error>;
}

pub struct Json<T>(pub T);

impl<T> FromRequest for Json<T>
where
    T: DeserializeOwned,
{
    type Error = Response;

    fn from_request(ctx: &Context) -> Result<Self, Self::Error> {
        serde_json::from_slice(&ctx.request.body)
            .map(Json)
            .map_err(|_| Response::ok(b"Invalid JSON body".to_vec()).status(400))
    }
}

pub struct Query<T>(pub T);

impl<T> FromRequest for Query<T>
where
    T: DeserializeOwned,
{
    type Error = Response;

    fn from_request(ctx: &Context) -> Result<Self, Self::Error> {
        let qs = ctx.request.query.as_deref().unwrap_or("");
        let mut map = serde_json::Map::new();
        for pair in qs.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            map.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        serde_json::from_value(serde_json::Value::Object(map))
            .map(Query)
            .map_err(|_| Response::ok(b"Invalid query string".to_vec()).status(400))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    fn ctx_with(body: Vec<u8>, query: Option<&str>) -> Context {
        Context::new(
            crate::context::OwnedRequest {
                method: crate::http::Method::Get,
                path: "/".to_string(),
                query: query.map(|q| q.to_string()),
                headers: Vec::new(),
                body,
            },
            HashMap::new(),
        )
    }

    #[derive(Deserialize)]
    struct Payload {
        name: String,
    }

    #[test]
    fn json_extracts_valid_body() {
        let ctx = ctx_with(br#"{"name":"alice"}"#.to_vec(), None);
        let Json(payload) = Json::<Payload>::from_request(&ctx).unwrap();
        assert_eq!(payload.name, "alice");
    }

    #[test]
    fn json_rejects_invalid_body() {
        let ctx = ctx_with(b"not json".to_vec(), None);
        assert!(Json::<Payload>::from_request(&ctx).is_err());
    }

    #[test]
    fn query_extracts_pairs() {
        let ctx = ctx_with(Vec::new(), Some("name=bob"));
        let Query(payload) = Query::<Payload>::from_request(&ctx).unwrap();
        assert_eq!(payload.name, "bob");
    }
}
