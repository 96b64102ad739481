// src/json.rs
//
// JSON response helpers built on `serde_json`. The teacher's own
// `kowito-json` schema-JIT serializer is not part of this pack (no
// source anywhere in the corpus to ground it on), so this layer is
// `serde_json` end to end.

pub use serde_json::Value;

pub fn to_response<T: serde::Serialize>(status: u16, val: &T) -> crate::http::Response {
    crate::http::Response::json_value(status, val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Payload {
        ok: bool,
    }

    #[test]
    fn to_response_serializes_body() {
        let response = to_response(201, &Payload { ok: true });
        assert_eq!(response.status, 201);
        assert_eq!(response.content_type, "application/json");
        assert_eq!(response.body.as_bytes(), br#"{"ok":true}"#);
    }
}
