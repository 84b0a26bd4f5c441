//! `{ success, message?, ...payload }` response envelope shared by every handler.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

/// Payload for responses that carry nothing beyond the status flag and message.
#[derive(Debug, Serialize)]
pub struct Empty {}

pub type ApiJson<T> = Json<Envelope<T>>;

pub fn ok<T: Serialize>(payload: T) -> ApiJson<T> {
    Json(Envelope {
        success: true,
        message: None,
        payload,
    })
}

pub fn ok_with_message<T: Serialize>(message: impl Into<String>, payload: T) -> ApiJson<T> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        payload,
    })
}

pub fn message(message: impl Into<String>) -> ApiJson<Empty> {
    ok_with_message(message, Empty {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Payload {
        token: &'static str,
    }

    #[test]
    fn test_payload_is_flattened() {
        let Json(body) = ok_with_message("Logged in", Payload { token: "abc" });
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "success": true, "message": "Logged in", "token": "abc" })
        );
    }

    #[test]
    fn test_message_only() {
        let Json(body) = message("Done");
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "message": "Done" }));
    }

    #[test]
    fn test_message_omitted_when_absent() {
        let Json(body) = ok(Payload { token: "t" });
        let value = serde_json::to_value(body).unwrap();
        assert!(value.get("message").is_none());
    }
}
