//! RPC → HTTP response encoding.
//!
//! # Responsibilities
//! - Render a successful response message as protojson (JSON names, every
//!   field emitted, 64-bit integers as strings)
//! - Render a failure status as the `{code, message, details}` envelope

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contract::{FieldKind, MessageSchema};
use crate::rpc::RpcStatus;
use crate::translate::status_map::{code_name, http_status};

/// JSON error body returned for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.details = details;
        self
    }
}

/// Map a failed call to its HTTP status and envelope.
pub fn encode_failure(status: &RpcStatus) -> (StatusCode, ErrorEnvelope) {
    let envelope = ErrorEnvelope::new(code_name(status.code), status.message.clone())
        .with_details(status.details.clone());
    (http_status(status.code), envelope)
}

/// Render a response message (proto-named JSON) under its JSON names.
pub fn encode_response(schema: &MessageSchema, message: &Value) -> Value {
    let mut rendered = Map::new();
    for field in schema.fields {
        let value = message
            .get(field.name)
            .or_else(|| message.get(field.json_name))
            .unwrap_or(&Value::Null);
        rendered.insert(field.json_name.to_string(), encode_field(field.kind, value));
    }
    Value::Object(rendered)
}

fn encode_field(kind: FieldKind, value: &Value) -> Value {
    match (kind, value) {
        (FieldKind::Message(nested), Value::Object(_)) => encode_response(nested, value),
        (FieldKind::Message(_), _) => Value::Null,
        (FieldKind::Int64 | FieldKind::UInt64, Value::Number(n)) => Value::String(n.to_string()),
        (FieldKind::Int64 | FieldKind::UInt64, Value::String(_)) => value.clone(),
        (FieldKind::Int64 | FieldKind::UInt64, _) => Value::String("0".to_string()),
        (FieldKind::Int32 | FieldKind::UInt32, Value::Number(_)) => value.clone(),
        (FieldKind::Int32 | FieldKind::UInt32, _) => Value::from(0),
        (FieldKind::Double, Value::Number(_)) => value.clone(),
        (FieldKind::Double, _) => Value::from(0.0),
        (FieldKind::Bool, Value::Bool(_)) => value.clone(),
        (FieldKind::Bool, _) => Value::Bool(false),
        (FieldKind::String, Value::String(_)) => value.clone(),
        (FieldKind::String, _) => Value::String(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::example::{ExampleResponse, EXAMPLE_RESPONSE};
    use crate::contract::FieldDescriptor;
    use crate::translate::request::decode_message;
    use serde_json::json;
    use tonic::Code;

    static OWNER: MessageSchema = MessageSchema {
        name: "test.Owner",
        fields: &[FieldDescriptor::optional("display_name", "displayName", FieldKind::String)],
    };

    static BOOK: MessageSchema = MessageSchema {
        name: "test.Book",
        fields: &[
            FieldDescriptor::optional("book_id", "bookId", FieldKind::Int64),
            FieldDescriptor::optional("page_count", "pageCount", FieldKind::UInt32),
            FieldDescriptor::optional("rating", "rating", FieldKind::Double),
            FieldDescriptor::optional("in_print", "inPrint", FieldKind::Bool),
            FieldDescriptor::optional("owner", "owner", FieldKind::Message(&OWNER)),
            FieldDescriptor::optional("missing_owner", "missingOwner", FieldKind::Message(&OWNER)),
        ],
    };

    #[test]
    fn test_renders_json_names_and_string_int64() {
        let message = json!({
            "book_id": 9007199254740993i64,
            "page_count": 320,
            "rating": 4.5,
            "owner": {"display_name": "Ada"},
        });
        assert_eq!(
            encode_response(&BOOK, &message),
            json!({
                "bookId": "9007199254740993",
                "pageCount": 320,
                "rating": 4.5,
                "inPrint": false,
                "owner": {"displayName": "Ada"},
                "missingOwner": null,
            })
        );
    }

    #[test]
    fn test_response_round_trips_through_json() {
        let message = json!({
            "book_id": -42,
            "page_count": 7,
            "rating": 0.25,
            "in_print": true,
            "owner": {"display_name": "Grace"},
        });
        let wire = serde_json::to_string(&encode_response(&BOOK, &message)).unwrap();
        let parsed: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(decode_message(&BOOK, parsed).unwrap(), message);
    }

    #[test]
    fn test_typed_response_round_trips() {
        let response = ExampleResponse {
            message: "Hello, Ada!".into(),
        };
        let rendered = encode_response(&EXAMPLE_RESPONSE, &serde_json::to_value(&response).unwrap());
        let back: ExampleResponse =
            serde_json::from_value(decode_message(&EXAMPLE_RESPONSE, rendered).unwrap()).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_failure_envelope() {
        let status = RpcStatus::not_found("no greeting for ghost")
            .with_details(json!({"name": "ghost"}));
        let (http, envelope) = encode_failure(&status);
        assert_eq!(http, StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "code": "NotFound",
                "message": "no greeting for ghost",
                "details": {"name": "ghost"},
            })
        );

        let (http, envelope) = encode_failure(&RpcStatus::new(Code::Unauthenticated, "who?"));
        assert_eq!(http, StatusCode::UNAUTHORIZED);
        assert!(serde_json::to_value(&envelope).unwrap().get("details").is_none());
    }
}
