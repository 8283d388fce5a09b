//! `example.v1.ExampleService`: greeting RPCs with REST bindings.
//!
//! Messages are plain protobuf structs (prost) that also derive serde so the
//! gateway can hand them validated JSON. Field names on the Rust side are the
//! proto names; JSON names live in the schemas below.

use serde::{Deserialize, Serialize};

use super::schema::{
    BodyMapping, FieldDescriptor, FieldKind, HttpRule, MessageSchema, MethodDescriptor,
    ServiceDescriptor,
};

// Generated by build.rs: `example_service_server` and `example_service_client`.
include!(concat!(env!("OUT_DIR"), "/example.v1.ExampleService.rs"));

/// Request carrying the name to greet.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Greeting produced by the service.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckRequest {}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckResponse {
    #[prost(bool, tag = "1")]
    pub healthy: bool,
    #[prost(string, tag = "2")]
    pub version: String,
}

pub static EXAMPLE_REQUEST: MessageSchema = MessageSchema {
    name: "example.v1.ExampleRequest",
    fields: &[FieldDescriptor::required("name", "name", FieldKind::String)],
};

pub static EXAMPLE_RESPONSE: MessageSchema = MessageSchema {
    name: "example.v1.ExampleResponse",
    fields: &[FieldDescriptor::optional("message", "message", FieldKind::String)],
};

pub static HEALTH_CHECK_REQUEST: MessageSchema = MessageSchema {
    name: "example.v1.HealthCheckRequest",
    fields: &[],
};

pub static HEALTH_CHECK_RESPONSE: MessageSchema = MessageSchema {
    name: "example.v1.HealthCheckResponse",
    fields: &[
        FieldDescriptor::optional("healthy", "healthy", FieldKind::Bool),
        FieldDescriptor::optional("version", "version", FieldKind::String),
    ],
};

pub static EXAMPLE_SERVICE: ServiceDescriptor = ServiceDescriptor {
    package: "example.v1",
    name: "ExampleService",
    methods: &[
        MethodDescriptor {
            name: "SayHello",
            request: &EXAMPLE_REQUEST,
            response: &EXAMPLE_RESPONSE,
            http: &[
                HttpRule::post("/v1/greet", BodyMapping::Whole),
                HttpRule::get("/v1/greet/{name}"),
            ],
        },
        MethodDescriptor {
            name: "SayGoodbye",
            request: &EXAMPLE_REQUEST,
            response: &EXAMPLE_RESPONSE,
            http: &[
                HttpRule::post("/v1/goodbye", BodyMapping::Whole),
                HttpRule::get("/v1/goodbye/{name}"),
            ],
        },
        // RPC-only: never appears in the routing table.
        MethodDescriptor {
            name: "HealthCheck",
            request: &HEALTH_CHECK_REQUEST,
            response: &HEALTH_CHECK_RESPONSE,
            http: &[],
        },
    ],
};
