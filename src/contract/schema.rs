//! Descriptor types for services, methods, messages and HTTP rules.

use axum::http::{Method, StatusCode};

/// A whole RPC service: package, name and the methods it exposes.
#[derive(Debug)]
pub struct ServiceDescriptor {
    /// Protobuf package (e.g. `example.v1`).
    pub package: &'static str,
    /// Service name (e.g. `ExampleService`).
    pub name: &'static str,
    pub methods: &'static [MethodDescriptor],
}

impl ServiceDescriptor {
    /// Fully qualified service name, `package.Service`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }

    /// gRPC request path for a method, `/package.Service/Method`.
    pub fn rpc_path(&self, method: &str) -> String {
        format!("/{}.{}/{}", self.package, self.name, method)
    }

    /// Look up a method by its RPC name.
    pub fn method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// One RPC method and its optional REST exposure.
#[derive(Debug)]
pub struct MethodDescriptor {
    /// RPC method name as it appears on the wire (e.g. `SayHello`).
    pub name: &'static str,
    pub request: &'static MessageSchema,
    pub response: &'static MessageSchema,
    /// HTTP rules; empty for RPC-only methods.
    pub http: &'static [HttpRule],
}

impl MethodDescriptor {
    /// True when the method has at least one REST route.
    pub fn is_rest_exposed(&self) -> bool {
        !self.http.is_empty()
    }
}

/// Declarative HTTP binding of a method.
#[derive(Debug, Clone, Copy)]
pub struct HttpRule {
    pub verb: HttpVerb,
    /// Path template, e.g. `/v1/greet/{name}`.
    pub path: &'static str,
    pub body: BodyMapping,
    /// Status used for a successful call.
    pub success_status: StatusCode,
}

impl HttpRule {
    pub const fn get(path: &'static str) -> Self {
        Self {
            verb: HttpVerb::Get,
            path,
            body: BodyMapping::None,
            success_status: StatusCode::OK,
        }
    }

    pub const fn post(path: &'static str, body: BodyMapping) -> Self {
        Self {
            verb: HttpVerb::Post,
            path,
            body,
            success_status: StatusCode::OK,
        }
    }

    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }
}

/// HTTP methods a rule can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_method(&self) -> Method {
        match self {
            HttpVerb::Get => Method::GET,
            HttpVerb::Post => Method::POST,
            HttpVerb::Put => Method::PUT,
            HttpVerb::Patch => Method::PATCH,
            HttpVerb::Delete => Method::DELETE,
        }
    }
}

/// Where the JSON request body goes in the request message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMapping {
    /// The body is ignored; fields come from path and query only.
    None,
    /// The body is the whole request message (`body: "*"`).
    Whole,
    /// The body is the value of one top-level field.
    Field(&'static str),
}

/// Shape of a message: an ordered list of fields.
#[derive(Debug)]
pub struct MessageSchema {
    /// Fully qualified message name, for error messages.
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl MessageSchema {
    /// Find a field by proto name or JSON name.
    pub fn field(&self, key: &str) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == key || f.json_name == key)
    }

    /// Resolve a dotted field path (`user.name`) through nested messages.
    pub fn field_path(&self, path: &str) -> Option<&'static FieldDescriptor> {
        let mut schema = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let field = schema.field(segment)?;
            if segments.peek().is_none() {
                return Some(field);
            }
            match field.kind {
                FieldKind::Message(nested) => schema = nested,
                _ => return None,
            }
        }
        None
    }
}

/// One field of a message.
#[derive(Debug)]
pub struct FieldDescriptor {
    /// Proto (snake_case) name; also the Rust field name.
    pub name: &'static str,
    /// lowerCamelCase name used when rendering JSON.
    pub json_name: &'static str,
    pub kind: FieldKind,
    /// Omission from every request source is a client error.
    pub required: bool,
}

impl FieldDescriptor {
    pub const fn optional(name: &'static str, json_name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            json_name,
            kind,
            required: false,
        }
    }

    pub const fn required(name: &'static str, json_name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            json_name,
            kind,
            required: true,
        }
    }
}

/// Declared type of a field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Double,
    Message(&'static MessageSchema),
}

impl FieldKind {
    /// Name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::UInt32 => "uint32",
            FieldKind::UInt64 => "uint64",
            FieldKind::Double => "double",
            FieldKind::Message(schema) => schema.name,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldKind::Message(_))
    }
}
