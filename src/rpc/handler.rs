//! Business logic behind the example service.

use async_trait::async_trait;

use crate::contract::example::{
    ExampleRequest, ExampleResponse, HealthCheckRequest, HealthCheckResponse,
};
use crate::rpc::context::CallContext;
use crate::rpc::status::{RpcStatus, StatusOutcome};

/// Capability set of `example.v1.ExampleService`.
///
/// Implementations only see validated messages and a [`CallContext`]; the
/// transport, deadlines and panic recovery are handled by
/// [`RpcService`](crate::rpc::RpcService).
#[async_trait]
pub trait ExampleHandler: Send + Sync + 'static {
    async fn say_hello(&self, ctx: &CallContext, request: ExampleRequest)
        -> StatusOutcome<ExampleResponse>;

    async fn say_goodbye(
        &self,
        ctx: &CallContext,
        request: ExampleRequest,
    ) -> StatusOutcome<ExampleResponse>;

    async fn health_check(
        &self,
        _ctx: &CallContext,
        _request: HealthCheckRequest,
    ) -> StatusOutcome<HealthCheckResponse> {
        Ok(HealthCheckResponse {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// Default greeting logic.
#[derive(Debug, Clone, Default)]
pub struct GreetingHandler;

impl GreetingHandler {
    pub fn new() -> Self {
        Self
    }
}

fn require_name(request: &ExampleRequest) -> Result<&str, RpcStatus> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(RpcStatus::invalid_argument("name must not be empty"));
    }
    Ok(name)
}

#[async_trait]
impl ExampleHandler for GreetingHandler {
    async fn say_hello(
        &self,
        _ctx: &CallContext,
        request: ExampleRequest,
    ) -> StatusOutcome<ExampleResponse> {
        let name = require_name(&request)?;
        Ok(ExampleResponse {
            message: format!("Hello, {}!", name),
        })
    }

    async fn say_goodbye(
        &self,
        _ctx: &CallContext,
        request: ExampleRequest,
    ) -> StatusOutcome<ExampleResponse> {
        let name = require_name(&request)?;
        Ok(ExampleResponse {
            message: format!("Goodbye, {}!", name),
        })
    }
}
