//! Adapter between the generated tonic service trait and [`ExampleHandler`].
//!
//! # Responsibilities
//! - Build a [`CallContext`] for every call
//! - Enforce the call deadline around the handler
//! - Cancel the context when the call finishes or is dropped
//! - Recover handler panics as `Internal`

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tonic::{Code, Request, Response, Status};

use crate::contract::example::example_service_server::{ExampleService, ExampleServiceServer};
use crate::contract::example::{
    ExampleRequest, ExampleResponse, HealthCheckRequest, HealthCheckResponse,
};
use crate::observability::metrics;
use crate::rpc::context::CallContext;
use crate::rpc::handler::ExampleHandler;
use crate::rpc::status::{RpcStatus, StatusOutcome};

/// Serves an [`ExampleHandler`] over gRPC.
pub struct RpcService<H> {
    handler: Arc<H>,
}

impl<H: ExampleHandler> RpcService<H> {
    pub fn new(handler: H) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    pub fn from_arc(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Wrap into the generated tonic server type.
    pub fn into_server(self) -> ExampleServiceServer<Self> {
        ExampleServiceServer::new(self)
    }
}

impl<H> Clone for RpcService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Drive one handler future under the context's deadline.
async fn run<T>(
    ctx: &CallContext,
    call: impl Future<Output = StatusOutcome<T>>,
) -> Result<Response<T>, Status> {
    let _cancel = ctx.cancel_on_drop();
    let started = Instant::now();
    let call = AssertUnwindSafe(call).catch_unwind();

    let outcome = match ctx.remaining() {
        Some(remaining) => match tokio::time::timeout(remaining, call).await {
            Ok(finished) => finished,
            Err(_) => {
                ctx.cancel();
                Ok(Err(RpcStatus::deadline_exceeded(
                    "deadline exceeded before the handler returned",
                )))
            }
        },
        None => call.await,
    };

    let outcome = outcome.unwrap_or_else(|payload| {
        tracing::error!(
            method = ctx.method(),
            panic = panic_message(payload.as_ref()),
            "Handler panicked"
        );
        Err(RpcStatus::new(Code::Internal, "internal error"))
    });

    let code = outcome.as_ref().map_or_else(|s| s.code, |_| Code::Ok);
    metrics::record_rpc_call(ctx.method(), code, started);
    tracing::info!(
        method = ctx.method(),
        code = ?code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "RPC call completed"
    );

    outcome.map(Response::new).map_err(Status::from)
}

#[tonic::async_trait]
impl<H: ExampleHandler> ExampleService for RpcService<H> {
    async fn say_hello(
        &self,
        request: Request<ExampleRequest>,
    ) -> Result<Response<ExampleResponse>, Status> {
        let ctx = CallContext::from_metadata("SayHello", request.metadata());
        let message = request.into_inner();
        run(&ctx, self.handler.say_hello(&ctx, message)).await
    }

    async fn say_goodbye(
        &self,
        request: Request<ExampleRequest>,
    ) -> Result<Response<ExampleResponse>, Status> {
        let ctx = CallContext::from_metadata("SayGoodbye", request.metadata());
        let message = request.into_inner();
        run(&ctx, self.handler.say_goodbye(&ctx, message)).await
    }

    async fn health_check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let ctx = CallContext::from_metadata("HealthCheck", request.metadata());
        let message = request.into_inner();
        run(&ctx, self.handler.health_check(&ctx, message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handler::GreetingHandler;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Handler that parks until cancelled and reports its context.
    struct Sleepy {
        seen: mpsc::UnboundedSender<CallContext>,
    }

    #[async_trait]
    impl ExampleHandler for Sleepy {
        async fn say_hello(
            &self,
            ctx: &CallContext,
            _request: ExampleRequest,
        ) -> StatusOutcome<ExampleResponse> {
            let _ = self.seen.send(ctx.clone());
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(ExampleResponse::default())
        }

        async fn say_goodbye(
            &self,
            _ctx: &CallContext,
            _request: ExampleRequest,
        ) -> StatusOutcome<ExampleResponse> {
            panic!("goodbye is broken");
        }
    }

    fn with_timeout(name: &str, timeout: &'static str) -> Request<ExampleRequest> {
        let mut request = Request::new(ExampleRequest { name: name.into() });
        request
            .metadata_mut()
            .insert("grpc-timeout", tonic::metadata::MetadataValue::from_static(timeout));
        request
    }

    #[tokio::test]
    async fn test_ok_outcome_becomes_response() {
        let service = RpcService::new(GreetingHandler);
        let response = service
            .say_hello(Request::new(ExampleRequest { name: "Grace".into() }))
            .await
            .unwrap();
        assert_eq!(response.into_inner().message, "Hello, Grace!");
    }

    #[tokio::test]
    async fn test_handler_failure_keeps_its_code() {
        let service = RpcService::new(GreetingHandler);
        let status = service
            .say_goodbye(Request::new(ExampleRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_deadline_cuts_handler_short_and_cancels_context() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = RpcService::new(Sleepy { seen: tx });

        let started = Instant::now();
        let status = service.say_hello(with_timeout("x", "50m")).await.unwrap_err();

        assert_eq!(status.code(), Code::DeadlineExceeded);
        assert!(started.elapsed() < Duration::from_millis(400));
        let ctx = rx.recv().await.unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_call_cancels_context() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = RpcService::new(Sleepy { seen: tx });

        let task = tokio::spawn(async move {
            let _ = service
                .say_hello(Request::new(ExampleRequest { name: "x".into() }))
                .await;
        });
        let ctx = rx.recv().await.unwrap();
        assert!(!ctx.is_cancelled());

        task.abort();
        let _ = task.await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_panic_becomes_internal() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let service = RpcService::new(Sleepy { seen: tx });
        let status = service
            .say_goodbye(Request::new(ExampleRequest { name: "x".into() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
    }
}
