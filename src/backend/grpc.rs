//! tonic-based backend over one shared HTTP/2 channel.

use std::collections::HashMap;
use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::uri::PathAndQuery;
use futures_util::future::BoxFuture;
use prost::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status, TimeoutExpired};

use crate::backend::{BackendError, OutboundCall, RpcBackend, RpcReply};
use crate::contract::example::{
    ExampleRequest, ExampleResponse, HealthCheckRequest, HealthCheckResponse, EXAMPLE_SERVICE,
};
use crate::contract::{MethodDescriptor, ServiceDescriptor};
use crate::rpc::RpcStatus;

type Invoker = fn(Grpc<Channel>, PathAndQuery, OutboundCall) -> BoxFuture<'static, Result<RpcReply, BackendError>>;

struct Route {
    path: PathAndQuery,
    invoke: Invoker,
}

/// Calls the RPC server through a lazily connected tonic channel.
///
/// The channel multiplexes every call over one HTTP/2 connection and
/// reconnects on demand; connection errors surface per call.
#[derive(Clone)]
pub struct GrpcBackend {
    grpc: Grpc<Channel>,
    routes: std::sync::Arc<HashMap<&'static str, Route>>,
}

impl BackendError {
    /// A status with an error source was produced by the client transport,
    /// not by the server. The channel's own deadline expiring is the one
    /// transport failure that is not an outage.
    fn from_status(status: Status) -> Self {
        if caused_by::<TimeoutExpired>(&status) {
            BackendError::Status(RpcStatus::deadline_exceeded(status.message()))
        } else if status.source().is_some() {
            BackendError::Unavailable(status.message().to_string())
        } else {
            BackendError::Status(RpcStatus::from(&status))
        }
    }
}

fn caused_by<E: std::error::Error + 'static>(status: &Status) -> bool {
    let mut current = status.source();
    while let Some(err) = current {
        if err.is::<E>() {
            return true;
        }
        current = err.source();
    }
    false
}

async fn invoke_unary<Req, Resp>(
    mut grpc: Grpc<Channel>,
    path: PathAndQuery,
    call: OutboundCall,
) -> Result<RpcReply, BackendError>
where
    Req: Message + DeserializeOwned + Default + 'static,
    Resp: Message + Serialize + Default + 'static,
{
    let message: Req = serde_json::from_value(call.payload)
        .map_err(|e| BackendError::Conversion(e.to_string()))?;

    let mut request = Request::new(message);
    *request.metadata_mut() = call.metadata;
    request.set_timeout(call.timeout);

    grpc.ready()
        .await
        .map_err(|e| BackendError::Unavailable(e.to_string()))?;

    let codec = ProstCodec::<Req, Resp>::default();
    let response = grpc
        .unary(request, path, codec)
        .await
        .map_err(BackendError::from_status)?;

    let (metadata, message, _) = response.into_parts();
    let payload =
        serde_json::to_value(&message).map_err(|e| BackendError::Conversion(e.to_string()))?;
    Ok(RpcReply { payload, metadata })
}

fn boxed<Req, Resp>(
    grpc: Grpc<Channel>,
    path: PathAndQuery,
    call: OutboundCall,
) -> BoxFuture<'static, Result<RpcReply, BackendError>>
where
    Req: Message + DeserializeOwned + Default + 'static,
    Resp: Message + Serialize + Default + 'static,
{
    Box::pin(invoke_unary::<Req, Resp>(grpc, path, call))
}

/// Builder that registers one typed invoker per RPC method.
pub struct GrpcBackendBuilder {
    service: &'static ServiceDescriptor,
    routes: HashMap<&'static str, Route>,
}

impl GrpcBackendBuilder {
    pub fn unary<Req, Resp>(mut self, method: &'static str) -> Result<Self, BackendError>
    where
        Req: Message + DeserializeOwned + Default + 'static,
        Resp: Message + Serialize + Default + 'static,
    {
        let descriptor = self
            .service
            .method(method)
            .ok_or(BackendError::UnknownMethod(method))?;
        let path = PathAndQuery::try_from(self.service.rpc_path(descriptor.name))
            .map_err(|e| BackendError::Conversion(e.to_string()))?;
        self.routes.insert(
            descriptor.name,
            Route {
                path,
                invoke: boxed::<Req, Resp>,
            },
        );
        Ok(self)
    }

    pub fn build(self, channel: Channel) -> GrpcBackend {
        GrpcBackend {
            grpc: Grpc::new(channel),
            routes: std::sync::Arc::new(self.routes),
        }
    }
}

impl GrpcBackend {
    pub fn builder(service: &'static ServiceDescriptor) -> GrpcBackendBuilder {
        GrpcBackendBuilder {
            service,
            routes: HashMap::new(),
        }
    }

    /// Backend for `example.v1.ExampleService` on an existing channel.
    pub fn example(channel: Channel) -> Result<Self, BackendError> {
        Ok(Self::builder(&EXAMPLE_SERVICE)
            .unary::<ExampleRequest, ExampleResponse>("SayHello")?
            .unary::<ExampleRequest, ExampleResponse>("SayGoodbye")?
            .unary::<HealthCheckRequest, HealthCheckResponse>("HealthCheck")?
            .build(channel))
    }

    /// Create a lazily connected channel to `address` (e.g. `http://127.0.0.1:50051`).
    ///
    /// Must be called inside a Tokio runtime.
    pub fn lazy_channel(address: &str, connect_timeout: Duration) -> Result<Channel, BackendError> {
        let endpoint = Endpoint::from_shared(address.to_string())
            .map_err(|e| BackendError::Unavailable(format!("invalid backend address {address}: {e}")))?
            .connect_timeout(connect_timeout);
        Ok(endpoint.connect_lazy())
    }
}

#[async_trait]
impl RpcBackend for GrpcBackend {
    async fn call(
        &self,
        method: &'static MethodDescriptor,
        call: OutboundCall,
    ) -> Result<RpcReply, BackendError> {
        let route = self
            .routes
            .get(method.name)
            .ok_or(BackendError::UnknownMethod(method.name))?;
        (route.invoke)(self.grpc.clone(), route.path.clone(), call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tonic::metadata::MetadataMap;
    use tonic::Code;

    fn call(payload: serde_json::Value) -> OutboundCall {
        OutboundCall {
            payload,
            metadata: MetadataMap::new(),
            timeout: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_transport_failures_are_unavailable() {
        let coded = Status::new(Code::NotFound, "nope");
        assert!(matches!(BackendError::from_status(coded), BackendError::Status(_)));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let transport = Status::from_error(Box::new(io));
        assert!(matches!(
            BackendError::from_status(transport),
            BackendError::Unavailable(_)
        ));
    }

    #[test]
    fn test_channel_timeout_is_deadline_exceeded() {
        let expired = Status::from_error(Box::new(TimeoutExpired(())));
        assert_eq!(expired.code(), Code::Cancelled);
        match BackendError::from_status(expired) {
            BackendError::Status(status) => assert_eq!(status.code, Code::DeadlineExceeded),
            other => panic!("expected a deadline status, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_method_is_rejected_at_registration() {
        let err = GrpcBackend::builder(&EXAMPLE_SERVICE)
            .unary::<ExampleRequest, ExampleResponse>("Nope")
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::UnknownMethod("Nope")));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Reserve a port and release it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel =
            GrpcBackend::lazy_channel(&format!("http://{addr}"), Duration::from_millis(200)).unwrap();
        let backend = GrpcBackend::example(channel).unwrap();
        let method = EXAMPLE_SERVICE.method("SayHello").unwrap();

        let err = backend
            .call(method, call(json!({"name": "Ada"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)), "got {err:?}");
    }
}
