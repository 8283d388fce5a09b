//! gRPC listener loop.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::rpc::handler::ExampleHandler;
use crate::rpc::service::RpcService;

/// gRPC server hosting the example service.
pub struct RpcServer<H> {
    service: RpcService<H>,
}

impl<H: ExampleHandler> RpcServer<H> {
    pub fn new(service: RpcService<H>) -> Self {
        Self { service }
    }

    /// Serve calls on an already bound listener until `shutdown` resolves,
    /// then drain in-flight calls.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), tonic::transport::Error> {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        tracing::info!(address = ?addr, "RPC server starting");

        Server::builder()
            .add_service(self.service.into_server())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;

        tracing::info!("RPC server stopped");
        Ok(())
    }
}
