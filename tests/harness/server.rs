//! In-process test server on a random local port.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wsengine::{Config, Dispatcher, EchoDispatcher, Server};

/// Echo suffix used by [`TestServer::spawn`].
pub const MARKER: &str = "marker";

pub struct TestServer {
    server: Server,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Echo server with default limits.
    pub async fn spawn() -> (Self, SocketAddr) {
        Self::spawn_with(Config::default(), EchoDispatcher::with_marker(MARKER)).await
    }

    pub async fn spawn_with(config: Config, dispatcher: impl Dispatcher) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(config, dispatcher);
        let (shutdown, rx) = oneshot::channel();

        let task = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .serve(listener, async {
                        let _ = rx.await;
                    })
                    .await
                    .unwrap();
            })
        };

        (Self { server, shutdown, task }, addr)
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Stop accepting, close open connections with 1001 and wait.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap();
    }
}
