use std::sync::Arc;

use act_zero::runtimes::tokio::spawn_actor;
use act_zero::{call, Addr};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{
    ConnectError, ConnectionId, ConnectionRegistry, ConnectionSnapshot, Endpoint, OpenCallback, OpenRequest,
    OpenStatus, RegistryError, Result,
};
use crate::ports::{ConnectionObserver, EventLogger};

/// Handle to a connection registry running on its own actor context
///
/// Cloning the handle shares the same registry. The registry shuts down,
/// resolving outstanding callbacks, once every handle is dropped.
#[derive(Clone)]
pub struct Registry {
    addr: Addr<ConnectionRegistry>,
    logger: Arc<dyn EventLogger>,
}

impl Registry {
    /// Hand `registry` over to its execution context. Must be called from
    /// within a tokio runtime.
    pub fn bind(registry: ConnectionRegistry) -> Self {
        let logger = registry.logger();
        Self {
            addr: spawn_actor(registry),
            logger,
        }
    }

    pub fn logger(&self) -> Arc<dyn EventLogger> {
        self.logger.clone()
    }

    /// Open a connection; `callback` receives the outcome exactly once.
    pub async fn open<F>(&self, request: OpenRequest, callback: F) -> Result<ConnectionId>
    where
        F: FnOnce(ConnectionId, OpenStatus) + Send + 'static,
    {
        let callback = OpenCallback::new(callback);
        let addr = self.addr.clone();
        call!(addr.open(request, callback))
            .await
            .map_err(|_| RegistryError::Stopped)
    }

    /// Open a connection and wait for the outcome.
    pub async fn open_and_wait(&self, request: OpenRequest) -> (ConnectionId, OpenStatus) {
        let (tx, rx) = oneshot::channel();
        let callback = move |id, status| {
            let _ = tx.send((id, status));
        };
        if self.open(request, callback).await.is_err() {
            return (
                ConnectionId::INVALID,
                OpenStatus::Failed(ConnectError::ShuttingDown),
            );
        }
        rx.await.unwrap_or((
            ConnectionId::INVALID,
            OpenStatus::Failed(ConnectError::ShuttingDown),
        ))
    }

    pub async fn close(&self, id: ConnectionId) -> Option<ConnectionSnapshot> {
        let addr = self.addr.clone();
        call!(addr.close(id)).await.ok().flatten()
    }

    pub async fn get(&self, id: ConnectionId) -> Option<ConnectionSnapshot> {
        let addr = self.addr.clone();
        call!(addr.get(id)).await.ok().flatten()
    }

    pub async fn get_by_endpoint(&self, endpoint: Endpoint) -> Option<ConnectionSnapshot> {
        let addr = self.addr.clone();
        call!(addr.get_by_endpoint(endpoint)).await.ok().flatten()
    }

    pub async fn send(&self, id: ConnectionId, payload: Vec<u8>) -> Result<()> {
        let addr = self.addr.clone();
        call!(addr.send_payload(id, payload))
            .await
            .map_err(|_| RegistryError::Stopped)?
    }

    pub async fn add_observer(
        &self,
        name: impl Into<String>,
        observer: Box<dyn ConnectionObserver>,
    ) -> Option<Box<dyn ConnectionObserver>> {
        let name = name.into();
        let addr = self.addr.clone();
        call!(addr.add_observer(name, observer)).await.ok().flatten()
    }

    pub async fn remove_observer(&self, name: impl Into<String>) -> Option<Box<dyn ConnectionObserver>> {
        let name = name.into();
        let addr = self.addr.clone();
        call!(addr.remove_observer(name)).await.ok().flatten()
    }

    /// Close every connection whose id arrives on `failures`.
    ///
    /// Failed connections otherwise stay in the registry until closed. The
    /// task holds no strong reference, so it ends with the registry.
    pub fn spawn_reaper(&self, mut failures: mpsc::UnboundedReceiver<ConnectionId>) -> JoinHandle<()> {
        let addr = self.addr.downgrade();
        tokio::spawn(async move {
            while let Some(id) = failures.recv().await {
                match call!(addr.close(id)).await {
                    Ok(Some(snapshot)) => debug!("reaped {} ({})", id, snapshot.state),
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
        })
    }

    /// Resolve every pending open with `ShuttingDown` and close all connections.
    pub async fn shutdown(&self) {
        let addr = self.addr.clone();
        let _ = call!(addr.shutdown()).await;
    }
}
