//! Request/response correlation and per-identifier dispatch over one channel.

use std::{
    collections::HashMap,
    mem,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
    },
};

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{
    channel::{spawn_channel, ChannelReceiver, ChannelSender},
    identifier::{IdentifierRegistry, ProxyIdentifier, Side},
    marshal::rewrite_uris,
    protocol::Envelope,
    proxy::Proxy,
};
use crate::{
    error::{panic_message, Error, Result},
    uri::{Direction, UriTransformer},
};

/// A service implementation bound to a proxy identifier on this side.
#[async_trait]
pub trait RpcService: Send + Sync + 'static {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value>;
}

enum Pending {
    /// A caller is awaiting the outcome.
    Awaited(oneshot::Sender<Result<Value>>),
    /// Fire-and-forget; only failures are logged.
    Detached { target: &'static str, method: String },
}

#[derive(Default)]
struct PendingTable {
    calls: HashMap<u64, Pending>,
    closed: bool,
}

struct Inbound {
    id: u64,
    target: String,
    method: String,
    args: Vec<Value>,
}

/// One end of the bridge: issues calls to the other side and serves calls
/// addressed to locally registered services.
pub struct RpcEngine {
    side: Side,
    identifiers: Arc<IdentifierRegistry>,
    transformer: Option<Arc<UriTransformer>>,
    services: RwLock<HashMap<&'static str, Arc<dyn RpcService>>>,
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<Inbound>>>,
    pending: Mutex<PendingTable>,
    next_id: AtomicU64,
    sender: ChannelSender,
    shut_down: CancellationToken,
}

impl RpcEngine {
    /// Open a channel over `reader`/`writer` and start serving it.
    ///
    /// Only the side holding a `transformer` rewrites identifiers: payloads it
    /// sends are translated outgoing, payloads it receives incoming.
    pub fn start<R, W>(
        side: Side,
        identifiers: Arc<IdentifierRegistry>,
        transformer: Option<Arc<UriTransformer>>,
        reader: R,
        writer: W,
    ) -> Arc<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, receiver) = spawn_channel(reader, writer);
        let engine = Arc::new(Self {
            side,
            identifiers,
            transformer,
            services: RwLock::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            pending: Mutex::new(PendingTable::default()),
            next_id: AtomicU64::new(1),
            sender,
            shut_down: CancellationToken::new(),
        });
        tokio::spawn(Arc::clone(&engine).receive_loop(receiver));
        engine
    }

    pub const fn side(&self) -> Side {
        self.side
    }

    pub fn identifiers(&self) -> &Arc<IdentifierRegistry> {
        &self.identifiers
    }

    /// Bind `service` to `identifier`, which must belong to this side.
    pub fn register_local(
        &self,
        identifier: ProxyIdentifier,
        service: Arc<dyn RpcService>,
    ) -> Result<()> {
        if identifier.side() != self.side {
            return Err(Error::invalid_arguments(
                "registerLocal",
                format!("{identifier} lives on the {} side", identifier.side()),
            ));
        }
        if self.identifiers.get(identifier.name()).is_none() {
            self.identifiers.register(identifier)?;
        }

        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        if services.contains_key(identifier.name()) {
            return Err(Error::DuplicateRegistration(identifier.name().to_string()));
        }
        services.insert(identifier.name(), service);
        tracing::debug!("Registered local service {identifier} on {} side", self.side);
        Ok(())
    }

    /// Call-through stub for a service on the other side.
    pub fn proxy(self: &Arc<Self>, identifier: ProxyIdentifier) -> Proxy {
        Proxy::new(identifier, Arc::clone(self))
    }

    /// Issue a call and wait for its outcome.
    pub async fn call(
        &self,
        target: ProxyIdentifier,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.send_request(target, method, args, Pending::Awaited(tx))?;
        rx.await.unwrap_or(Err(Error::ChannelClosed))
    }

    /// Issue a call without waiting. Failures are logged and dropped.
    pub fn notify(&self, target: ProxyIdentifier, method: &str, args: Vec<Value>) {
        let pending = Pending::Detached {
            target: target.name(),
            method: method.to_string(),
        };
        if let Err(e) = self.send_request(target, method, args, pending) {
            tracing::debug!("Dropped notification {target}.{method}: {e}");
        }
    }

    /// Tear the channel down, failing every call still in flight.
    pub fn close(&self) {
        self.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.shut_down.is_cancelled()
    }

    /// Resolves once the engine has shut down.
    pub async fn closed(&self) {
        self.shut_down.cancelled().await;
    }

    fn send_request(
        &self,
        target: ProxyIdentifier,
        method: &str,
        mut args: Vec<Value>,
        pending: Pending,
    ) -> Result<u64> {
        for arg in &mut args {
            self.marshal(arg, Direction::Outgoing);
        }

        // Id allocation, write and registration happen under one lock so the
        // reply can never be observed before its pending entry exists.
        let mut table = self.lock_pending();
        if table.closed {
            return Err(Error::ChannelClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = Envelope::Request {
            id,
            target: target.name().to_string(),
            method: method.to_string(),
            args,
        }
        .encode()?;
        self.sender.send(frame)?;
        table.calls.insert(id, pending);
        Ok(id)
    }

    async fn receive_loop(self: Arc<Self>, mut receiver: ChannelReceiver) {
        while let Some(frame) = receiver.recv().await {
            match Envelope::decode(&frame) {
                Ok(envelope) => self.handle_envelope(envelope),
                Err(e) => tracing::warn!("Dropping undecodable frame: {e}"),
            }
        }
        tracing::info!("Channel closed on {} side", self.side);
        self.shutdown();
    }

    fn handle_envelope(self: &Arc<Self>, envelope: Envelope) {
        match envelope {
            Envelope::Request {
                id,
                target,
                method,
                args,
            } => self.enqueue(Inbound {
                id,
                target,
                method,
                args,
            }),
            Envelope::Response { id, mut result } => {
                self.marshal(&mut result, Direction::Incoming);
                self.settle(id, Ok(result));
            }
            Envelope::Error { id, error } => self.settle(id, Err(error.into())),
        }
    }

    fn settle(&self, id: u64, outcome: Result<Value>) {
        let pending = self.lock_pending().calls.remove(&id);
        match pending {
            Some(Pending::Awaited(tx)) => {
                // The caller may have given up on the call.
                let _ = tx.send(outcome);
            }
            Some(Pending::Detached { target, method }) => {
                if let Err(e) = outcome {
                    tracing::debug!("Notification {target}.{method} failed: {e}");
                }
            }
            None => tracing::debug!("Reply for unknown call {id}"),
        }
    }

    /// Hand a request to the worker of its target, starting one if needed.
    /// Requests for unbound targets are answered here without a worker.
    fn enqueue(self: &Arc<Self>, request: Inbound) {
        if !self.is_bound(&request.target) {
            tracing::debug!("No service for {}, rejecting call {}", request.target, request.id);
            self.reply(&Envelope::Error {
                id: request.id,
                error: Error::UnresolvedProxy(request.target).to_remote(),
            });
            return;
        }

        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = queues.entry(request.target.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let span = tracing::debug_span!("dispatch", target = %request.target);
            tokio::spawn(Arc::clone(self).dispatch_loop(rx).instrument(span));
            tx
        });
        if let Err(mpsc::error::SendError(request)) = queue.send(request) {
            tracing::debug!("Worker for {} is gone, dropping call {}", request.target, request.id);
        }
    }

    async fn dispatch_loop(self: Arc<Self>, mut requests: mpsc::UnboundedReceiver<Inbound>) {
        while let Some(request) = requests.recv().await {
            let reply = self.dispatch(request).await;
            self.reply(&reply);
        }
    }

    fn reply(&self, reply: &Envelope) {
        let frame = match reply.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode reply {}: {e}", reply.id());
                return;
            }
        };
        if let Err(e) = self.sender.send(frame) {
            tracing::debug!("Reply {} not sent: {e}", reply.id());
        }
    }

    fn is_bound(&self, target: &str) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }

    async fn dispatch(&self, request: Inbound) -> Envelope {
        let Inbound {
            id,
            target,
            method,
            mut args,
        } = request;
        for arg in &mut args {
            self.marshal(arg, Direction::Incoming);
        }

        let service = self
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target.as_str())
            .cloned();
        let outcome = match service {
            Some(service) => AssertUnwindSafe(service.invoke(&method, args))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(Error::Internal(format!(
                        "{target}.{method} panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                }),
            None => Err(Error::UnresolvedProxy(target.clone())),
        };

        match outcome {
            Ok(mut result) => {
                self.marshal(&mut result, Direction::Outgoing);
                Envelope::Response { id, result }
            }
            Err(e) => {
                tracing::debug!("Call {target}.{method} failed: {e}");
                Envelope::Error {
                    id,
                    error: e.to_remote(),
                }
            }
        }
    }

    fn marshal(&self, value: &mut Value, direction: Direction) {
        if let Some(transformer) = &self.transformer {
            rewrite_uris(value, transformer, direction);
        }
    }

    fn shutdown(&self) {
        self.sender.close();
        let calls = {
            let mut table = self.lock_pending();
            table.closed = true;
            mem::take(&mut table.calls)
        };
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        for (id, pending) in calls {
            match pending {
                Pending::Awaited(tx) => {
                    let _ = tx.send(Err(Error::ChannelClosed));
                }
                Pending::Detached { target, method } => {
                    tracing::debug!("Notification {target}.{method} ({id}) lost: channel closed");
                }
            }
        }
        self.shut_down.cancel();
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
