//! In-process publish/subscribe.
//!
//! A bus has two delivery paths for every published event: direct listeners
//! registered per topic, and a bounded broadcast stream that sees every topic.

mod stream;
mod topic;
mod ui;

use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock, Weak,
    },
};

use tokio::{runtime::Handle, sync::broadcast};

pub use stream::{EventStream, TopicStream};
pub use topic::{
    ConnectionChanged, ConnectionState, DirectoriesChanged, DirectoryChanged, EditorTabsChanged,
    Event, FileChanged, FilesChanged, Topic, WorkspaceChanged,
};
pub use ui::UiDispatcher;

use crate::error::{panic_message, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusScope {
    Application,
    Workspace(String),
}

impl fmt::Display for BusScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => f.write_str("application"),
            Self::Workspace(id) => write!(f, "workspace {id}"),
        }
    }
}

/// Where a listener runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// On the publishing thread, before `publish` returns.
    Inline,
    /// On the blocking worker pool, unordered relative to `publish`.
    Worker,
    /// On the UI thread. All UI listeners of one publish run as one task.
    Ui,
}

type Handler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct Listener {
    id: u64,
    mode: DeliveryMode,
    handler: Handler,
}

pub struct EventBus {
    scope: BusScope,
    listeners: RwLock<HashMap<TypeId, Arc<[Listener]>>>,
    next_listener: AtomicU64,
    stream: broadcast::Sender<Arc<Event>>,
    ui: Option<UiDispatcher>,
}

impl EventBus {
    pub fn new(scope: BusScope, capacity: usize, ui: Option<UiDispatcher>) -> Arc<Self> {
        let (stream, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            scope,
            listeners: RwLock::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            stream,
            ui,
        })
    }

    pub const fn scope(&self) -> &BusScope {
        &self.scope
    }

    pub fn subscribe<T: Topic>(
        self: &Arc<Self>,
        mode: DeliveryMode,
        handler: impl Fn(&T::Payload) + Send + Sync + 'static,
    ) -> Subscription {
        self.try_subscribe::<T>(mode, move |payload| {
            handler(payload);
            Ok(())
        })
    }

    /// Like [`Self::subscribe`], for handlers that can fail. A failure is
    /// logged and does not reach the publisher.
    pub fn try_subscribe<T: Topic>(
        self: &Arc<Self>,
        mode: DeliveryMode,
        handler: impl Fn(&T::Payload) -> Result<()> + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener = Listener {
            id,
            mode,
            handler: Arc::new(move |event: &Event| T::extract(event).map_or(Ok(()), &handler)),
        };

        let topic = TypeId::of::<T>();
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = listeners.get(&topic).map(|l| l.to_vec()).unwrap_or_default();
        updated.push(listener);
        listeners.insert(topic, updated.into());

        Subscription {
            bus: Arc::downgrade(self),
            topic,
            id,
            attached: true,
        }
    }

    fn unsubscribe(&self, topic: TypeId, id: u64) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = listeners.get(&topic) else {
            return;
        };
        let remaining: Vec<_> = current.iter().filter(|l| l.id != id).cloned().collect();
        if remaining.is_empty() {
            listeners.remove(&topic);
        } else {
            listeners.insert(topic, remaining.into());
        }
    }

    pub fn listener_count<T: Topic>(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .map_or(0, |l| l.len())
    }

    /// Deliver `payload` to the stream and to every listener of `T`.
    pub fn publish<T: Topic>(&self, payload: T::Payload) {
        let event = Arc::new(T::wrap(payload));
        // No stream subscribers is not an error.
        let _ = self.stream.send(Arc::clone(&event));

        // Iterate a snapshot so listeners may (un)subscribe while we deliver.
        let snapshot = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned();
        let Some(listeners) = snapshot else {
            return;
        };

        let mut ui_batch = Vec::new();
        for listener in listeners.iter() {
            match listener.mode {
                DeliveryMode::Inline => deliver(T::NAME, &listener.handler, &event),
                DeliveryMode::Worker => self.deliver_on_worker(T::NAME, listener, &event),
                DeliveryMode::Ui => ui_batch.push(Arc::clone(&listener.handler)),
            }
        }
        if !ui_batch.is_empty() {
            self.deliver_on_ui(T::NAME, ui_batch, event);
        }
    }

    fn deliver_on_worker(&self, topic: &'static str, listener: &Listener, event: &Arc<Event>) {
        let Ok(runtime) = Handle::try_current() else {
            deliver(topic, &listener.handler, event);
            return;
        };
        let handler = Arc::clone(&listener.handler);
        let event = Arc::clone(event);
        runtime.spawn_blocking(move || deliver(topic, &handler, &event));
    }

    fn deliver_on_ui(&self, topic: &'static str, handlers: Vec<Handler>, event: Arc<Event>) {
        let Some(ui) = &self.ui else {
            tracing::debug!("No UI thread on {} bus, delivering {topic} inline", self.scope);
            for handler in &handlers {
                deliver(topic, handler, &event);
            }
            return;
        };
        let queued = ui.invoke_later(move || {
            for handler in &handlers {
                deliver(topic, handler, &event);
            }
        });
        if let Err(e) = queued {
            tracing::warn!("Dropped {topic} UI delivery on {} bus: {e}", self.scope);
        }
    }

    /// All events published from now on.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.stream.subscribe())
    }

    /// Payloads of topic `T` published from now on.
    pub fn stream_of<T: Topic>(&self) -> TopicStream<T> {
        TopicStream::new(self.stream())
    }
}

fn deliver(topic: &'static str, handler: &Handler, event: &Event) {
    let reason = match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(panic) => panic_message(panic.as_ref()),
    };
    tracing::warn!("{}", Error::ListenerFailure { topic, reason });
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    bus: Weak<EventBus>,
    topic: TypeId,
    id: u64,
    attached: bool,
}

impl Subscription {
    /// Keep the listener for as long as the bus lives.
    pub fn detach(mut self) {
        self.attached = false;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.attached {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.topic, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::{Duration, SystemTime},
    };

    use super::*;
    use crate::{
        uri::UriParts,
        workspace::{ChangeKind, ItemKind, WorkspaceFileChangeData},
    };

    fn change(path: &str) -> WorkspaceFileChangeData {
        WorkspaceFileChangeData {
            resource: UriParts::new("file", path).with_authority(""),
            path: PathBuf::from(path),
            change_kind: ChangeKind::Created,
            item_kind: ItemKind::File,
            timestamp: SystemTime::now(),
        }
    }

    fn bus() -> Arc<EventBus> {
        EventBus::new(BusScope::Application, 16, None)
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let bus = bus();
        let delivered = Arc::new(AtomicUsize::new(0));

        let _panics = bus.subscribe::<FileChanged>(DeliveryMode::Inline, |_| panic!("listener bug"));
        let _fails = bus.try_subscribe::<FileChanged>(DeliveryMode::Inline, |_| {
            Err(Error::Internal("listener error".into()))
        });
        let counter = Arc::clone(&delivered);
        let _counts = bus.subscribe::<FileChanged>(DeliveryMode::Inline, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish::<FileChanged>(change("/a"));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listeners_only_see_their_topic() {
        let bus = bus();
        let files = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&files);
        let _sub = bus.subscribe::<FilesChanged>(DeliveryMode::Inline, move |batch| {
            counter.fetch_add(batch.len(), Ordering::SeqCst);
        });

        bus.publish::<FileChanged>(change("/single"));
        bus.publish::<FilesChanged>(vec![change("/a"), change("/b")]);
        assert_eq!(files.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus = bus();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sub = bus.subscribe::<ConnectionChanged>(DeliveryMode::Inline, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&hits);
        bus.subscribe::<ConnectionChanged>(DeliveryMode::Inline, move |_| {
            counter.fetch_add(10, Ordering::SeqCst);
        })
        .detach();
        assert_eq!(bus.listener_count::<ConnectionChanged>(), 2);

        bus.publish::<ConnectionChanged>(ConnectionState::Connected);
        drop(sub);
        bus.publish::<ConnectionChanged>(ConnectionState::Disconnected);

        assert_eq!(hits.load(Ordering::SeqCst), 21);
        assert_eq!(bus.listener_count::<ConnectionChanged>(), 1);
    }

    #[test]
    fn test_listener_may_subscribe_during_delivery() {
        let bus = bus();
        let nested = Arc::new(Mutex::new(Vec::new()));
        let bus_ref = Arc::downgrade(&bus);
        let keep = Arc::clone(&nested);
        let _sub = bus.subscribe::<ConnectionChanged>(DeliveryMode::Inline, move |_| {
            if let Some(bus) = bus_ref.upgrade() {
                keep.lock()
                    .unwrap()
                    .push(bus.subscribe::<ConnectionChanged>(DeliveryMode::Inline, |_| {}));
            }
        });
        bus.publish::<ConnectionChanged>(ConnectionState::Connected);
        assert_eq!(nested.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count::<ConnectionChanged>(), 2);
    }

    #[test]
    fn test_ui_listeners_run_on_ui_thread() {
        let ui = UiDispatcher::spawn("bus-ui").unwrap();
        let bus = EventBus::new(BusScope::Workspace("ws".into()), 16, Some(ui.clone()));
        let threads = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let threads = Arc::clone(&threads);
            bus.subscribe::<ConnectionChanged>(DeliveryMode::Ui, move |_| {
                threads
                    .lock()
                    .unwrap()
                    .push(std::thread::current().name().map(str::to_string));
            })
            .detach();
        }
        bus.publish::<ConnectionChanged>(ConnectionState::Connected);
        ui.invoke_and_wait(|| ()).unwrap();

        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|t| t.as_deref() == Some("bus-ui")));
    }

    #[tokio::test]
    async fn test_worker_listeners_run_off_thread() {
        let bus = bus();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let _sub = bus.subscribe::<ConnectionChanged>(DeliveryMode::Worker, move |state| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(*state);
            }
        });
        bus.publish::<ConnectionChanged>(ConnectionState::Disconnected);
        let state = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stream_receives_every_topic_in_order() {
        let bus = bus();
        let mut all = bus.stream();
        let mut connections = bus.stream_of::<ConnectionChanged>();

        bus.publish::<FileChanged>(change("/a"));
        bus.publish::<ConnectionChanged>(ConnectionState::Connected);

        assert_eq!(all.recv().await.unwrap().topic_name(), "fileChanged");
        assert_eq!(all.recv().await.unwrap().topic_name(), "connectionChanged");
        assert_eq!(connections.recv().await, Some(ConnectionState::Connected));
    }

    #[tokio::test]
    async fn test_slow_stream_drops_oldest() {
        let bus = EventBus::new(BusScope::Application, 2, None);
        let mut files = bus.stream_of::<FileChanged>();
        for n in 0..5 {
            bus.publish::<FileChanged>(change(&format!("/f{n}")));
        }
        assert_eq!(files.recv().await.unwrap().path, PathBuf::from("/f3"));
        assert_eq!(files.recv().await.unwrap().path, PathBuf::from("/f4"));
    }
}
