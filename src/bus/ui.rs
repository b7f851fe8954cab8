//! The single thread that owns UI state.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle, ThreadId},
};

use tokio::sync::oneshot;

use crate::error::{panic_message, Error, Result};

type Task = Box<dyn FnOnce() + Send>;

struct Inner {
    tasks: Mutex<Option<mpsc::Sender<Task>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Runs queued closures one at a time, in submission order, on a dedicated
/// thread. A panicking task is logged and the next one still runs.
#[derive(Clone)]
pub struct UiDispatcher {
    inner: Arc<Inner>,
}

impl UiDispatcher {
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
                        tracing::warn!("UI task panicked: {}", panic_message(panic.as_ref()));
                    }
                }
                tracing::debug!("UI thread stopped");
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(Some(tx)),
                thread_id: handle.thread().id(),
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Whether the caller is running on the UI thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Queue `task` behind everything already submitted.
    pub fn invoke_later(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = tasks.as_ref().ok_or(Error::ChannelClosed)?;
        sender.send(Box::new(task)).map_err(|_| Error::ChannelClosed)
    }

    /// Run `task` on the UI thread and block until it returns. Runs inline
    /// when already on the UI thread.
    pub fn invoke_and_wait<R>(&self, task: impl FnOnce() -> R + Send + 'static) -> Result<R>
    where
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(task());
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.invoke_later(move || {
            let _ = tx.send(task());
        })?;
        rx.recv()
            .map_err(|_| Error::Internal("UI task did not complete".to_string()))
    }

    /// Run `task` on the UI thread and await its result without blocking.
    pub async fn run<R>(&self, task: impl FnOnce() -> R + Send + 'static) -> Result<R>
    where
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(task());
        }
        let (tx, rx) = oneshot::channel();
        self.invoke_later(move || {
            let _ = tx.send(task());
        })?;
        rx.await
            .map_err(|_| Error::Internal("UI task did not complete".to_string()))
    }

    /// Stop accepting tasks and wait for the queue to drain.
    pub fn shutdown(&self) {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if self.is_current() {
            return;
        }
        let handle = self
            .inner
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("UI thread exited abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_tasks_run_in_order_on_ui_thread() {
        let ui = UiDispatcher::spawn("test-ui").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for n in 0..5 {
            let seen = Arc::clone(&seen);
            let ui_check = ui.clone();
            ui.invoke_later(move || {
                assert!(ui_check.is_current());
                seen.lock().unwrap().push(n);
            })
            .unwrap();
        }
        ui.invoke_and_wait(|| ()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(!ui.is_current());
    }

    #[test]
    fn test_panicking_task_does_not_stop_thread() {
        let ui = UiDispatcher::spawn("test-ui").unwrap();
        ui.invoke_later(|| panic!("bad task")).unwrap();
        let err = ui.invoke_and_wait(|| -> u8 { panic!("also bad") });
        assert!(err.is_err());
        assert_eq!(ui.invoke_and_wait(|| 42).unwrap(), 42);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let ui = UiDispatcher::spawn("test-ui").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let count = Arc::clone(&count);
            ui.invoke_later(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        ui.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert!(matches!(ui.invoke_later(|| ()), Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_run_awaits_result() {
        let ui = UiDispatcher::spawn("test-ui").unwrap();
        let name = ui
            .run(|| thread::current().name().map(str::to_string))
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("test-ui"));
    }
}
