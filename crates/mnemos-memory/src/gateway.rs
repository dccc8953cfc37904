//! Write-behind persistence gateway.
//!
//! Mutations are mirrored to a [`PersistenceBackend`] by a background Tokio
//! task fed through an unbounded channel. Sending never blocks and never
//! fails the caller: a backend error, or a worker that has gone away, is
//! logged with `tracing::warn!` and handed to the optional
//! [`ErrorCallback`].
//!
//! Commands are applied in the order they were queued. [`flush`] waits until
//! every command queued before it has been applied.
//!
//! [`flush`]: PersistenceGateway::flush

use std::sync::Arc;

use mnemos_types::MemoryRecord;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::persistence::{PersistenceBackend, PersistenceError};

/// Observer for swallowed persistence failures.
pub type ErrorCallback = Arc<dyn Fn(&PersistenceError) + Send + Sync>;

enum Command {
    Put(MemoryRecord),
    Delete(Uuid),
    Clear,
    Flush(oneshot::Sender<()>),
}

pub struct PersistenceGateway {
    backend: Arc<dyn PersistenceBackend>,
    sender: mpsc::UnboundedSender<Command>,
    on_error: Option<ErrorCallback>,
}

impl PersistenceGateway {
    /// Spawn the background writer on the current Tokio runtime.
    ///
    /// Fails with [`PersistenceError::NoRuntime`] when called outside one.
    pub fn spawn(
        backend: Arc<dyn PersistenceBackend>,
        on_error: Option<ErrorCallback>,
    ) -> Result<Self, PersistenceError> {
        let handle = Handle::try_current().map_err(|_| PersistenceError::NoRuntime)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(run_worker(Arc::clone(&backend), receiver, on_error.clone()));
        Ok(Self {
            backend,
            sender,
            on_error,
        })
    }

    /// Read every durable record. Failures are reported and yield `None`.
    pub async fn load_all(&self) -> Option<Vec<MemoryRecord>> {
        match self.backend.get_all().await {
            Ok(records) => Some(records),
            Err(e) => {
                report(self.on_error.as_ref(), &e, "load");
                None
            }
        }
    }

    pub fn put(&self, record: MemoryRecord) {
        self.send(Command::Put(record));
    }

    pub fn delete(&self, id: Uuid) {
        self.send(Command::Delete(id));
    }

    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    /// Wait for all previously queued commands to be applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx));
        // A dropped sender means the worker is gone; nothing left to wait for.
        let _ = rx.await;
    }

    fn send(&self, command: Command) {
        if self.sender.send(command).is_err() {
            report(self.on_error.as_ref(), &PersistenceError::WorkerClosed, "enqueue");
        }
    }
}

pub(crate) fn report(on_error: Option<&ErrorCallback>, error: &PersistenceError, operation: &str) {
    warn!(error = %error, operation, "Memory persistence failed; continuing in memory");
    if let Some(callback) = on_error {
        callback(error);
    }
}

async fn run_worker(
    backend: Arc<dyn PersistenceBackend>,
    mut receiver: mpsc::UnboundedReceiver<Command>,
    on_error: Option<ErrorCallback>,
) {
    while let Some(command) = receiver.recv().await {
        let (operation, result) = match command {
            Command::Put(record) => {
                debug!(memory_id = %record.id, "Persisting memory");
                ("put", backend.put(record).await)
            }
            Command::Delete(id) => {
                debug!(memory_id = %id, "Deleting persisted memory");
                ("delete", backend.delete(id).await)
            }
            Command::Clear => ("clear", backend.clear().await),
            Command::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        if let Err(e) = result {
            report(on_error.as_ref(), &e, operation);
        }
    }
    debug!("Persistence worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryBackend;
    use chrono::Utc;
    use mnemos_types::{EntryMetadata, Role, Sentiment};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(content: &str) -> MemoryRecord {
        MemoryRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role: Role::Assistant,
            content: content.to_string(),
            vector: vec![0.0, 1.0],
            metadata: EntryMetadata::new("general".into(), None, Sentiment::Neutral, 0.5, None),
        }
    }

    fn counting_callback() -> (ErrorCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: ErrorCallback = Arc::new(move |_: &PersistenceError| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[tokio::test]
    async fn commands_apply_in_order() {
        let backend = Arc::new(InMemoryBackend::new());
        let gateway = PersistenceGateway::spawn(backend.clone(), None).unwrap();

        let a = record("a");
        let b = record("b");
        gateway.put(a.clone());
        gateway.put(b.clone());
        gateway.delete(a.id);
        gateway.flush().await;

        assert!(!backend.contains(&a.id));
        assert!(backend.contains(&b.id));

        gateway.clear();
        gateway.flush().await;
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_failing(true);
        let (callback, count) = counting_callback();
        let gateway = PersistenceGateway::spawn(backend.clone(), Some(callback)).unwrap();

        gateway.put(record("lost"));
        gateway.delete(Uuid::new_v4());
        gateway.flush().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(gateway.load_all().await.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn load_all_returns_existing_records() {
        let r = record("persisted");
        let backend = Arc::new(InMemoryBackend::with_records([r.clone()]));
        let gateway = PersistenceGateway::spawn(backend, None).unwrap();
        assert_eq!(gateway.load_all().await, Some(vec![r]));
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let backend = Arc::new(InMemoryBackend::new());
        let result = PersistenceGateway::spawn(backend, None);
        assert!(matches!(result, Err(PersistenceError::NoRuntime)));
    }
}
