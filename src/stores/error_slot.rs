use crate::core::error::{RecordedError, SyncError};
use tokio::sync::watch;
use tracing::warn;

/// Last error of a cache, observable instead of thrown
pub struct ErrorSlot {
    name: &'static str,
    tx: watch::Sender<Option<RecordedError>>,
}

impl ErrorSlot {
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { name, tx }
    }

    pub fn record(&self, error: &SyncError) {
        warn!(cache = self.name, kind = ?error.kind(), error = %error, "Refresh failed");
        self.tx.send_replace(Some(RecordedError::from(error)));
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|current| current.take().is_some());
    }

    pub fn current(&self) -> Option<RecordedError> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RecordedError>> {
        self.tx.subscribe()
    }
}
