//! SnapshotCell - single-writer, multi-reader published value
//!
//! Wraps a `watch` channel: writers replace the whole value, readers clone the
//! latest one without waiting. A reader never sees a partially updated value.

use std::sync::Arc;

use tokio::sync::watch;

use crate::adapter::ProgressListener;
use crate::domain::ProgressInfo;

/// Last-value-wins cell readable from any thread
#[derive(Debug)]
pub struct SnapshotCell<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for SnapshotCell<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Clone> SnapshotCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the published value
    pub fn publish(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Replace the published value only if `f` changes it; the check and the
    /// write happen atomically
    pub fn publish_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    /// Latest published value
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl ProgressListener for SnapshotCell<ProgressInfo> {
    fn progress_changed(&self, progress: ProgressInfo) {
        self.publish(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_value_wins() {
        let cell = SnapshotCell::new(1);
        cell.publish(2);
        cell.publish(3);
        assert_eq!(cell.get(), 3);
    }

    #[test]
    fn test_clones_share_the_value() {
        let cell = SnapshotCell::new("a".to_string());
        let other = cell.clone();
        other.publish("b".to_string());
        assert_eq!(cell.get(), "b");
    }

    #[test]
    fn test_publish_if_only_writes_on_change() {
        let cell = SnapshotCell::new(5);
        assert!(!cell.publish_if(|v| {
            if *v == 0 {
                *v = 1;
                true
            } else {
                false
            }
        }));
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn test_progress_listener_overwrites() {
        let cell = SnapshotCell::new(ProgressInfo::default());
        let listener: Arc<dyn ProgressListener> = Arc::new(cell.clone());
        listener.progress_changed(ProgressInfo::new(40, "Loading", false));
        listener.progress_changed(ProgressInfo::new(80, "Loading", false));
        assert_eq!(cell.get(), ProgressInfo::new(80, "Loading", false));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let cell = SnapshotCell::new(0u32);
        let mut rx = cell.subscribe();
        cell.publish(7);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 7);
    }
}
