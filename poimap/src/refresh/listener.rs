//! Controller → presentation layer notifications.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::model::GeoPoint;
use crate::transport::FetchError;

/// Receives state changes from a [`RefreshController`](super::RefreshController).
///
/// Notifications arrive one at a time, in the order the state changed, and
/// no controller lock is held while a callback runs. A callback may read or
/// drive the controller; events that raises are delivered after it returns.
/// Callbacks run on whichever task triggered the change, so keep them quick.
pub trait RefreshListener: Send + Sync {
    /// New points for the current viewport.
    fn on_update(&self, points: Arc<Vec<GeoPoint>>);

    /// Loading indicator changed.
    fn on_loading_change(&self, loading: bool);

    /// A fetch failed. Previous points remain valid.
    ///
    /// Cancellations are never reported here.
    fn on_error(&self, _error: &FetchError) {}
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl RefreshListener for NoopListener {
    fn on_update(&self, _points: Arc<Vec<GeoPoint>>) {}

    fn on_loading_change(&self, _loading: bool) {}
}

/// Controller notification as a value, for channel-based consumers.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Updated(Arc<Vec<GeoPoint>>),
    Loading(bool),
    Error(FetchError),
}

/// Forward notifications into an unbounded channel.
///
/// Sending never blocks; if the receiver is gone the event is dropped.
impl RefreshListener for mpsc::UnboundedSender<RefreshEvent> {
    fn on_update(&self, points: Arc<Vec<GeoPoint>>) {
        let _ = self.send(RefreshEvent::Updated(points));
    }

    fn on_loading_change(&self, loading: bool) {
        let _ = self.send(RefreshEvent::Loading(loading));
    }

    fn on_error(&self, error: &FetchError) {
        let _ = self.send(RefreshEvent::Error(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_listener_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn RefreshListener> = Arc::new(tx);

        listener.on_loading_change(true);
        listener.on_update(Arc::new(Vec::new()));
        listener.on_error(&FetchError::Http { status: 500 });

        assert!(matches!(rx.try_recv(), Ok(RefreshEvent::Loading(true))));
        assert!(matches!(rx.try_recv(), Ok(RefreshEvent::Updated(p)) if p.is_empty()));
        assert!(matches!(
            rx.try_recv(),
            Ok(RefreshEvent::Error(FetchError::Http { status: 500 }))
        ));
    }

    #[test]
    fn test_channel_listener_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.on_loading_change(false);
    }
}
