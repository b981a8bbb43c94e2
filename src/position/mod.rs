//! Live position input.
//!
//! The engine never talks to a platform location API directly. It depends
//! on a [`PositionSource`], which hands out a [`Subscription`]: fixes and
//! failures arrive on it asynchronously, and dropping or unsubscribing it
//! releases the underlying platform resource.

pub mod channel;
pub mod simulate;
pub mod trace;

pub use channel::{ChannelPositionSource, PositionFeed};
pub use simulate::{Detour, SimulatedWalk};
pub use trace::{open_trace, read_trace, ReplayPositionSource, TraceError};

use crate::error::NavResult;
use crate::types::Position;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationErrorKind {
    /// User or OS refused access; no further fixes will come
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

/// A failed fix reported by the location service
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct LocationError {
    pub kind: LocationErrorKind,
    #[serde(default)]
    pub message: String,
}

impl LocationError {
    pub fn new(kind: LocationErrorKind, message: impl Into<String>) -> Self {
        LocationError {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == LocationErrorKind::PermissionDenied
    }
}

pub type PositionUpdate = Result<Position, LocationError>;

/// Capability over a live location service
pub trait PositionSource {
    /// Start receiving updates. The returned guard must be kept alive for
    /// as long as updates are wanted.
    fn subscribe(&mut self) -> NavResult<Subscription>;
}

/// Scoped handle on a position stream.
///
/// `unsubscribe` is idempotent and also runs on drop, so every exit path
/// releases the source.
pub struct Subscription {
    updates: mpsc::UnboundedReceiver<PositionUpdate>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        updates: mpsc::UnboundedReceiver<PositionUpdate>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription {
            updates,
            release: Some(Box::new(release)),
        }
    }

    /// Next update, or `None` once unsubscribed or the source closed
    pub async fn recv(&mut self) -> Option<PositionUpdate> {
        if self.release.is_none() {
            return None;
        }
        self.updates.recv().await
    }

    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            self.updates.close();
            release();
            log::debug!("Position subscription released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = releases.clone();
        let mut sub = Subscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(Ok(Position::now(GeoPoint::new(1.0, 1.0)))).unwrap();
        assert!(sub.recv().await.is_some());

        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_updates_after_unsubscribe() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(rx, || {});

        tx.send(Ok(Position::now(GeoPoint::new(1.0, 1.0)))).unwrap();
        sub.unsubscribe();

        assert!(!sub.is_active());
        assert!(sub.recv().await.is_none());
        assert!(tx.send(Ok(Position::now(GeoPoint::new(2.0, 2.0)))).is_err());
    }

    #[test]
    fn test_drop_releases() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        {
            let _sub = Subscription::new(rx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_location_error_fatality() {
        assert!(LocationError::new(LocationErrorKind::PermissionDenied, "denied").is_fatal());
        assert!(!LocationError::new(LocationErrorKind::Timeout, "slow").is_fatal());
        let err = LocationError::new(LocationErrorKind::PositionUnavailable, "no sky");
        assert_eq!(err.to_string(), "PositionUnavailable: no sky");
    }
}
