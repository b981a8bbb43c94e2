use super::{LocationError, LocationErrorKind, PositionSource, PositionUpdate, Subscription};
use crate::error::{NavError, NavResult};
use crate::types::{GeoPoint, Position};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// (subscription id, sender) for the one live subscriber
type Slot = Arc<Mutex<Option<(u64, mpsc::UnboundedSender<PositionUpdate>)>>>;

/// Position source fed by hand through a [`PositionFeed`].
///
/// Stands in for a platform location service: a platform binding pushes
/// callbacks into the feed, tests push scripted fixes. One subscriber at a
/// time; pushes while nobody is subscribed are dropped.
pub struct ChannelPositionSource {
    slot: Slot,
    next_id: u64,
}

/// Producer side of a [`ChannelPositionSource`]
#[derive(Clone)]
pub struct PositionFeed {
    slot: Slot,
}

impl ChannelPositionSource {
    pub fn new() -> (Self, PositionFeed) {
        let slot: Slot = Arc::new(Mutex::new(None));
        (
            ChannelPositionSource {
                slot: slot.clone(),
                next_id: 0,
            },
            PositionFeed { slot },
        )
    }
}

impl PositionSource for ChannelPositionSource {
    fn subscribe(&mut self) -> NavResult<Subscription> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| NavError::SourceUnavailable("position feed lock poisoned".to_string()))?;

        if slot.is_some() {
            return Err(NavError::SourceUnavailable(
                "source already has a subscriber".to_string(),
            ));
        }

        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some((id, tx));

        let release_slot = self.slot.clone();
        Ok(Subscription::new(rx, move || {
            if let Ok(mut slot) = release_slot.lock() {
                // A newer subscription may own the slot by now
                if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                    *slot = None;
                }
            }
        }))
    }
}

impl PositionFeed {
    /// Deliver an update; false when nobody is listening
    pub fn push(&self, update: PositionUpdate) -> bool {
        self.slot
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|(_, tx)| tx.send(update).is_ok()))
            .unwrap_or(false)
    }

    pub fn fix(&self, position: Position) -> bool {
        self.push(Ok(position))
    }

    /// Fix at `point` stamped with the wall clock
    pub fn fix_at(&self, point: GeoPoint) -> bool {
        self.push(Ok(Position::now(point)))
    }

    pub fn error(&self, kind: LocationErrorKind, message: &str) -> bool {
        self.push(Err(LocationError::new(kind, message)))
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot
            .lock()
            .ok()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// End the stream; the subscriber sees `None` after draining
    pub fn close(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_delivers_to_subscriber() {
        let (mut source, feed) = ChannelPositionSource::new();
        assert!(!feed.fix_at(GeoPoint::new(1.0, 1.0)), "nobody subscribed yet");

        let mut sub = source.subscribe().unwrap();
        assert!(feed.is_subscribed());
        assert!(feed.fix_at(GeoPoint::new(1.0, 2.0)));
        assert!(feed.error(LocationErrorKind::Timeout, "slow"));

        let first = sub.recv().await.unwrap().unwrap();
        assert_eq!(first.point, GeoPoint::new(1.0, 2.0));
        assert!(sub.recv().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_source() {
        let (mut source, feed) = ChannelPositionSource::new();
        let mut sub = source.subscribe().unwrap();

        sub.unsubscribe();
        assert!(!feed.is_subscribed());
        assert!(!feed.fix_at(GeoPoint::new(1.0, 1.0)));
    }

    #[test]
    fn test_single_subscriber() {
        let (mut source, _feed) = ChannelPositionSource::new();
        let _sub = source.subscribe().unwrap();
        assert!(matches!(
            source.subscribe(),
            Err(NavError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_stale_release_keeps_new_subscription() {
        let (mut source, feed) = ChannelPositionSource::new();
        let first = source.subscribe().unwrap();
        feed.close();
        let _second = source.subscribe().unwrap();

        drop(first);
        assert!(feed.is_subscribed());
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (mut source, feed) = ChannelPositionSource::new();
        let mut sub = source.subscribe().unwrap();
        feed.fix_at(GeoPoint::new(3.0, 3.0));
        feed.close();

        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }
}
