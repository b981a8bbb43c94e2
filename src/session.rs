//! Async driver for one navigation session.
//!
//! Runs on a single task: fixes, location errors, the (at most one)
//! in-flight routing request and cancellation are multiplexed with
//! `tokio::select!`. Nothing is spawned. Each input is handled to
//! completion before the next one is looked at.

use crate::controller::{NavigationController, NavigationEvent, Phase};
use crate::error::NavResult;
use crate::position::PositionSource;
use crate::route::Route;
use crate::routing::{RoutingError, RoutingService};
use crate::types::Position;
use futures::future::OptionFuture;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

type RouteFuture<'a> = Pin<Box<dyn Future<Output = Result<Route, RoutingError>> + 'a>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Arrived,
    Cancelled,
    /// Location stream ended before arrival
    SourceClosed,
}

/// Continuously readable view for the UI
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NavigationSnapshot {
    pub position: Option<Position>,
    pub step_index: usize,
    pub phase: Phase,
}

/// UI side of a session
pub struct SessionHandle {
    pub events: mpsc::UnboundedReceiver<NavigationEvent>,
    snapshot: watch::Receiver<NavigationSnapshot>,
    cancel: watch::Sender<bool>,
}

impl SessionHandle {
    /// Stop the session. In-flight routing results are discarded.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        *self.snapshot.borrow()
    }
}

pub struct NavigationSession {
    controller: NavigationController,
    events: mpsc::UnboundedSender<NavigationEvent>,
    snapshot: watch::Sender<NavigationSnapshot>,
    cancel: watch::Receiver<bool>,
}

impl NavigationSession {
    pub fn new(controller: NavigationController) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot_of(&controller));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        (
            NavigationSession {
                controller,
                events: events_tx,
                snapshot: snapshot_tx,
                cancel: cancel_rx,
            },
            SessionHandle {
                events: events_rx,
                snapshot: snapshot_rx,
                cancel: cancel_tx,
            },
        )
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    /// Drive the session until arrival, cancellation or end of the
    /// location stream. The subscription is released on every exit path.
    pub async fn run<S, R>(&mut self, source: &mut S, routing: &R) -> NavResult<SessionOutcome>
    where
        S: PositionSource,
        R: RoutingService,
    {
        let mut subscription = source.subscribe()?;
        let mut pending: Option<(u64, RouteFuture<'_>)> = None;
        let mut cancel_open = true;

        let outcome = loop {
            if self.controller.phase() == Phase::Arrived {
                break SessionOutcome::Arrived;
            }

            tokio::select! {
                biased;

                changed = self.cancel.changed(), if cancel_open => {
                    if changed.is_err() {
                        // Handle dropped; nobody can cancel any more
                        cancel_open = false;
                    } else if *self.cancel.borrow() {
                        self.controller.cancel();
                        break SessionOutcome::Cancelled;
                    }
                }

                Some(result) = OptionFuture::from(pending.as_mut().map(|(_, fut)| fut)) => {
                    if let Some((ticket, _)) = pending.take() {
                        let events = self.controller.on_recalculation_result(ticket, result);
                        self.emit(events);
                        self.publish_snapshot();
                    }
                }

                update = subscription.recv() => match update {
                    None => {
                        log::info!("Location stream closed before arrival");
                        break SessionOutcome::SourceClosed;
                    }
                    Some(Ok(position)) => {
                        let outcome = self.controller.on_position(position, Instant::now());
                        self.emit(outcome.events);
                        if let Some(request) = outcome.recalculation {
                            let fut = routing.request_route(request.origin, request.destination);
                            pending = Some((request.ticket, Box::pin(fut)));
                        }
                        self.publish_snapshot();
                    }
                    Some(Err(error)) => {
                        let events = self.controller.on_location_error(&error);
                        self.emit(events);
                    }
                },
            }
        };

        // Dropping the future abandons any in-flight request
        drop(pending);
        subscription.unsubscribe();
        self.publish_snapshot();
        log::info!("Navigation session ended: {:?}", outcome);
        Ok(outcome)
    }

    fn emit(&self, events: Vec<NavigationEvent>) {
        for event in events {
            // UI may have gone away; the session still runs to completion
            let _ = self.events.send(event);
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(snapshot_of(&self.controller));
    }
}

fn snapshot_of(controller: &NavigationController) -> NavigationSnapshot {
    NavigationSnapshot {
        position: controller.current_position(),
        step_index: controller.current_step_index(),
        phase: controller.phase(),
    }
}
