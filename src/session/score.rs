use std::time::Duration;

use tokio::sync::watch;

use crate::auth::{AuthError, Identity};
use crate::core::clock;
use crate::core::score::Scoreboard;
use crate::core::task::OwnerId;
use crate::events::{AppEvent, EventBus};
use crate::store::{StoreError, TaskStore};

/// Derives the owner's score and streak from the store's completed-task query
/// and republishes on demand. The board is pure output; nothing here writes.
pub struct ScoreKeeper<S> {
    store: S,
    owner: OwnerId,
    tx: watch::Sender<Scoreboard>,
}

impl<S: TaskStore + Clone> ScoreKeeper<S> {
    pub fn new(store: S, identity: &Identity) -> Result<Self, AuthError> {
        let owner = identity.require_verified()?.clone();
        let (tx, _) = watch::channel(Scoreboard::default());
        Ok(Self { store, owner, tx })
    }

    pub fn board(&self) -> Scoreboard {
        *self.tx.borrow()
    }

    /// Watch channel for consumers that want push updates instead of polling
    /// `board`.
    pub fn subscribe(&self) -> watch::Receiver<Scoreboard> {
        self.tx.subscribe()
    }

    /// Refetch the completed set and recompute. Recomputing with no
    /// intervening change yields the same board and is not published again.
    pub async fn recompute(&self) -> Result<Scoreboard, StoreError> {
        let done = self.store.completed_tasks(&self.owner).await?;
        let board = Scoreboard::compute(&done, clock::today());
        self.tx.send_if_modified(|current| {
            if *current == board {
                false
            } else {
                *current = board;
                true
            }
        });
        Ok(board)
    }

    /// Recompute on every `TasksChanged` and on a fixed cadence as a safety
    /// net against changes that arrive without a bus signal. Runs until the
    /// bus closes.
    pub async fn run(&self, bus: EventBus, cadence: Duration) {
        let mut events = bus.subscribe();
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(AppEvent::TasksChanged) => {
                        if let Err(e) = self.recompute().await {
                            log::warn!("score recompute failed: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("score keeper lagged {n} events; recomputing");
                        if let Err(e) = self.recompute().await {
                            log::warn!("score recompute failed: {e}");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.recompute().await {
                        log::warn!("score recompute failed: {e}");
                    }
                }
            }
        }
    }
}
