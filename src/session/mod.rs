pub mod mutate;
pub mod score;

#[cfg(test)]
pub(crate) mod testutil;

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::ai::{PlanRelay, PLAN_FALLBACK};
use crate::auth::{AuthError, Identity};
use crate::core::clock;
use crate::core::task::{OwnerId, Task};
use crate::events::{AppEvent, EventBus};
use crate::store::{StoreError, TaskStore, TaskWatch};

/// Default freshness window: a cached day younger than this is reused when
/// the session flips back to it instead of reopening the watch.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(30);

/// The task list for the active session date, kept fresh by at most one open
/// store watch and mutated optimistically (see `mutate`). Snapshots from the
/// watch replace the visible list wholesale; the list is the last-known-good
/// render buffer, the watch is the source of truth.
pub struct SessionTasks<S> {
    store: S,
    owner: OwnerId,
    bus: EventBus,
    relay: Option<PlanRelay>,
    date: NaiveDate,
    tasks: Vec<Task>,
    fetched_at: Option<Instant>,
    watch: Option<TaskWatch>,
    /// Set when degraded to the owner-wide stream; snapshots then need
    /// client-side day filtering.
    day_filtered: bool,
    /// Optimistic writes currently awaiting confirmation. While non-zero,
    /// incoming snapshots are ignored so a stale notification cannot clobber
    /// a newer local edit; the write's own confirmation snapshot reconciles.
    in_flight: usize,
    freshness: Duration,
}

impl<S: TaskStore + Clone> SessionTasks<S> {
    pub fn new(store: S, identity: &Identity, bus: EventBus) -> Result<Self, AuthError> {
        let owner = identity.require_verified()?.clone();
        Ok(Self {
            store,
            owner,
            bus,
            relay: None,
            date: clock::today(),
            tasks: Vec::new(),
            fetched_at: None,
            watch: None,
            day_filtered: false,
            in_flight: 0,
            freshness: DEFAULT_FRESHNESS,
        })
    }

    pub fn with_relay(mut self, relay: PlanRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Switch the session to `date` and bring the visible list up. A still
    /// fresh cache for the same date is republished as-is; otherwise the
    /// previous watch is cancelled and a new one opened. A rejected day query
    /// degrades to the owner-wide stream filtered client-side; permission
    /// denial is terminal and triggers no fallback fetch.
    pub async fn load(&mut self, date: NaiveDate) -> Result<(), StoreError> {
        if date == self.date
            && self.watch.is_some()
            && self
                .fetched_at
                .is_some_and(|at| at.elapsed() < self.freshness)
        {
            self.bus.emit(AppEvent::TasksChanged);
            return Ok(());
        }

        // At most one watch: drop the previous feed before opening the next.
        self.watch = None;
        self.fetched_at = None;
        self.date = date;
        self.day_filtered = false;

        let mut watch = match self.store.watch_day(&self.owner, date).await {
            Ok(watch) => watch,
            Err(StoreError::BadQuery(msg)) => {
                log::warn!("day query rejected ({msg}); degrading to owner-wide stream");
                self.day_filtered = true;
                let all = self.store.tasks_for_owner(&self.owner).await?;
                self.install_snapshot(all);
                self.watch = Some(self.store.watch_owner(&self.owner).await?);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if let Some(first) = watch.next().await {
            self.install_snapshot(first);
        }
        self.watch = Some(watch);
        Ok(())
    }

    /// Drain any pending watch snapshots into the visible list.
    pub fn poll_changes(&mut self) {
        loop {
            let snapshot = match self.watch.as_mut() {
                Some(watch) => match watch.try_next() {
                    Some(s) => s,
                    None => return,
                },
                None => return,
            };
            if self.in_flight > 0 {
                log::debug!("dropping snapshot while a write is in flight");
                continue;
            }
            self.install_snapshot(snapshot);
        }
    }

    /// Wait for and apply the next watch snapshot. Returns false once the
    /// feed is closed or no watch is open.
    pub async fn next_change(&mut self) -> bool {
        let snapshot = match self.watch.as_mut() {
            Some(watch) => watch.next().await,
            None => None,
        };
        match snapshot {
            Some(s) => {
                if self.in_flight == 0 {
                    self.install_snapshot(s);
                }
                true
            }
            None => false,
        }
    }

    /// The planner is a today-only affordance; past and future session dates
    /// never consult the relay.
    pub fn plan_available(&self) -> bool {
        self.date == clock::today()
    }

    /// Ask the relay for a prioritized day plan over the visible tasks.
    /// Any relay failure yields the fixed fallback text, never an error.
    pub async fn day_plan(&self) -> String {
        if !self.plan_available() {
            return PLAN_FALLBACK.to_string();
        }
        let Some(relay) = &self.relay else {
            return PLAN_FALLBACK.to_string();
        };
        match relay.generate_day_plan(&self.tasks).await {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("day plan relay failed: {e}");
                PLAN_FALLBACK.to_string()
            }
        }
    }

    fn install_snapshot(&mut self, mut tasks: Vec<Task>) {
        if self.day_filtered {
            tasks.retain(|t| t.day() == self.date);
        }
        tasks.sort_by_key(|t| t.due);
        self.tasks = tasks;
        self.fetched_at = Some(Instant::now());
        self.bus.emit(AppEvent::TasksChanged);
    }

    /// Replace the visible list after a local mutation and signal dependents.
    fn republish(&mut self) {
        self.tasks.sort_by_key(|t| t.due);
        self.bus.emit(AppEvent::TasksChanged);
    }

    /// The reusable optimistic-mutation guard: the caller has already applied
    /// its local patch; this runs the remote operation and, on failure,
    /// restores the pre-patch snapshot before surfacing the error.
    async fn guarded<T, Fut>(
        &mut self,
        before: Vec<Task>,
        op: Fut,
    ) -> Result<T, mutate::MutateError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        // Balanced by a drop guard: even if the caller drops this future
        // mid-await (timeout, shutdown), the counter comes back down and
        // snapshot delivery keeps working.
        struct InFlight<'a>(&'a mut usize);
        impl Drop for InFlight<'_> {
            fn drop(&mut self) {
                *self.0 -= 1;
            }
        }

        self.in_flight += 1;
        let result = {
            let _guard = InFlight(&mut self.in_flight);
            op.await
        };
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                self.tasks = before;
                self.republish();
                Err(mutate::MutateError::Store(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{identity, task_due, FlakyStore};
    use super::*;
    use crate::core::task::TaskDraft;
    use crate::store::memory::MemoryStore;
    use chrono::Duration as ChronoDuration;

    fn bus() -> EventBus {
        EventBus::new()
    }

    async fn session_for(store: MemoryStore) -> SessionTasks<MemoryStore> {
        SessionTasks::new(store, &identity(), bus()).unwrap()
    }

    #[tokio::test]
    async fn load_fills_the_visible_list_for_the_day() {
        let store = MemoryStore::new();
        let today = clock::today();
        store.create(&task_due("Stretch", today, 7)).await.unwrap();
        store.create(&task_due("Email", today, 9)).await.unwrap();
        store
            .create(&task_due("Tomorrow thing", today + ChronoDuration::days(1), 9))
            .await
            .unwrap();

        let mut session = session_for(store).await;
        session.load(today).await.unwrap();

        let texts: Vec<&str> = session.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Stretch", "Email"]);
    }

    #[tokio::test]
    async fn fresh_cache_is_reused_without_reopening_the_watch() {
        let store = MemoryStore::new();
        let today = clock::today();
        store.create(&task_due("Stretch", today, 7)).await.unwrap();

        let bus = bus();
        let mut rx = bus.subscribe();
        let mut session = SessionTasks::new(store, &identity(), bus).unwrap();
        session.load(today).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), AppEvent::TasksChanged);

        // Second load inside the freshness window republishes the cache
        session.load(today).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), AppEvent::TasksChanged);
        assert_eq!(session.tasks().len(), 1);
    }

    #[tokio::test]
    async fn switching_dates_swaps_the_visible_list() {
        let store = MemoryStore::new();
        let today = clock::today();
        let tomorrow = today + ChronoDuration::days(1);
        store.create(&task_due("Today", today, 9)).await.unwrap();
        store
            .create(&task_due("Tomorrow", tomorrow, 9))
            .await
            .unwrap();

        let mut session = session_for(store).await;
        session.load(today).await.unwrap();
        assert_eq!(session.tasks()[0].text, "Today");

        session.load(tomorrow).await.unwrap();
        assert_eq!(session.tasks().len(), 1);
        assert_eq!(session.tasks()[0].text, "Tomorrow");
    }

    #[tokio::test]
    async fn remote_changes_flow_into_the_list() {
        let store = MemoryStore::new();
        let today = clock::today();
        let mut session = session_for(store.clone()).await;
        session.load(today).await.unwrap();
        assert!(session.tasks().is_empty());

        store.create(&task_due("New", today, 11)).await.unwrap();
        assert!(session.next_change().await);
        assert_eq!(session.tasks().len(), 1);
    }

    #[tokio::test]
    async fn bad_query_degrades_to_owner_stream_with_day_filter() {
        let store = FlakyStore::new();
        let today = clock::today();
        store
            .inner
            .create(&task_due("Today", today, 9))
            .await
            .unwrap();
        store
            .inner
            .create(&task_due("Other day", today + ChronoDuration::days(2), 9))
            .await
            .unwrap();
        store.set_watch_day_error(StoreError::BadQuery("missing index".into()));

        let mut session = SessionTasks::new(store.clone(), &identity(), bus()).unwrap();
        session.load(today).await.unwrap();

        // Fallback filters the owner-wide result down to the session day
        assert_eq!(session.tasks().len(), 1);
        assert_eq!(session.tasks()[0].text, "Today");
        assert_eq!(store.owner_fetches(), 1);

        // The owner-wide stream keeps the filter on later snapshots
        store
            .inner
            .create(&task_due("Later today", today, 20))
            .await
            .unwrap();
        // First pending snapshot is the stream's initial one; pump until the
        // create shows up.
        while session.tasks().len() < 2 {
            assert!(session.next_change().await);
        }
        let texts: Vec<&str> = session.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Today", "Later today"]);
    }

    #[tokio::test]
    async fn permission_denied_is_terminal_and_fetches_nothing() {
        let store = FlakyStore::new();
        store.set_watch_day_error(StoreError::PermissionDenied);

        let mut session = SessionTasks::new(store.clone(), &identity(), bus()).unwrap();
        let err = session.load(clock::today()).await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied));
        // No fallback fetch was issued
        assert_eq!(store.owner_fetches(), 0);
        assert!(session.tasks().is_empty());
    }

    #[tokio::test]
    async fn unverified_identity_cannot_open_a_session() {
        let id = Identity::new("u1", "u1@example.com", false);
        assert!(SessionTasks::new(MemoryStore::new(), &id, bus()).is_err());
    }

    #[tokio::test]
    async fn day_plan_without_relay_is_the_fallback_text() {
        let session = session_for(MemoryStore::new()).await;
        assert_eq!(session.day_plan().await, PLAN_FALLBACK);
    }

    #[tokio::test]
    async fn the_planner_is_only_available_on_today() {
        let mut session = session_for(MemoryStore::new()).await;

        session.load(clock::today()).await.unwrap();
        assert!(session.plan_available());

        session
            .load(clock::today() + ChronoDuration::days(1))
            .await
            .unwrap();
        assert!(!session.plan_available());
        assert_eq!(session.day_plan().await, PLAN_FALLBACK);

        session
            .load(clock::today() - ChronoDuration::days(1))
            .await
            .unwrap();
        assert!(!session.plan_available());
    }

    #[tokio::test]
    async fn cancelled_write_does_not_wedge_snapshot_delivery() {
        let store = FlakyStore::new();
        let day = clock::today() + ChronoDuration::days(1);
        let due = day.and_hms_opt(10, 0, 0).unwrap();

        let mut session = SessionTasks::new(store.clone(), &identity(), bus()).unwrap();
        session.load(day).await.unwrap();

        // The write hangs and the caller gives up on it
        store.set_hang_writes(true);
        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            session.add_or_edit(TaskDraft::new("Stuck", due)),
        )
        .await;
        assert!(timed_out.is_err());
        store.set_hang_writes(false);

        // Later snapshots must still land and reconcile the abandoned
        // optimistic insert away
        store.inner.create(&task_due("Fresh", day, 9)).await.unwrap();
        let settled = tokio::time::timeout(Duration::from_secs(1), async {
            while !session.tasks().iter().any(|t| t.text == "Fresh") {
                assert!(session.next_change().await);
            }
        })
        .await;
        assert!(settled.is_ok());
        assert!(!session.tasks().iter().any(|t| t.text == "Stuck"));
    }
}
