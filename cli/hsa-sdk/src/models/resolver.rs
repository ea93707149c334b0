//! State shared by the users and products resolvers.
//!
//! A resolver shows exactly one page at a time. Every fetch is tagged with a
//! monotonically increasing sequence number when it starts, and its outcome
//! is only shown if no other fetch was started in the meantime.
//! Outcomes of superseded fetches are dropped, so a slow response can't
//! overwrite the page of a newer query.

use hsa_api::ApiError;
use tracing::{debug, error};

use super::events::{SubscriptionId, Subscribers};
use super::page::ResultPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverEvent {
    /// A setter changed the query, the shown page is out of date.
    QueryChanged,
    Loading,
    Loaded { count: usize, total: u64 },
    Failed,
    /// The outcome of fetch `sequence` arrived after a newer fetch started.
    StaleDiscarded { sequence: u64 },
}

/// A fetch that was started but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch<Q> {
    sequence: u64,
    query: Q,
}

impl<Q> PendingFetch<Q> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The query as it was when the fetch started.
    pub fn query(&self) -> &Q {
        &self.query
    }
}

/// Result of starting a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<Q> {
    /// Served from cache, the page is already shown.
    Cached,
    Pending(PendingFetch<Q>),
}

#[derive(Debug)]
pub(crate) struct ResolverCore<T> {
    status: ResolverStatus,
    page: ResultPage<T>,
    last_sequence: u64,
    subscribers: Subscribers<ResolverEvent>,
}

impl<T> Default for ResolverCore<T> {
    fn default() -> Self {
        Self {
            status: ResolverStatus::Idle,
            page: ResultPage::default(),
            last_sequence: 0,
            subscribers: Subscribers::default(),
        }
    }
}

impl<T> ResolverCore<T> {
    pub(crate) fn status(&self) -> ResolverStatus {
        self.status
    }

    pub(crate) fn page(&self) -> &ResultPage<T> {
        &self.page
    }

    pub(crate) fn subscribe(&mut self, callback: impl Fn(&ResolverEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub(crate) fn query_changed(&self) {
        self.subscribers.emit(&ResolverEvent::QueryChanged);
    }

    /// Supersede every fetch started so far.
    fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    pub(crate) fn start<Q>(&mut self, query: Q) -> PendingFetch<Q> {
        let sequence = self.next_sequence();
        self.status = ResolverStatus::Loading;
        debug!(sequence, "fetch started");
        self.subscribers.emit(&ResolverEvent::Loading);
        PendingFetch { sequence, query }
    }

    /// Show a page that needed no fetch.
    pub(crate) fn show_immediately(&mut self, page: ResultPage<T>) {
        let sequence = self.next_sequence();
        debug!(sequence, "showing cached page");
        self.show(page);
    }

    /// Apply the outcome of a fetch if it is still the latest one.
    ///
    /// Returns whether the outcome was applied.
    pub(crate) fn complete(
        &mut self,
        sequence: u64,
        outcome: Result<ResultPage<T>, ApiError>,
    ) -> bool {
        if sequence != self.last_sequence {
            debug!(sequence, latest = self.last_sequence, "discarding stale outcome");
            self.subscribers
                .emit(&ResolverEvent::StaleDiscarded { sequence });
            return false;
        }

        match outcome {
            Ok(page) => self.show(page),
            Err(e) => {
                error!(error = %e, sequence, "failed to resolve page");
                self.page = ResultPage::default();
                self.status = ResolverStatus::Failed;
                self.subscribers.emit(&ResolverEvent::Failed);
            },
        }
        true
    }

    fn show(&mut self, page: ResultPage<T>) {
        self.page = page;
        self.status = ResolverStatus::Loaded;
        self.subscribers.emit(&ResolverEvent::Loaded {
            count: self.page.records.len(),
            total: self.page.total,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;

    fn recorded(core: &mut ResolverCore<u32>) -> Rc<RefCell<Vec<ResolverEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        core.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn newer_fetch_wins_regardless_of_arrival_order() {
        let mut core = ResolverCore::<u32>::default();
        let events = recorded(&mut core);

        let older = core.start("a");
        let newer = core.start("b");

        assert!(core.complete(newer.sequence(), Ok(ResultPage::new(vec![2], 1))));
        assert!(!core.complete(older.sequence(), Ok(ResultPage::new(vec![1], 1))));

        assert_eq!(core.page().records, vec![2]);
        assert_eq!(core.status(), ResolverStatus::Loaded);
        assert_eq!(*events.borrow(), vec![
            ResolverEvent::Loading,
            ResolverEvent::Loading,
            ResolverEvent::Loaded { count: 1, total: 1 },
            ResolverEvent::StaleDiscarded {
                sequence: older.sequence()
            },
        ]);
    }

    #[test]
    fn failure_shows_empty_page() {
        let mut core = ResolverCore::<u32>::default();
        core.show_immediately(ResultPage::new(vec![1, 2], 2));

        let pending = core.start(());
        assert!(core.complete(pending.sequence(), Err(ApiError::NotFound)));

        assert_eq!(core.status(), ResolverStatus::Failed);
        assert_eq!(core.page(), &ResultPage::default());
    }

    #[test]
    fn immediate_page_supersedes_pending_fetch() {
        let mut core = ResolverCore::<u32>::default();
        let pending = core.start(());
        core.show_immediately(ResultPage::new(vec![7], 1));

        assert!(!core.complete(pending.sequence(), Ok(ResultPage::new(vec![1], 1))));
        assert_eq!(core.page().records, vec![7]);
    }
}
