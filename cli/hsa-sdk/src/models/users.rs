//! Paginated, searchable users.
//!
//! Upstream search only matches whole phrases, so a multi word term that
//! finds nothing is retried word by word before falling back to the
//! unfiltered list. Resolved pages are cached for the resolver's lifetime.

use std::collections::HashMap;
use std::num::NonZeroU32;

use hsa_api::ApiError;
use hsa_api::types::{Record, RecordId, User};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, instrument};

use super::events::SubscriptionId;
use super::page::{DEFAULT_PAGE_SIZE, PageRequest, ResultPage};
use super::resolver::{Fetch, PendingFetch, ResolverCore, ResolverEvent, ResolverStatus};
use crate::providers::directory::DirectoryClient;

/// Query state of a [UsersResolver], also the key of its cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsersQuery {
    /// Zero based.
    pub page: u32,
    pub page_size: NonZeroU32,
    /// Trimmed, empty for no filter.
    pub search: String,
}

impl Default for UsersQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            search: String::new(),
        }
    }
}

impl UsersQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// Resolve one page of users for `query`.
///
/// 1. no search term: the unfiltered list
/// 2. the whole term as a phrase
/// 3. if that found nothing and the term has several words:
///    every distinct word on its own, merged by id in first seen order
/// 4. if still nothing: the unfiltered list
///
/// The first failing request fails the whole resolution.
#[instrument(skip(client))]
pub async fn resolve_users<C: DirectoryClient>(
    client: &C,
    query: &UsersQuery,
) -> Result<ResultPage<User>, ApiError> {
    let request = query.page_request();
    let term = query.search.trim();

    if term.is_empty() {
        return Ok(client.list_users(request).await?.truncated(request.limit));
    }

    let phrase = client.search_users(term, request).await?;
    if !phrase.is_empty() {
        return Ok(phrase.truncated(request.limit));
    }

    if term.contains(char::is_whitespace) {
        let mut merged: IndexMap<RecordId, User> = IndexMap::new();
        for token in term.split_whitespace().unique() {
            let page = client.search_users(token, request).await?;
            debug!(token, found = page.records.len(), "searched token");
            for user in page.records {
                merged.entry(user.id()).or_insert(user);
            }
        }
        if !merged.is_empty() {
            let total = merged.len() as u64;
            return Ok(ResultPage::new(merged.into_values().collect(), total)
                .truncated(request.limit));
        }
    }

    debug!("search found nothing, showing unfiltered list");
    Ok(client.list_users(request).await?.truncated(request.limit))
}

/// Owns the users query state and the page currently shown for it.
#[derive(Debug, Default)]
pub struct UsersResolver {
    query: UsersQuery,
    cache: HashMap<UsersQuery, ResultPage<User>>,
    core: ResolverCore<User>,
}

impl UsersResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &UsersQuery {
        &self.query
    }

    pub fn status(&self) -> ResolverStatus {
        self.core.status()
    }

    pub fn page(&self) -> &ResultPage<User> {
        self.core.page()
    }

    pub fn subscribe(&mut self, callback: impl Fn(&ResolverEvent) + 'static) -> SubscriptionId {
        self.core.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.core.unsubscribe(id)
    }

    /// Set the search term and go back to the first page.
    pub fn set_search(&mut self, term: &str) {
        let term = term.trim();
        if self.query.search == term && self.query.page == 0 {
            return;
        }
        self.query.search = term.to_string();
        self.query.page = 0;
        self.core.query_changed();
    }

    pub fn set_page(&mut self, page: u32) {
        if self.query.page == page {
            return;
        }
        self.query.page = page;
        self.core.query_changed();
    }

    /// Set the page size and go back to the first page.
    pub fn set_page_size(&mut self, page_size: NonZeroU32) {
        if self.query.page_size == page_size && self.query.page == 0 {
            return;
        }
        self.query.page_size = page_size;
        self.query.page = 0;
        self.core.query_changed();
    }

    /// Show the cached page for the current query or start a fetch for it.
    pub fn begin_fetch(&mut self) -> Fetch<UsersQuery> {
        if let Some(page) = self.cache.get(&self.query) {
            debug!(query = ?self.query, "cache hit");
            self.core.show_immediately(page.clone());
            return Fetch::Cached;
        }
        Fetch::Pending(self.core.start(self.query.clone()))
    }

    /// Finish a fetch started by [Self::begin_fetch].
    ///
    /// Successful outcomes are cached under the query they were fetched for,
    /// even if a newer fetch has since superseded them.
    /// Returns whether the outcome is now shown.
    pub fn complete(
        &mut self,
        pending: PendingFetch<UsersQuery>,
        outcome: Result<ResultPage<User>, ApiError>,
    ) -> bool {
        let sequence = pending.sequence();
        if let Ok(page) = &outcome {
            self.cache.insert(pending.query().clone(), page.clone());
        }
        self.core.complete(sequence, outcome)
    }

    /// Resolve the current query and show the result.
    pub async fn fetch<C: DirectoryClient>(&mut self, client: &C) -> &ResultPage<User> {
        if let Fetch::Pending(pending) = self.begin_fetch() {
            let outcome = resolve_users(client, pending.query()).await;
            self.complete(pending, outcome);
        }
        self.page()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Fetch a single user, bypassing query state and cache.
    pub async fn fetch_by_id<C: DirectoryClient>(&self, client: &C, id: RecordId) -> Option<User> {
        if id == 0 {
            return None;
        }
        match client.user_by_id(id).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(id, error = %e, "user not available");
                None
            },
        }
    }
}
