//! Paginated products, filtered by search term or category.

use std::num::NonZeroU32;

use hsa_api::ApiError;
use hsa_api::types::{Product, RecordId};
use tracing::{debug, error, instrument};

use super::categories::normalize_categories;
use super::events::SubscriptionId;
use super::page::{DEFAULT_PAGE_SIZE, PageRequest, ResultPage};
use super::resolver::{PendingFetch, ResolverCore, ResolverEvent, ResolverStatus};
use crate::providers::directory::DirectoryClient;

/// Category filter value that disables category filtering.
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductsQuery {
    /// Zero based.
    pub page: u32,
    pub page_size: NonZeroU32,
    /// Trimmed, empty for no filter.
    pub search: String,
    /// A category name or [ALL_CATEGORIES].
    pub category: String,
}

impl Default for ProductsQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            search: String::new(),
            category: ALL_CATEGORIES.to_string(),
        }
    }
}

impl ProductsQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// The one endpoint a products query is answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductsEndpoint<'a> {
    Search(&'a str),
    Category(&'a str),
    All,
}

impl<'a> ProductsEndpoint<'a> {
    /// A search term wins over a category filter.
    pub fn select(query: &'a ProductsQuery) -> Self {
        let term = query.search.trim();
        if !term.is_empty() {
            return ProductsEndpoint::Search(term);
        }
        let category = query.category.trim();
        if !category.is_empty() && category != ALL_CATEGORIES {
            return ProductsEndpoint::Category(category);
        }
        ProductsEndpoint::All
    }
}

#[instrument(skip(client))]
pub async fn resolve_products<C: DirectoryClient>(
    client: &C,
    query: &ProductsQuery,
) -> Result<ResultPage<Product>, ApiError> {
    let request = query.page_request();
    let page = match ProductsEndpoint::select(query) {
        ProductsEndpoint::Search(term) => client.search_products(term, request).await?,
        ProductsEndpoint::Category(category) => {
            client.products_in_category(category, request).await?
        },
        ProductsEndpoint::All => client.list_products(request).await?,
    };
    Ok(page.truncated(request.limit))
}

/// Owns the products query state, the page currently shown for it
/// and the known categories.
#[derive(Debug, Default)]
pub struct ProductsResolver {
    query: ProductsQuery,
    categories: Vec<String>,
    core: ResolverCore<Product>,
}

impl ProductsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &ProductsQuery {
        &self.query
    }

    pub fn status(&self) -> ResolverStatus {
        self.core.status()
    }

    pub fn page(&self) -> &ResultPage<Product> {
        self.core.page()
    }

    /// Categories from the last [Self::fetch_categories].
    pub fn categories(&self) -> &[String] {
        &self.categories
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

    /// Set the category filter and go back to the first page.
    pub fn set_category(&mut self, category: &str) {
        let category = match category.trim() {
            "" => ALL_CATEGORIES,
            category => category,
        };
        if self.query.category == category && self.query.page == 0 {
            return;
        }
        self.query.category = category.to_string();
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

    pub fn set_page_size(&mut self, page_size: NonZeroU32) {
        if self.query.page_size == page_size && self.query.page == 0 {
            return;
        }
        self.query.page_size = page_size;
        self.query.page = 0;
        self.core.query_changed();
    }

    /// Start a fetch for the current query.
    pub fn begin_fetch(&mut self) -> PendingFetch<ProductsQuery> {
        self.core.start(self.query.clone())
    }

    /// Finish a fetch started by [Self::begin_fetch].
    ///
    /// Returns whether the outcome is now shown.
    pub fn complete(
        &mut self,
        pending: PendingFetch<ProductsQuery>,
        outcome: Result<ResultPage<Product>, ApiError>,
    ) -> bool {
        self.core.complete(pending.sequence(), outcome)
    }

    /// Resolve the current query and show the result.
    pub async fn fetch<C: DirectoryClient>(&mut self, client: &C) -> &ResultPage<Product> {
        let pending = self.begin_fetch();
        let outcome = resolve_products(client, pending.query()).await;
        self.complete(pending, outcome);
        self.page()
    }

    /// Refresh the known categories, none if they can't be fetched.
    pub async fn fetch_categories<C: DirectoryClient>(&mut self, client: &C) -> &[String] {
        self.categories = match client.product_categories().await {
            Ok(served) => normalize_categories(&served),
            Err(e) => {
                error!(error = %e, "failed to fetch product categories");
                Vec::new()
            },
        };
        &self.categories
    }

    /// Fetch a single product, bypassing query state.
    pub async fn fetch_by_id<C: DirectoryClient>(
        &self,
        client: &C,
        id: RecordId,
    ) -> Option<Product> {
        if id == 0 {
            return None;
        }
        match client.product_by_id(id).await {
            Ok(product) => Some(product),
            Err(e) => {
                debug!(id, error = %e, "product not available");
                None
            },
        }
    }
}
