//! The upstream directory of users and products.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use enum_dispatch::enum_dispatch;
use hsa_api::types::{Product, ProductsPayload, RecordId, User, UsersPayload};
use hsa_api::{ApiClient, ApiError};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::models::page::{PageRequest, ResultPage};

const USERS_PATH: &str = "/users";
const USERS_SEARCH_PATH: &str = "/users/search";
const PRODUCTS_PATH: &str = "/products";
const PRODUCTS_SEARCH_PATH: &str = "/products/search";
const PRODUCT_CATEGORIES_PATH: &str = "/products/categories";

/// Endpoints of the upstream API used by the resolvers.
///
/// List endpoints coalesce their payload: a missing record list is empty and
/// a missing total is the number of records received.
#[enum_dispatch]
#[allow(async_fn_in_trait)]
pub trait DirectoryClient {
    /// `GET /users?limit&skip`
    async fn list_users(&self, page: PageRequest) -> Result<ResultPage<User>, ApiError>;

    /// `GET /users/search?q&limit&skip`
    async fn search_users(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<ResultPage<User>, ApiError>;

    /// `GET /users/{id}`
    async fn user_by_id(&self, id: RecordId) -> Result<User, ApiError>;

    /// `GET /products?limit&skip`
    async fn list_products(&self, page: PageRequest) -> Result<ResultPage<Product>, ApiError>;

    /// `GET /products/search?q&limit&skip`
    async fn search_products(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<ResultPage<Product>, ApiError>;

    /// `GET /products/category/{category}?limit&skip`
    async fn products_in_category(
        &self,
        category: &str,
        page: PageRequest,
    ) -> Result<ResultPage<Product>, ApiError>;

    /// `GET /products/{id}`
    async fn product_by_id(&self, id: RecordId) -> Result<Product, ApiError>;

    /// `GET /products/categories`, as served.
    async fn product_categories(&self) -> Result<Value, ApiError>;
}

/// Either the HTTP client for the upstream API,
/// or a mock client for testing.
#[derive(Debug)]
#[enum_dispatch(DirectoryClient)]
pub enum Client {
    Http(ApiClient),
    Mock(MockClient),
}

fn search_params(term: &str, page: PageRequest) -> [(&'static str, String); 3] {
    let [limit, skip] = page.query_params();
    [("q", term.to_string()), limit, skip]
}

fn users_page(payload: UsersPayload) -> ResultPage<User> {
    let (records, total) = payload.into_parts();
    ResultPage::new(records, total)
}

fn products_page(payload: ProductsPayload) -> ResultPage<Product> {
    let (records, total) = payload.into_parts();
    ResultPage::new(records, total)
}

impl DirectoryClient for ApiClient {
    #[instrument(skip(self))]
    async fn list_users(&self, page: PageRequest) -> Result<ResultPage<User>, ApiError> {
        let payload: UsersPayload = self.get_json(USERS_PATH, &page.query_params()).await?;
        Ok(users_page(payload))
    }

    #[instrument(skip(self))]
    async fn search_users(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<ResultPage<User>, ApiError> {
        let payload: UsersPayload = self
            .get_json(USERS_SEARCH_PATH, &search_params(term, page))
            .await?;
        Ok(users_page(payload))
    }

    #[instrument(skip(self))]
    async fn user_by_id(&self, id: RecordId) -> Result<User, ApiError> {
        self.get_json(&format!("{USERS_PATH}/{id}"), &[]).await
    }

    #[instrument(skip(self))]
    async fn list_products(&self, page: PageRequest) -> Result<ResultPage<Product>, ApiError> {
        let payload: ProductsPayload = self.get_json(PRODUCTS_PATH, &page.query_params()).await?;
        Ok(products_page(payload))
    }

    #[instrument(skip(self))]
    async fn search_products(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<ResultPage<Product>, ApiError> {
        let payload: ProductsPayload = self
            .get_json(PRODUCTS_SEARCH_PATH, &search_params(term, page))
            .await?;
        Ok(products_page(payload))
    }

    #[instrument(skip(self))]
    async fn products_in_category(
        &self,
        category: &str,
        page: PageRequest,
    ) -> Result<ResultPage<Product>, ApiError> {
        let url = self.url_from_segments(["products", "category", category])?;
        let payload: ProductsPayload = self.get_json_url(url, &page.query_params()).await?;
        Ok(products_page(payload))
    }

    #[instrument(skip(self))]
    async fn product_by_id(&self, id: RecordId) -> Result<Product, ApiError> {
        self.get_json(&format!("{PRODUCTS_PATH}/{id}"), &[]).await
    }

    #[instrument(skip(self))]
    async fn product_categories(&self) -> Result<Value, ApiError> {
        self.get_json(PRODUCT_CATEGORIES_PATH, &[]).await
    }
}

// ---------------------------------------------------------------------------
// Mock client
// ---------------------------------------------------------------------------

// Arc allows you to push things into the client from outside the client if necessary
// Mutex allows the client to be shared by reference while responses are taken out
type MockField<T> = Arc<Mutex<T>>;

/// A call received by a [MockClient].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListUsers(PageRequest),
    SearchUsers(String, PageRequest),
    UserById(RecordId),
    ListProducts(PageRequest),
    SearchProducts(String, PageRequest),
    ProductsInCategory(String, PageRequest),
    ProductById(RecordId),
    ProductCategories,
}

#[derive(Debug)]
pub enum MockResponse {
    Users(ResultPage<User>),
    User(User),
    Products(ResultPage<Product>),
    Product(Product),
    Categories(Value),
    Error(ApiError),
}

/// A directory client that answers from a queue of canned responses,
/// in order, and records every call it receives.
#[derive(Debug, Default, Clone)]
pub struct MockClient {
    pub mock_responses: MockField<VecDeque<MockResponse>>,
    pub calls: MockField<Vec<MockCall>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, response: MockResponse) {
        self.mock_responses
            .lock()
            .expect("couldn't acquire mock lock")
            .push_back(response);
    }

    pub fn push_users_response(&self, page: ResultPage<User>) {
        self.push(MockResponse::Users(page));
    }

    pub fn push_user_response(&self, user: User) {
        self.push(MockResponse::User(user));
    }

    pub fn push_products_response(&self, page: ResultPage<Product>) {
        self.push(MockResponse::Products(page));
    }

    pub fn push_product_response(&self, product: Product) {
        self.push(MockResponse::Product(product));
    }

    pub fn push_categories_response(&self, categories: Value) {
        self.push(MockResponse::Categories(categories));
    }

    pub fn push_error_response(&self, err: ApiError) {
        self.push(MockResponse::Error(err));
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("couldn't acquire mock lock").clone()
    }

    fn answer(&self, call: MockCall) -> Result<MockResponse, ApiError> {
        debug!(?call, "mock client called");
        self.calls
            .lock()
            .expect("couldn't acquire mock lock")
            .push(call.clone());
        let response = self
            .mock_responses
            .lock()
            .expect("couldn't acquire mock lock")
            .pop_front()
            .ok_or_else(|| ApiError::Other(format!("no mock response for {call:?}")))?;
        match response {
            MockResponse::Error(err) => Err(err),
            response => Ok(response),
        }
    }
}

fn unexpected(response: MockResponse) -> ApiError {
    ApiError::Other(format!("unexpected mock response: {response:?}"))
}

impl DirectoryClient for MockClient {
    async fn list_users(&self, page: PageRequest) -> Result<ResultPage<User>, ApiError> {
        match self.answer(MockCall::ListUsers(page))? {
            MockResponse::Users(page) => Ok(page),
            other => Err(unexpected(other)),
        }
    }

    async fn search_users(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<ResultPage<User>, ApiError> {
        match self.answer(MockCall::SearchUsers(term.to_string(), page))? {
            MockResponse::Users(page) => Ok(page),
            other => Err(unexpected(other)),
        }
    }

    async fn user_by_id(&self, id: RecordId) -> Result<User, ApiError> {
        match self.answer(MockCall::UserById(id))? {
            MockResponse::User(user) => Ok(user),
            other => Err(unexpected(other)),
        }
    }

    async fn list_products(&self, page: PageRequest) -> Result<ResultPage<Product>, ApiError> {
        match self.answer(MockCall::ListProducts(page))? {
            MockResponse::Products(page) => Ok(page),
            other => Err(unexpected(other)),
        }
    }

    async fn search_products(
        &self,
        term: &str,
        page: PageRequest,
    ) -> Result<ResultPage<Product>, ApiError> {
        match self.answer(MockCall::SearchProducts(term.to_string(), page))? {
            MockResponse::Products(page) => Ok(page),
            other => Err(unexpected(other)),
        }
    }

    async fn products_in_category(
        &self,
        category: &str,
        page: PageRequest,
    ) -> Result<ResultPage<Product>, ApiError> {
        match self.answer(MockCall::ProductsInCategory(category.to_string(), page))? {
            MockResponse::Products(page) => Ok(page),
            other => Err(unexpected(other)),
        }
    }

    async fn product_by_id(&self, id: RecordId) -> Result<Product, ApiError> {
        match self.answer(MockCall::ProductById(id))? {
            MockResponse::Product(product) => Ok(product),
            other => Err(unexpected(other)),
        }
    }

    async fn product_categories(&self) -> Result<Value, ApiError> {
        match self.answer(MockCall::ProductCategories)? {
            MockResponse::Categories(categories) => Ok(categories),
            other => Err(unexpected(other)),
        }
    }
}

/// Helpers for building canned records.
pub mod test_helpers {
    use super::*;

    pub fn user(id: RecordId) -> User {
        User {
            id,
            ..Default::default()
        }
    }

    pub fn users(ids: &[RecordId]) -> ResultPage<User> {
        ResultPage::new(ids.iter().copied().map(user).collect(), ids.len() as u64)
    }

    pub fn product(id: RecordId) -> Product {
        Product {
            id,
            ..Default::default()
        }
    }

    pub fn products(ids: &[RecordId]) -> ResultPage<Product> {
        ResultPage::new(ids.iter().copied().map(product).collect(), ids.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use hsa_api::{ApiClientConfig, SessionContext};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::models::page::DEFAULT_PAGE_SIZE;

    fn http_client(server: &MockServer) -> Client {
        let config = ApiClientConfig {
            base_url: server.base_url(),
            ..Default::default()
        };
        Client::from(ApiClient::new(config, SessionContext::in_memory()).unwrap())
    }

    #[tokio::test]
    async fn list_users_sends_limit_and_skip() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/users")
                .query_param("limit", "10")
                .query_param("skip", "20");
            then.status(200).json_body(json!({
                "users": [{ "id": 21 }, { "id": 22 }],
                "total": 208,
                "skip": 20,
                "limit": 10,
            }));
        });

        let client = http_client(&server);
        let page = client
            .list_users(PageRequest::new(2, DEFAULT_PAGE_SIZE))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(page.total, 208);
        assert_eq!(page.records.iter().map(|u| u.id).collect::<Vec<_>>(), vec![
            21, 22
        ]);
    }

    #[tokio::test]
    async fn search_sends_term() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/products/search")
                .query_param("q", "phone")
                .query_param("limit", "10")
                .query_param("skip", "0");
            then.status(200).json_body(json!({ "products": [{ "id": 1 }] }));
        });

        let client = http_client(&server);
        let page = client
            .search_products("phone", PageRequest::new(0, DEFAULT_PAGE_SIZE))
            .await
            .unwrap();
        mock.assert();
        // total falls back to the number of records
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn category_is_a_path_segment() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/products/category/home-decoration")
                .query_param("limit", "10")
                .query_param("skip", "10");
            then.status(200)
                .json_body(json!({ "products": [], "total": 5 }));
        });

        let client = http_client(&server);
        let page = client
            .products_in_category("home-decoration", PageRequest::new(1, DEFAULT_PAGE_SIZE))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(page, ResultPage::new(vec![], 5));
    }

    #[tokio::test]
    async fn record_by_id() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/products/3");
            then.status(200)
                .json_body(json!({ "id": 3, "title": "Powder Canister", "price": 14.99 }));
        });

        let client = http_client(&server);
        let product = client.product_by_id(3).await.unwrap();
        assert_eq!(product.title.as_deref(), Some("Powder Canister"));
        assert_eq!(product.price, Some(14.99));
    }

    #[tokio::test]
    async fn mock_client_records_calls() {
        let mock = MockClient::new();
        mock.push_users_response(test_helpers::users(&[1]));
        mock.push_error_response(ApiError::NotFound);

        let client = Client::from(mock.clone());
        let page = PageRequest::new(0, DEFAULT_PAGE_SIZE);
        assert_eq!(client.list_users(page).await.unwrap().records.len(), 1);
        assert!(matches!(client.user_by_id(5).await, Err(ApiError::NotFound)));
        assert!(matches!(client.product_categories().await, Err(ApiError::Other(_))));

        assert_eq!(mock.calls(), vec![
            MockCall::ListUsers(page),
            MockCall::UserById(5),
            MockCall::ProductCategories,
        ]);
    }
}
