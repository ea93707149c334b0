use serde::Serialize;
use tracing::instrument;

use super::products::ProductsResolver;
use super::resolver::ResolverStatus;
use super::users::UsersResolver;
use crate::providers::directory::DirectoryClient;

/// Record counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub users_total: u64,
    pub products_total: u64,
    /// Whether either count could not be fetched and reads 0.
    #[serde(skip)]
    pub incomplete: bool,
}

impl DashboardSummary {
    /// Load the first page of users and of products, concurrently.
    #[instrument(skip_all)]
    pub async fn load<C: DirectoryClient>(client: &C) -> Self {
        let mut users = UsersResolver::new();
        let mut products = ProductsResolver::new();

        let (users_total, products_total) = futures::join!(
            async { users.fetch(client).await.total },
            async { products.fetch(client).await.total },
        );

        Self {
            users_total,
            products_total,
            incomplete: users.status() == ResolverStatus::Failed
                || products.status() == ResolverStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use hsa_api::ApiError;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::page::ResultPage;
    use crate::providers::directory::test_helpers::{product, user};
    use crate::providers::directory::MockClient;

    #[tokio::test]
    async fn reports_totals() {
        let client = MockClient::new();
        client.push_users_response(ResultPage::new(vec![user(1)], 208));
        client.push_products_response(ResultPage::new(vec![product(1)], 194));

        let summary = DashboardSummary::load(&client).await;
        assert_eq!(summary, DashboardSummary {
            users_total: 208,
            products_total: 194,
            incomplete: false,
        });
    }

    #[tokio::test]
    async fn failed_count_reads_zero() {
        let client = MockClient::new();
        client.push_error_response(ApiError::Other("boom".to_string()));
        client.push_products_response(ResultPage::new(vec![product(1)], 194));

        let summary = DashboardSummary::load(&client).await;
        assert_eq!(summary.users_total, 0);
        assert_eq!(summary.products_total, 194);
        assert!(summary.incomplete);
    }
}
