use anyhow::{Result, bail};
use bpaf::Bpaf;
use hsa_api::types::{Product, RecordId};
use hsa_sdk::models::page::ResultPage;
use hsa_sdk::models::products::{ALL_CATEGORIES, ProductsResolver};
use hsa_sdk::models::resolver::ResolverStatus;
use indoc::formatdoc;
use tracing::{debug, instrument};

use super::{Admin, ListOptions, list_options};
use crate::utils::dialog::{Dialog, Spinner};
use crate::utils::message;
use crate::utils::table::{Table, cell};

#[derive(Clone, Debug, Bpaf)]
pub struct ProductsList {
    /// Only show products matching this term, any category filter is ignored
    #[bpaf(long, short, argument("term"))]
    search: Option<String>,

    /// Only show products of this category
    #[bpaf(long, short, argument("category"), fallback(ALL_CATEGORIES.to_string()))]
    category: String,

    #[bpaf(external(list_options))]
    options: ListOptions,
}

#[derive(Clone, Debug, Bpaf)]
pub struct ProductShow {
    /// Print the product as JSON
    #[bpaf(long)]
    json: bool,

    /// Id of the product
    #[bpaf(positional("id"))]
    id: RecordId,
}

#[derive(Clone, Debug, Bpaf)]
pub struct Categories {
    /// Print the categories as JSON
    #[bpaf(long)]
    json: bool,
}

#[derive(Clone, Debug, Bpaf)]
pub enum Products {
    /// List products a page at a time
    #[bpaf(command)]
    List(#[bpaf(external(products_list))] ProductsList),

    /// Show a single product
    #[bpaf(command)]
    Show(#[bpaf(external(product_show))] ProductShow),

    /// List product categories
    #[bpaf(command)]
    Categories(#[bpaf(external(categories))] Categories),
}

impl Products {
    #[instrument(name = "products", skip_all)]
    pub async fn handle(self, admin: Admin) -> Result<()> {
        admin.ensure_signed_in()?;
        match self {
            Products::List(args) => args.handle(&admin).await,
            Products::Show(args) => args.handle(&admin).await,
            Products::Categories(args) => args.handle(&admin).await,
        }
    }
}

impl ProductsList {
    async fn handle(self, admin: &Admin) -> Result<()> {
        let mut resolver = ProductsResolver::new();
        resolver.subscribe(|event| debug!(?event, "products"));
        resolver.subscribe(
            Dialog {
                message: "Loading products...",
                help_message: None,
                typed: Spinner::default(),
            }
            .follow(),
        );
        resolver.set_page_size(admin.config.page_size());
        resolver.set_search(self.search.as_deref().unwrap_or_default());
        resolver.set_category(&self.category);
        resolver.set_page(self.options.page_index());

        resolver.fetch(&admin.directory).await;
        if resolver.status() == ResolverStatus::Failed {
            bail!("Could not load products");
        }

        if self.options.json {
            println!("{}", serde_json::to_string_pretty(resolver.page())?);
            return Ok(());
        }

        let query = resolver.query();
        let page = resolver.page();
        if page.is_empty() {
            message::plain("No products found");
            return Ok(());
        }
        print!("{}", render_products(page));
        message::plain(format!(
            "Page {} of {} ({} products)",
            query.page + 1,
            page.page_count(query.page_size),
            page.total
        ));
        Ok(())
    }
}

impl ProductShow {
    async fn handle(self, admin: &Admin) -> Result<()> {
        let resolver = ProductsResolver::new();
        let Some(product) = resolver.fetch_by_id(&admin.directory, self.id).await else {
            bail!("Product {} not found", self.id);
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&product)?);
        } else {
            print!("{}", render_product(&product));
        }
        Ok(())
    }
}

impl Categories {
    async fn handle(self, admin: &Admin) -> Result<()> {
        let mut resolver = ProductsResolver::new();
        let categories = resolver.fetch_categories(&admin.directory).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(categories)?);
            return Ok(());
        }
        if categories.is_empty() {
            message::warning("No categories available");
            return Ok(());
        }
        for category in categories {
            println!("{category}");
        }
        Ok(())
    }
}

fn price(value: Option<f64>) -> String {
    cell(value.map(|price| format!("${price:.2}")))
}

fn render_products(page: &ResultPage<Product>) -> String {
    let mut table = Table::new(vec!["ID", "TITLE", "CATEGORY", "PRICE", "STOCK"]);
    for product in &page.records {
        table.push_row(vec![
            product.id.to_string(),
            cell(product.title.as_deref()),
            cell(product.category.as_deref()),
            price(product.price),
            cell(product.stock),
        ]);
    }
    table.to_string()
}

fn render_product(product: &Product) -> String {
    formatdoc! {"
        {title} (#{id})
        category:   {category}
        brand:      {brand}
        price:      {price}
        discount:   {discount}
        rating:     {rating}
        stock:      {stock}

        {description}
    ",
        title = cell(product.title.as_deref()),
        id = product.id,
        category = cell(product.category.as_deref()),
        brand = cell(product.brand.as_deref()),
        price = price(product.price),
        discount = cell(product.discount_percentage.map(|d| format!("{d}%"))),
        rating = cell(product.rating),
        stock = cell(product.stock),
        description = product.description.as_deref().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::commands::tests::test_admin;

    fn signed_in_admin(server: &MockServer, dir: &std::path::Path) -> Admin {
        let admin = test_admin(&server.base_url(), dir);
        admin.session.set(hsa_api::Session {
            token: Some("jwt".to_string()),
            user: None,
        });
        admin
    }

    fn list(search: Option<&str>, category: &str) -> ProductsList {
        ProductsList {
            search: search.map(str::to_string),
            category: category.to_string(),
            options: ListOptions {
                page: 1,
                json: true,
            },
        }
    }

    #[test]
    fn products_table() {
        let page = ResultPage::new(
            vec![
                Product {
                    id: 1,
                    title: Some("Essence Mascara Lash Princess".to_string()),
                    category: Some("beauty".to_string()),
                    price: Some(9.99),
                    stock: Some(99),
                    ..Default::default()
                },
                Product {
                    id: 2,
                    ..Default::default()
                },
            ],
            194,
        );
        assert_eq!(render_products(&page), indoc! {"
            ID  TITLE                          CATEGORY  PRICE  STOCK
            1   Essence Mascara Lash Princess  beauty    $9.99  99
            2   -                              -         -      -
        "});
    }

    #[tokio::test]
    async fn category_filter_is_a_path_segment() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/products/category/mens-shirts")
                .query_param("limit", "10")
                .query_param("skip", "0");
            then.status(200)
                .json_body(json!({ "products": [{ "id": 81 }], "total": 5 }));
        });

        let dir = tempfile::tempdir().unwrap();
        let admin = signed_in_admin(&server, dir.path());
        list(None, "mens-shirts").handle(&admin).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn search_wins_over_category() {
        let server = MockServer::start_async().await;
        let search = server.mock(|when, then| {
            when.path("/products/search").query_param("q", "shirt");
            then.status(200).json_body(json!({ "products": [] }));
        });
        let category = server.mock(|when, then| {
            when.path("/products/category/mens-shirts");
            then.status(200).json_body(json!({ "products": [] }));
        });

        let dir = tempfile::tempdir().unwrap();
        let admin = signed_in_admin(&server, dir.path());
        list(Some("shirt"), "mens-shirts")
            .handle(&admin)
            .await
            .unwrap();
        search.assert();
        category.assert_hits(0);
    }

    #[tokio::test]
    async fn failed_list_is_an_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/products");
            then.status(500);
        });

        let dir = tempfile::tempdir().unwrap();
        let admin = signed_in_admin(&server, dir.path());
        assert!(list(None, ALL_CATEGORIES).handle(&admin).await.is_err());
        // only 401 ends the session
        assert!(admin.session.is_signed_in());
    }

    #[tokio::test]
    async fn categories_tolerate_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/products/categories");
            then.status(502);
        });

        let dir = tempfile::tempdir().unwrap();
        let admin = signed_in_admin(&server, dir.path());
        Categories { json: false }.handle(&admin).await.unwrap();
    }
}
