use anyhow::Result;
use bpaf::Bpaf;
use hsa_sdk::models::dashboard::DashboardSummary;
use indoc::formatdoc;
use tracing::instrument;

use super::Admin;
use crate::utils::message;

#[derive(Clone, Debug, Bpaf)]
pub struct Dashboard {
    /// Print the summary as JSON
    #[bpaf(long)]
    json: bool,
}

impl Dashboard {
    #[instrument(name = "dashboard", skip_all)]
    pub async fn handle(self, admin: Admin) -> Result<()> {
        admin.ensure_signed_in()?;

        let summary = DashboardSummary::load(&admin.directory).await;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print!("{}", render_summary(&summary));
        }

        if summary.incomplete {
            message::warning("Some totals could not be loaded and are shown as 0");
        }
        Ok(())
    }
}

fn render_summary(summary: &DashboardSummary) -> String {
    formatdoc! {"
        users:     {users}
        products:  {products}
    ",
        users = summary.users_total,
        products = summary.products_total,
    }
}
