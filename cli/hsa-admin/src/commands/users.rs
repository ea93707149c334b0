use anyhow::{Result, bail};
use bpaf::Bpaf;
use hsa_api::types::{RecordId, User};
use hsa_sdk::models::page::ResultPage;
use hsa_sdk::models::resolver::ResolverStatus;
use hsa_sdk::models::users::UsersResolver;
use indoc::formatdoc;
use tracing::{debug, instrument};

use super::{Admin, ListOptions, list_options};
use crate::utils::dialog::{Dialog, Spinner};
use crate::utils::message;
use crate::utils::table::{Table, cell};

#[derive(Clone, Debug, Bpaf)]
pub struct UsersList {
    /// Only show users matching this term
    ///
    /// Names that match no user as a whole are searched word by word.
    #[bpaf(long, short, argument("term"))]
    search: Option<String>,

    #[bpaf(external(list_options))]
    options: ListOptions,
}

#[derive(Clone, Debug, Bpaf)]
pub struct UserShow {
    /// Print the user as JSON
    #[bpaf(long)]
    json: bool,

    /// Id of the user
    #[bpaf(positional("id"))]
    id: RecordId,
}

#[derive(Clone, Debug, Bpaf)]
pub enum Users {
    /// List users a page at a time
    #[bpaf(command)]
    List(#[bpaf(external(users_list))] UsersList),

    /// Show a single user
    #[bpaf(command)]
    Show(#[bpaf(external(user_show))] UserShow),
}

impl Users {
    #[instrument(name = "users", skip_all)]
    pub async fn handle(self, admin: Admin) -> Result<()> {
        admin.ensure_signed_in()?;
        match self {
            Users::List(args) => args.handle(&admin).await,
            Users::Show(args) => args.handle(&admin).await,
        }
    }
}

impl UsersList {
    async fn handle(self, admin: &Admin) -> Result<()> {
        let mut resolver = UsersResolver::new();
        resolver.subscribe(|event| debug!(?event, "users"));
        resolver.subscribe(
            Dialog {
                message: "Loading users...",
                help_message: None,
                typed: Spinner::default(),
            }
            .follow(),
        );
        resolver.set_page_size(admin.config.page_size());
        resolver.set_search(self.search.as_deref().unwrap_or_default());
        resolver.set_page(self.options.page_index());

        resolver.fetch(&admin.directory).await;
        if resolver.status() == ResolverStatus::Failed {
            bail!("Could not load users");
        }

        if self.options.json {
            println!("{}", serde_json::to_string_pretty(resolver.page())?);
            return Ok(());
        }

        let query = resolver.query();
        let page = resolver.page();
        if page.is_empty() {
            message::plain("No users found");
            return Ok(());
        }
        print!("{}", render_users(page));
        message::plain(format!(
            "Page {} of {} ({} users)",
            query.page + 1,
            page.page_count(query.page_size),
            page.total
        ));
        Ok(())
    }
}

impl UserShow {
    async fn handle(self, admin: &Admin) -> Result<()> {
        let resolver = UsersResolver::new();
        let Some(user) = resolver.fetch_by_id(&admin.directory, self.id).await else {
            bail!("User {} not found", self.id);
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&user)?);
        } else {
            print!("{}", render_user(&user));
        }
        Ok(())
    }
}

fn render_users(page: &ResultPage<User>) -> String {
    let mut table = Table::new(vec!["ID", "NAME", "USERNAME", "EMAIL", "ROLE"]);
    for user in &page.records {
        table.push_row(vec![
            user.id.to_string(),
            user.full_name(),
            cell(user.username.as_deref()),
            cell(user.email.as_deref()),
            cell(user.role.as_deref()),
        ]);
    }
    table.to_string()
}

fn render_user(user: &User) -> String {
    let company = user.company.as_ref();
    formatdoc! {"
        {initials}  {name} (#{id})
        username:   {username}
        email:      {email}
        phone:      {phone}
        gender:     {gender}
        role:       {role}
        company:    {company}
        title:      {title}
    ",
        initials = user.initials(),
        name = user.full_name(),
        id = user.id,
        username = cell(user.username.as_deref()),
        email = cell(user.email.as_deref()),
        phone = cell(user.phone.as_deref()),
        gender = cell(user.gender.as_deref()),
        role = cell(user.role.as_deref()),
        company = cell(company.and_then(|c| c.name.as_deref())),
        title = cell(company.and_then(|c| c.title.as_deref())),
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

    fn emily() -> User {
        serde_json::from_value(json!({
            "id": 1,
            "firstName": "Emily",
            "lastName": "Johnson",
            "username": "emilys",
            "email": "emily.johnson@x.dummyjson.com",
            "role": "admin",
            "company": { "name": "Dooley", "title": "Sales Manager" },
        }))
        .unwrap()
    }

    #[test]
    fn users_table() {
        let page = ResultPage::new(vec![emily(), User {
            id: 2,
            first_name: Some("Michael".to_string()),
            ..Default::default()
        }], 2);
        assert_eq!(render_users(&page), indoc! {"
            ID  NAME           USERNAME  EMAIL                          ROLE
            1   Emily Johnson  emilys    emily.johnson@x.dummyjson.com  admin
            2   Michael        -         -                              -
        "});
    }

    #[test]
    fn user_details() {
        let rendered = render_user(&emily());
        assert!(rendered.starts_with("EJ  Emily Johnson (#1)\n"));
        assert!(rendered.contains("company:    Dooley\n"));
        assert!(rendered.contains("phone:      -\n"));
    }

    #[tokio::test]
    async fn list_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let admin = test_admin("http://localhost:1", dir.path());
        let list = Users::List(UsersList {
            search: None,
            options: ListOptions {
                page: 1,
                json: false,
            },
        });
        assert!(list.handle(admin).await.is_err());
    }

    #[tokio::test]
    async fn list_searches_with_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/users/search")
                .query_param("q", "emily")
                .query_param("limit", "10")
                .query_param("skip", "10")
                .header("authorization", "Bearer jwt");
            then.status(200)
                .json_body(json!({ "users": [{ "id": 1 }], "total": 11 }));
        });

        let dir = tempfile::tempdir().unwrap();
        let admin = signed_in_admin(&server, dir.path());
        let list = UsersList {
            search: Some(" emily ".to_string()),
            options: ListOptions {
                page: 2,
                json: true,
            },
        };
        list.handle(&admin).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn expired_token_signs_out() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/users");
            then.status(401);
        });

        let dir = tempfile::tempdir().unwrap();
        let admin = signed_in_admin(&server, dir.path());
        let list = UsersList {
            search: None,
            options: ListOptions {
                page: 1,
                json: false,
            },
        };
        assert!(list.handle(&admin).await.is_err());
        assert!(!admin.session.is_signed_in());
    }

    #[tokio::test]
    async fn show_missing_user_fails() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/users/999");
            then.status(404)
                .json_body(json!({ "message": "User with id '999' not found" }));
        });

        let dir = tempfile::tempdir().unwrap();
        let admin = signed_in_admin(&server, dir.path());
        let show = UserShow {
            json: false,
            id: 999,
        };
        let err = show.handle(&admin).await.unwrap_err();
        assert_eq!(err.to_string(), "User 999 not found");
    }
}
