//! Account user listing

use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::auth::Credential;
use crate::config::ClientOptions;
use crate::error::Result;
use crate::fetch::Fetch;

/// An account user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl User {
    /// "First Last - email" when both names are known, otherwise the email
    pub fn display_name(&self) -> String {
        if !self.first_name.is_empty() && !self.last_name.is_empty() {
            format!("{} {} - {}", self.first_name, self.last_name, self.email)
        } else {
            self.email.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserPage {
    #[serde(default)]
    page_count: u32,
    #[serde(default)]
    users: Vec<User>,
}

/// Paginates the account's user list
pub struct UserEnumerator {
    base_url: String,
    http_client: Client,
    page_size: u32,
    request_timeout: Option<Duration>,
}

impl UserEnumerator {
    pub fn new(http_client: Client, options: &ClientOptions) -> Self {
        Self {
            base_url: options.api_base_url.clone(),
            http_client,
            page_size: options.page_size,
            request_timeout: options.request_timeout,
        }
    }

    /// List every user of the account.
    ///
    /// The first request only reads `page_count`; pages `1..=page_count` are
    /// then fetched in order. Any failed page aborts the listing.
    pub async fn list_users(&self, credential: &Credential) -> Result<Vec<User>> {
        let first = self.fetch_page(credential, None).await?;
        debug!("User listing reports {} page(s)", first.page_count);

        let mut users = Vec::new();
        for page_number in 1..=first.page_count {
            let page = self.fetch_page(credential, Some(page_number)).await?;
            users.extend(page.users);
        }

        info!("Found {} user(s)", users.len());
        Ok(users)
    }

    async fn fetch_page(&self, credential: &Credential, page_number: Option<u32>) -> Result<UserPage> {
        let url = format!("{}/users", self.base_url);

        let mut request = Fetch::get(&self.http_client, &url)
            .bearer_auth(&credential.access_token)
            .query("page_size", self.page_size)
            .timeout(self.request_timeout);
        if let Some(page_number) = page_number {
            request = request.query("page_number", page_number);
        }

        request.execute::<UserPage>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn enumerator(server: &MockServer) -> UserEnumerator {
        let options = ClientOptions::default().with_api_base_url(&format!("{}/v2", server.uri()));
        UserEnumerator::new(Client::new(), &options)
    }

    fn user(n: u32) -> serde_json::Value {
        json!({
            "id": format!("u{}", n),
            "email": format!("user{}@example.com", n),
            "first_name": "User",
            "last_name": format!("{}", n),
            "type": 2
        })
    }

    #[tokio::test]
    async fn test_pages_are_flattened_in_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/users"))
            .and(query_param("page_number", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page_count": 2, "page_number": 2, "users": [user(3)]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/users"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page_count": 2, "page_number": 1, "users": [user(1), user(2)]
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let users = enumerator(&mock_server)
            .list_users(&Credential::new("tok".into(), 60))
            .await
            .unwrap();

        let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
        assert_eq!(users[0].display_name(), "User 1 - user1@example.com");
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/users"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "code": 124, "message": "Invalid access token."
            })))
            .mount(&mock_server)
            .await;

        let err = enumerator(&mock_server)
            .list_users(&Credential::new("bad".into(), 60))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_failed_page_is_not_dropped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/users"))
            .and(query_param("page_number", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page_count": 2, "users": [user(1)]
            })))
            .mount(&mock_server)
            .await;

        let err = enumerator(&mock_server)
            .list_users(&Credential::new("tok".into(), 60))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status: 500, .. }));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User {
            email: "solo@example.com".into(),
            id: "x".into(),
            first_name: "Solo".into(),
            last_name: String::new(),
        };
        assert_eq!(user.display_name(), "solo@example.com");
    }
}
