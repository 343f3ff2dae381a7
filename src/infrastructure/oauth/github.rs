use crate::domain::auth::{AuthError, OAuthProvider, ProviderIdentity};
use serde::Deserialize;

const PROVIDER_NAME: &str = "github";
const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_API_URL: &str = "https://api.github.com/user";
const GITHUB_USER_EMAIL_API_URL: &str = "https://api.github.com/user/emails";
const USER_AGENT: &str = "timber-auth";

/// GitHub answers a failed code exchange with 200 and an `error` body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenExchangeResponse {
    Granted {
        access_token: String,
    },
    Denied {
        error: String,
        error_description: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

pub struct GitHubOAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http_client: reqwest::Client,
}

impl GitHubOAuthClient {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            http_client: reqwest::Client::new(),
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(GITHUB_TOKEN_URL)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("github token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "github token exchange returned {}",
                response.status()
            )));
        }

        match response
            .json::<TokenExchangeResponse>()
            .await
            .map_err(|e| AuthError::Provider(format!("failed to parse github token: {}", e)))?
        {
            TokenExchangeResponse::Granted { access_token } => Ok(access_token),
            TokenExchangeResponse::Denied {
                error,
                error_description,
            } => Err(AuthError::Provider(format!(
                "github rejected the code: {} {}",
                error,
                error_description.unwrap_or_default()
            ))),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AuthError> {
        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("github request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "github request to {} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("failed to parse github response: {}", e)))
    }

    async fn primary_email(&self, access_token: &str) -> Option<String> {
        // Missing email scope is not fatal for sign-in.
        let emails: Vec<GitHubEmail> = match self.get_json(GITHUB_USER_EMAIL_API_URL, access_token).await {
            Ok(emails) => emails,
            Err(err) => {
                tracing::debug!(error = %err, "could not read github emails");
                return None;
            }
        };

        emails
            .iter()
            .find(|e| e.primary && e.verified)
            .or_else(|| emails.iter().find(|e| e.verified))
            .map(|e| e.email.clone())
    }
}

#[async_trait::async_trait]
impl OAuthProvider for GitHubOAuthClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}",
            GITHUB_AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode("read:user user:email"),
            urlencoding::encode(state)
        )
    }

    async fn exchange(&self, assertion: &str) -> Result<ProviderIdentity, AuthError> {
        let access_token = self.exchange_code(assertion).await?;
        let user: GitHubUser = self.get_json(GITHUB_USER_API_URL, &access_token).await?;

        let email = match user.email {
            Some(email) => Some(email),
            None => self.primary_email(&access_token).await,
        };

        tracing::debug!(github_id = user.id, login = %user.login, "github user fetched");

        Ok(ProviderIdentity {
            provider: PROVIDER_NAME.to_string(),
            subject: user.id.to_string(),
            email,
        })
    }
}
