use std::fmt;

use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
    basic::BasicClient,
};
use serde::{Deserialize, Serialize};

use crate::{AppResult, config::{Config, OAuthKeys}, session::SessionUser};

use super::{Authorization, IdentityProvider};

type ProviderClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    pub fn id(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    fn path(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google",
            Github => "github",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        use ClientProvider::*;
        match self {
            Google => (
                "https://accounts.google.com/o/oauth2/auth",
                "https://oauth2.googleapis.com/token",
            ),
            Github => (
                "https://github.com/login/oauth/authorize",
                "https://github.com/login/oauth/access_token",
            ),
        }
    }

    fn scopes(&self) -> &'static [&'static str] {
        use ClientProvider::*;
        match self {
            Google => &["openid", "email", "profile"],
            Github => &["read:user"],
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FirebaseRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirebaseUser {
    local_id: String,
    #[serde(default)]
    photo_url: Option<String>,
}

/// OAuth clients for each configured provider plus the Firebase
/// Identity Toolkit endpoint that turns their tokens into users.
#[derive(Clone)]
pub struct Clients {
    firebase_idpurl: String,
    request_uri: String,
    http_client: reqwest::Client,
    google_client: Option<ProviderClient>,
    github_client: Option<ProviderClient>,
}

impl Clients {
    pub fn from_config(config: &Config) -> AppResult<Clients> {
        let firebase_idpurl = format!(
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp?key={}",
            config.backend.api_key
        );
        let request_uri = format!("https://{}/", config.backend.auth_domain);

        let build = |provider: ClientProvider, keys: &Option<OAuthKeys>| -> AppResult<Option<ProviderClient>> {
            let Some(keys) = keys else {
                return Ok(None);
            };
            let (auth_url, token_url) = provider.endpoints();

            Ok(Some(
                BasicClient::new(ClientId::new(keys.client_id.clone()))
                    .set_client_secret(ClientSecret::new(keys.client_secret.clone()))
                    .set_auth_uri(AuthUrl::new(auth_url.to_owned())?)
                    .set_token_uri(TokenUrl::new(token_url.to_owned())?)
                    .set_redirect_uri(RedirectUrl::new(format!(
                        "{}/lockin/{}",
                        config.public_url,
                        provider.path()
                    ))?),
            ))
        };

        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Clients {
            firebase_idpurl,
            request_uri,
            http_client,
            google_client: build(ClientProvider::Google, &config.google)?,
            github_client: build(ClientProvider::Github, &config.github)?,
        })
    }

    fn get_client(&self, provider: ClientProvider) -> AppResult<&ProviderClient> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.as_ref(),
            Github => self.github_client.as_ref(),
        }
        .ok_or_else(|| anyhow::anyhow!("OAuth provider {provider} keys not supplied").into())
    }
}

#[async_trait]
impl IdentityProvider for Clients {
    fn authorize(&self, provider: ClientProvider) -> AppResult<Authorization> {
        let client = self.get_client(provider)?;
        let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (authorize_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(provider.scopes().iter().map(|scope| Scope::new(scope.to_string())))
            .set_pkce_challenge(pkce_code_challenge)
            .url();

        Ok(Authorization {
            url: authorize_url.to_string(),
            csrf_state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    async fn exchange(
        &self,
        provider: ClientProvider,
        code: String,
        pkce_verifier: String,
    ) -> AppResult<SessionUser> {
        let client = self.get_client(provider)?;
        let token_result = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http_client)
            .await?;

        let access_token = token_result.access_token().secret();
        let user: FirebaseUser = self
            .http_client
            .post(&self.firebase_idpurl)
            .json(&FirebaseRequest {
                post_body: format!("access_token={access_token}&providerId={}", provider.id()),
                request_uri: self.request_uri.clone(),
                return_idp_credential: true,
                return_secure_token: true,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(SessionUser::new(user.local_id, user.photo_url))
    }
}
