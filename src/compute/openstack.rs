//! OpenStack compute client (Keystone identity + Nova).
//!
//! Only the handful of calls the bot needs: token issue, server detail
//! listing, start/stop/reboot actions and delete.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::provider::{ComputeClient, ComputeError, Result, Server};
use crate::config::{AuthVersion, Settings};

const DEFAULT_DOMAIN: &str = "Default";
const TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Connection parameters for an OpenStack cloud.
#[derive(Clone, Debug)]
pub struct OpenStackConfig {
    pub auth_url: String,
    pub auth_version: AuthVersion,
    pub username: String,
    pub password: String,
    pub domain_name: Option<String>,
    pub project: Option<String>,
    pub region: Option<String>,
}

impl OpenStackConfig {
    pub fn from_settings(settings: &Settings) -> crate::error::Result<Self> {
        Ok(Self {
            auth_url: settings.require_auth_url()?.to_string(),
            auth_version: settings.auth_version,
            username: settings.username.clone(),
            password: settings.password.clone(),
            domain_name: settings.domain_name.clone(),
            project: settings.project.clone(),
            region: settings.region.clone(),
        })
    }

    fn domain(&self) -> &str {
        self.domain_name.as_deref().unwrap_or(DEFAULT_DOMAIN)
    }
}

#[derive(Clone, Debug)]
struct Session {
    token: String,
    compute_url: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => at - Duration::seconds(30) > Utc::now(),
            None => true,
        }
    }
}

pub struct OpenStackClient {
    client: Client,
    config: OpenStackConfig,
    session: Mutex<Option<Session>>,
}

#[derive(Deserialize)]
struct ServersResponse {
    servers: Vec<Server>,
}

// Keystone v3 token body.
#[derive(Deserialize)]
struct V3TokenResponse {
    token: V3Token,
}

#[derive(Deserialize)]
struct V3Token {
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    catalog: Vec<V3Service>,
}

#[derive(Deserialize)]
struct V3Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<V3Endpoint>,
}

#[derive(Deserialize)]
struct V3Endpoint {
    interface: String,
    region: Option<String>,
    region_id: Option<String>,
    url: String,
}

// Keystone v2.0 access body.
#[derive(Deserialize)]
struct V2AccessResponse {
    access: V2Access,
}

#[derive(Deserialize)]
struct V2Access {
    token: V2Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<V2Service>,
}

#[derive(Deserialize)]
struct V2Token {
    id: String,
    expires: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct V2Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<V2Endpoint>,
}

#[derive(Deserialize)]
struct V2Endpoint {
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

impl OpenStackClient {
    pub fn new(config: OpenStackConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            session: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> crate::error::Result<Self> {
        Ok(Self::new(OpenStackConfig::from_settings(settings)?))
    }

    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref().filter(|s| s.is_fresh()) {
            return Ok(session.clone());
        }

        let session = match self.config.auth_version {
            AuthVersion::V3 => self.authenticate_v3().await?,
            AuthVersion::V2 => self.authenticate_v2().await?,
        };
        tracing::debug!(compute_url = %session.compute_url, "Authenticated with identity service");
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn invalidate(&self) {
        *self.session.lock().await = None;
    }

    async fn authenticate_v3(&self) -> Result<Session> {
        let cfg = &self.config;
        let mut body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": cfg.username,
                            "domain": { "name": cfg.domain() },
                            "password": cfg.password,
                        }
                    }
                }
            }
        });
        if let Some(project) = &cfg.project {
            body["auth"]["scope"] = json!({
                "project": { "name": project, "domain": { "name": cfg.domain() } }
            });
        }

        let url = format!("{}/v3/auth/tokens", cfg.auth_url.trim_end_matches('/'));
        let resp = self.client.post(url).json(&body).send().await?;
        let resp = check_auth(resp).await?;

        let token = resp
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ComputeError::Auth(format!("response carried no {}", TOKEN_HEADER)))?;

        let parsed: V3TokenResponse = resp
            .json()
            .await
            .map_err(|e| ComputeError::Parse(e.to_string()))?;

        let region = cfg.region.as_deref();
        let compute_url = parsed
            .token
            .catalog
            .iter()
            .filter(|s| s.kind == "compute")
            .flat_map(|s| s.endpoints.iter())
            .find(|e| {
                e.interface == "public"
                    && region.map_or(true, |r| {
                        e.region.as_deref() == Some(r) || e.region_id.as_deref() == Some(r)
                    })
            })
            .map(|e| e.url.trim_end_matches('/').to_string())
            .ok_or_else(|| ComputeError::Catalog(region.unwrap_or("any region").to_string()))?;

        Ok(Session {
            token,
            compute_url,
            expires_at: parsed.token.expires_at,
        })
    }

    async fn authenticate_v2(&self) -> Result<Session> {
        let cfg = &self.config;
        let mut body = json!({
            "auth": {
                "passwordCredentials": {
                    "username": cfg.username,
                    "password": cfg.password,
                }
            }
        });
        if let Some(project) = &cfg.project {
            body["auth"]["tenantName"] = Value::String(project.clone());
        }

        let url = format!("{}/v2.0/tokens", cfg.auth_url.trim_end_matches('/'));
        let resp = self.client.post(url).json(&body).send().await?;
        let resp = check_auth(resp).await?;
        let parsed: V2AccessResponse = resp
            .json()
            .await
            .map_err(|e| ComputeError::Parse(e.to_string()))?;

        let region = cfg.region.as_deref();
        let compute_url = parsed
            .access
            .service_catalog
            .iter()
            .filter(|s| s.kind == "compute")
            .flat_map(|s| s.endpoints.iter())
            .find(|e| region.map_or(true, |r| e.region.as_deref() == Some(r)))
            .map(|e| e.public_url.trim_end_matches('/').to_string())
            .ok_or_else(|| ComputeError::Catalog(region.unwrap_or("any region").to_string()))?;

        Ok(Session {
            token: parsed.access.token.id,
            compute_url,
            expires_at: parsed.access.token.expires,
        })
    }

    /// Send an authenticated compute request built from the session URL.
    async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: FnOnce(&Client, &str) -> RequestBuilder,
    {
        let session = self.session().await?;
        let resp = build(&self.client, &session.compute_url)
            .header(AUTH_TOKEN_HEADER, &session.token)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            // Token revoked early; the next call authenticates again.
            self.invalidate().await;
        }
        check_status(resp).await
    }

    async fn server_action(&self, server: &Server, action: Value) -> Result<()> {
        let id = server.id.clone();
        self.send(move |client, base| {
            client
                .post(format!("{}/servers/{}/action", base, id))
                .json(&action)
        })
        .await?;
        Ok(())
    }
}

async fn check_auth(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ComputeError::Auth(format!("{}: {}", status.as_u16(), body)))
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ComputeError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ComputeClient for OpenStackClient {
    fn name(&self) -> &str {
        "openstack"
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        let resp = self
            .send(|client, base| client.get(format!("{}/servers/detail", base)))
            .await?;
        let parsed: ServersResponse = resp
            .json()
            .await
            .map_err(|e| ComputeError::Parse(e.to_string()))?;
        Ok(parsed.servers)
    }

    async fn start_server(&self, server: &Server) -> Result<()> {
        self.server_action(server, json!({ "os-start": null })).await
    }

    async fn stop_server(&self, server: &Server) -> Result<()> {
        self.server_action(server, json!({ "os-stop": null })).await
    }

    async fn reboot_server(&self, server: &Server) -> Result<()> {
        self.server_action(server, json!({ "reboot": { "type": "SOFT" } }))
            .await
    }

    async fn destroy_server(&self, server: &Server) -> Result<()> {
        let id = server.id.clone();
        self.send(move |client, base| client.delete(format!("{}/servers/{}", base, id)))
            .await?;
        Ok(())
    }
}
