use crate::engine::manifest::{map_file_manifest, map_torrent_status};
use async_trait::async_trait;
use domain::{DomainError, EngineStatus, FileEntry, InfoHash, TorrentEngine};
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Body qBittorrent answers with when it refuses a login or an add.
const FAILS_BODY: &str = "Fails.";

#[derive(Debug, Clone)]
pub struct QbittorrentSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Save path as seen by the daemon.
    pub save_path: String,
    pub login_timeout: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Default)]
struct AuthState {
    logged_in: bool,
    cookie: Option<String>,
}

/// qBittorrent Web API (v2) client.
///
/// Holds the `SID` cookie from the last login. A request answered with
/// 401/403, or one that fails in transport, triggers exactly one re-login
/// and resend before the call fails with `EngineUnavailable`.
pub struct QbittorrentClient {
    http: Client,
    settings: QbittorrentSettings,
    auth: RwLock<AuthState>,
}

impl QbittorrentClient {
    pub fn new(settings: QbittorrentSettings) -> Result<Self, DomainError> {
        let http = Client::builder()
            .build()
            .map_err(|e| DomainError::EngineUnavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            settings,
            auth: RwLock::new(AuthState::default()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    pub async fn login(&self) -> Result<(), DomainError> {
        let response = self
            .http
            .post(self.endpoint("/api/v2/auth/login"))
            .header(REFERER, self.settings.base_url.as_str())
            .form(&[
                ("username", self.settings.username.as_str()),
                ("password", self.settings.password.as_str()),
            ])
            .timeout(self.settings.login_timeout)
            .send()
            .await
            .map_err(|e| DomainError::EngineUnavailable(format!("login request failed: {}", e)))?;

        let status = response.status();
        let cookie = session_cookie(&response);
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() || body.trim() == FAILS_BODY {
            let mut auth = self.auth.write().await;
            *auth = AuthState::default();
            warn!("🔒 qBittorrent login rejected ({}): {}", status, body.trim());
            return Err(DomainError::EngineUnavailable(format!(
                "login rejected with status {}",
                status
            )));
        }

        let mut auth = self.auth.write().await;
        auth.logged_in = true;
        auth.cookie = cookie;
        info!("🔑 Logged in to qBittorrent at {}", self.settings.base_url);
        Ok(())
    }

    /// Sends the request built by `build`. The first attempt logs in when
    /// there is no session yet; a failed login, an auth rejection or a
    /// transport error is followed by exactly one re-login and resend.
    async fn send<F>(&self, build: F) -> Result<Response, DomainError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        match self.attempt(&build).await {
            Ok(response) => return Ok(response),
            Err(reason) => debug!("qBittorrent attempt failed ({}), logging in again", reason),
        }

        self.login().await?;
        let response = self
            .dispatch(&build)
            .await
            .map_err(|e| DomainError::EngineUnavailable(e.to_string()))?;
        if is_auth_failure(response.status()) {
            return Err(DomainError::EngineUnavailable(format!(
                "request rejected after re-login with status {}",
                response.status()
            )));
        }
        Ok(response)
    }

    async fn attempt<F>(&self, build: &F) -> Result<Response, String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        if !self.auth.read().await.logged_in {
            self.login().await.map_err(|e| e.to_string())?;
        }

        match self.dispatch(build).await {
            Ok(response) if is_auth_failure(response.status()) => {
                Err(format!("session rejected with status {}", response.status()))
            }
            Ok(response) => Ok(response),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn dispatch<F>(&self, build: &F) -> Result<Response, reqwest::Error>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut request = build(&self.http)
            .header(REFERER, self.settings.base_url.as_str())
            .timeout(self.settings.request_timeout);
        if let Some(cookie) = self.auth.read().await.cookie.clone() {
            request = request.header(COOKIE, cookie);
        }
        request.send().await
    }

    async fn read_json(response: Response) -> Result<Value, DomainError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| DomainError::EngineRejected(format!("unreadable engine response: {}", e)))
    }
}

#[async_trait]
impl TorrentEngine for QbittorrentClient {
    async fn connect(&self) -> Result<(), DomainError> {
        self.login().await
    }

    async fn submit_magnet(&self, magnet: &str) -> Result<(), DomainError> {
        let url = self.endpoint("/api/v2/torrents/add");
        let response = self
            .send(|http| {
                http.post(&url).form(&[
                    ("urls", magnet),
                    ("savepath", self.settings.save_path.as_str()),
                    ("sequentialDownload", "true"),
                    ("firstLastPiecePrio", "true"),
                ])
            })
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() || body.trim() == FAILS_BODY {
            return Err(DomainError::EngineRejected(format!(
                "add failed with status {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(())
    }

    async fn torrent_status(&self, info_hash: &InfoHash) -> Result<EngineStatus, DomainError> {
        let url = self.endpoint("/api/v2/torrents/info");
        let response = self
            .send(|http| http.get(&url).query(&[("hashes", info_hash.as_str())]))
            .await?;

        if !response.status().is_success() {
            return Err(DomainError::EngineRejected(format!(
                "torrent info failed with status {}",
                response.status()
            )));
        }

        let payload = Self::read_json(response).await?;
        map_torrent_status(&payload)
            .ok_or_else(|| DomainError::NotFound(format!("torrent {} unknown to engine", info_hash)))
    }

    async fn torrent_files(&self, info_hash: &InfoHash) -> Result<Vec<FileEntry>, DomainError> {
        let url = self.endpoint("/api/v2/torrents/files");
        let response = self
            .send(|http| http.get(&url).query(&[("hash", info_hash.as_str())]))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DomainError::NotFound(format!(
                "torrent {} unknown to engine",
                info_hash
            ))),
            status if !status.is_success() => Err(DomainError::EngineRejected(format!(
                "file listing failed with status {}",
                status
            ))),
            _ => Ok(map_file_manifest(&Self::read_json(response).await?)),
        }
    }

    async fn remove_torrent(&self, info_hash: &InfoHash, delete_files: bool) -> Result<(), DomainError> {
        let url = self.endpoint("/api/v2/torrents/delete");
        let delete_files = if delete_files { "true" } else { "false" };
        let response = self
            .send(|http| {
                http.post(&url).form(&[
                    ("hashes", info_hash.as_str()),
                    ("deleteFiles", delete_files),
                ])
            })
            .await?;

        if !response.status().is_success() {
            return Err(DomainError::EngineRejected(format!(
                "delete failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .find(|pair| pair.starts_with("SID="))
        .map(str::to_string)
}
