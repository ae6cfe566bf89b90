//! レジストリ認証
//!
//! Docker の config.json から push / pull 用の認証情報を解決します。
//! `auths` の静的な認証情報を優先し、なければ credential helper に問い合わせます。

use crate::error::{BuildError, Result};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Docker Hub のレジストリ名
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// config.json 上で Docker Hub を指すキー
const DOCKER_HUB_AUTH_KEY: &str = "https://index.docker.io/v1/";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// 全レジストリ共通の helper（例: "osxkeychain"）
    #[serde(default)]
    creds_store: Option<String>,
    /// レジストリごとの helper
    #[serde(default)]
    cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64 の "username:password"
    auth: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

#[derive(Debug, Clone)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`、なければ `~/.docker/config.json`
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self { config_path }
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// イメージ参照に対応する認証情報
    ///
    /// config.json がない、または該当する認証情報がない場合は `Ok(None)` です。
    pub fn credentials_for(&self, reference: &str) -> Result<Option<DockerCredentials>> {
        let registry = registry_of(reference);

        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }
        let config = self.load_docker_config()?;

        for key in auth_keys(&registry) {
            if let Some(auth_b64) = config.auths.get(key).and_then(|e| e.auth.as_deref()) {
                if let Some(creds) = decode_auth(auth_b64, &registry)? {
                    tracing::debug!(registry = %registry, "Found credentials in auths");
                    return Ok(Some(creds));
                }
            }
        }

        let helper = config
            .cred_helpers
            .get(&registry)
            .or(config.creds_store.as_ref());
        if let Some(helper) = helper {
            tracing::debug!(registry = %registry, helper = %helper, "Trying credential helper");
            match query_helper(helper, &registry) {
                Ok(Some(creds)) => return Ok(Some(creds)),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "Credential helper failed"),
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_docker_config(&self) -> Result<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to parse config.json: {}", e),
        })
    }
}

/// イメージ参照からレジストリを取り出す
///
/// 最初の `/` より前が `.` か `:` を含むか `localhost` ならレジストリ、それ以外は Docker Hub。
pub fn registry_of(reference: &str) -> String {
    match reference.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            first.to_string()
        }
        _ => DEFAULT_REGISTRY.to_string(),
    }
}

fn auth_keys(registry: &str) -> Vec<&str> {
    if registry == DEFAULT_REGISTRY {
        vec![DEFAULT_REGISTRY, DOCKER_HUB_AUTH_KEY]
    } else {
        vec![registry]
    }
}

fn decode_auth(auth_b64: &str, registry: &str) -> Result<Option<DockerCredentials>> {
    let auth_failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth_b64)
        .map_err(|e| auth_failed(format!("Failed to decode auth: {}", e)))?;
    let auth_str =
        String::from_utf8(decoded).map_err(|e| auth_failed(format!("Invalid UTF-8 in auth: {}", e)))?;

    Ok(auth_str
        .split_once(':')
        .map(|(username, password)| DockerCredentials {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            serveraddress: Some(registry.to_string()),
            ..Default::default()
        }))
}

fn query_helper(helper: &str, registry: &str) -> Result<Option<DockerCredentials>> {
    let helper_cmd = format!("docker-credential-{}", helper);
    let auth_failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let mut child = Command::new(&helper_cmd)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| auth_failed(format!("Failed to run {}: {}", helper_cmd, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes())?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| auth_failed(format!("Credential helper failed: {}", e)))?;

    if !output.status.success() {
        return Ok(None);
    }

    let response: CredentialResponse = serde_json::from_slice(&output.stdout)
        .map_err(|e| auth_failed(format!("Failed to parse credential helper response: {}", e)))?;

    Ok(Some(DockerCredentials {
        username: Some(response.username),
        password: Some(response.secret),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    }))
}
