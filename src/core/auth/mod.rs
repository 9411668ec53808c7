//! Identity collaborator seam. Account sign-in is handled elsewhere; the
//! launch pipeline only asks an [`IdentityProvider`] for a ready profile.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    Offline,
    Microsoft,
}

/// What the game needs to know about the player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchAccountProfile {
    pub mode: AccountMode,
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    #[serde(default = "default_xuid")]
    pub xuid: String,
    #[serde(default)]
    pub user_type: String,
}

fn default_xuid() -> String {
    "0".into()
}

impl LaunchAccountProfile {
    pub fn offline(username: &str) -> Self {
        let username = match username.trim() {
            "" => "Player",
            name => name,
        };
        Self {
            mode: AccountMode::Offline,
            username: username.to_string(),
            uuid: offline_uuid(username),
            access_token: "offline_access_token".into(),
            xuid: default_xuid(),
            user_type: "legacy".into(),
        }
    }

    /// Fill derivable blanks. The access token is never invented.
    pub fn sanitized(mut self) -> Self {
        if self.uuid.trim().is_empty() {
            self.uuid = offline_uuid(&self.username);
        }
        if self.xuid.trim().is_empty() {
            self.xuid = default_xuid();
        }
        if self.user_type.trim().is_empty() {
            self.user_type = match self.mode {
                AccountMode::Offline => "legacy".into(),
                AccountMode::Microsoft => "msa".into(),
            };
        }
        self
    }
}

/// Name-based UUID the game itself derives for offline players
/// (MD5 of `OfflinePlayer:<name>`, version 3).
pub fn offline_uuid(username: &str) -> String {
    let digest = Md5::digest(format!("OfflinePlayer:{}", username).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    uuid::Uuid::from_bytes(bytes).to_string()
}

/// Supplies a display name, account id and bearer token for one launch.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self) -> LauncherResult<LaunchAccountProfile>;
}

/// Fixed offline player.
#[derive(Debug, Clone)]
pub struct OfflineIdentity {
    username: String,
}

impl OfflineIdentity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for OfflineIdentity {
    async fn authenticate(&self) -> LauncherResult<LaunchAccountProfile> {
        Ok(LaunchAccountProfile::offline(&self.username))
    }
}

/// Session stored by the account front end as JSON.
#[derive(Debug, Clone)]
pub struct SessionFileIdentity {
    path: PathBuf,
}

impl SessionFileIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IdentityProvider for SessionFileIdentity {
    async fn authenticate(&self) -> LauncherResult<LaunchAccountProfile> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LauncherError::Auth(format!(
                    "no stored session at {:?}",
                    self.path
                )))
            }
            Err(e) => return Err(LauncherError::io(&self.path, e)),
        };
        let profile: LaunchAccountProfile = serde_json::from_str(&raw)
            .map_err(|e| LauncherError::Auth(format!("stored session is unreadable: {}", e)))?;

        if profile.access_token.trim().is_empty() {
            return Err(LauncherError::Auth("stored session has no access token".into()));
        }
        if profile.username.trim().is_empty() {
            return Err(LauncherError::Auth("stored session has no username".into()));
        }
        debug!("Loaded session for {}", profile.username);
        Ok(profile.sanitized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_uuid_matches_game_derivation() {
        assert_eq!(offline_uuid("Notch"), "b50ad385-829d-3141-a216-7e7d7539ba7f");
        assert_eq!(offline_uuid("Notch"), offline_uuid("Notch"));
    }

    #[test]
    fn blank_offline_name_defaults_to_player() {
        let profile = LaunchAccountProfile::offline("  ");
        assert_eq!(profile.username, "Player");
        assert_eq!(profile.user_type, "legacy");
    }

    #[tokio::test]
    async fn session_file_requires_token() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("session.json");

        let missing = SessionFileIdentity::new(&path).authenticate().await;
        assert!(matches!(missing, Err(LauncherError::Auth(_))));

        std::fs::write(
            &path,
            r#"{"mode":"microsoft","username":"Alex","uuid":"","access_token":"  "}"#,
        )
        .unwrap();
        let empty = SessionFileIdentity::new(&path).authenticate().await;
        assert!(matches!(empty, Err(LauncherError::Auth(_))));

        std::fs::write(
            &path,
            r#"{"mode":"microsoft","username":"Alex","uuid":"abc","access_token":"tok"}"#,
        )
        .unwrap();
        let profile = SessionFileIdentity::new(&path).authenticate().await.unwrap();
        assert_eq!(profile.access_token, "tok");
        assert_eq!(profile.user_type, "msa");
        assert_eq!(profile.xuid, "0");
    }
}
