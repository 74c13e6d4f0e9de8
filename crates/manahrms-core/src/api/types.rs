//! Request and response bodies for the HRMS endpoints.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::models::UserRecord;

/// Fallback file name when a path has none
const DEFAULT_AVATAR_NAME: &str = "avatar.jpg";

/// Multipart field name expected by `POST /user/avatar`
const AVATAR_FIELD: &str = "avatar";

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
    pub user: UserRecord,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangePasswordRequest<'a> {
    #[serde(rename = "oldPassword")]
    pub old_password: &'a str,
    #[serde(rename = "newPassword")]
    pub new_password: &'a str,
}

/// An image to upload as the profile avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AvatarFile {
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self {
            bytes,
            file_name,
            mime_type,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_AVATAR_NAME);
        Ok(Self::from_bytes(bytes, file_name))
    }

    /// Build a fresh multipart form. Called per dispatch so a request can be re-sent.
    pub(crate) fn to_form(&self) -> Result<Form, ApiError> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime_type)
            .map_err(|e| ApiError::InvalidRequest(format!("Bad avatar MIME type: {}", e)))?;
        Ok(Form::new().part(AVATAR_FIELD, part))
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_for("me.JPG"), "image/jpeg");
        assert_eq!(mime_for("me.jpeg"), "image/jpeg");
        assert_eq!(mime_for("me.png"), "image/png");
        assert_eq!(mime_for("me.heic"), "image/heic");
        assert_eq!(mime_for("me"), "application/octet-stream");
    }

    #[test]
    fn test_login_response_optional_refresh_token() {
        let resp: LoginResponse =
            serde_json::from_str(r#"{"token":"T1","user":{"email":"a@b.com"}}"#).unwrap();
        assert_eq!(resp.token, "T1");
        assert!(resp.refresh_token.is_none());
        assert_eq!(resp.user.email(), Some("a@b.com"));

        let resp: LoginResponse = serde_json::from_str(
            r#"{"accessToken":"T2","refreshToken":"R2","user":{}}"#,
        )
        .unwrap();
        assert_eq!(resp.token, "T2");
        assert_eq!(resp.refresh_token.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_avatar_from_path_uses_file_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("portrait.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let avatar = AvatarFile::from_path(&path).await.unwrap();
        assert_eq!(avatar.file_name, "portrait.png");
        assert_eq!(avatar.mime_type, "image/png");
        assert_eq!(avatar.bytes.len(), 4);
    }
}
