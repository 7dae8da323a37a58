use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::storage::config::GoogleConfig;

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Failed to read credentials file {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse credentials file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Credentials file has neither an 'installed' nor a 'web' client")]
    MissingClient,
}

/// OAuth client identity plus the endpoints it talks to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl ClientSecret {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, CredentialsError> {
        let file: ClientSecretFile = serde_json::from_str(content)?;
        file.installed
            .or(file.web)
            .ok_or(CredentialsError::MissingClient)
    }

    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialsError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Inline config values win over the credentials file.
    pub fn from_config(google: &GoogleConfig) -> Result<Self, CredentialsError> {
        if google.has_inline_client() {
            return Ok(Self::new(google.client_id.clone(), google.client_secret.clone()));
        }
        Self::from_file(&google.credentials_file)
    }

    pub fn with_endpoints(mut self, auth_uri: String, token_uri: String) -> Self {
        self.auth_uri = auth_uri;
        self.token_uri = token_uri;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const INSTALLED_JSON: &str = r#"{
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "project_id": "events-sync",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_secret": "shh",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    fn google_config(credentials_file: PathBuf) -> GoogleConfig {
        GoogleConfig {
            credentials_file,
            token_cache: PathBuf::from("/tmp/token.json"),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }

    #[test]
    fn parses_installed_client() {
        let secret = ClientSecret::from_json(INSTALLED_JSON).unwrap();

        assert_eq!(secret.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secret.client_secret, "shh");
        assert_eq!(secret.auth_uri, "https://accounts.google.com/o/oauth2/auth");
    }

    #[test]
    fn parses_web_client_with_default_endpoints() {
        let json = r#"{"web": {"client_id": "abc", "client_secret": "def"}}"#;

        let secret = ClientSecret::from_json(json).unwrap();

        assert_eq!(secret.token_uri, GOOGLE_TOKEN_URI);
        assert_eq!(secret.auth_uri, GOOGLE_AUTH_URI);
    }

    #[test]
    fn file_without_client_section_is_rejected() {
        let result = ClientSecret::from_json(r#"{"other": {}}"#);

        assert!(matches!(result, Err(CredentialsError::MissingClient)));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let result = ClientSecret::from_file(Path::new("/nonexistent/credentials.json"));

        let message = result.unwrap_err().to_string();
        assert!(message.contains("/nonexistent/credentials.json"));
    }

    #[test]
    fn from_config_reads_credentials_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        std::fs::write(&path, INSTALLED_JSON).unwrap();

        let secret = ClientSecret::from_config(&google_config(path)).unwrap();

        assert_eq!(secret.client_secret, "shh");
    }

    #[test]
    fn from_config_prefers_inline_client() {
        let mut google = google_config(PathBuf::from("/nonexistent/credentials.json"));
        google.client_id = "inline-id".to_string();
        google.client_secret = "inline-secret".to_string();

        let secret = ClientSecret::from_config(&google).unwrap();

        assert_eq!(secret, ClientSecret::new("inline-id", "inline-secret"));
    }
}
