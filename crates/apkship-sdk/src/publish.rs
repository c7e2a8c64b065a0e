//! Distribution platform uploads.
//!
//! Two platforms are supported behind one contract:
//!
//! - **Pgyer** - a single multipart POST carrying the package and the
//!   API key; the response body reports a numeric status code.
//! - **fir.im** - two steps: fetch an upload certificate with a token
//!   header, then POST the package to the dynamic upload URL that
//!   certificate designates.
//!
//! Every failure mode - missing credential, transport error, malformed
//! response, platform-reported rejection - is reported as a
//! [`PublishResult`] with `success == false` and a human-readable
//! message. [`Publisher::publish`] never panics and never returns an
//! error to the caller.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};

use crate::types::{is_package_file, DeliveryError};

const PGYER_UPLOAD_URL: &str = "https://www.pgyer.com/apiv2/app/upload";
const PGYER_DOWNLOAD_BASE: &str = "https://www.pgyer.com";
const FIR_CERT_URL: &str = "https://api.fir.im/apps";
const USER_AGENT: &str = concat!("apkship/", env!("CARGO_PKG_VERSION"));

/// Uploads are large and slow; the client imposes the bounded timeout
/// so a hung transfer surfaces as a transport failure.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Supported distribution platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishPlatform {
    #[default]
    Pgyer,
    Fir,
}

impl PublishPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishPlatform::Pgyer => "pgyer",
            PublishPlatform::Fir => "fir",
        }
    }
}

/// Configuration for one publish attempt.
///
/// The credential matching the selected platform must be present;
/// everything else is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    pub platform: PublishPlatform,
    /// Pgyer API key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
    /// fir.im API token.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_token: Option<String>,
    /// Optional install password (Pgyer).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>,
    /// Optional changelog / update description.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub changelog: Option<String>,
    /// Pgyer install policy: 1 = public, 2 = password, 3 = invite.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub install_type: Option<u8>,
}

/// Outcome of one publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub qr_code_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub build_key: Option<String>,
}

impl PublishResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            download_url: None,
            qr_code_url: None,
            build_key: None,
        }
    }
}

/// Client for pushing packages to a distribution platform.
pub struct Publisher {
    http: Client,
    pgyer_upload_url: String,
    pgyer_download_base: String,
    fir_cert_url: String,
}

impl Publisher {
    pub fn new() -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(UPLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            pgyer_upload_url: PGYER_UPLOAD_URL.to_string(),
            pgyer_download_base: PGYER_DOWNLOAD_BASE.to_string(),
            fir_cert_url: FIR_CERT_URL.to_string(),
        })
    }

    /// Overrides the Pgyer endpoints.
    #[cfg(test)]
    pub fn with_pgyer_endpoints(
        mut self,
        upload_url: impl Into<String>,
        download_base: impl Into<String>,
    ) -> Self {
        self.pgyer_upload_url = upload_url.into();
        self.pgyer_download_base = download_base.into();
        self
    }

    /// Overrides the fir.im certificate endpoint.
    #[cfg(test)]
    pub fn with_fir_cert_url(mut self, url: impl Into<String>) -> Self {
        self.fir_cert_url = url.into();
        self
    }

    /// Uploads one package file to the configured platform.
    ///
    /// Preconditions checked before any network I/O: the file exists,
    /// its extension is `.apk` or `.aab`, and the platform's credential
    /// is present. A missing credential yields an immediate failure
    /// result with zero requests attempted.
    pub fn publish(&self, file: &Path, config: &PublishConfig) -> PublishResult {
        if !file.exists() {
            return PublishResult::failure(format!("file not found: {}", file.display()));
        }
        if !is_package_file(file) {
            return PublishResult::failure(format!(
                "unsupported file type: {}; only .apk and .aab packages can be published",
                file.display()
            ));
        }
        match config.platform {
            PublishPlatform::Pgyer => self.publish_pgyer(file, config),
            PublishPlatform::Fir => self.publish_fir(file, config),
        }
    }

    fn publish_pgyer(&self, file: &Path, config: &PublishConfig) -> PublishResult {
        let api_key = match config.api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => key,
            None => return PublishResult::failure("pgyer api key not configured"),
        };
        match self.try_publish_pgyer(file, api_key, config) {
            Ok(result) => result,
            Err(err) => PublishResult::failure(format!("pgyer upload failed: {err:#}")),
        }
    }

    fn try_publish_pgyer(
        &self,
        file: &Path,
        api_key: &str,
        config: &PublishConfig,
    ) -> Result<PublishResult> {
        let mut form = multipart::Form::new()
            .file("file", file)
            .context("attaching package to upload form")?
            .text("_api_key", api_key.to_string());
        if let Some(password) = &config.password {
            form = form.text("password", password.clone());
        }
        if let Some(changelog) = &config.changelog {
            form = form.text("updateDescription", changelog.clone());
        }
        if let Some(install_type) = config.install_type {
            form = form.text("installType", install_type.to_string());
        }

        let response = self
            .http
            .post(&self.pgyer_upload_url)
            .multipart(form)
            .send()
            .context("sending upload request to pgyer")?;
        let body = response.text().context("reading pgyer upload response")?;
        Ok(parse_pgyer_response(&body, &self.pgyer_download_base))
    }

    fn publish_fir(&self, file: &Path, config: &PublishConfig) -> PublishResult {
        let api_token = match config.api_token.as_deref().filter(|token| !token.is_empty()) {
            Some(token) => token,
            None => return PublishResult::failure("fir.im api token not configured"),
        };
        match self.try_publish_fir(file, api_token, config) {
            Ok(result) => result,
            Err(err) => PublishResult::failure(format!("fir.im upload failed: {err:#}")),
        }
    }

    fn try_publish_fir(
        &self,
        file: &Path,
        api_token: &str,
        config: &PublishConfig,
    ) -> Result<PublishResult> {
        // Step one: fetch the upload certificate.
        let response = self
            .http
            .get(&self.fir_cert_url)
            .header("X-Token", api_token)
            .send()
            .context("requesting fir.im upload certificate")?;
        let body = response.text().context("reading fir.im certificate response")?;

        let (binary, key) = match parse_fir_cert(&body) {
            Ok(cert) => cert,
            // Certificate rejection halts here; the upload POST is
            // never attempted.
            Err(message) => return Ok(PublishResult::failure(message)),
        };

        // Step two: upload to the URL the certificate designates.
        let mut form = multipart::Form::new()
            .text("key", key)
            .text("token", binary.token)
            .file("file", file)
            .context("attaching package to upload form")?;
        if let Some(changelog) = &config.changelog {
            form = form.text("changelog", changelog.clone());
        }

        let response = self
            .http
            .post(&binary.upload_url)
            .multipart(form)
            .send()
            .context("sending upload request to fir.im")?;
        let body = response.text().context("reading fir.im upload response")?;
        Ok(parse_fir_upload_response(&body))
    }
}

#[derive(Debug, Deserialize)]
struct PgyerResponse {
    code: i64,
    message: Option<String>,
    data: Option<PgyerData>,
}

#[derive(Debug, Default, Deserialize)]
struct PgyerData {
    #[serde(rename = "buildShortcutUrl")]
    build_shortcut_url: Option<String>,
    #[serde(rename = "buildQRCodeURL")]
    build_qr_code_url: Option<String>,
    #[serde(rename = "buildKey")]
    build_key: Option<String>,
}

fn parse_pgyer_response(body: &str, download_base: &str) -> PublishResult {
    let parsed: PgyerResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) => return PublishResult::failure(format!("unexpected pgyer response: {err}")),
    };
    if parsed.code != 0 {
        let message = parsed
            .message
            .unwrap_or_else(|| format!("platform code {}", parsed.code));
        return PublishResult::failure(format!("pgyer rejected upload: {message}"));
    }

    let data = parsed.data.unwrap_or_default();
    // A missing shortcut segment is tolerated: the download URL is
    // simply omitted from the result.
    let download_url = data.build_shortcut_url.as_deref().map(|segment| {
        format!(
            "{}/{}",
            download_base.trim_end_matches('/'),
            segment.trim_start_matches('/')
        )
    });
    PublishResult {
        success: true,
        message: "upload complete".to_string(),
        download_url,
        qr_code_url: data.build_qr_code_url,
        build_key: data.build_key,
    }
}

#[derive(Debug, Deserialize)]
struct FirCertResponse {
    cert: Option<FirCert>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirCert {
    binary: Option<FirBinaryCert>,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirBinaryCert {
    token: String,
    upload_url: String,
}

fn parse_fir_cert(body: &str) -> Result<(FirBinaryCert, String), String> {
    let parsed: FirCertResponse = serde_json::from_str(body)
        .map_err(|err| format!("unexpected fir.im certificate response: {err}"))?;
    let message = parsed.message;
    let cert = parsed.cert.and_then(|cert| match (cert.binary, cert.key) {
        (Some(binary), Some(key)) => Some((binary, key)),
        _ => None,
    });
    cert.ok_or_else(|| {
        message.unwrap_or_else(|| "fir.im certificate response missing cert.binary".to_string())
    })
}

#[derive(Debug, Deserialize)]
struct FirUploadResponse {
    #[serde(default)]
    is_completed: bool,
    download_url: Option<String>,
    qrcode_url: Option<String>,
    message: Option<String>,
}

fn parse_fir_upload_response(body: &str) -> PublishResult {
    let parsed: FirUploadResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return PublishResult::failure(format!("unexpected fir.im upload response: {err}"))
        }
    };
    if !parsed.is_completed {
        let message = parsed.message.unwrap_or_else(|| "unknown error".to_string());
        return PublishResult::failure(format!("fir.im rejected upload: {message}"));
    }
    PublishResult {
        success: true,
        message: "upload complete".to_string(),
        download_url: parsed.download_url,
        qr_code_url: parsed.qrcode_url,
        build_key: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn package(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"bytes").unwrap();
        path
    }

    #[test]
    fn rejects_missing_file_before_any_request() {
        let publisher = Publisher::new().unwrap();
        let result = publisher.publish(
            Path::new("/tmp/definitely-missing.apk"),
            &PublishConfig::default(),
        );
        assert!(!result.success);
        assert!(result.message.contains("file not found"));
    }

    #[test]
    fn rejects_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let file = package(&dir, "notes.txt");
        let publisher = Publisher::new().unwrap();
        let result = publisher.publish(&file, &PublishConfig::default());
        assert!(!result.success);
        assert!(result.message.contains("unsupported file type"));
    }

    #[test]
    fn missing_pgyer_key_fails_without_network() {
        let dir = TempDir::new().unwrap();
        let file = package(&dir, "app.apk");
        // Endpoints point at an unroutable host; the credential check
        // must fire first, so no transport error can appear.
        let publisher = Publisher::new()
            .unwrap()
            .with_pgyer_endpoints("http://127.0.0.1:1/upload", "http://127.0.0.1:1");
        let result = publisher.publish(
            &file,
            &PublishConfig {
                platform: PublishPlatform::Pgyer,
                ..Default::default()
            },
        );
        assert!(!result.success);
        assert_eq!(result.message, "pgyer api key not configured");
    }

    #[test]
    fn missing_fir_token_fails_without_network() {
        let dir = TempDir::new().unwrap();
        let file = package(&dir, "app.aab");
        let publisher = Publisher::new()
            .unwrap()
            .with_fir_cert_url("http://127.0.0.1:1/apps");
        let result = publisher.publish(
            &file,
            &PublishConfig {
                platform: PublishPlatform::Fir,
                ..Default::default()
            },
        );
        assert!(!result.success);
        assert_eq!(result.message, "fir.im api token not configured");
    }

    #[test]
    fn transport_error_becomes_failure_result() {
        let dir = TempDir::new().unwrap();
        let file = package(&dir, "app.apk");
        let publisher = Publisher::new()
            .unwrap()
            .with_pgyer_endpoints("http://127.0.0.1:1/upload", "http://127.0.0.1:1");
        let result = publisher.publish(
            &file,
            &PublishConfig {
                platform: PublishPlatform::Pgyer,
                api_key: Some("key".to_string()),
                ..Default::default()
            },
        );
        assert!(!result.success);
        assert!(result.message.contains("pgyer upload failed"));
    }

    #[test]
    fn pgyer_success_composes_download_url() {
        let body = r#"{"code":0,"data":{"buildShortcutUrl":"abc","buildQRCodeURL":"https://q.example/qr.png","buildKey":"k1"}}"#;
        let result = parse_pgyer_response(body, "https://www.pgyer.com");
        assert!(result.success);
        assert_eq!(result.download_url.as_deref(), Some("https://www.pgyer.com/abc"));
        assert!(result.download_url.unwrap().ends_with("abc"));
        assert_eq!(result.qr_code_url.as_deref(), Some("https://q.example/qr.png"));
        assert_eq!(result.build_key.as_deref(), Some("k1"));
    }

    #[test]
    fn pgyer_success_without_shortcut_omits_download_url() {
        let body = r#"{"code":0,"data":{"buildKey":"k1"}}"#;
        let result = parse_pgyer_response(body, "https://www.pgyer.com");
        assert!(result.success);
        assert!(result.download_url.is_none());
    }

    #[test]
    fn pgyer_success_without_data_block_is_tolerated() {
        let result = parse_pgyer_response(r#"{"code":0}"#, "https://www.pgyer.com");
        assert!(result.success);
        assert!(result.download_url.is_none());
    }

    #[test]
    fn pgyer_nonzero_code_carries_platform_message() {
        let result = parse_pgyer_response(r#"{"code":1,"message":"bad key"}"#, "https://www.pgyer.com");
        assert!(!result.success);
        assert!(result.message.contains("bad key"));
    }

    #[test]
    fn pgyer_parse_failure_is_a_result_not_a_panic() {
        let result = parse_pgyer_response("<html>502</html>", "https://www.pgyer.com");
        assert!(!result.success);
        assert!(result.message.contains("unexpected pgyer response"));
    }

    #[test]
    fn fir_cert_parses_token_upload_url_and_key() {
        let body = r#"{"cert":{"binary":{"token":"t","upload_url":"https://up.fir.im/x"},"key":"sess"}}"#;
        let (binary, key) = parse_fir_cert(body).unwrap();
        assert_eq!(binary.token, "t");
        assert_eq!(binary.upload_url, "https://up.fir.im/x");
        assert_eq!(key, "sess");
    }

    #[test]
    fn fir_cert_without_binary_fails_before_upload() {
        let body = r#"{"cert":{"key":"sess"},"message":"token invalid"}"#;
        let err = parse_fir_cert(body).unwrap_err();
        assert_eq!(err, "token invalid");
    }

    #[test]
    fn fir_cert_without_binary_and_message_has_fallback() {
        let err = parse_fir_cert(r#"{}"#).unwrap_err();
        assert!(err.contains("missing cert.binary"));
    }

    #[test]
    fn fir_upload_completion_flag_controls_success() {
        let ok = parse_fir_upload_response(
            r#"{"is_completed":true,"download_url":"https://fir.im/dl","qrcode_url":"https://fir.im/qr"}"#,
        );
        assert!(ok.success);
        assert_eq!(ok.download_url.as_deref(), Some("https://fir.im/dl"));

        let rejected = parse_fir_upload_response(r#"{"is_completed":false,"message":"quota"}"#);
        assert!(!rejected.success);
        assert!(rejected.message.contains("quota"));
    }

    #[test]
    fn fir_upload_parse_failure_is_a_result() {
        let result = parse_fir_upload_response("not json");
        assert!(!result.success);
        assert!(result.message.contains("unexpected fir.im upload response"));
    }
}
