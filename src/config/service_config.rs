use crate::utils::error::{CutoutError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.5-flash-image";
pub const DEFAULT_SITE_URL: &str = "https://wordcaps.app";
pub const DEFAULT_REMOVEBG_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid placeholder regex"));

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub generative: GenerativeConfig,
    pub segmentation: SegmentationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub default_provider: ProviderKind,
    pub timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Generative,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// 生成式模型 (chat completion) 的設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    pub api_key: Option<Credential>,
    pub endpoint: String,
    pub model: String,
    pub site_url: Option<String>,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_OPENROUTER_ENDPOINT.to_string(),
            model: DEFAULT_OPENROUTER_MODEL.to_string(),
            site_url: Some(DEFAULT_SITE_URL.to_string()),
        }
    }
}

impl GenerativeConfig {
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_ref().and_then(Credential::usable)
    }
}

/// 去背服務的設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub api_key: Option<Credential>,
    pub endpoint: String,
    pub size: String,
    pub format: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_REMOVEBG_ENDPOINT.to_string(),
            size: "preview".to_string(),
            format: "png".to_string(),
        }
    }
}

impl SegmentationConfig {
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_ref().and_then(Credential::usable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Generative,
    Segmentation,
}

impl FromStr for ProviderKind {
    type Err = CutoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generative" | "gemini" | "openrouter" => Ok(Self::Generative),
            "segmentation" | "removebg" | "remove.bg" => Ok(Self::Segmentation),
            other => Err(CutoutError::InvalidConfigValueError {
                field: "pipeline.default_provider".to_string(),
                value: other.to_string(),
                reason: "Expected 'generative' or 'segmentation'".to_string(),
            }),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generative => write!(f, "generative"),
            Self::Segmentation => write!(f, "segmentation"),
        }
    }
}

/// API 金鑰，Debug 輸出時遮蔽
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 空字串或未替換的 `${VAR}` 視為未設定
    pub fn usable(&self) -> Option<&str> {
        let value = self.0.trim();
        if value.is_empty() || ENV_PLACEHOLDER.is_match(value) {
            None
        } else {
            Some(value)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl ServiceConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CutoutError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CutoutError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 從環境變數建立配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.generative.api_key = lookup("OPENROUTER_API_KEY").map(Credential::new);
        if let Some(site_url) = lookup("SITE_URL") {
            config.generative.site_url = Some(site_url);
        }
        if let Some(model) = lookup("OPENROUTER_MODEL") {
            config.generative.model = model;
        }
        config.segmentation.api_key = lookup("REMOVEBG_API_KEY").map(Credential::new);

        if let Some(provider) = lookup("CUTOUT_PROVIDER") {
            config.pipeline.default_provider = provider.parse()?;
        }
        if let Some(timeout) = lookup("CUTOUT_TIMEOUT_SECONDS") {
            config.pipeline.timeout_seconds = parse_number("CUTOUT_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Some(host) = lookup("CUTOUT_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("CUTOUT_PORT") {
            config.server.port = parse_number("CUTOUT_PORT", &port)?;
        }

        Ok(config)
    }

    /// 替換環境變數 (例如 ${OPENROUTER_API_KEY})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_PLACEHOLDER
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validation::validate_range("pipeline.timeout_seconds", self.pipeline.timeout_seconds, 1, 600)?;

        validation::validate_url("generative.endpoint", &self.generative.endpoint)?;
        validation::validate_non_empty_string("generative.model", &self.generative.model)?;
        if let Some(site_url) = &self.generative.site_url {
            validation::validate_url("generative.site_url", site_url)?;
        }

        validation::validate_url("segmentation.endpoint", &self.segmentation.endpoint)?;
        validation::validate_one_of(
            "segmentation.size",
            &self.segmentation.size,
            &["auto", "preview", "small", "regular", "medium", "hd", "full", "4k"],
        )?;
        validation::validate_one_of(
            "segmentation.format",
            &self.segmentation.format,
            &["png", "jpg", "webp"],
        )?;

        if self.generative.credential().is_none() {
            tracing::warn!("⚠️ OPENROUTER_API_KEY not configured, generative route will pass images through");
        }
        if self.segmentation.credential().is_none() {
            tracing::warn!("⚠️ REMOVEBG_API_KEY not configured, segmentation route will pass images through");
        }

        Ok(())
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CutoutError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Expected a positive integer".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();

        assert_eq!(config.pipeline.timeout(), Duration::from_secs(60));
        assert_eq!(config.pipeline.default_provider, ProviderKind::Generative);
        assert_eq!(config.generative.model, "google/gemini-2.5-flash-image");
        assert_eq!(config.segmentation.size, "preview");
        assert_eq!(config.segmentation.format, "png");
        assert!(config.generative.credential().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_content = r#"
[pipeline]
default_provider = "segmentation"
timeout_seconds = 30

[segmentation]
api_key = "rbg-key"
"#;

        let config = ServiceConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.pipeline.default_provider, ProviderKind::Segmentation);
        assert_eq!(config.pipeline.timeout_seconds, 30);
        assert_eq!(config.segmentation.credential(), Some("rbg-key"));
        assert_eq!(config.segmentation.endpoint, DEFAULT_REMOVEBG_ENDPOINT);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("STICKER_TEST_OPENROUTER_KEY", "sk-or-test");

        let toml_content = r#"
[generative]
api_key = "${STICKER_TEST_OPENROUTER_KEY}"
"#;

        let config = ServiceConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.generative.credential(), Some("sk-or-test"));

        std::env::remove_var("STICKER_TEST_OPENROUTER_KEY");
    }

    #[test]
    fn test_unresolved_placeholder_counts_as_missing() {
        let toml_content = r#"
[generative]
api_key = "${STICKER_TEST_DEFINITELY_UNSET_KEY}"

[segmentation]
api_key = "   "
"#;

        let config = ServiceConfig::from_toml_str(toml_content).unwrap();
        assert!(config.generative.credential().is_none());
        assert!(config.segmentation.credential().is_none());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "sk-or-env"),
            ("SITE_URL", "https://stickers.example.com"),
            ("CUTOUT_PROVIDER", "removebg"),
            ("CUTOUT_TIMEOUT_SECONDS", "15"),
            ("CUTOUT_PORT", "8088"),
        ]);

        let config =
            ServiceConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.generative.credential(), Some("sk-or-env"));
        assert_eq!(
            config.generative.site_url.as_deref(),
            Some("https://stickers.example.com")
        );
        assert_eq!(config.pipeline.default_provider, ProviderKind::Segmentation);
        assert_eq!(config.pipeline.timeout(), Duration::from_secs(15));
        assert_eq!(config.server.port, 8088);
        assert!(config.segmentation.credential().is_none());
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let result = ServiceConfig::from_lookup(|key| {
            (key == "CUTOUT_TIMEOUT_SECONDS").then(|| "sixty".to_string())
        });
        assert!(matches!(
            result,
            Err(CutoutError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[generative]
endpoint = "invalid-url"
"#;
        let config = ServiceConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[pipeline]
timeout_seconds = 0
"#;
        let config = ServiceConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[segmentation]
format = "bmp"
"#;
        let config = ServiceConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        // 非圖片輸出格式無法對應 image/* MIME
        for format in ["zip", "auto"] {
            let toml_content = format!("[segmentation]\nformat = \"{}\"", format);
            let config = ServiceConfig::from_toml_str(&toml_content).unwrap();
            assert!(config.validate().is_err(), "{format}");
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(ServiceConfig::from_toml_str("[pipeline]\ndefault_provider = \"magic\"").is_err());
        assert!("magic".parse::<ProviderKind>().is_err());
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Generative);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("sk-or-very-secret");
        assert!(!format!("{:?}", credential).contains("very-secret"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8080

[generative]
model = "google/gemini-2.5-flash-image-preview"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = ServiceConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.generative.model, "google/gemini-2.5-flash-image-preview");
    }
}
