use chronochat_auth::{Partitioning, RateLimitConfig, TokenVerifierConfig};
use chronochat_cache::{RecentMessagesConfig, RedisCacheConfig};
use chronochat_graph::{OrchestratorConfig, RetryPolicy};
use chronochat_llm::{GenerateOptions, ProviderConfig, ProviderType};
use chronochat_persist::{AnalyticsWriterConfig, MongoConfig, PostgresConfig};
use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub mongodb: MongoDbConfig,
    #[serde(default)]
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub analytics: AnalyticsSettings,

    // Secrets (from ENV only)
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// `["*"]` allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 120,
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JwtAlgorithm {
    #[default]
    Rs256,
    Es256,
    /// Shared secret, local development only
    Hs256,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub algorithm: JwtAlgorithm,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub required_claims: Vec<String>,
    pub leeway_secs: u64,
    pub max_cache_ttl_secs: u64,
    /// Read when `JWT_PUBLIC_KEY_PEM` is not set
    pub public_key_path: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::Rs256,
            issuer: None,
            audience: None,
            required_claims: Vec::new(),
            leeway_secs: 0,
            max_cache_ttl_secs: 300,
            public_key_path: None,
        }
    }
}

impl AuthConfig {
    pub fn verifier_config(&self) -> TokenVerifierConfig {
        TokenVerifierConfig {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            required_claims: self.required_claims.clone(),
            leeway: Duration::from_secs(self.leeway_secs),
            max_cache_ttl: Duration::from_secs(self.max_cache_ttl_secs),
            ..TokenVerifierConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub limit: u32,
    pub window_secs: u64,
    pub partitioning: Partitioning,
    pub cas_attempts: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: 60,
            window_secs: 60,
            partitioning: Partitioning::Global,
            cas_attempts: 3,
        }
    }
}

impl RateLimitSettings {
    pub fn limiter_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            limit: self.limit,
            window: Duration::from_secs(self.window_secs),
            partitioning: self.partitioning,
            cas_attempts: self.cas_attempts,
            ..RateLimitConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub op_timeout_ms: u64,
    pub recent_capacity: usize,
    pub recent_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: 250,
            recent_capacity: 20,
            recent_ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    pub fn redis_config(&self, url: &str) -> RedisCacheConfig {
        RedisCacheConfig::new(url).with_op_timeout(Duration::from_millis(self.op_timeout_ms))
    }

    pub fn recent_messages_config(&self) -> RecentMessagesConfig {
        RecentMessagesConfig {
            capacity: self.recent_capacity,
            ttl: Duration::from_secs(self.recent_ttl_secs),
            ..RecentMessagesConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    pub database: String,
    pub server_selection_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            database: "chronochat".to_string(),
            server_selection_timeout_ms: 5000,
            connect_timeout_ms: 5000,
        }
    }
}

impl MongoDbConfig {
    pub fn store_config(&self, uri: &str) -> MongoConfig {
        MongoConfig {
            server_selection_timeout: Duration::from_millis(self.server_selection_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            ..MongoConfig::new(uri, &self.database)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresSettings {
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Create the analytics tables at startup
    pub migrate: bool,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_ms: 3000,
            migrate: true,
        }
    }
}

impl PostgresSettings {
    pub fn store_config(&self, url: &str) -> PostgresConfig {
        PostgresConfig {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            ..PostgresConfig::new(url)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderType,
    pub model: String,
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::OpenAI,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            request_timeout_secs: 60,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    pub fn provider_config(&self, api_key: &str) -> ProviderConfig {
        let mut config = match self.provider {
            ProviderType::OpenAI => ProviderConfig::openai(api_key, &self.model),
            ProviderType::Gemini => ProviderConfig::gemini(api_key, &self.model),
        };
        if let Some(base_url) = &self.base_url {
            config.details = match config.details {
                chronochat_llm::ProviderDetails::OpenAI(c) => {
                    chronochat_llm::ProviderDetails::OpenAI(c.with_base_url(base_url))
                }
                chronochat_llm::ProviderDetails::Gemini(c) => {
                    chronochat_llm::ProviderDetails::Gemini(c.with_base_url(base_url))
                }
            };
        }
        config.with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Environment variable holding the provider's API key
    pub fn api_key_var(&self) -> &'static str {
        match self.provider {
            ProviderType::OpenAI => "OPENAI_API_KEY",
            ProviderType::Gemini => "GEMINI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub system_prompt: Option<String>,
    pub max_tool_rounds: usize,
    pub history_limit: usize,
    pub max_retries: u32,
    pub provider_timeout_secs: u64,
    pub store_timeout_ms: u64,
    pub cache_timeout_ms: u64,
    pub busy_retry_after_secs: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tool_rounds: 5,
            history_limit: 20,
            max_retries: 2,
            provider_timeout_secs: 30,
            store_timeout_ms: 5000,
            cache_timeout_ms: 1000,
            busy_retry_after_secs: 2,
        }
    }
}

impl OrchestratorSettings {
    pub fn orchestrator_config(&self, llm: &LlmConfig) -> OrchestratorConfig {
        let mut config = OrchestratorConfig {
            max_tool_rounds: self.max_tool_rounds,
            history_limit: self.history_limit,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            cache_timeout: Duration::from_millis(self.cache_timeout_ms),
            busy_retry_after: Duration::from_secs(self.busy_retry_after_secs),
            generate_options: llm.generate_options(),
            ..OrchestratorConfig::default()
        };
        if let Some(prompt) = &self.system_prompt {
            config.system_prompt = prompt.clone();
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub calculator: bool,
    pub current_time: bool,
    /// `web_search` is registered only when an endpoint is configured
    pub web_search_endpoint: Option<String>,
    pub web_search_timeout_secs: u64,
    /// `retrieval_lookup` is registered only when an endpoint is configured
    pub retrieval_endpoint: Option<String>,
    pub retrieval_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            calculator: true,
            current_time: true,
            web_search_endpoint: None,
            web_search_timeout_secs: 8,
            retrieval_endpoint: None,
            retrieval_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub op_timeout_ms: u64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_attempts: 5,
            base_backoff_ms: 100,
            max_backoff_ms: 5000,
            op_timeout_ms: 5000,
        }
    }
}

impl AnalyticsSettings {
    pub fn writer_config(&self) -> AnalyticsWriterConfig {
        AnalyticsWriterConfig {
            capacity: self.queue_capacity,
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
        }
    }
}

/// Credentials that never live in TOML
#[derive(Clone, Default)]
pub struct Secrets {
    pub mongodb_uri: String,
    pub database_url: String,
    pub redis_url: String,
    pub llm_api_key: String,
    /// PEM public key, or the shared secret for `hs256`
    pub jwt_key: String,
    pub search_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::Message(format!("{} environment variable is required", name)))
}

impl Secrets {
    pub fn from_env(config: &Config) -> Result<Self, ConfigError> {
        let jwt_key = match std::env::var("JWT_PUBLIC_KEY_PEM") {
            Ok(pem) if !pem.trim().is_empty() => pem,
            _ => {
                let path = std::env::var("JWT_PUBLIC_KEY_PATH")
                    .ok()
                    .or_else(|| config.auth.public_key_path.clone())
                    .ok_or_else(|| {
                        ConfigError::Message(
                            "JWT_PUBLIC_KEY_PEM or JWT_PUBLIC_KEY_PATH is required".to_string(),
                        )
                    })?;
                std::fs::read_to_string(&path).map_err(|e| {
                    ConfigError::Message(format!("failed to read JWT key at {}: {}", path, e))
                })?
            }
        };

        Ok(Self {
            mongodb_uri: required_env("MONGODB_URI")?,
            database_url: required_env("DATABASE_URL")?,
            redis_url: required_env("REDIS_URL")?,
            llm_api_key: required_env(config.llm.api_key_var())?,
            jwt_key,
            search_api_key: std::env::var("SEARCH_API_KEY").ok(),
        })
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables prefixed `CHRONOCHAT_`, sections split by `__`
    ///    (e.g. `CHRONOCHAT_SERVER__PORT=9000`)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("CHRONOCHAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Config = config.try_deserialize()?;
        cfg.secrets = Secrets::from_env(&cfg)?;
        Ok(cfg)
    }

    /// Load config from a specific path without secrets (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_structure() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 3000

            [rate_limit]
            limit = 5
            window_secs = 10
            partitioning = "per_endpoint"

            [llm]
            provider = "gemini"
            model = "gemini-1.5-flash"
            temperature = 0.2

            [orchestrator]
            max_tool_rounds = 3

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.mongodb.database, "chronochat");
        assert_eq!(config.llm.api_key_var(), "GEMINI_API_KEY");

        let limiter = config.rate_limit.limiter_config();
        assert_eq!(limiter.limit, 5);
        assert_eq!(limiter.window, Duration::from_secs(10));
        assert_eq!(limiter.partitioning, Partitioning::PerEndpoint);

        let orchestrator = config.orchestrator.orchestrator_config(&config.llm);
        assert_eq!(orchestrator.max_tool_rounds, 3);
        assert_eq!(orchestrator.generate_options.temperature, Some(0.2));
        assert_eq!(orchestrator.system_prompt, chronochat_graph::DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_provider_config_carries_base_url_and_timeout() {
        let llm = LlmConfig {
            base_url: Some("http://localhost:9999/v1".to_string()),
            request_timeout_secs: 15,
            ..LlmConfig::default()
        };
        let provider = llm.provider_config("key");
        assert_eq!(provider.provider_type(), ProviderType::OpenAI);
        assert_eq!(provider.request_timeout_secs, Some(15));
        match provider.details {
            chronochat_llm::ProviderDetails::OpenAI(c) => {
                assert_eq!(c.base_url.as_deref(), Some("http://localhost:9999/v1"))
            }
            other => panic!("unexpected provider {:?}", other),
        }
    }

    #[test]
    fn test_secrets_are_not_printed() {
        let secrets = Secrets {
            llm_api_key: "sk-live-123".to_string(),
            ..Secrets::default()
        };
        assert!(!format!("{:?}", secrets).contains("sk-live"));
    }
}
