use crate::config::{Config, JwtAlgorithm, ToolsConfig};
use crate::state::AppState;
use anyhow::Context;
use chronochat_auth::{JwtSignatureVerifier, RateLimiter, TokenVerifier};
use chronochat_cache::{RedisCache, SessionCache};
use chronochat_graph::{ChatService, Orchestrator};
use chronochat_llm::ProviderFactory;
use chronochat_persist::{AnalyticsWriter, MongoConversationStore, PgAnalyticsStore};
use chronochat_tools::builtin::{
    CalculatorTool, CurrentTimeTool, HttpRetrievalBackend, RetrievalLookupTool, WebSearchConfig,
    WebSearchTool,
};
use chronochat_tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Every long-lived client the process owns
///
/// Built once at startup in dependency order and torn down explicitly by
/// [`Services::shutdown`].
pub struct Services {
    pub state: AppState,
    cache: RedisCache,
    analytics: Arc<AnalyticsWriter>,
}

impl Services {
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let secrets = &config.secrets;

        info!("Connecting to Redis");
        let redis = RedisCache::connect(config.cache.redis_config(&secrets.redis_url))
            .await
            .context("failed to connect to Redis")?;
        let cache: Arc<dyn SessionCache> = Arc::new(redis.clone());

        info!("Connecting to MongoDB");
        let store = Arc::new(
            MongoConversationStore::connect(&config.mongodb.store_config(&secrets.mongodb_uri))
                .await
                .context("failed to connect to MongoDB")?,
        );

        info!("Connecting to PostgreSQL");
        let analytics_store = Arc::new(
            PgAnalyticsStore::connect(&config.postgres.store_config(&secrets.database_url))
                .await
                .context("failed to connect to PostgreSQL")?,
        );
        if config.postgres.migrate {
            analytics_store
                .migrate()
                .await
                .context("failed to create analytics tables")?;
        }
        let analytics = Arc::new(AnalyticsWriter::start(
            analytics_store.clone(),
            config.analytics.writer_config(),
        ));

        info!(provider = ?config.llm.provider, model = %config.llm.model, "Initializing completion provider");
        let provider = ProviderFactory::create(config.llm.provider_config(&secrets.llm_api_key))
            .context("failed to create completion provider")?;

        let tools = Arc::new(build_tools(&config.tools, secrets.search_api_key.clone())?);
        info!(tools = tools.len(), "Tool registry frozen");

        let orchestrator = Orchestrator::builder()
            .provider(provider)
            .tools(tools)
            .store(store.clone())
            .cache(cache.clone())
            .analytics(analytics.clone())
            .recent_messages(config.cache.recent_messages_config())
            .config(config.orchestrator.orchestrator_config(&config.llm))
            .build()?;

        let signature = match config.auth.algorithm {
            JwtAlgorithm::Rs256 => JwtSignatureVerifier::rsa_pem(secrets.jwt_key.as_bytes()),
            JwtAlgorithm::Es256 => JwtSignatureVerifier::ec_pem(secrets.jwt_key.as_bytes()),
            JwtAlgorithm::Hs256 => JwtSignatureVerifier::hmac_secret(secrets.jwt_key.as_bytes()),
        }
        .context("invalid JWT verification key")?;
        let verifier = TokenVerifier::new(Arc::new(signature), cache.clone(), config.auth.verifier_config());
        let limiter = RateLimiter::new(cache.clone(), config.rate_limit.limiter_config());

        let chat = ChatService::new(
            Arc::new(verifier),
            Arc::new(limiter),
            orchestrator,
            analytics.clone(),
        );

        Ok(Self {
            state: AppState::new(chat, store, analytics_store, cache),
            cache: redis,
            analytics,
        })
    }

    /// Drain queued analytics, then release the cache connection
    pub async fn shutdown(self) {
        let Self {
            state,
            cache,
            analytics,
        } = self;
        // the verifier, limiter and orchestrator hold cache clones
        drop(state);

        info!("Draining analytics writer");
        analytics.shutdown().await;
        cache.close().await;
        info!("Services stopped");
    }
}

pub fn build_tools(config: &ToolsConfig, search_api_key: Option<String>) -> anyhow::Result<ToolRegistry> {
    let mut builder = ToolRegistry::builder();

    if config.calculator {
        builder = builder.register(Arc::new(CalculatorTool::new()))?;
    }
    if config.current_time {
        builder = builder.register(Arc::new(CurrentTimeTool::new()))?;
    }
    if let Some(endpoint) = &config.web_search_endpoint {
        let search = WebSearchTool::new(WebSearchConfig {
            endpoint: endpoint.clone(),
            api_key: search_api_key,
            timeout_secs: config.web_search_timeout_secs,
        })?;
        builder = builder.register(Arc::new(search))?;
    }
    if let Some(endpoint) = &config.retrieval_endpoint {
        let backend = Arc::new(HttpRetrievalBackend::new(endpoint));
        builder = builder.register(Arc::new(RetrievalLookupTool::new(
            backend,
            Duration::from_secs(config.retrieval_timeout_secs),
        )))?;
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronochat_types::TurnMode;

    #[test]
    fn test_default_tools() {
        let registry = build_tools(&ToolsConfig::default(), None).unwrap();
        assert!(registry.contains("calculator"));
        assert!(registry.contains("current_time"));
        assert!(!registry.contains("web_search"));
        assert!(!registry.contains("retrieval_lookup"));
    }

    #[test]
    fn test_configured_backends_are_registered() {
        let config = ToolsConfig {
            web_search_endpoint: Some("http://localhost:9000/search".to_string()),
            retrieval_endpoint: Some("http://localhost:9001/lookup".to_string()),
            ..ToolsConfig::default()
        };
        let registry = build_tools(&config, Some("key".to_string())).unwrap();
        assert_eq!(registry.len(), 4);

        let retrieval: Vec<String> = registry
            .descriptors(TurnMode::Retrieval)
            .into_iter()
            .map(|tool| tool.function.name)
            .collect();
        assert!(retrieval.contains(&"retrieval_lookup".to_string()));
    }
}
