use crate::config::OrchestratorConfig;
use crate::error::TurnError;
use crate::locks::ThreadLocks;
use crate::nodes::{LLMNode, ToolNode};
use crate::orchestrator::{Inner, Orchestrator};
use crate::router::SimpleRouter;
use crate::tokens::TokenCounter;
use chronochat_cache::{RecentMessages, RecentMessagesConfig, SessionCache};
use chronochat_llm::CompletionProvider;
use chronochat_persist::{AnalyticsWriter, ConversationStore};
use chronochat_tools::ToolRegistry;
use std::sync::Arc;

/// Builder for an [`Orchestrator`] and its collaborators
pub struct OrchestratorBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    tools: Option<Arc<ToolRegistry>>,
    store: Option<Arc<dyn ConversationStore>>,
    cache: Option<Arc<dyn SessionCache>>,
    analytics: Option<Arc<AnalyticsWriter>>,
    recent: RecentMessagesConfig,
    tokens: Option<TokenCounter>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: None,
            store: None,
            cache: None,
            analytics: None,
            recent: RecentMessagesConfig::default(),
            tokens: None,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn analytics(mut self, writer: Arc<AnalyticsWriter>) -> Self {
        self.analytics = Some(writer);
        self
    }

    pub fn recent_messages(mut self, config: RecentMessagesConfig) -> Self {
        self.recent = config;
        self
    }

    pub fn token_counter(mut self, tokens: TokenCounter) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator, TurnError> {
        let provider = self
            .provider
            .ok_or_else(|| TurnError::Internal("completion provider is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| TurnError::Internal("conversation store is required".into()))?;
        let cache = self
            .cache
            .ok_or_else(|| TurnError::Internal("session cache is required".into()))?;
        let analytics = self
            .analytics
            .ok_or_else(|| TurnError::Internal("analytics writer is required".into()))?;
        let tools = self.tools.unwrap_or_else(|| Arc::new(ToolRegistry::empty()));
        let tokens = self.tokens.unwrap_or_default();
        let config = self.config;

        let llm_node = LLMNode::new(
            Arc::clone(&provider),
            Arc::clone(&tools),
            config.generate_options,
            config.retry,
            config.provider_timeout,
        );
        let tool_node = ToolNode::new(tools, tokens.clone());

        Ok(Orchestrator::from_inner(Inner {
            provider,
            store,
            recent: RecentMessages::new(cache, self.recent),
            analytics,
            tokens,
            locks: ThreadLocks::new(),
            llm_node,
            tool_node,
            router: SimpleRouter::new(config.max_tool_rounds),
            config,
        }))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
