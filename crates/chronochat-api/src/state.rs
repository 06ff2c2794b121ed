use chronochat_cache::SessionCache;
use chronochat_graph::ChatService;
use chronochat_persist::{AnalyticsStore, ConversationStore};
use std::sync::Arc;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub store: Arc<dyn ConversationStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub cache: Arc<dyn SessionCache>,
}

impl AppState {
    pub fn new(
        chat: ChatService,
        store: Arc<dyn ConversationStore>,
        analytics: Arc<dyn AnalyticsStore>,
        cache: Arc<dyn SessionCache>,
    ) -> Self {
        Self {
            chat: Arc::new(chat),
            store,
            analytics,
            cache,
        }
    }
}
