mod analytics;
mod conversation;

pub use analytics::MemoryAnalyticsStore;
pub use conversation::MemoryConversationStore;
