pub mod builder;
pub mod config;
pub mod error;
pub mod history;
pub mod locks;
pub mod node;
pub mod nodes;
pub mod orchestrator;
pub mod router;
pub mod service;
pub mod state;
pub mod tokens;

pub use builder::OrchestratorBuilder;
pub use config::{OrchestratorConfig, RetryPolicy, DEFAULT_SYSTEM_PROMPT};
pub use error::TurnError;
pub use locks::{ThreadGuard, ThreadLocks};
pub use node::{Node, NodeType};
pub use orchestrator::Orchestrator;
pub use router::{NextNode, Router, SimpleRouter};
pub use service::{ChatService, CHAT_OPERATION};
pub use state::{Phase, TurnState};
pub use tokens::TokenCounter;
