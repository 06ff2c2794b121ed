use crate::error::TurnError;
use crate::state::TurnState;
use async_trait::async_trait;

/// One step of the turn state machine
#[async_trait]
pub trait Node: Send + Sync {
    async fn execute(&self, state: &mut TurnState) -> Result<(), TurnError>;

    fn node_type(&self) -> NodeType;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    LLM,
    Tool,
}
