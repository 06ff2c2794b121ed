use crate::node::NodeType;
use crate::state::TurnState;

/// Decides which node runs next based on the current state
pub trait Router: Send + Sync {
    fn next(&self, state: &TurnState, current: NodeType) -> NextNode;
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextNode {
    LLM,
    Tool,
    End,
}

/// LLM -> Tool (while tool calls are pending and rounds remain) -> LLM -> End
pub struct SimpleRouter {
    max_tool_rounds: usize,
}

impl SimpleRouter {
    pub fn new(max_tool_rounds: usize) -> Self {
        Self { max_tool_rounds }
    }
}

impl Router for SimpleRouter {
    fn next(&self, state: &TurnState, current: NodeType) -> NextNode {
        match current {
            NodeType::LLM => {
                if state.has_pending_tool_calls() && state.tool_rounds < self.max_tool_rounds {
                    NextNode::Tool
                } else {
                    NextNode::End
                }
            }
            NodeType::Tool => NextNode::LLM,
        }
    }
}
