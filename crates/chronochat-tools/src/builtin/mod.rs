mod calculator;
mod clock;
mod retrieval;
mod web_search;

pub use calculator::{evaluate, CalculatorTool};
pub use clock::CurrentTimeTool;
pub use retrieval::{HttpRetrievalBackend, RetrievalBackend, RetrievalLookupTool, RetrievedPassage};
pub use web_search::{SearchResult, WebSearchConfig, WebSearchTool};
