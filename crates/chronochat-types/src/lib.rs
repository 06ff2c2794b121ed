pub mod claims;
pub mod message;
pub mod thread;
pub mod turn;
pub mod usage;

pub use claims::Claims;
pub use message::{Message, NewMessage, Role, SequenceRange, ToolTrace};
pub use thread::{NewThread, Thread};
pub use turn::{TurnInput, TurnMode, TurnOutcome};
pub use usage::{period_key, RequestLog, SessionRecord, UsageCounter, UsageDelta, UsageIncrement};
