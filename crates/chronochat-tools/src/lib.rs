pub mod builtin;
pub mod capability;
pub mod error;
pub mod registry;

pub use capability::ToolCapability;
pub use error::{RegistrationError, ToolError};
pub use registry::{ToolListEntry, ToolRegistry, ToolRegistryBuilder};
