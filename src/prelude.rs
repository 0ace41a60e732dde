//! Convenience re-exports for common use.

pub use crate::config::{ClientTarget, ServerConfig, ToolkitConfig, ToolkitMode, TransportKind};
pub use crate::error::{Result, ToolkitError};
pub use crate::factory::MCPToolFactory;
pub use crate::services::{ConnectionState, MCPClientService, MCPServerService, ServerState, ToolBody};
pub use crate::toolkit::Toolkit;
pub use crate::tools::{Tool, ToolArguments, ToolDescriptor, ToolOrigin, ToolParameters};
pub use crate::types::{ContentPart, ModelMessage, Role};
