//! Model Context Protocol plumbing over the `rmcp` SDK.

pub mod client;
pub mod schema;
pub mod session;
pub mod transport;

pub use client::{MCPClient, MCPConnectionState, MCPToolCallResult};
pub use schema::{
    MCPPromptArgument, MCPPromptMessage, MCPPromptResult, MCPPromptRole, MCPPromptSchema,
    MCPResourceContent, MCPResourceSchema, MCPToolSchema,
};
pub use session::{MCPConnector, MCPSession, RmcpConnector};
pub use transport::{HttpTransport, MCPTransport, StdioTransport};
