//! The client and server services the toolkit composes.

pub mod client;
pub mod server;

pub use client::{ConnectionState, Listing, MCPClientService, ServerItem};
pub use server::{MCPServerService, ServerState, ServerStatus, ToolBody};
