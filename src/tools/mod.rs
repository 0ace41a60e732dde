//! Tool descriptors: the uniform shape every capability is exposed in.

pub mod arguments;
pub mod dynamic;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use dynamic::{bind_dynamic_tool, provider_descriptors, DynamicTool, DynamicToolProvider};
pub use tool::{Tool, ToolDescriptor, ToolExecutionContext, ToolOrigin};
pub use types::{ParameterBuilder, ToolParameters};
pub use validation::validate_arguments;
