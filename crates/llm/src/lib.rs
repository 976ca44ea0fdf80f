pub mod gateway;
pub mod provider;
pub mod providers;

pub use gateway::{GatewayError, GatewayOptions, ModelGateway};
pub use provider::{LlmError, LlmProvider, Message, Role};
pub use providers::{create_provider, create_provider_with};
