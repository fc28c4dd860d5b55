pub mod anthropic_client;
pub mod local_client;
pub mod openai_client;
pub mod provider_factory;

pub use anthropic_client::AnthropicClient;
pub use local_client::LocalModelClient;
pub use openai_client::OpenAiClient;
pub use provider_factory::build_provider;
