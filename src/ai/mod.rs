/// Chat-completion client for the Nebula inference proxy.
///
/// # Architecture
///
/// - `builder` - turns user input and history into a `ChatRequest`
/// - `client` - sends requests, with the single-image fallback
/// - `transport` - HTTP seam (`Transport` trait, reqwest implementation)
/// - `error` - transport failures and the user-facing error taxonomy
///
/// # Usage
///
/// ```rust,no_run
/// use nebula_chat::ai::{NebulaClient, UserInput};
/// use nebula_chat::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let client = NebulaClient::from_config(&config)?;
/// let outcome = client
///     .chat(&config.model_id, UserInput::new("Hello!", &[]), &[])
///     .await?;
/// println!("{}", outcome.reply());
/// # Ok(())
/// # }
/// ```
mod builder;
mod client;
mod error;
mod transport;

pub use builder::{
    ChatRequestBuilder, DEFAULT_IMAGE_PROMPT, MAX_PRIMARY_IMAGES, SYSTEM_PROMPT, UserInput, build,
};
pub use client::{
    CHAT_COMPLETIONS_PATH, EMPTY_REPLY, NebulaClient, SendOutcome, reply_text, send_with_fallback,
};
pub use error::{ChatError, ChatResult, TransportError};
pub use transport::{HttpTransport, Transport};
