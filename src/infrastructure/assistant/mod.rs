//! Resume assistant infrastructure - chat completion clients

mod chat_completion;
mod http_client;

pub use chat_completion::{ChatCompletionAssistant, ChatCompletionProvider};
pub use http_client::{HttpClient, HttpClientTrait};
