//! Provider adapters: the reply stream decoder and the HTTP transport.

pub mod decoder;
pub mod http;

pub use decoder::ReplyFrameStream;
pub use http::{HttpExchangeTransport, QUOTA_EXHAUSTED_SENTINEL};
