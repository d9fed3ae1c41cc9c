//! quai-dash-rpc: HTTP and JSON-RPC transport for quai-dash.
//!
//! Every outbound request goes through [`HttpClient`], which applies the hard
//! per-attempt timeout, retries transport failures with exponential backoff
//! and maps failures onto [`CallError`]. [`RpcClient`] layers JSON-RPC 2.0
//! framing on top.

mod client;
mod error;
mod http;
mod message;
mod retry;

pub use client::RpcClient;
pub use error::{CallError, ErrorClass};
pub use http::{join_path, validate_endpoint, HttpClient, DEFAULT_TIMEOUT};
pub use message::{ErrorObject, Request, Response};
pub use retry::{retry_with_backoff, RetryPolicy};
