pub mod client;
pub mod types;

pub use client::GoogleClient;
pub use types::{AuthSession, CallbackParams, GoogleProfile};
