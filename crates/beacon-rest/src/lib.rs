//! # beacon-rest
//!
//! The stateless HTTP side of the client. The gateway core never issues REST
//! calls itself; callers hydrate entities through [`RestClient::request`].
//!
//! - [`RestClient`]: `request(method, path, body?, headers?) -> JSON`
//! - [`HttpRestClient`]: `reqwest` implementation with bot authorization
//! - [`fetch_gateway_url`]: `GET /gateway/bot` discovery used when no gateway
//!   URL is configured

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod gateway;

pub use client::{HttpRestClient, RestClient};
pub use errors::RestError;
pub use gateway::{GatewayBot, SessionStartLimit, fetch_gateway_bot, fetch_gateway_url};
pub use reqwest::Method;
pub use reqwest::header::HeaderMap;
