//! apiwire HTTP and JSONP transport adapters.
//!
//! Implements [`pipeline::HttpTransport`] and [`pipeline::JsonpTransport`] on
//! top of `reqwest`. Register them on a client builder:
//!
//! ```ignore
//! let client = Client::builder(config)
//!     .http(ReqwestHttp::new()?)
//!     .jsonp(ReqwestJsonp::new()?)
//!     .build()?;
//! ```
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All network I/O, header handling, timeouts and body
//! decoding live here. The [`pipeline`] crate sees only the port traits.

mod error;
mod http;
mod jsonp;

pub use error::HttpTransportError;
pub use http::ReqwestHttp;
pub use jsonp::ReqwestJsonp;
