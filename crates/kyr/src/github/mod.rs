//! GitHub REST API host.

mod host;
pub mod request;
mod types;

pub use host::{DEFAULT_API_URL, GitHub, page_count};
pub use request::{FetchRequest, RequestKind, RequestScope};
