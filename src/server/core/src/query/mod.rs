/* src/server/core/src/query/mod.rs */

pub mod client;
pub mod manager;
pub mod replay;
pub mod ssr;
pub mod web;

pub use client::{data_url, Fetcher, QueryFn, StaticClient};
pub use manager::QueryManager;
pub use replay::{FetchedRequest, ReplayLog};
pub use ssr::SsrStaticClient;
pub use web::WebStaticClient;
