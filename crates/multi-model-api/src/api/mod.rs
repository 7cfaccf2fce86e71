//! HTTP handlers for the model routes and the informational routes.

pub mod admin_api;
pub mod blocking;
pub mod dispatcher;
pub mod embedding_api;
pub mod error;
pub mod generate_api;
pub mod reranker_api;

pub use admin_api::{health, home};
pub use embedding_api::embedding;
pub use error::ApiError;
pub use generate_api::generate;
pub use reranker_api::rerank;
