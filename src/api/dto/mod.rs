//! Data Transfer Objects for REST request/response serialization.
//!
//! Query structs keep every field as an optional string and validate it
//! explicitly, so bad input renders as the engine's JSON error body.

pub mod common_dto;
pub mod job_dto;
pub mod recommendation_dto;
pub mod trending_dto;

pub use common_dto::*;
pub use job_dto::*;
pub use recommendation_dto::*;
pub use trending_dto::*;
