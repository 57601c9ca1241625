//! Data Transfer Objects for REST request/response serialization.

pub mod player_dto;

pub use player_dto::*;
