//! Common utilities shared by the movemap navigation mesh and the pathfinder

mod geometry;
mod vector;

pub use geometry::*;
pub use vector::*;

/// Error types for the movemap crates
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid navigation mesh: {0}")]
    InvalidMesh(String),

    #[error("navigation query failed: {0}")]
    Query(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for movemap operations
pub type Result<T> = std::result::Result<T, Error>;
