//! Status codes for navigation mesh queries

/// Reason a navigation mesh query was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Provided parameter was invalid
    InvalidParam,
    /// Value does not exist or is not found
    NotFound,
}

impl std::error::Error for Status {}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::InvalidParam => write!(f, "Invalid parameter"),
            Status::NotFound => write!(f, "Value not found"),
        }
    }
}

impl From<Status> for movemap_common::Error {
    fn from(status: Status) -> Self {
        movemap_common::Error::Query(status.to_string())
    }
}
