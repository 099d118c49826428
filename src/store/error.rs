use crate::model::{BookingId, Ms};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// End not after start.
    InvalidInterval { start: Ms, end: Ms },
    /// Overlaps an existing booking of the same room.
    Conflict(BookingId),
    NotFound(BookingId),
    /// The mirror could not be read or written. Memory was left untouched.
    Persistence(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidInterval { start, end } => {
                write!(f, "invalid interval [{start}, {end}): end must be after start")
            }
            StoreError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Persistence(e) => write!(f, "mirror error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
