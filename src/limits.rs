use crate::model::Ms;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;

pub const MAX_OWNER_FIELD_LEN: usize = 256;
pub const MAX_ROOM_LEN: usize = 64;
pub const MAX_BOOKING_ID_LEN: usize = 128;

pub const MAX_SITE_NAME_LEN: usize = 64;
pub const MAX_SITES: usize = 1024;

/// Bound on the mirror writer's command queue. Mutations are serialized, so
/// in practice at most one snapshot is ever in flight.
pub const MIRROR_QUEUE_DEPTH: usize = 16;
