use tracing_subscriber::EnvFilter;

// ── Store metrics ───────────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "boardroom_bookings_created_total";

/// Counter: bookings updated.
pub const BOOKINGS_UPDATED_TOTAL: &str = "boardroom_bookings_updated_total";

/// Counter: bookings deleted.
pub const BOOKINGS_DELETED_TOTAL: &str = "boardroom_bookings_deleted_total";

/// Counter: mutations rejected for overlapping an existing booking. Labels: op.
pub const CONFLICTS_TOTAL: &str = "boardroom_conflicts_total";

/// Gauge: live bookings in the most recently touched store.
pub const BOOKINGS_ACTIVE: &str = "boardroom_bookings_active";

/// Histogram: full-snapshot mirror write duration in seconds.
pub const MIRROR_WRITE_DURATION_SECONDS: &str = "boardroom_mirror_write_duration_seconds";

/// Counter: failed mirror writes.
pub const MIRROR_FAILURES_TOTAL: &str = "boardroom_mirror_failures_total";

// ── Service metrics ─────────────────────────────────────────────

/// Counter: requests rejected before reaching the store. Labels: reason.
pub const VALIDATION_FAILURES_TOTAL: &str = "boardroom_validation_failures_total";

/// Gauge: sites with an open store.
pub const SITES_ACTIVE: &str = "boardroom_sites_active";

/// Install the fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
