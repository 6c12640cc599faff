use std::time::Duration;

// Compiled-in bounds. Requests outside them are rejected before any work
// happens, so a bad client cannot make the engine allocate unbounded memory.

/// Grid step used when a query does not specify one.
pub const DEFAULT_GRANULARITY_MINUTES: i64 = 15;

pub const MIN_GRANULARITY_MINUTES: i64 = 5;

pub const MAX_GRANULARITY_MINUTES: i64 = 240;

/// Longest service a salon can define.
pub const MAX_SERVICE_DURATION_MINUTES: i64 = 480;

/// How far ahead the customer surface lets you book.
pub const CUSTOMER_HORIZON_DAYS: i64 = 30;

/// How far ahead the staff surface lets you book.
pub const STAFF_HORIZON_DAYS: i64 = 14;

pub const MAX_HORIZON_DAYS: i64 = 365;

/// Cap on candidates a single day query may produce.
pub const MAX_SLOTS_PER_QUERY: usize = 2_000;

pub const MAX_SHIFTS_PER_DAY: usize = 16;

pub const MAX_CUSTOMER_LEN: usize = 256;

/// Widest day window a reconciler will mirror.
pub const MAX_WINDOW_DAYS: i64 = 92;

/// Bounded fan-out per provider; slow subscribers see `Lagged` and resync.
pub const FEED_CHANNEL_CAPACITY: usize = 256;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Pause before a dropped or failed subscription is retried.
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
