// Pool / executor constants (ADR: No magic values)
use std::time::Duration;

/// Upper bound on concurrent connections
pub const DEFAULT_POOL_MAX_SIZE: usize = 20;

/// Floor maintained by the reaper
pub const DEFAULT_POOL_MIN_SIZE: usize = 5;

/// Idle time after which a connection may be reaped (60s)
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Wait for a free slot or a new session in acquire() (10s)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Per-attempt statement deadline (15s)
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Reaper scan interval (30s)
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// How long shutdown waits for checked-out connections to come back (5s)
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff base: delay = 2^attempt * base + jitter
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound of the random jitter added to each backoff
pub const RETRY_MAX_JITTER: Duration = Duration::from_millis(500);

/// Occupancy above which the pool reports saturation (percent of max_size)
pub const SATURATION_OCCUPANCY_PERCENT: usize = 80;

/// Bound on closing a session; a driver stuck behind a running statement is
/// abandoned after this long (5s)
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest accepted timeout or interval setting (24h)
pub const MAX_CONFIGURED_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
