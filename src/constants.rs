//! Global constants for the gallery bridge

/// Maximum number of holders allowed to display a large image at once
pub const DEFAULT_LARGE_IMAGE_CAPACITY: usize = 5;

/// Soft per-frame budget for draining service responses, in milliseconds
pub const DEFAULT_DRAIN_BUDGET_MS: u64 = 8;

/// Drain time above which a diagnostic is logged, in milliseconds
pub const DEFAULT_DRAIN_WARNING_MS: u64 = 16;

/// Completed decode jobs collected per tick
pub const DEFAULT_DECODE_RESULTS_PER_TICK: usize = 1;

/// First request id issued by the threaded service (0 is reserved)
pub const FIRST_REQUEST_ID: u64 = 1;

/// Name of the background image decoding thread
pub const DECODER_THREAD_NAME: &str = "image-decoder";

/// Name of the background data service thread
pub const SERVICE_THREAD_NAME: &str = "gallery-service";
