//! Shared protocol and engine constants

/// Wire protocol version. Decoding a header with any other value is a hard
/// failure that ends the session.
pub const PROTOCOL_VERSION: i32 = 125;

/// Numeric identifier meaning "no host id assigned".
pub const INVALID_ID: i32 = -1;

/// Hardware instancing limit: one instanced draw never carries more than
/// this many transforms. Overflow is split into multiple batches.
pub const MAX_INSTANCES_PER_BATCH: usize = 1023;

/// Default capacity of the decode-thread -> engine snapshot queue.
pub const SNAPSHOT_QUEUE_CAPACITY: usize = 64;
