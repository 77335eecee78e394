/// Look-ahead written in front of the playback cursor when none is configured.
pub const DEFAULT_LATENCY_MS: i32 = 100;

/// Ring depth (in multiples of the latency) when none is configured.
pub const DEFAULT_BUFFER_COUNT: i32 = 5;

/// Most buffers a voice accepts in its queue at once.
pub const MAX_QUEUED_BUFFERS: usize = 64;

/// Working buffer size used when streaming a clip to disk.
pub const EXPORT_CHUNK_BYTES: usize = 65536;
