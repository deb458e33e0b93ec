/// Default proxy URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Default upstream host id
pub const DEFAULT_HOST_ID: &str = "1";

/// Read buffer used when hashing local files
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;
