/// Default root directory of the object store
pub const DEFAULT_DATA_DIR: &str = "proxy_data";

/// Default hosts file for the filesystem registry
pub const DEFAULT_HOSTS_FILE: &str = "hosts.json";

/// Default server host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_PORT: &str = "8080";

/// Registry type identifier for database
pub const REGISTRY_TYPE_DATABASE: &str = "db";

/// Registry type identifier for the hosts file (also used as the default registry type)
pub const REGISTRY_TYPE_FILESYSTEM: &str = "fs";

/// Largest request body buffered for batch requests and forwarded Git traffic (512 MiB)
pub const MAX_BUFFERED_BODY: usize = 512 * 1024 * 1024;

/// Content type of raw object bytes
pub const OCTET_STREAM: &str = "application/octet-stream";
