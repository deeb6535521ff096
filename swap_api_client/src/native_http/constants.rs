use std::time::Duration;

pub const CONTENT_TYPE_HEADER_LOWERCASE: &str = "content-type";
pub const CONTENT_TYPE_VALUE: &str = "application/json";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
