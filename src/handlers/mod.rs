pub mod access_log;
pub mod short_url;
