mod short_url;

pub use short_url::{validate_future_date, validate_url};
