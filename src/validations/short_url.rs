use chrono::{DateTime, Utc};
use url::Url;
use validator::ValidationError;

/// Validates that a URL string is properly formatted and uses http/https
pub fn validate_url(url_str: &str) -> Result<(), ValidationError> {
    let url = Url::parse(url_str).map_err(|_| invalid("invalid_url", "Invalid URL format"))?;

    if url.host().is_none() {
        return Err(invalid("url_without_host", "URL must have a host"));
    }

    // Only accept HTTP and HTTPS URLs
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("url_scheme", "URL scheme must be http or https"));
    }

    Ok(())
}

/// Validates that a date is in the future
pub fn validate_future_date(date: &DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if *date <= now {
        return Err(invalid("date_in_past", "Date must be in the future"));
    }

    Ok(())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}
