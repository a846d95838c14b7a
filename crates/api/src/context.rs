use std::time::Duration;

use axum::http::HeaderMap;

use catalog_infra::CallContext;

/// Caller-supplied per-request timeout, in milliseconds.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";
/// Correlation id echoed on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the call context for a request from its headers.
///
/// Without a timeout header the service default deadline applies.
pub fn call_context(headers: &HeaderMap) -> Result<CallContext, String> {
    let Some(raw) = headers.get(REQUEST_TIMEOUT_HEADER) else {
        return Ok(CallContext::background());
    };

    let millis: u64 = raw
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| format!("{REQUEST_TIMEOUT_HEADER} must be a whole number of milliseconds"))?;

    Ok(CallContext::with_timeout(Duration::from_millis(millis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_has_no_caller_deadline() {
        assert_eq!(call_context(&HeaderMap::new()).unwrap().deadline(), None);
    }

    #[test]
    fn timeout_header_sets_deadline() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_TIMEOUT_HEADER, HeaderValue::from_static("250"));
        assert!(call_context(&headers).unwrap().deadline().is_some());

        headers.insert(REQUEST_TIMEOUT_HEADER, HeaderValue::from_static("soon"));
        assert!(call_context(&headers).is_err());
    }
}
