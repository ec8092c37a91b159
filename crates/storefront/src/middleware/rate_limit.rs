//! Rate limiting for the auth functions using governor and `tower_governor`.
//!
//! Login and registration are limited to ~10 requests per minute per client
//! IP. Other functions are left to the hosting layer.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor that reads the client IP from proxy headers.
///
/// Order: `CF-Connecting-IP`, first hop of `X-Forwarded-For`, `X-Real-IP`.
#[derive(Clone, Copy)]
pub struct ForwardedIpKeyExtractor;

const IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

impl tower_governor::key_extractor::KeyExtractor for ForwardedIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();
        IP_HEADERS
            .iter()
            .find_map(|name| {
                headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.split(',').next())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rejected limiter settings.
#[derive(Debug, thiserror::Error)]
#[error("invalid rate limiter settings: one token every {period_secs}s, burst {burst}")]
pub struct RateLimitError {
    pub period_secs: u64,
    pub burst: u32,
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ForwardedIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Build a limiter that replenishes one token every `period_secs` with room
/// for `burst` requests.
///
/// # Errors
///
/// Returns `RateLimitError` if either value is zero.
pub fn rate_limiter(period_secs: u64, burst: u32) -> Result<RateLimiterLayer, RateLimitError> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ForwardedIpKeyExtractor)
        .per_second(period_secs)
        .burst_size(burst)
        .finish()
        .ok_or(RateLimitError { period_secs, burst })?;
    Ok(GovernorLayer::new(Arc::new(config)))
}

/// Limiter for `auth-login` and `auth-register`: one token every 6 seconds,
/// burst of 5.
///
/// # Errors
///
/// Never fails with these constants; the `Result` is kept so callers treat
/// every limiter uniformly.
pub fn auth_rate_limiter() -> Result<RateLimiterLayer, RateLimitError> {
    rate_limiter(6, 5)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_extracts_first_forwarded_hop() {
        let req = request(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(
            ForwardedIpKeyExtractor.extract(&req).unwrap(),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let req = request(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("cf-connecting-ip", "198.51.100.2"),
        ]);
        assert_eq!(
            ForwardedIpKeyExtractor.extract(&req).unwrap(),
            "198.51.100.2".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_missing_ip_is_an_error() {
        assert!(ForwardedIpKeyExtractor.extract(&request(&[])).is_err());
    }

    #[test]
    fn test_zero_settings_rejected() {
        assert!(rate_limiter(0, 5).is_err());
        assert!(rate_limiter(6, 0).is_err());
        assert!(auth_rate_limiter().is_ok());
    }
}
