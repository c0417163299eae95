//! Response header policy for cached assets.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// `max-age` sent with every asset: one year.
pub const ASSET_MAX_AGE: Duration = Duration::from_secs(31_536_000);

/// Default distance of the `Expires` header from now: about two years.
pub const DEFAULT_EXPIRES: Duration = Duration::from_secs(63_113_852);

/// Public `Cache-Control` policy for a served asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl {
    /// Value of the `max-age` directive.
    pub max_age: Duration,
}

impl CacheControl {
    /// Converts to a Cache-Control header value.
    pub fn to_header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&format!("public, max-age={}", self.max_age.as_secs()))
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
    }

    /// Cache control for built asset groups.
    pub fn for_assets() -> Self {
        Self {
            max_age: ASSET_MAX_AGE,
        }
    }
}

impl Default for CacheControl {
    fn default() -> Self {
        Self::for_assets()
    }
}

/// Formats a timestamp as an HTTP date header value.
pub fn http_date(time: &DateTime<Utc>) -> HeaderValue {
    HeaderValue::from_str(&satchel_core::format_http_date(time))
        .unwrap_or_else(|_| HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"))
}

/// Returns true if `Accept-Encoding` lists gzip with a non-zero quality.
///
/// `*` is not treated as gzip acceptance.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| {
            let mut params = token.split(';');
            let coding = params.next().unwrap_or_default().trim();
            let is_gzip = coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip");
            is_gzip && quality(params) > 0.0
        })
}

fn quality<'a>(params: impl Iterator<Item = &'a str>) -> f32 {
    params
        .filter_map(|p| {
            let (name, value) = p.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("q")
                .then(|| value.trim().parse::<f32>().unwrap_or(1.0))
        })
        .next()
        .unwrap_or(1.0)
}

/// Parses `If-Modified-Since`, if present and well formed.
pub fn if_modified_since(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(satchel_core::parse_http_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_cache_control_for_assets() {
        let value = CacheControl::for_assets().to_header_value();
        assert_eq!(value.to_str().unwrap(), "public, max-age=31536000");
    }

    #[test]
    fn test_cache_control_custom_max_age() {
        let value = CacheControl {
            max_age: Duration::from_secs(60),
        }
        .to_header_value();
        assert_eq!(value.to_str().unwrap(), "public, max-age=60");
    }

    #[test]
    fn test_if_modified_since_obsolete_formats() {
        let expected = Some(Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap());
        for value in ["Sunday, 06-Nov-94 08:49:37 GMT", "Sun Nov  6 08:49:37 1994"] {
            let mut headers = HeaderMap::new();
            headers.insert(header::IF_MODIFIED_SINCE, HeaderValue::from_static(value));
            assert_eq!(if_modified_since(&headers), expected, "{value}");
        }
    }

    #[test]
    fn test_accepts_gzip() {
        assert!(accepts_gzip(&accept("gzip, deflate, br")));
        assert!(accepts_gzip(&accept("deflate, GZIP;q=0.5")));
        assert!(accepts_gzip(&accept("x-gzip")));
    }

    #[test]
    fn test_gzip_refused() {
        assert!(!accepts_gzip(&HeaderMap::new()));
        assert!(!accepts_gzip(&accept("identity")));
        assert!(!accepts_gzip(&accept("br, *")));
        assert!(!accepts_gzip(&accept("gzip;q=0")));
        assert!(!accepts_gzip(&accept("gzip; q=0.0, deflate")));
    }

    #[test]
    fn test_http_date() {
        let time = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        assert_eq!(http_date(&time).to_str().unwrap(), "Wed, 21 Oct 2015 07:28:00 GMT");
    }

    #[test]
    fn test_if_modified_since() {
        let mut headers = HeaderMap::new();
        assert!(if_modified_since(&headers).is_none());

        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(
            if_modified_since(&headers),
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
        );

        headers.insert(header::IF_MODIFIED_SINCE, HeaderValue::from_static("yesterday"));
        assert!(if_modified_since(&headers).is_none());
    }
}
