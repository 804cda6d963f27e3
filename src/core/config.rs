use std::env;

use chrono_tz::Tz;

use crate::query::DEFAULT_MAX_RADIUS_METERS;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub base_uri: String,
    pub local_timezone: Tz,
    /// Drop meetings without a valid time zone instead of assuming
    /// `local_timezone`
    pub require_timezone: bool,
    pub request_timeout_secs: u64,
    pub max_radius_meters: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base_uri = env::var("MEETDIR_BASE_URI")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/entrypoint.php".to_string());
        let local_timezone = env::var("MEETDIR_LOCAL_TIMEZONE")
            .or_else(|_| env::var("TZ"))
            .ok()
            .and_then(|tz| parse_timezone(&tz))
            .unwrap_or(Tz::UTC);
        let require_timezone = env::var("MEETDIR_REQUIRE_TIMEZONE")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);
        let request_timeout_secs = env::var("MEETDIR_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let max_radius_meters = env::var("MEETDIR_MAX_RADIUS_METERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RADIUS_METERS);

        Self {
            base_uri,
            local_timezone,
            require_timezone,
            request_timeout_secs,
            max_radius_meters,
        }
    }
}

/// Accepts IANA names, including the `:Area/City` form `TZ` allows.
pub fn parse_timezone(value: &str) -> Option<Tz> {
    value.trim().trim_start_matches(':').parse().ok()
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
