//! Page configuration resolution
//!
//! Method and URL problems are fatal: the page cannot be polled at all.
//! Everything else (frequency, offset range, headers, user agents) is
//! corrected to a working default and reported through the log instead.

use crate::config::types::{PageConfig, PollOptions, UserAgentOptions};
use crate::ConfigError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Method;
use std::collections::BTreeMap;
use std::time::Duration;
use url::{ParseError, Url};

/// Lowest accepted polling frequency, in seconds
pub const MIN_FREQUENCY_SECS: u64 = 5;

/// Highest accepted polling frequency, in seconds (one week)
pub const MAX_FREQUENCY_SECS: u64 = 7 * 24 * 60 * 60;

/// Frequency used when none (or an unusable one) is configured
pub const DEFAULT_FREQUENCY_SECS: u64 = 30;

/// Lowest accepted offset range, in seconds
pub const MIN_OFFSET_RANGE_SECS: u64 = 5;

/// Offset range used when random polling is requested without a usable one
pub const DEFAULT_OFFSET_RANGE_SECS: u64 = 10;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

const KNOWN_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
];

/// Resolved timing for a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPlan {
    /// Whether each interval is drawn at random around `frequency`
    pub randomized: bool,

    /// Base interval between polls
    pub frequency: Duration,

    /// Half-width of the random window; zero for fixed polling
    pub offset_range: Duration,
}

impl PollPlan {
    fn fixed(frequency_secs: u64) -> Self {
        Self {
            randomized: false,
            frequency: Duration::from_secs(frequency_secs),
            offset_range: Duration::ZERO,
        }
    }

    fn randomized(frequency_secs: u64, offset_secs: u64) -> Self {
        Self {
            randomized: true,
            frequency: Duration::from_secs(frequency_secs),
            offset_range: Duration::from_secs(offset_secs),
        }
    }
}

impl Default for PollPlan {
    fn default() -> Self {
        Self::fixed(DEFAULT_FREQUENCY_SECS)
    }
}

/// A page configuration after every field has been resolved
#[derive(Debug, Clone)]
pub struct ValidatedPage {
    pub id: String,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub user_agents: Vec<String>,
    pub random_ua: bool,
    pub plan: PollPlan,
}

/// Resolves a raw page configuration
///
/// # Returns
///
/// * `Ok(ValidatedPage)` - The page with defaults applied
/// * `Err(ConfigError)` - The method is not recognized or the URL is unusable
pub fn validate_page(page: &PageConfig) -> Result<ValidatedPage, ConfigError> {
    let id = resolve_id(page.id.as_deref());
    let method = resolve_method(page.method.as_deref())?;
    let url = resolve_url(&page.url)?;
    let headers = resolve_headers(&id, &page.headers);
    let (random_ua, user_agents) = resolve_user_agents(&id, page.user_agent_options.as_ref());
    let plan = resolve_poll_plan(&id, page.poll_options.as_ref());

    Ok(ValidatedPage {
        id,
        method,
        url,
        headers,
        user_agents,
        random_ua,
        plan,
    })
}

/// Returns the configured id, or a freshly generated one if it is absent or blank
pub fn resolve_id(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

/// Resolves an HTTP method name, case-insensitively
///
/// An absent or empty method means GET.
pub fn resolve_method(raw: Option<&str>) -> Result<Method, ConfigError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Method::GET),
        Some(raw) => raw,
    };

    KNOWN_METHODS
        .iter()
        .find(|method| method.as_str().eq_ignore_ascii_case(raw))
        .cloned()
        .ok_or_else(|| ConfigError::UnrecognizedMethod(raw.to_string()))
}

/// Parses the page URL, which must be absolute
///
/// The returned URL is normalized by the parser: the host is lowercased and
/// an empty path becomes `/`. Any scheme is accepted here; schemes the HTTP
/// client cannot speak fail on each poll instead.
pub fn resolve_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| match e {
        ParseError::RelativeUrlWithoutBase => ConfigError::MissingScheme(raw.to_string()),
        source => ConfigError::InvalidUrl {
            url: raw.to_string(),
            source,
        },
    })
}

/// Builds the request headers, skipping entries that are not valid HTTP
pub fn resolve_headers(id: &str, raw: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(raw.len() + 1);

    for (name, value) in raw {
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .ok()
            .zip(HeaderValue::from_str(value).ok());

        match parsed {
            Some((name, value)) => {
                headers.append(name, value);
            }
            None => {
                tracing::warn!(id, header = %name, "Skipping invalid header");
            }
        }
    }

    if headers.is_empty() {
        tracing::debug!(id, "No headers configured, sending a default Accept header");
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    }

    headers
}

/// Resolves the user agent list and whether to pick from it at random
pub fn resolve_user_agents(id: &str, options: Option<&UserAgentOptions>) -> (bool, Vec<String>) {
    let Some(options) = options else {
        return (false, Vec::new());
    };

    if options.random_ua && options.user_agents.is_empty() {
        tracing::warn!(
            id,
            "Random user agents requested without a list, a generated one will be used per request"
        );
    }

    (options.random_ua, options.user_agents.clone())
}

/// Resolves the polling schedule
///
/// Never fails: values below the minimum are replaced by defaults and
/// frequencies above [`MAX_FREQUENCY_SECS`] are capped. When random
/// polling would allow an interval shorter than the minimum frequency, both
/// frequency and offset range fall back to their defaults.
pub fn resolve_poll_plan(id: &str, options: Option<&PollOptions>) -> PollPlan {
    let Some(options) = options else {
        return PollPlan::default();
    };

    let frequency = match u64::try_from(options.frequency) {
        Ok(frequency) if frequency > MAX_FREQUENCY_SECS => {
            tracing::info!(
                id,
                configured = options.frequency,
                "Frequency above {}s, using {}s",
                MAX_FREQUENCY_SECS,
                MAX_FREQUENCY_SECS
            );
            MAX_FREQUENCY_SECS
        }
        Ok(frequency) if frequency >= MIN_FREQUENCY_SECS => frequency,
        _ => {
            tracing::info!(
                id,
                configured = options.frequency,
                "Frequency below {}s, using {}s",
                MIN_FREQUENCY_SECS,
                DEFAULT_FREQUENCY_SECS
            );
            DEFAULT_FREQUENCY_SECS
        }
    };

    if !options.random_frequency {
        return PollPlan::fixed(frequency);
    }

    let offset = match options.offset_range.map(u64::try_from) {
        Some(Ok(offset)) if offset >= MIN_OFFSET_RANGE_SECS => offset,
        _ => {
            tracing::info!(
                id,
                configured = ?options.offset_range,
                "Offset range missing or below {}s, using {}s",
                MIN_OFFSET_RANGE_SECS,
                DEFAULT_OFFSET_RANGE_SECS
            );
            DEFAULT_OFFSET_RANGE_SECS
        }
    };

    if frequency.saturating_sub(offset) < MIN_FREQUENCY_SECS {
        tracing::warn!(
            id,
            frequency,
            offset,
            "Offset range would allow polls closer than {}s, using {}s +/- {}s",
            MIN_FREQUENCY_SECS,
            DEFAULT_FREQUENCY_SECS,
            DEFAULT_OFFSET_RANGE_SECS
        );
        return PollPlan::randomized(DEFAULT_FREQUENCY_SECS, DEFAULT_OFFSET_RANGE_SECS);
    }

    PollPlan::randomized(frequency, offset)
}
