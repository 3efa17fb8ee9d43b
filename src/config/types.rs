use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Website-Poller
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,

    /// Pages to poll, one `[[page]]` table each
    #[serde(rename = "page", default)]
    pub pages: Vec<PageConfig>,
}

/// Shared HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    crate::poller::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// A single page to poll
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageConfig {
    /// Short name used in logs and handler calls. A random one is generated
    /// when absent.
    #[serde(default)]
    pub id: Option<String>,

    /// URL to poll, must be absolute
    pub url: String,

    /// HTTP method, GET when absent
    #[serde(default)]
    pub method: Option<String>,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(rename = "user-agent-options", default)]
    pub user_agent_options: Option<UserAgentOptions>,

    #[serde(rename = "poll-options", default)]
    pub poll_options: Option<PollOptions>,
}

impl PageConfig {
    /// Creates a page config with only a URL; everything else takes its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// User agent options for a page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserAgentOptions {
    /// User agents to cycle through
    #[serde(rename = "user-agents", default)]
    pub user_agents: Vec<String>,

    /// Pick the next user agent at random instead of rotating in order
    #[serde(rename = "random-ua", default)]
    pub random_ua: bool,
}

/// Polling options for a page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollOptions {
    /// Polling frequency in seconds
    #[serde(default)]
    pub frequency: i64,

    /// Poll at a random time around `frequency` instead of a fixed period
    #[serde(rename = "random-frequency", default)]
    pub random_frequency: bool,

    /// Half-width of the random window in seconds. With a frequency of 30
    /// and an offset range of 10, polls land anywhere in [20, 40] seconds.
    #[serde(rename = "offset-range", default)]
    pub offset_range: Option<i64>,
}
