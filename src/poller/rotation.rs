//! User agent rotation
//!
//! Picks the identity each request is sent with. Sequential rotation walks the
//! list in order and wraps; random rotation never picks the same entry twice
//! in a row when there is more than one to choose from.

use rand::seq::SliceRandom;
use rand::Rng;

/// How the next user agent is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    Sequential,
    Random,
}

impl RotationMode {
    pub fn from_random_flag(random: bool) -> Self {
        if random {
            Self::Random
        } else {
            Self::Sequential
        }
    }
}

/// Rotation state owned by a single poller
#[derive(Debug, Clone)]
pub struct UserAgentRotator {
    user_agents: Vec<String>,
    mode: RotationMode,
    last_index: Option<usize>,
}

impl UserAgentRotator {
    pub fn new(user_agents: Vec<String>, mode: RotationMode) -> Self {
        Self {
            user_agents,
            mode,
            last_index: None,
        }
    }

    /// Returns the user agent for the next request and remembers its index
    ///
    /// An empty string means no `User-Agent` header should be sent.
    pub fn next(&mut self) -> String {
        let (user_agent, index) = next_user_agent(&self.user_agents, self.mode, self.last_index);
        self.last_index = index;
        user_agent
    }

    /// Index of the last user agent handed out, if any
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    pub fn mode(&self) -> RotationMode {
        self.mode
    }
}

/// Selects the next user agent given the previous selection
///
/// # Arguments
///
/// * `user_agents` - Candidates, possibly empty
/// * `mode` - Sequential or random selection
/// * `last` - Index returned by the previous call, `None` on the first call
///
/// # Returns
///
/// The selected user agent and its index. With no candidates the index stays
/// `None`; sequential mode then yields an empty string and random mode a
/// generated browser user agent.
pub fn next_user_agent(
    user_agents: &[String],
    mode: RotationMode,
    last: Option<usize>,
) -> (String, Option<usize>) {
    if user_agents.is_empty() {
        return match mode {
            RotationMode::Sequential => (String::new(), None),
            RotationMode::Random => (generate_user_agent(), None),
        };
    }

    let len = user_agents.len();
    let index = match mode {
        RotationMode::Sequential => last.map_or(0, |last| (last % len + 1) % len),
        RotationMode::Random => {
            let mut rng = rand::thread_rng();
            let mut index = rng.gen_range(0..len);
            while len > 1 && Some(index) == last {
                index = rng.gen_range(0..len);
            }
            index
        }
    };

    (user_agents[index].clone(), Some(index))
}

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

/// Builds a plausible desktop browser user agent with randomized versions
pub fn generate_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);

    match rng.gen_range(0..3) {
        0 => {
            let major = rng.gen_range(110..=131);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36"
            )
        }
        1 => {
            let major = rng.gen_range(110..=132);
            format!("Mozilla/5.0 ({platform}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0")
        }
        _ => {
            let major = rng.gen_range(110..=131);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36 Edg/{major}.0.0.0"
            )
        }
    }
}
