//! Page polling
//!
//! This module contains the polling machinery, including:
//! - The shared HTTP client and the transport seam
//! - User agent rotation
//! - Fixed and jittered poll scheduling with cooperative cancellation
//! - The per-page poller tying them together

mod client;
mod page;
pub mod rotation;
pub mod scheduler;

pub use client::{build_http_client, RequestTemplate, Transport, DEFAULT_REQUEST_TIMEOUT};
pub use page::{Handler, PagePoller, PollResult, Poller};
pub use rotation::{next_user_agent, RotationMode, UserAgentRotator};
pub use scheduler::Schedule;
