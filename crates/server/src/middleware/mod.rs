//! HTTP middleware.

mod rate_limit;

pub use rate_limit::{Decision, RateLimiter, client_ip, rate_limit};
