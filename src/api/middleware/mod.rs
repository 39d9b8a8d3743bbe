//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter
//! 2. Auth validator (injects `Actor`)
//! 3. Audit logger

pub mod audit;
pub mod auth;
pub mod rate;
