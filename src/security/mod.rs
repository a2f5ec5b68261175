//! Guard rails around the relay
//!
//! - `policy` - capability boundary for commands and file writes
//! - `rate_limit` - token bucket in front of the chat endpoint
//!
//! # Layers
//!
//! ```text
//! POST /ai/chat ──► RateLimiter ──► Orchestrator ──► ToolRegistry
//!                     (429)                             │
//!                                                       ▼
//!                                               CommandPolicy
//!                                      allow-list · workspace root · timeout
//! ```

pub mod policy;
pub mod rate_limit;

pub use policy::{normalize_path, CommandPolicy, PolicyViolation};
pub use rate_limit::{RateLimitError, RateLimiter};
