//! Live-update reconnection agent for Lagoon front ends.
//!
//! One agent runs per consuming front end. It dials the platform's SSE
//! endpoint, classifies each event into a refresh scope, and asks its
//! [`Refresher`] to re-fetch that scope (coarse-grained invalidation, not
//! incremental patching). The stream is a latency optimization only: when
//! it breaks, a fixed-interval full-refresh poll independently converges
//! the client, so a front end is never stranded on a dead stream.
//!
//! ```ignore
//! use lagoon_client::{AgentConfig, LiveUpdateAgent};
//!
//! let agent = LiveUpdateAgent::new(
//!     AgentConfig::new("http://localhost:3000/api/events"),
//!     refresher,
//! );
//! tokio::spawn(async move { agent.run().await });
//! ```

pub mod agent;

pub use agent::{AgentConfig, AgentError, LiveUpdateAgent, RefreshScope, Refresher};
