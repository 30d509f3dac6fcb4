//! Bootstrap step caching
//!
//! Decides per project whether its bootstrap step can be skipped because
//! nothing relevant changed since the last successful run.
//!
//! # Record Lifecycle
//!
//! | Moment | Action | Record afterwards |
//! |--------|--------|-------------------|
//! | Checksum phase | read + compare | unchanged |
//! | Before the step runs | invalidate | absent |
//! | After the step succeeds | commit | fresh fingerprint |
//! | Step fails or crashes | nothing | absent, so the next run retries |

pub mod fingerprint;
pub mod store;

pub use fingerprint::{Fingerprint, FingerprintComputer};
pub use store::{CacheDecision, CacheRecord, CacheStore, ProjectCache};
