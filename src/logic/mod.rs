//! Logic modules: translate requested changes into resolved settings and
//! concrete actions.
//!
//! # Modules
//!
//! - `changes` - Request keys and the `ChangeSet` handed over by front ends
//! - `resolver` - Applies a `ChangeSet` to the working snapshot
//! - `services` - Daemon start/stop actions implied by the settings

pub mod changes;
pub mod resolver;
pub mod services;
