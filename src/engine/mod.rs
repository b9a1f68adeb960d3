//! Engine modules: the part that turns resolved settings into disk writes.
//!
//! The engine sits between the resolver (what the settings should be) and the
//! collaborators that touch the system (config backend, join tools, service
//! manager). It computes an ordered plan, then executes it.

pub mod write;
