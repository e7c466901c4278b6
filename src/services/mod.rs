//! External collaborators the gateway calls into.
//!
//! The client directory resolves `X-Client-Id` values into client records.

pub mod directory;
