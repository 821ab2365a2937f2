//! Networking against the session authority.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` issues the HTTP calls and `types` defines the wire schema plus the
//! shared error taxonomy.

pub mod api;
pub mod types;
