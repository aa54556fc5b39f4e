//! Tenants: the process-wide registry and per-tenant sessions.

pub mod registry;
pub mod session;
