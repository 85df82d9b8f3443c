//! Observability subsystem.
//!
//! Only structured logging (see [`logging`]); the resolver emits events through
//! `tracing` and the binary decides where they go.

pub mod logging;
