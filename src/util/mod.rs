//! Helpers consumed by the presentation layer.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route components should apply identical admit/redirect behavior, so the
//! decision lives here rather than in each view.

pub mod gate;
