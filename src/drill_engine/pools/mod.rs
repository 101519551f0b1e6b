//! One generator per pool archetype, grouped by strand.
//!
//! Every generator has the shape `fn(ctx, spec, count[, sequential]) -> Vec<Question>`
//! and never fails: impossible constraints give a short (possibly empty)
//! batch, never a panic or an endless loop.

pub mod addition;
pub mod multiplication;
pub mod subtraction;
pub mod written;
