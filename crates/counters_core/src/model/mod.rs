//! Counter domain model.
//!
//! # Responsibility
//! - Define the registry record (`Counter`) and its aggregate view.
//! - Define how arbitrary application records identify themselves as
//!   counter owners (`Counterable`, `OwnerRef`).
//!
//! # Invariants
//! - `Counter::key` is globally unique and immutable after creation.
//! - An attachment value is independent of its counter's own `value`.

pub mod counter;
pub mod counterable;
