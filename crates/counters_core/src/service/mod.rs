//! Core use-case services.
//!
//! # Responsibility
//! - `Counters`: the registry, with cache-fronted reads and marker-gated
//!   mutations.
//! - `OwnerCounters`: one owner's view over its attached counters.
//!
//! # Invariants
//! - Registry mutators are strict: an unknown key is `DoesNotExist`.
//! - Owner mutators attach the counter on first touch.
//! - Bulk operations are per-key and report unknown keys as `false`.

pub mod counter_service;
pub mod counterable_service;
