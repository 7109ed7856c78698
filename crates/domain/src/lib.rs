//! # fleethub-domain
//!
//! Pure domain model for the fleethub device fleet manager.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (remote endpoints with a stable hardware identifier,
//!   declared capabilities, and observed state)
//! - Define **Scripts** (opaque command bodies owned by a device)
//! - Define **Queue entries** (positioned script references awaiting dispatch)
//! - Define **Commands** (named payloads gated by device capabilities)
//! - Define **Automations** (trigger → action rules)
//! - Define **Events** (append-only audit records)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod capability;
pub mod command;
pub mod device;
pub mod event;
pub mod queue;
pub mod script;
