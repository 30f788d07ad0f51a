// crates/capgate-core/src/core/mod.rs
// ============================================================================
// Module: Capgate Core Model
// Description: Core model modules for identity, capability, and isolation.
// Purpose: Group the gateway's data model and security logic.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! Core model modules. Leaves first: identifiers and time carry no logic,
//! crypto is pure, and the stateful pieces (grants, namespace) reach storage
//! only through [`crate::interfaces`].

pub mod capability;
pub mod crypto;
pub mod grants;
pub mod identifiers;
pub mod namespace;
pub mod principal;
pub mod records;
pub mod time;
