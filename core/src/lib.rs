//! Shared domain types and conversation-engine logic for Coachline services.
//!
//! Everything in this crate is pure: no I/O, no clocks, no stores. The api
//! crate wires these pieces to Postgres, the NL parser, and the exercise
//! matcher.

pub mod disambiguation;
pub mod error;
pub mod flows;
pub mod followup;
pub mod merge;
pub mod messages;
pub mod preferences;
pub mod steps;
pub mod update;
