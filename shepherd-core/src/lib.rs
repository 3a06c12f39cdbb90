//! Shepherd Core
//!
//! Core types for the shepherd grid-job babysitter.
//!
//! This crate contains:
//! - Domain types: the entities tracked across a monitoring run (Job,
//!   JobSet, Manifest, Outcome)
//!
//! Behavior lives elsewhere: the collaborator seams in `shepherd-client`,
//! the polling loop and its controllers in `shepherd-monitor`.

pub mod domain;
