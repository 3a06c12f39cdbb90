//! Core domain types
//!
//! This module contains the domain structures shared between the client
//! seam and the monitor. These represent the fundamental entities of a
//! monitoring run: the jobs being shepherded, the jobsets they were born
//! from, the manifests their output is validated against, and the final
//! outcome of a run.

pub mod job;
pub mod jobset;
pub mod manifest;
pub mod outcome;
