//! Core domain types
//!
//! This module contains the core domain structures used across Harvest crates.
//! Site definitions are loaded by the scheduler and handed to crawl handlers;
//! run records and schedule rules live entirely inside the scheduler.

pub mod record;
pub mod run;
pub mod schedule;
pub mod site;
