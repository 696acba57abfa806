//! Harvest Core
//!
//! Core types shared by the Harvest crawl scheduler.
//!
//! This crate contains:
//! - Domain types: sites, run records, crawled records and schedule rules

pub mod domain;
