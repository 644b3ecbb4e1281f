#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (provider payloads and hashes), records.rs (content records and file lists).

pub mod fixtures;
pub mod records;
