//! Command handlers grouped by concern.

pub(crate) mod discovery;
pub(crate) mod session;
pub(crate) mod tail;
