//! Transcript change notifications.

pub mod bus;
