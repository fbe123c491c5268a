//! Background tasks and scheduled jobs.
//!
//! - [`token_sweep`] -- hourly purge of token records past their refresh expiry.

pub mod token_sweep;
