//! Scheduled playback.
//!
//! - [`cron`] - trigger expression parser and next-fire computation
//! - [`clock`] - wall clock abstraction, swapped for a manual clock in tests
//! - [`engine`] - the [`ScheduleEngine`] and its active-timer registry

pub mod clock;
pub mod cron;
pub mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cron::{CronExpression, CronParser};
pub use engine::ScheduleEngine;
