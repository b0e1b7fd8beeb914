pub mod clock;
pub mod duration;
pub mod power_state;
pub mod schedule;
pub mod schedule_format;
