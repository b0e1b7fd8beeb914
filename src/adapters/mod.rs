pub mod api;
pub mod db;
pub mod markers;
pub mod schedule_file;
pub mod telegram;
pub mod yasno;
