pub mod config;
mod error;
mod logging;
pub mod power;
mod runtime;
pub mod schedule;
pub mod services;

pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        db_path = %config.db_path,
        http_bind = %config.http_bind,
        timezone = %config.timezone,
        channel = %config.telegram_channel_id,
        schedule_channel = %config.telegram_schedule_channel_id,
        schedule_enabled = config.schedule.enabled,
        group = %config.schedule.group,
        "application bootstrap initialized"
    );

    runtime::run(config)
}

pub fn init_logging() -> Result<(), AppError> {
    logging::init()
}
