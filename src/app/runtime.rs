use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use reqwest::blocking::Client;

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::markers::SqliteMarkerStore;
use crate::adapters::schedule_file::ScheduleFileSource;
use crate::adapters::telegram::TelegramNotifier;
use crate::adapters::yasno::{ScheduleSource, YasnoClient};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::power::PowerStatusReconciler;
use crate::app::schedule::{ScheduleReconciler, ScheduleSettings, start_schedule_poller};
use crate::app::services::PowerStatusService;
use crate::domain::clock::SystemClock;

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let mut connection = open_connection(&config.db_path).map_err(AppError::database_init)?;
    run_migrations(&mut connection).map_err(AppError::database_init)?;
    let markers = SqliteMarkerStore::new(Arc::new(Mutex::new(connection)));

    // Built outside the actix system; the blocking client owns its own runtime.
    let client = TelegramNotifier::build_client(Duration::from_secs(config.http_timeout_secs))
        .map_err(AppError::runtime)?;

    let power_notifier = TelegramNotifier::new(
        client.clone(),
        &config.telegram_api_base_url,
        &config.telegram_bot_token,
        &config.telegram_channel_id,
    );
    let power_service = PowerStatusService::new(
        PowerStatusReconciler::new(power_notifier, markers.clone()),
        SystemClock,
        config.timezone,
    );
    let api_state = ApiState {
        power: Arc::new(power_service),
        markers: Arc::new(markers.clone()),
        api_token: config.api_token.clone(),
    };

    let stop_flag = Arc::new(AtomicBool::new(false));
    let poller_handle = if config.schedule.enabled {
        Some(start_poller(&config, client.clone(), markers, &stop_flag)?)
    } else {
        tracing::info!("schedule monitoring disabled");
        None
    };

    tracing::info!(bind = %config.http_bind, "http server starting");

    let http_bind = config.http_bind.clone();
    let server_result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(api_state.clone()))
                .configure(configure_routes)
        })
        .bind(&http_bind)?
        .run()
        .await
    });

    stop_flag.store(true, Ordering::Relaxed);
    if let Some(handle) = poller_handle
        && handle.join().is_err()
    {
        return Err(AppError::runtime("schedule poller thread panicked"));
    }
    drop(client);

    server_result.map_err(AppError::runtime)
}

fn start_poller(
    config: &AppConfig,
    client: Client,
    markers: SqliteMarkerStore,
    stop_flag: &Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AppError> {
    let schedule = &config.schedule;
    let source: Box<dyn ScheduleSource> = match &schedule.debug_file {
        Some(path) => {
            tracing::info!(path = %path, "replaying outage schedules from debug file");
            Box::new(ScheduleFileSource::from_file(path).map_err(AppError::config)?)
        }
        None => Box::new(YasnoClient::new(
            client.clone(),
            &schedule.api_base_url,
            schedule.region_id,
            schedule.dso_id,
        )),
    };

    let notifier = TelegramNotifier::new(
        client,
        &config.telegram_api_base_url,
        &config.telegram_bot_token,
        &config.telegram_schedule_channel_id,
    );
    let settings = ScheduleSettings {
        group: schedule.group.clone(),
        timezone: config.timezone,
        changes_start_hour: schedule.changes_start_hour,
        tomorrow_start_hour: schedule.tomorrow_start_hour,
    };

    tracing::info!(
        group = %settings.group,
        interval_secs = schedule.check_interval_secs,
        changes_start_hour = settings.changes_start_hour,
        tomorrow_start_hour = settings.tomorrow_start_hour,
        "schedule monitoring started"
    );

    let reconciler = ScheduleReconciler::new(source, notifier, markers, SystemClock, settings);
    Ok(start_schedule_poller(
        reconciler,
        Duration::from_secs(schedule.check_interval_secs),
        Arc::clone(stop_flag),
    ))
}
