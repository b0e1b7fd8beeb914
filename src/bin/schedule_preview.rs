use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use light_bot::adapters::schedule_file::ScheduleFileSource;
use light_bot::adapters::yasno::{self, ScheduleSource, YasnoClient};
use light_bot::domain::schedule::ScheduleFingerprint;
use light_bot::domain::schedule_format::{Framing, render_schedule_message};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

struct Options {
    group: String,
    timezone: Tz,
    base_url: String,
    region_id: u32,
    dso_id: u32,
    file: Option<String>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("schedule preview failed: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args()? else {
        return Ok(());
    };
    light_bot::app::init_logging().map_err(|error| error.to_string())?;

    let source: Box<dyn ScheduleSource> = match &options.file {
        Some(path) => Box::new(ScheduleFileSource::from_file(path).map_err(|e| e.to_string())?),
        None => {
            let client = reqwest::blocking::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .map_err(|error| format!("failed to build http client: {error}"))?;
            Box::new(YasnoClient::new(
                client,
                &options.base_url,
                options.region_id,
                options.dso_id,
            ))
        }
    };

    let snapshot = source.fetch().map_err(|error| error.to_string())?;
    let Some(group) = snapshot.group(&options.group) else {
        let known: Vec<&str> = snapshot.groups.keys().map(String::as_str).collect();
        return Err(format!(
            "group {} not found; available: {}",
            options.group,
            known.join(", ")
        ));
    };

    let now = Utc::now().with_timezone(&options.timezone);
    let today_fingerprint = ScheduleFingerprint::compute(&options.group, &group.today.slots);
    let tomorrow_fingerprint = ScheduleFingerprint::compute(&options.group, &group.tomorrow.slots);

    println!("group: {}", options.group);
    if let Some(updated_on) = group.updated_on {
        println!("updated on: {updated_on}");
    }
    println!(
        "today ({}, {}): {}",
        group.today.date,
        group.today.status,
        today_fingerprint.as_str()
    );
    println!(
        "tomorrow ({}, {}): {}",
        group.tomorrow.date,
        group.tomorrow.status,
        tomorrow_fingerprint.as_str()
    );
    println!();
    println!(
        "{}",
        render_schedule_message(&options.group, &group.today, Framing::Today, &now)
    );
    println!();
    println!(
        "{}",
        render_schedule_message(&options.group, &group.tomorrow, Framing::Tomorrow, &now)
    );
    Ok(())
}

fn parse_args() -> Result<Option<Options>, String> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

    let mut options = Options {
        group: env("YASNO_GROUP").unwrap_or_else(|| "2.1".to_string()),
        timezone: chrono_tz::Europe::Kyiv,
        base_url: env("YASNO_API_BASE_URL").unwrap_or_else(|| yasno::DEFAULT_API_BASE_URL.to_string()),
        region_id: 25,
        dso_id: 902,
        file: env("YASNO_DEBUG_FILE"),
    };
    if let Some(name) = env("TIMEZONE") {
        options.timezone = parse_timezone(&name)?;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        if matches!(flag, "--help" | "-h") {
            print_help();
            return Ok(None);
        }

        let Some(value) = args.get(index + 1) else {
            return Err(format!("{flag} requires a value"));
        };
        match flag {
            "--group" => options.group = value.clone(),
            "--timezone" => options.timezone = parse_timezone(value)?,
            "--base-url" => options.base_url = value.clone(),
            "--region" => options.region_id = parse_id(flag, value)?,
            "--dso" => options.dso_id = parse_id(flag, value)?,
            "--file" => options.file = Some(value.clone()),
            other => return Err(format!("unknown argument: {other}")),
        }
        index += 2;
    }

    Ok(Some(options))
}

fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| format!("unknown timezone: {name}"))
}

fn parse_id(flag: &str, value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{flag} must be a number"))
}

fn print_help() {
    println!("schedule_preview");
    println!();
    println!("Fetches the outage schedule once and prints the messages that would be sent.");
    println!();
    println!("Usage:");
    println!("  cargo run --bin schedule_preview -- [options]");
    println!();
    println!("Options:");
    println!("  --group <id>        outage group (default: $YASNO_GROUP or 2.1)");
    println!("  --timezone <name>   IANA timezone (default: $TIMEZONE or Europe/Kyiv)");
    println!("  --base-url <url>    schedule API base url");
    println!("  --region <id>       region id (default: 25)");
    println!("  --dso <id>          distribution operator id (default: 902)");
    println!("  --file <path>       replay a debug script instead of calling the API");
}
