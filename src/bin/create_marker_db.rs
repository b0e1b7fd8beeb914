use light_bot::adapters::db::{
    delete_marker, list_markers, open_connection, run_migrations, schema_version,
};

struct Options {
    path: String,
    reset: Vec<String>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("marker db setup failed: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args()? else {
        return Ok(());
    };

    let mut connection = open_connection(&options.path).map_err(|error| error.to_string())?;
    run_migrations(&mut connection).map_err(|error| error.to_string())?;

    for key in &options.reset {
        delete_marker(&connection, key).map_err(|error| error.to_string())?;
        println!("reset marker {key}");
    }

    let version = schema_version(&connection).map_err(|error| error.to_string())?;
    println!("{} at schema version {version}", options.path);
    for marker in list_markers(&connection).map_err(|error| error.to_string())? {
        println!("  {} = {} (updated {})", marker.key, marker.value, marker.updated_at);
    }
    Ok(())
}

fn parse_args() -> Result<Option<Options>, String> {
    let mut options = Options {
        path: std::env::var("DB_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "light_bot.db".to_string()),
        reset: Vec::new(),
    };

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--path" | "--reset" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("{flag} requires a value"))?;
                if flag == "--path" {
                    options.path = value;
                } else {
                    options.reset.push(value);
                }
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(Some(options))
}

fn print_help() {
    println!("create_marker_db");
    println!();
    println!("Migrates the marker database and lists the stored markers.");
    println!();
    println!("Usage:");
    println!("  cargo run --bin create_marker_db -- [--path <file>] [--reset <key>]...");
    println!();
    println!("Options:");
    println!("  --path <file>   sqlite file (default: $DB_PATH or light_bot.db)");
    println!("  --reset <key>   delete a marker, e.g. schedule.fingerprint, before listing");
}
