//! ldata: operator tool for latest-data notifications.
//!
//! - `ldata write <dir> ...`: publish a notification
//! - `ldata read <dir>`: read the latest notification once
//! - `ldata watch <dir>`: block and print notifications as they arrive
//!
//! Encodings and queue size follow the `LDATA_*` environment variables.
//! Logging goes to stderr and is filtered with `RUST_LOG`.

mod commands;
mod format;
mod parse;

use std::path::Path;
use std::process;

use ldata_durability::{
    LdataConfig, LdataPaths, NotificationReader, NotificationWriter, ReadOutcome,
};
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_no_new_data, format_notification, format_published, OutputMode};
use parse::{globals, matches_to_action, CliAction, Globals};

fn main() {
    let matches = build_cli().get_matches();
    let globals = globals(&matches);
    init_tracing(globals.debug);

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let config = LdataConfig::from_env().with_debug(globals.debug);
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        process::exit(2);
    }

    process::exit(run(action, &globals, config));
}

fn init_tracing(debug: bool) {
    let default = if debug { "ldata=debug" } else { "ldata=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn paths_for(dir: &Path, globals: &Globals) -> LdataPaths {
    let paths = LdataPaths::from_dir(dir);
    match &globals.file_name {
        Some(name) => paths.with_file_name(name.as_str()),
        None => paths,
    }
}

fn run(action: CliAction, globals: &Globals, config: LdataConfig) -> i32 {
    match action {
        CliAction::Write {
            dir,
            record,
            queue_only,
        } => {
            let mut writer = NotificationWriter::with_paths(paths_for(&dir, globals), config);
            let result = if queue_only {
                writer.publish_queue_only(&record)
            } else {
                writer.publish(&record).map(|_| None)
            };
            match result {
                Ok(queue_id) => {
                    println!("{}", format_published(&dir, &record, queue_id));
                    0
                }
                Err(e) => {
                    eprintln!("{}", e);
                    1
                }
            }
        }

        CliAction::Read {
            dir,
            max_age,
            forced,
            json,
        } => {
            let mode = OutputMode::from_json_flag(json);
            let mut reader = NotificationReader::with_paths(paths_for(&dir, globals), config);
            let result = if forced {
                reader.read_forced(max_age)
            } else {
                reader.read(max_age)
            };
            match result {
                Ok(ReadOutcome::NewData) => {
                    println!("{}", format_notification(&reader, mode));
                    0
                }
                Ok(ReadOutcome::NoNewData) => {
                    println!("{}", format_no_new_data(mode));
                    0
                }
                Err(e) => {
                    eprintln!("{}", e);
                    1
                }
            }
        }

        CliAction::Watch {
            dir,
            max_age,
            interval,
            from_start,
            checkpoint,
            count,
            json,
        } => {
            let mode = OutputMode::from_json_flag(json);
            let config = config.with_read_from_start(from_start);
            let mut reader = NotificationReader::with_paths(paths_for(&dir, globals), config);

            if let Some(label) = checkpoint {
                match reader.enable_checkpoint(&label, max_age) {
                    Ok(Some(id)) => info!(target: "ldata::cli", %label, id, "Resuming after checkpoint"),
                    Ok(None) => info!(target: "ldata::cli", %label, "No checkpoint, starting at latest"),
                    Err(e) => {
                        eprintln!("{}", e);
                        return 1;
                    }
                }
            }

            let mut seen = 0u64;
            loop {
                reader.read_blocking(max_age, interval, |label| {
                    trace!(target: "ldata::cli", label, "Waiting for data");
                });
                println!("{}", format_notification(&reader, mode));
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    return 0;
                }
            }
        }
    }
}
