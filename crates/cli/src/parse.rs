//! ArgMatches → CliAction conversion.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ArgMatches;
use ldata_core::{now_unix, NotificationRecord};
use ldata_durability::MaxAge;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Globals {
    /// Base file name override
    pub file_name: Option<String>,
    /// Trace reader decisions
    pub debug: bool,
}

/// The result of parsing the command line.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Publish one record.
    Write {
        dir: PathBuf,
        record: NotificationRecord,
        queue_only: bool,
    },
    /// Read once.
    Read {
        dir: PathBuf,
        max_age: MaxAge,
        forced: bool,
        json: bool,
    },
    /// Poll and print until interrupted or `count` notifications arrived.
    Watch {
        dir: PathBuf,
        max_age: MaxAge,
        interval: Duration,
        from_start: bool,
        checkpoint: Option<String>,
        count: Option<u64>,
        json: bool,
    },
}

/// Extract the global options.
pub fn globals(matches: &ArgMatches) -> Globals {
    Globals {
        file_name: matches.get_one::<String>("file-name").cloned(),
        debug: matches.get_flag("debug"),
    }
}

/// Convert parsed arguments into an action.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("write", sub)) => parse_write(sub),
        Some(("read", sub)) => Ok(CliAction::Read {
            dir: dir(sub),
            max_age: max_age(sub),
            forced: sub.get_flag("forced"),
            json: sub.get_flag("json"),
        }),
        Some(("watch", sub)) => Ok(CliAction::Watch {
            dir: dir(sub),
            max_age: max_age(sub),
            interval: Duration::from_millis(
                sub.get_one::<u64>("interval-ms").copied().unwrap_or(1000),
            ),
            from_start: sub.get_flag("from-start"),
            checkpoint: sub.get_one::<String>("checkpoint").cloned(),
            count: sub.get_one::<u64>("count").copied(),
            json: sub.get_flag("json"),
        }),
        Some((other, _)) => Err(format!("Unknown command: {}", other)),
        None => Err("No command given".to_string()),
    }
}

fn dir(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("dir")
        .map(PathBuf::from)
        .unwrap_or_default()
}

fn max_age(matches: &ArgMatches) -> MaxAge {
    MaxAge::from_secs(matches.get_one::<i64>("max-age").copied().unwrap_or(-1))
}

fn parse_write(matches: &ArgMatches) -> Result<CliAction, String> {
    let dir = dir(matches);
    let mut record = NotificationRecord::new();

    if let Some(file_path) = matches.get_one::<String>("from-path") {
        let file_path = Path::new(file_path);
        let file_path = if file_path.is_absolute() {
            file_path.to_path_buf()
        } else {
            dir.join(file_path)
        };
        record
            .set_path_and_time(&dir, &file_path)
            .map_err(|e| e.to_string())?;
    } else {
        record.set_latest_time(matches.get_one::<i64>("time").copied().unwrap_or_else(now_unix));
        if let Some(rel) = matches.get_one::<String>("rel-path") {
            record.set_rel_data_path(rel.as_str());
        }
    }

    if let Some(ext) = matches.get_one::<String>("ext") {
        record.set_data_file_ext(ext.as_str());
    }
    if let Some(writer) = matches.get_one::<String>("writer") {
        record.set_writer(writer.as_str());
    }
    if let Some(data_type) = matches.get_one::<String>("data-type") {
        record.set_data_type(data_type.as_str());
    }
    if let Some(info) = matches.get_one::<String>("info1") {
        record.set_user_info1(info.as_str());
    }
    if let Some(info) = matches.get_one::<String>("info2") {
        record.set_user_info2(info.as_str());
    }
    if let Some(lead) = matches.get_one::<i32>("lead") {
        record.set_forecast(*lead);
    }

    Ok(CliAction::Write {
        dir,
        record,
        queue_only: matches.get_flag("queue-only"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_cli;

    fn parse(args: &[&str]) -> CliAction {
        let matches = build_cli().try_get_matches_from(args).unwrap();
        matches_to_action(&matches).unwrap()
    }

    #[test]
    fn test_write_fields() {
        let action = parse(&[
            "ldata", "write", "/data", "--time", "1577836800", "--rel-path",
            "20200101/000000.nc", "--ext", "nc", "--writer", "ingest", "--lead", "600",
        ]);
        let CliAction::Write { dir, record, queue_only } = action else {
            panic!("expected write");
        };
        assert_eq!(dir, PathBuf::from("/data"));
        assert!(!queue_only);
        assert_eq!(record.latest_time(), 1577836800);
        assert_eq!(record.rel_data_path(), Some("20200101/000000.nc"));
        assert_eq!(record.writer(), Some("ingest"));
        assert_eq!(record.forecast_lead_secs(), 600);
    }

    #[test]
    fn test_write_from_path() {
        let action = parse(&["ldata", "write", "/data", "--from-path", "20200101/123000.nc"]);
        let CliAction::Write { record, .. } = action else {
            panic!("expected write");
        };
        assert_eq!(record.rel_data_path(), Some("20200101/123000.nc"));
        assert_eq!(record.data_file_ext(), Some("nc"));
        assert_eq!(record.latest_time(), 1577881800);
    }

    #[test]
    fn test_read_negative_max_age() {
        assert_eq!(
            parse(&["ldata", "read", "/data", "--max-age", "-1", "--json"]),
            CliAction::Read {
                dir: PathBuf::from("/data"),
                max_age: MaxAge::Any,
                forced: false,
                json: true,
            }
        );
    }

    #[test]
    fn test_watch_defaults_and_globals() {
        let matches = build_cli()
            .try_get_matches_from(["ldata", "watch", "/d", "--max-age", "60", "--debug"])
            .unwrap();
        assert_eq!(
            globals(&matches),
            Globals {
                file_name: None,
                debug: true
            }
        );
        assert_eq!(
            matches_to_action(&matches).unwrap(),
            CliAction::Watch {
                dir: PathBuf::from("/d"),
                max_age: MaxAge::Secs(60),
                interval: Duration::from_millis(1000),
                from_start: false,
                checkpoint: None,
                count: None,
                json: false,
            }
        );
    }

    #[test]
    fn test_checkpoint_conflicts_with_from_start() {
        let result = build_cli().try_get_matches_from([
            "ldata", "watch", "/d", "--from-start", "--checkpoint", "x",
        ]);
        assert!(result.is_err());
    }
}
