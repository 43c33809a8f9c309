//! Clap command tree definition.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("ldata")
        .about("Publish and consume latest-data notifications")
        .subcommand_required(true)
        .arg(
            Arg::new("file-name")
                .long("file-name")
                .help("Notification base file name (default: latest_data_info)")
                .global(true),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Trace freshness decisions and fallbacks")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_write())
        .subcommand(build_read())
        .subcommand(build_watch())
}

fn dir_arg() -> Arg {
    Arg::new("dir")
        .help("Data directory")
        .required(true)
}

fn max_age_arg() -> Arg {
    Arg::new("max-age")
        .long("max-age")
        .help("Ignore files older than this many seconds, negative for no limit")
        .value_parser(value_parser!(i64))
        .allow_negative_numbers(true)
        .default_value("-1")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("JSON output")
        .action(ArgAction::SetTrue)
}

fn build_write() -> Command {
    Command::new("write")
        .about("Publish a notification")
        .arg(dir_arg())
        .arg(
            Arg::new("time")
                .long("time")
                .help("Data time, unix seconds (default: now)")
                .value_parser(value_parser!(i64)),
        )
        .arg(
            Arg::new("rel-path")
                .long("rel-path")
                .help("Data file path relative to the directory"),
        )
        .arg(
            Arg::new("from-path")
                .long("from-path")
                .help("Take the relative path, extension and time from a data file path")
                .conflicts_with_all(["rel-path", "time"]),
        )
        .arg(Arg::new("ext").long("ext").help("Data file extension"))
        .arg(Arg::new("writer").long("writer").help("Name of the publishing program"))
        .arg(Arg::new("data-type").long("data-type").help("Data type, e.g. mdv"))
        .arg(Arg::new("info1").long("info1").help("User info 1"))
        .arg(Arg::new("info2").long("info2").help("User info 2"))
        .arg(
            Arg::new("lead")
                .long("lead")
                .help("Forecast lead time in seconds")
                .value_parser(value_parser!(i32)),
        )
        .arg(
            Arg::new("queue-only")
                .long("queue-only")
                .help("Append to the queue only, without lock or text files")
                .action(ArgAction::SetTrue),
        )
}

fn build_read() -> Command {
    Command::new("read")
        .about("Read the latest notification once")
        .arg(dir_arg())
        .arg(max_age_arg())
        .arg(
            Arg::new("forced")
                .long("forced")
                .help("Re-read even if already seen")
                .action(ArgAction::SetTrue),
        )
        .arg(json_arg())
}

fn build_watch() -> Command {
    Command::new("watch")
        .about("Print notifications as they arrive")
        .arg(dir_arg())
        .arg(max_age_arg())
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .help("Poll interval in milliseconds")
                .value_parser(value_parser!(u64))
                .default_value("1000"),
        )
        .arg(
            Arg::new("from-start")
                .long("from-start")
                .help("Start at the oldest queued message")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("checkpoint")
                .long("checkpoint")
                .help("Resume from and save to a checkpoint with this label")
                .conflicts_with("from-start"),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .help("Exit after this many notifications")
                .value_parser(value_parser!(u64)),
        )
        .arg(json_arg())
}
