use std::path::PathBuf;
use structopt::clap::AppSettings;
use structopt::StructOpt;

use crate::engine::TimeField;

/// A command typed during a session, one per line.
#[derive(Debug, StructOpt)]
#[structopt(name = "daysheet", setting = AppSettings::NoBinaryName)]
pub enum Command {
    /// Append a task starting right after the last one.
    Add,
    /// Remove a task by position. Later tasks move up.
    #[structopt(alias = "remove")]
    Rm {
        #[structopt()]
        position: u32,
    },
    /// Set a time field of a task. Invalid values count as 0 and are
    /// clamped to the field's range.
    #[structopt(setting = AppSettings::AllowLeadingHyphen)]
    Set {
        #[structopt()]
        position: u32,

        /// start-hour, start-minute, end-hour or end-minute.
        #[structopt()]
        field: TimeField,

        #[structopt()]
        value: String,
    },
    /// Name a task. An empty name clears it.
    #[structopt(setting = AppSettings::AllowLeadingHyphen)]
    Name {
        #[structopt()]
        position: u32,

        #[structopt()]
        name: Vec<String>,
    },
    /// Show the sheet preview and the total duration.
    #[structopt(alias = "ls")]
    List,
    /// Show the total duration.
    Total,
    /// Save the schedule as a spreadsheet.
    Export {
        /// Save into this directory instead of the configured one.
        #[structopt(parse(from_os_str), short, long)]
        dir: Option<PathBuf>,
    },
    /// End the session.
    #[structopt(alias = "exit")]
    Quit,
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "Daysheet",
    about = "A hyper-minimalistic daily schedule builder."
)]
pub struct CommandLineArgs {
    /// Directory the schedule spreadsheet is exported to.
    #[structopt(parse(from_os_str), short, long, env = "DAYSHEET_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Diagnostics filter, written to stderr. RUST_LOG takes precedence.
    #[structopt(long, env = "DAYSHEET_LOG", default_value = "warn")]
    pub log_level: String,
}
