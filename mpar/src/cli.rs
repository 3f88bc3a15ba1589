use std::num::ParseIntError;
use std::path::PathBuf;

use mpar_format::SortMode;
use structopt::clap::AppSettings::*;
use structopt::StructOpt;

use crate::util::Settings;

#[derive(Debug)]
pub struct ParseSortModeError(String);

impl std::error::Error for ParseSortModeError {}

impl std::fmt::Display for ParseSortModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown sort mode: {} (expected name, line or none)", self.0)
    }
}

fn parse_sort_mode(src: &str) -> std::result::Result<SortMode, ParseSortModeError> {
    let mode = match src {
        "name" => SortMode::ByName,
        "line" => SortMode::ByLine,
        "none" | "unordered" => SortMode::Unordered,
        _ => return Err(ParseSortModeError(src.to_string())),
    };

    Ok(mode)
}

/// Comma separated ROT key, e.g. `1,2,-3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotKey(pub Vec<i32>);

fn parse_rot_key(src: &str) -> std::result::Result<RotKey, ParseIntError> {
    if src.trim().is_empty() {
        return Ok(RotKey(vec![]));
    }
    src.split(',')
        .map(|n| n.trim().parse::<i32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(RotKey)
}

#[derive(Debug, StructOpt)]
pub enum Commands {
    #[structopt(
        name = "a",
        visible_alias = "append",
        about = "Append files to an existing archive"
    )]
    Append {
        #[structopt(short, long, help = "Recursively handle provided paths")]
        recursive: bool,

        #[structopt(short, long, help = "Replace entries that already exist")]
        force: bool,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .mpar archive"
        )]
        path: PathBuf,

        #[structopt(
            name = "files",
            parse(from_os_str),
            help = "Files and directories to add"
        )]
        files: Vec<PathBuf>,
    },

    #[structopt(name = "c", visible_alias = "create", about = "Create a new archive")]
    Create {
        #[structopt(short, long, help = "Recursively handle provided paths")]
        recursive: bool,

        #[structopt(short, long, help = "Overwrite an existing archive")]
        force: bool,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .mpar archive"
        )]
        path: PathBuf,

        #[structopt(
            name = "files",
            parse(from_os_str),
            help = "Files and directories to add"
        )]
        files: Vec<PathBuf>,
    },

    #[structopt(name = "l", visible_alias = "list", about = "List files of an archive")]
    List {
        #[structopt(long, help = "Print the listing as JSON")]
        json: bool,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .mpar archive"
        )]
        path: PathBuf,
    },

    #[structopt(
        name = "x",
        visible_alias = "extract",
        about = "Extract files from an archive"
    )]
    Extract {
        #[structopt(
            short,
            long,
            parse(from_os_str),
            help = "Directory to extract into [default: current directory]"
        )]
        output: Option<PathBuf>,

        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .mpar archive"
        )]
        path: PathBuf,

        #[structopt(name = "files", help = "Entries to extract [default: all]")]
        files: Vec<String>,
    },

    #[structopt(
        name = "d",
        visible_alias = "delete",
        about = "Delete entries from an archive"
    )]
    Delete {
        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .mpar archive"
        )]
        path: PathBuf,

        #[structopt(name = "files", required = true, help = "Entries to delete")]
        files: Vec<String>,
    },

    #[structopt(
        name = "t",
        visible_alias = "test",
        about = "Verify every checksum of an archive"
    )]
    Test {
        #[structopt(
            name = "archive",
            parse(from_os_str),
            help = "Path to the .mpar archive"
        )]
        path: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "mpar",
    about = "Create, modify and extract MPAR portable text archives.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands],
    usage = "mpar (a|c|d|l|t|x) [FLAGS|OPTIONS] <archive> [files]..."
)]
pub struct CliOpts {
    #[structopt(short, long, help = "Show verbose output", global = true)]
    pub verbose: bool,

    #[structopt(
        long,
        value_name = "KEY",
        help = "XOR cipher key, taken as the bytes of the argument",
        global = true
    )]
    pub xor_key: Option<String>,

    #[structopt(
        long,
        value_name = "N,N,...",
        parse(try_from_str = parse_rot_key),
        help = "ROT cipher key as comma separated integers",
        global = true
    )]
    pub rot_key: Option<RotKey>,

    #[structopt(
        long,
        value_name = "MODE",
        parse(try_from_str = parse_sort_mode),
        default_value = "name",
        help = "Order of entries when writing: name, line or none",
        global = true
    )]
    pub sort: SortMode,

    #[structopt(
        long,
        help = "Reject archives with bytes outside the magic and footer",
        global = true
    )]
    pub strict: bool,

    #[structopt(subcommand)]
    pub cmd: Commands,
}

impl CliOpts {
    pub fn settings(&self) -> Settings {
        Settings {
            xor_key: self.xor_key.as_ref().map(|key| key.as_bytes().to_vec()),
            rot_key: self.rot_key.as_ref().map(|key| key.0.clone()),
            sort: self.sort,
            strict: self.strict,
        }
    }
}
