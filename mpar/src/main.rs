mod cli;
mod commands;
mod error;
mod util;

use anyhow::Context;
use structopt::StructOpt;
use tracing::Level;

use cli::{CliOpts, Commands};

fn run(opts: CliOpts) -> anyhow::Result<()> {
    let settings = opts.settings();

    match opts.cmd {
        Commands::Append {
            path,
            files,
            recursive,
            force,
        } => commands::append(&settings, &path, &files, recursive, force)
            .with_context(|| format!("append to `{}` failed", path.display()))?,
        Commands::Create {
            path,
            files,
            recursive,
            force,
        } => commands::create(&settings, &path, &files, recursive, force)
            .with_context(|| format!("create `{}` failed", path.display()))?,
        Commands::List { path, json } => commands::list(&settings, &path, json)
            .with_context(|| format!("list `{}` failed", path.display()))?,
        Commands::Extract {
            path,
            output,
            files,
        } => commands::extract(&settings, &path, output, &files, opts.verbose)
            .with_context(|| format!("extract `{}` failed", path.display()))?,
        Commands::Delete { path, files } => commands::delete(&settings, &path, &files)
            .with_context(|| format!("delete from `{}` failed", path.display()))?,
        Commands::Test { path } => {
            if let Err(e) = commands::test(&settings, &path) {
                if let Err(err) = commands::test::report_status(&e, std::io::stderr()) {
                    tracing::warn!(%err, "cannot write archive status");
                }
                return Err(e).with_context(|| format!("test `{}` failed", path.display()));
            }
        }
    };

    Ok(())
}

fn main() {
    let opts = CliOpts::from_iter(wild::args_os());

    let level = if opts.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(opts) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}
