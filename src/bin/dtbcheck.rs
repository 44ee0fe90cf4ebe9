// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! dtbcheck: validate a DTB against a chip schema and sign it.

use std::{
    fs::{self, File},
    io::{self, BufReader, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use bupkit::{
    chip::{Chip, ChipTables},
    logger,
};
use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "dtbcheck", version, about = "Validate and sign a device tree blob")]
struct Args {
    /// Target chip
    #[arg(short, long, value_enum)]
    chip: Chip,

    /// Signed DTB destination (stdout if absent)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// JSON file replacing the built-in chip tables
    #[arg(long, value_name = "FILE")]
    chip_params: Option<PathBuf>,

    /// Print the parsed tree to stderr before checking
    #[arg(long)]
    dump: bool,

    /// Log more (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log less (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// DTB to check
    input: PathBuf,
}

fn load_tables(args: &Args) -> Result<ChipTables> {
    let Some(path) = &args.chip_params else {
        return Ok(args.chip.tables());
    };

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    ChipTables::from_json(BufReader::new(file)).with_context(|| format!("Invalid chip parameters in {}", path.display()))
}

#[cfg(feature = "pretty-printing")]
fn dump(data: &[u8]) -> Result<()> {
    let tree = bupkit::DeviceTree::parse(data)?;
    eprintln!("{tree}");
    Ok(())
}

#[cfg(not(feature = "pretty-printing"))]
fn dump(_: &[u8]) -> Result<()> {
    anyhow::bail!("--dump requires the pretty-printing feature")
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(logger::verbosity(args.verbose, args.quiet))?;

    let data = fs::read(&args.input).with_context(|| format!("Failed to read {}", args.input.display()))?;
    let tables = load_tables(&args)?;

    if args.dump {
        dump(&data)?;
    }

    let signed = bupkit::dtbcheck(&data, args.chip, &tables)
        .with_context(|| format!("{} failed the {} check", args.input.display(), args.chip))?;

    match &args.output {
        Some(path) => {
            fs::write(path, &signed).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("wrote {} ({} bytes)", path.display(), signed.len());
        }
        None => io::stdout().lock().write_all(&signed)?,
    }

    Ok(())
}
