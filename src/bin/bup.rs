// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! bup: pack, inspect and extract bootloader update payload blobs.

use std::{
    fs::{self, File},
    io::BufReader,
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use bupkit::{
    bup::{self, BlobType, DEFAULT_MAX_ENTRIES},
    config::{self, PackEnv},
    logger,
};
use clap::Parser;
use log::{error, warn};

#[derive(Parser, Debug)]
#[command(name = "bup", version, about = "Generate or inspect bootloader update payload blobs")]
struct Args {
    /// Blob type to generate or inspect
    #[arg(short = 't', long, value_enum, default_value = "update")]
    blob_type: BlobType,

    /// Accessory bytes stored after the header
    #[arg(short = 'r', long, value_name = "FILE")]
    accessory: Option<PathBuf>,

    /// Entries separated by ';', each "<file> <part_name> <version> <op_mode> <spec_info>"
    /// (update) or "<file> <bmp_type> <resolution>" (bmp)
    #[arg(short = 'e', long, value_name = "LIST")]
    entry_list: Option<String>,

    /// Directory the generated blob is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Print the blob header and entry table
    #[arg(short = 'c', long)]
    contents: bool,

    /// Maximum number of entries read from the blob
    #[arg(short = 'm', long, value_name = "N", default_value_t = DEFAULT_MAX_ENTRIES)]
    max_entries: usize,

    /// Partitions to extract into OUT, separated by ';', or "all"
    #[arg(short = 'x', long, value_name = "LIST")]
    extract: Option<String>,

    /// Check that every partition with spec-specific entries covers every spec
    #[arg(short = 'k', long)]
    check: bool,

    /// Source tree root (falls back to ANDROID_BUILD_TOP)
    #[arg(long, env = "TOP", value_name = "DIR")]
    top: Option<PathBuf>,

    /// Build output directory, searched for payloads and used for extraction
    #[arg(long, env = "OUT", value_name = "DIR")]
    out: Option<PathBuf>,

    /// Log more (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log less (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Blob to inspect
    blob: Option<PathBuf>,
}

fn generate(args: Args) -> Result<()> {
    let Some(list) = args.entry_list.as_deref() else {
        bail!("An entry list (-e) is required to generate a blob");
    };

    let env = PackEnv::new(args.top.clone(), args.out.clone())?;

    println!("PARTITION INFO   : {list}");
    let entries = bup::parse_entry_list(list, args.blob_type)?;

    let accessory = match &args.accessory {
        Some(path) => fs::read(path).with_context(|| format!("Failed to read accessory {}", path.display()))?,
        None => Vec::new(),
    };

    let (path, summary) = bup::pack(args.blob_type, &accessory, entries, &env.resolver(), &args.output_dir)
        .with_context(|| format!("Failed to generate {}", args.blob_type.file_name()))?;

    println!("Wrote {} ({} bytes)", path.display(), summary.blob_size);

    Ok(())
}

fn inspect(args: Args) -> Result<()> {
    let Some(path) = args.blob.as_deref() else {
        bail!("Last argument must be a path to a valid blob file");
    };

    if args.blob_type != BlobType::Update {
        return Err(bup::Error::UnsupportedBlobType(args.blob_type.code()).into());
    }

    println!("BLOB PATH:");
    println!("{}", path.canonicalize().unwrap_or_else(|_| path.to_path_buf()).display());

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut blob = bup::Blob::read(BufReader::new(file), args.max_entries)?;

    let entry_count = blob.header().entry_count as usize;
    if entry_count > args.max_entries {
        println!();
        println!("Blob header indicates {entry_count} partitions in this blob.");
        println!("Limiting display to the first {} partitions.", args.max_entries);
        println!("Use the '--max-entries' or '-m' option to specify otherwise.");
    }

    if args.check {
        println!();
        println!("Checking entry table ...");
        if let Err(e) = blob.check_coverage() {
            if let bup::Error::CoverageHole(missing) = &e {
                for m in missing {
                    error!("{m}");
                }
            }
            return Err(e.into());
        }
        println!("Check entry table successful");
    } else if args.contents {
        println!();
        println!("{}", blob.header());
        println!();
        println!("{}", blob.entry_table());
    }

    if let Some(request) = args.extract.as_deref() {
        let out = config::out_dir(args.out.clone()).context("Cannot save binaries")?;

        println!();
        println!("Saving partitions to \"{}\"", out.display());
        println!("File names are of format \"<part_name>[_<op_str>][_<tnspec>].raw.bin\"");

        let extraction = blob.extract(request, &out)?;
        for name in &extraction.missing {
            warn!("Could not find \"{name}\" in the blob entry table.");
        }
        if !extraction.missing.is_empty() {
            warn!("Verify that the exact partition name(s) exist in the entry table output.");
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(logger::verbosity(args.verbose, args.quiet))?;

    if args.contents || args.check || args.extract.is_some() {
        inspect(args)
    } else {
        generate(args)
    }
}
