use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use jretro::classfile::ClassReader;
use jretro::{helper_class_bytes, patch_class, TargetVersion, CONCAT_HELPER_NAME};

#[derive(Parser)]
#[command(name = "jretro")]
#[command(about = "Downgrades JVM class files so they load on older runtimes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch a .class file, or every .class file under a directory
    Patch {
        /// Input .class file or directory
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Java release the output must load on (e.g. 8)
        #[arg(short, long, value_name = "RELEASE")]
        target: u8,

        /// Output file or directory (defaults to patching in place)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write the runtime concatenation helper class
    DumpHelper {
        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Show the name and version of a .class file
    Info {
        /// Input .class file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Patch { input, target, output, verbose } => {
            patch_path(input, *target, output.as_deref(), *verbose)?;
        }
        Commands::DumpHelper { output } => {
            dump_helper(output)?;
        }
        Commands::Info { input } => {
            info(input)?;
        }
    }

    Ok(())
}

fn patch_path(input: &Path, target: u8, output: Option<&Path>, verbose: bool) -> Result<()> {
    let target = TargetVersion::new(target)?;
    let mut patched = 0usize;
    let mut concat_rewrites = 0usize;

    if input.is_dir() {
        let output_root = output.unwrap_or(input).to_path_buf();
        for entry in WalkDir::new(input) {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.path().extension().map_or(true, |e| e != "class") {
                continue;
            }
            let relative = entry.path().strip_prefix(input).expect("walked entries live under the walk root");
            let destination = output_root.join(relative);
            concat_rewrites += patch_file(entry.path(), &destination, target, verbose)?;
            patched += 1;
        }
        if concat_rewrites > 0 {
            deposit_helper(&output_root)?;
        }
    } else {
        let destination = output.unwrap_or(input).to_path_buf();
        concat_rewrites += patch_file(input, &destination, target, verbose)?;
        patched += 1;
        if concat_rewrites > 0 {
            let parent = destination.parent().unwrap_or_else(|| Path::new("."));
            deposit_helper(parent)?;
        }
    }

    println!(
        "Patched {} class file(s) for {}; rewrote {} concatenation site(s)",
        patched, target, concat_rewrites
    );
    Ok(())
}

fn patch_file(input: &Path, output: &Path, target: TargetVersion, verbose: bool) -> Result<usize> {
    if verbose {
        println!("Patching {}...", input.display());
    }
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let outcome = patch_class(&bytes, target)
        .with_context(|| format!("patching {}", input.display()))?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &outcome.bytes).with_context(|| format!("writing {}", output.display()))?;
    if verbose && outcome.record_lowered {
        println!("  lowered record class");
    }
    Ok(outcome.concat_rewrites)
}

fn deposit_helper(root: &Path) -> Result<()> {
    let path = root.join(format!("{}.class", CONCAT_HELPER_NAME));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, helper_class_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn dump_helper(output: &Path) -> Result<()> {
    deposit_helper(output)?;
    println!("Wrote {}/{}.class", output.display(), CONCAT_HELPER_NAME);
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let reader = ClassReader::new(&bytes)?;
    let major = reader.major_version();
    if major < 45 {
        bail!("{} declares an unknown classfile version {}", input.display(), major);
    }
    println!("{}", reader.class_name()?);
    println!("  classfile version: {}.{}", major, reader.version() >> 16);
    println!("  Java release: {}", major - 44);
    Ok(())
}
