use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::Result;

use lc3vm::console::Terminal;
use lc3vm::{error, output, Memory, RunState};

/// Environment variable holding the `env_logger` filter.
const LOG_VAR: &str = "LC3VM_LOG";

/// Virtual machine for binary LC3 program images.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.obj` image to run
    path: Option<PathBuf>,

    /// Produce minimal output, suited for blackbox tests
    #[arg(
        short,
        long,
        global = true,
        env = "LC3VM_MINIMAL",
        value_parser = BoolishValueParser::new()
    )]
    minimal: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a binary `.obj` image and output to terminal
    Run {
        /// Image to run
        name: PathBuf,
    },
    /// Load a binary image without running it
    Check {
        /// Image to check
        name: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::new().filter_or(LOG_VAR, "warn")).init();

    match args.command {
        Some(Command::Run { name }) => run(&name, args.minimal),
        Some(Command::Check { name }) => check(&name),
        None => match args.path {
            Some(path) => run(&path, args.minimal),
            None => {
                println!("\n~ lc3vm v{VERSION} ~");
                println!("{SHORT_INFO}");
                Ok(())
            }
        },
    }
}

fn file_message(left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(left, &right);
}

fn message(left: &str, right: &str) {
    println!("{:>12} {right}", left.green());
}

fn run(name: &Path, minimal: bool) -> Result<()> {
    let mut mem = Memory::new();
    let image = lc3vm::load_file(&mut mem, name).map_err(error::load_failed)?;
    log::debug!("image at 0x{:04x}, {} words", image.origin, image.len);
    if !minimal {
        file_message("Loaded", name);
        message(
            "Running",
            &format!("from 0x{:04x}", lc3vm::PC_START),
        );
    }

    // Terminal leaves raw mode when dropped, before any status is printed
    let (result, registers) = {
        let mut program = RunState::from_memory(mem, Terminal::new());
        let result = program.run();
        (result, program.registers().clone())
    };

    match result {
        Ok(()) => {
            if minimal {
                println!("\nHalted");
            } else {
                println!("\n{:>12}", "Halted".cyan());
            }
            Ok(())
        }
        Err(fault) => {
            eprintln!();
            eprint!("{}", output::registers(&registers, minimal));
            Err(error::fault(fault))
        }
    }
}

fn check(name: &Path) -> Result<()> {
    file_message("Checking", name);
    let mut mem = Memory::new();
    let image = lc3vm::load_file(&mut mem, name).map_err(error::load_failed)?;
    message(
        "Success",
        &format!("{} words at 0x{:04x}", image.len, image.origin),
    );
    Ok(())
}

const SHORT_INFO: &str = r"
Runs binary LC3 images: a big-endian origin word, followed by program words.
Execution starts at x3000 and ends at HALT.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
