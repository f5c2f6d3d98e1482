use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, Result};

use sim6809::output::Output;
use sim6809::{Air, AsmParser, Debugger, DebuggerOptions, Halt, Simulator, PROGRAM_EXTENSION};

/// sim6809 assembles and runs programs for a 6809-style teaching CPU.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asmb` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble and run a `.asmb` file, then show the final registers
    Run {
        /// `.asmb` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Step through a `.asmb` file with the debugger
    Debug {
        /// `.asmb` file to debug
        name: PathBuf,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Create a binary `.bin` image of the assembled program
    Compile {
        /// `.asmb` file to compile
        name: PathBuf,
        /// Destination to output `.bin` file
        dest: Option<PathBuf>,
    },
    /// Check a `.asmb` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Place a watch on a `.asmb` file to receive constant assembler updates
    Watch {
        /// `.asmb` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    sim6809::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(sim6809::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&path, None, false);
        }
        println!("\n~ sim6809 v{VERSION} ~");
        println!("{SHORT_INFO}");
        return Ok(());
    };

    match command {
        Command::Run { name, minimal } => run(&name, None, minimal),
        Command::Debug {
            name,
            command,
            minimal,
        } => run(&name, Some(DebuggerOptions { command }), minimal),
        Command::Compile { name, dest } => {
            file_message(Green, "Assembling", &name);
            let contents = read_source(&name)?;
            let air = assemble(&contents)?;

            let out_file_name = match dest {
                Some(dest) => dest,
                None => name.with_extension("bin"),
            };
            let mut file = File::create(&out_file_name).into_diagnostic()?;
            file.write_all(&air.orig().to_be_bytes()).into_diagnostic()?;
            file.write_all(&air.image()).into_diagnostic()?;

            message(Green, "Finished", "emit binary");
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let contents = read_source(&name)?;
            let _ = assemble(&contents)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Watch { name } => watch(name),
    }
}

fn watch(name: PathBuf) -> Result<()> {
    use MsgColor::*;
    if !name.exists() {
        bail!("File does not exist. Exiting...")
    }
    // Vim breaks if watching a single file
    let folder_path = match name.parent() {
        Some(pth) if pth.is_dir() => pth.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    // Clear screen and move cursor to top left
    print!("\x1B[2J\x1B[2;1H");
    file_message(Green, "Watching", &name);
    message(Cyan, "Help", "press CTRL+C to exit");

    let mut watcher =
        Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

    watcher
        .watch(folder_path, move |event: Event| match event.kind {
            // Watch remove for vim changes
            EventKind::Modify(_) | EventKind::Remove(_) => {
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Green, "Re-checking", "file change detected");
                message(Cyan, "Help", "press CTRL+C to exit");

                // Makes reruns more obvious
                sleep(Duration::from_millis(50));

                let contents = match fs::read_to_string(&name) {
                    Ok(contents) => contents,
                    Err(e) => {
                        eprintln!("{e}. Exiting...");
                        return Flow::Exit;
                    }
                };
                match assemble(&contents) {
                    Ok(_) => message(Green, "Success", "no errors found!"),
                    Err(e) => println!("\n{:?}", e),
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        })
        .into_diagnostic()?;
    watcher.run();
    Ok(())
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, debugger_opts: Option<DebuggerOptions>, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    file_message(MsgColor::Green, "Assembling", name);
    match name.extension().and_then(|ext| ext.to_str()) {
        Some(PROGRAM_EXTENSION) => (),
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    }

    let mut sim = Simulator::new();
    sim.load_file(name).into_diagnostic()?;
    let contents = sim.save_program().to_string();
    sim.assemble().map_err(|err| err.report(&contents))?;

    if let Some(opts) = debugger_opts {
        message(MsgColor::Green, "Debugging", "assembled program");
        let _ = Debugger::new(opts, sim).run();
        file_message(MsgColor::Green, "Completed", name);
        return Ok(());
    }

    message(MsgColor::Green, "Running", "assembled program");
    let snapshot = sim.run().map_err(|err| err.report(&contents))?;

    Output::Normal.print_snapshot(&snapshot);
    match sim.halt_reason() {
        Some(Halt::Exhausted) => {
            message(MsgColor::Red, "Halted", "ran past the last instruction")
        }
        Some(Halt::Interrupt) => message(MsgColor::Green, "Halted", "reached SWI"),
        Some(Halt::Return) => message(MsgColor::Green, "Halted", "returned from program"),
        _ => message(MsgColor::Green, "Halted", "reached END"),
    }
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn read_source(name: &Path) -> Result<String> {
    fs::read_to_string(name).into_diagnostic()
}

/// Return assembly intermediate representation of source file for further processing
fn assemble(contents: &str) -> Result<Air> {
    let parser = AsmParser::new(contents).map_err(|err| err.report(contents))?;
    let air = parser.parse().map_err(|err| err.report(contents))?;
    Ok(air)
}

const SHORT_INFO: &str = r"
Welcome to sim6809, an assembler and step-through simulator
for a 6809-style teaching CPU.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
