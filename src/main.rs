use std::path::{Path, PathBuf};

use clap::builder::FalseyValueParser;
use clap::Parser;
use miette::{IntoDiagnostic, Result};

use lace_vm::output::{Color, Output};
use lace_vm::term::TerminalIo;
use lace_vm::{fault_report, image_report, Image, RunState, Stop};

/// Exit status after an operator interrupt, as a shell reports SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

/// Run LC3 object images.
///
/// Images are loaded in order, then execution starts at x3000 and continues
/// until the program halts.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// `.obj` images to load; later images overwrite earlier ones where they overlap
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Only print program output
    #[arg(short, long)]
    quiet: bool,
    /// Print every executed instruction to stderr
    #[arg(short, long, env = "LC3_TRACE", value_parser = FalseyValueParser::new())]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(2)
                .build(),
        )
    }))?;

    Output::set_quiet(args.quiet);
    Output::set_tracing(args.trace);

    let mut state = RunState::new();
    for path in &args.images {
        file_message(Color::Green, "Loading", path);
        let image = Image::read(path).map_err(|e| image_report(&path.display().to_string(), &e))?;
        state.load(&image);
    }

    let result = {
        // Terminal is restored when `io` is dropped, whatever the outcome
        let mut io = TerminalIo::new().into_diagnostic()?;
        message(Color::Green, "Running", "from x3000");
        state.run(&mut io)
    };

    match result {
        Ok(Stop::Halted) => {
            let summary = format!("after {} instructions", state.cycles());
            message(Color::Cyan, "Halted", &summary);
            Ok(())
        }
        Ok(Stop::Interrupted) => {
            message(Color::Red, "Interrupted", &format!("at x{:04X}", state.pc()));
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(fault) => Err(fault_report(&fault)),
    }
}

fn file_message(color: Color, left: &str, path: &Path) {
    let right = format!("image {}", path.display());
    message(color, left, &right);
}

fn message(color: Color, left: &str, right: &str) {
    Output::Status(color).message(left, right);
}
