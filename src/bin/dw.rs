//! Command-line front end for byte and text line pipelines.
//!
//! Usage:
//!   dw cat [-n] [FILE...] [-o OUTPUT]
//!   dw grep -e PATTERN [-e PATTERN...] [-i] [-m NUM] [FILE...]
//!   dw text head -n 10 [FILE...]
//!
//! `-` (the default) reads stdin or writes stdout.

use std::process;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use dw::bytes::{self, GrepOptions};
use dw::text::{self, TextErrors};
use dw::{InputSource, OutputTarget, Pipeline, Result, head, logging, sorted, tail, uniq, uniq_all};

#[derive(Parser, Debug)]
#[command(name = "dw", version, about = "Lazy line pipelines", propagate_version = true)]
struct Cli {
    /// Log level, `LEVEL` or `NAME=LEVEL`; may be repeated or comma-separated
    #[arg(
        long = "log-level",
        value_name = "[NAME=]LEVEL",
        global = true,
        env = "DW_LOG_LEVEL",
        value_delimiter = ','
    )]
    log_level: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Concatenate files byte for byte
    Cat(CatArgs),
    /// Keep lines matching any pattern
    #[command(alias = "filter")]
    Grep(GrepArgs),
    /// Byte-line commands
    #[command(subcommand)]
    Bytes(BytesCommand),
    /// UTF-8 text-line commands
    #[command(subcommand)]
    Text(TextCommand),
}

#[derive(Subcommand, Debug)]
enum BytesCommand {
    /// Concatenate files byte for byte
    Cat(CatArgs),
    /// Keep lines matching any pattern
    #[command(alias = "filter")]
    Grep(GrepArgs),
}

#[derive(Subcommand, Debug)]
enum TextCommand {
    /// Concatenate and decode files
    Cat(TextCatArgs),
    /// Keep the first lines
    Head(CountArgs),
    /// Keep the last lines
    Tail(CountArgs),
    /// Drop duplicate lines
    Uniq(UniqArgs),
    /// Sort lines
    Sort(SortArgs),
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input files (`-` for stdin)
    #[arg(value_name = "FILE")]
    files: Vec<InputSource>,

    /// Input file, may be repeated
    #[arg(long = "input", value_name = "FILE")]
    inputs: Vec<InputSource>,

    /// Output file (`-` for stdout)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    output: OutputTarget,
}

impl IoArgs {
    fn sources(&self) -> Vec<InputSource> {
        self.files.iter().chain(&self.inputs).cloned().collect()
    }
}

#[derive(Args, Debug)]
struct CatArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Prefix each line with its zero-based number
    #[arg(short = 'n', long = "number")]
    number: bool,
}

#[derive(Args, Debug)]
struct GrepArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Pattern to match; lines matching any pattern are kept
    #[arg(short = 'e', long = "pattern", visible_alias = "regexp", value_name = "PATTERN")]
    patterns: Vec<String>,

    /// Stop after NUM selected lines
    #[arg(short = 'm', long = "max-count", value_name = "NUM")]
    max_count: Option<usize>,

    /// Match case-insensitively
    #[arg(short = 'i', long = "ignore-case")]
    ignore_case: bool,
}

#[derive(Args, Debug)]
struct TextIoArgs {
    #[command(flatten)]
    io: IoArgs,

    /// How to handle bytes that are not valid UTF-8
    #[arg(long = "input-errors", value_enum, env = "DW_TEXT_ERRORS", default_value_t = TextErrors::Replace)]
    input_errors: TextErrors,
}

#[derive(Args, Debug)]
struct TextCatArgs {
    #[command(flatten)]
    text: TextIoArgs,

    /// Prefix each line with its zero-based number
    #[arg(short = 'n', long = "number")]
    number: bool,
}

#[derive(Args, Debug)]
struct CountArgs {
    #[command(flatten)]
    text: TextIoArgs,

    /// Number of lines
    #[arg(short = 'n', long = "lines", default_value_t = 10)]
    lines: usize,
}

#[derive(Args, Debug)]
struct UniqArgs {
    #[command(flatten)]
    text: TextIoArgs,

    /// Drop every repeated line, not only adjacent ones
    #[arg(long)]
    all: bool,
}

#[derive(Args, Debug)]
struct SortArgs {
    #[command(flatten)]
    text: TextIoArgs,

    /// Sort in descending order
    #[arg(short, long)]
    reverse: bool,
}

fn run_cat(args: CatArgs) -> Result<usize> {
    let stage = bytes::cat(args.io.sources())?.numbered(args.number);
    Pipeline::source(stage)?.run(bytes::to_file(args.io.output))
}

fn run_grep(args: GrepArgs) -> Result<usize> {
    let options = GrepOptions {
        ignore_case: args.ignore_case,
        max_count: args.max_count,
    };
    let stage = bytes::grep(&args.patterns, options)?.reading(args.io.sources())?;
    Pipeline::source(stage)?.run(bytes::to_file(args.io.output))
}

fn text_lines(args: &TextIoArgs) -> Result<Pipeline<String>> {
    Pipeline::source(text::cat(args.io.sources())?.errors(args.input_errors))
}

fn run_text(command: TextCommand) -> Result<usize> {
    match command {
        TextCommand::Cat(args) => {
            let stage = text::cat(args.text.io.sources())?
                .errors(args.text.input_errors)
                .numbered(args.number);
            Pipeline::source(stage)?.run(text::to_file(args.text.io.output))
        }
        TextCommand::Head(args) => {
            (text_lines(&args.text)? | head(args.lines)).run(text::to_file(args.text.io.output))
        }
        TextCommand::Tail(args) => {
            (text_lines(&args.text)? | tail(args.lines)).run(text::to_file(args.text.io.output))
        }
        TextCommand::Uniq(args) => {
            let lines = text_lines(&args.text)?;
            let lines = if args.all { lines | uniq_all() } else { lines | uniq() };
            lines.run(text::to_file(args.text.io.output))
        }
        TextCommand::Sort(args) => (text_lines(&args.text)? | sorted().descending(args.reverse))
            .run(text::to_file(args.text.io.output)),
    }
}

fn run(command: Command) -> Result<usize> {
    match command {
        Command::Cat(args) | Command::Bytes(BytesCommand::Cat(args)) => run_cat(args),
        Command::Grep(args) | Command::Bytes(BytesCommand::Grep(args)) => run_grep(args),
        Command::Text(command) => run_text(command),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("dw: {}", e);
        process::exit(1);
    }

    match run(cli.command) {
        Ok(lines) => debug!(lines, "Finished"),
        Err(e) => {
            eprintln!("dw: {}", e);
            process::exit(1);
        }
    }
}
