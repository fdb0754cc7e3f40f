//! Command-line front end for typed CSV.
//!
//! Usage:
//!   cw csv to-csv [FILE] [-d ';'] [-D ','] [--metadata META.json]
//!   cw csv pivot [FILE] --field KEY[,KEY...] --formula NAME=EXPR [--before-all 'x = 1']

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use cw::dialect::parse_char;
use cw::{Dialect, PivotOptions, Quoting, Result, metadata, pivot, to_csv, to_typed_csv};
use dw::text::TextErrors;
use dw::{InputSource, OutputTarget, logging};

#[derive(Parser, Debug)]
#[command(name = "cw", version, about = "Typed CSV conversion and pivoting", propagate_version = true)]
struct Cli {
    /// Log level, `LEVEL` or `NAME=LEVEL`; may be repeated or comma-separated
    #[arg(
        long = "log-level",
        value_name = "[NAME=]LEVEL",
        global = true,
        env = "CW_LOG_LEVEL",
        value_delimiter = ','
    )]
    log_level: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// CSV commands
    #[command(subcommand)]
    Csv(CsvCommand),
}

#[derive(Subcommand, Debug)]
enum CsvCommand {
    /// Rewrite a CSV file in another dialect
    ToCsv(ToCsvArgs),
    /// Group rows by key fields and compute a formula per group
    Pivot(PivotArgs),
}

fn dialect_char(s: &str) -> std::result::Result<u8, String> {
    parse_char(s).map_err(|e| e.to_string())
}

#[derive(Args, Debug)]
struct CsvIoArgs {
    /// Input file (`-` for stdin)
    #[arg(value_name = "FILE")]
    file: Option<InputSource>,

    /// Input file, instead of the positional one
    #[arg(long = "input", value_name = "FILE", conflicts_with = "file")]
    input: Option<InputSource>,

    /// Output file (`-` for stdout)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    output: OutputTarget,

    /// How to handle bytes that are not valid UTF-8
    #[arg(
        long = "input-errors",
        value_enum,
        env = "CW_TEXT_ERRORS",
        default_value_t = TextErrors::Replace
    )]
    input_errors: TextErrors,

    /// Field-type metadata (JSON); a missing file means no types
    #[arg(long, value_name = "FILE")]
    metadata: Option<PathBuf>,

    /// Input field delimiter (`\t` for tab)
    #[arg(
        short = 'd',
        long = "input-delimiter",
        visible_alias = "delimiter",
        env = "CW_CSV_DELIMITER",
        value_parser = dialect_char,
        default_value = ","
    )]
    input_delimiter: u8,

    /// Output field delimiter
    #[arg(
        short = 'D',
        long = "output-delimiter",
        env = "CW_CSV_DELIMITER",
        value_parser = dialect_char,
        default_value = ","
    )]
    output_delimiter: u8,

    /// Input quote character
    #[arg(
        short = 'q',
        long = "input-quotechar",
        env = "CW_CSV_QUOTECHAR",
        value_parser = dialect_char,
        default_value = "\""
    )]
    input_quotechar: u8,

    /// Output quote character
    #[arg(
        short = 'Q',
        long = "output-quotechar",
        env = "CW_CSV_QUOTECHAR",
        value_parser = dialect_char,
        default_value = "\""
    )]
    output_quotechar: u8,

    /// Output quoting style
    #[arg(
        long = "output-quoting",
        value_enum,
        ignore_case = true,
        env = "CW_CSV_QUOTING",
        default_value_t = Quoting::Minimal
    )]
    output_quoting: Quoting,
}

impl CsvIoArgs {
    fn source(&self) -> InputSource {
        self.file
            .clone()
            .or_else(|| self.input.clone())
            .unwrap_or(InputSource::Stdin)
    }

    fn dialect(&self) -> Dialect {
        Dialect {
            input_delimiter: self.input_delimiter,
            input_quotechar: self.input_quotechar,
            output_delimiter: self.output_delimiter,
            output_quotechar: self.output_quotechar,
            output_quoting: self.output_quoting,
        }
    }
}

#[derive(Args, Debug)]
struct ToCsvArgs {
    #[command(flatten)]
    io: CsvIoArgs,
}

#[derive(Args, Debug)]
struct PivotArgs {
    #[command(flatten)]
    io: CsvIoArgs,

    /// Key fields as CSV text; may be repeated
    #[arg(long = "field", value_name = "FIELDNAME")]
    fields: Vec<String>,

    /// Output field computed per group, `NAME=EXPR`; may be repeated
    #[arg(long = "formula", value_name = "NAME=EXPR")]
    formulas: Vec<String>,

    /// Bindings evaluated once before grouping, `NAME = EXPR; ...`
    #[arg(long = "before-all", value_name = "BINDINGS")]
    before_all: Option<String>,
}

fn run_to_csv(args: ToCsvArgs) -> Result<usize> {
    let io = &args.io;
    match &io.metadata {
        Some(path) => {
            let types = metadata::load(Some(path.as_path()))?.field_types()?;
            to_typed_csv(&io.source(), &io.output, &io.dialect(), io.input_errors, types)
        }
        None => to_csv(&io.source(), &io.output, &io.dialect(), io.input_errors),
    }
}

fn run_pivot(args: PivotArgs) -> Result<usize> {
    let opts = PivotOptions {
        dialect: args.io.dialect(),
        errors: args.io.input_errors,
        metadata: args.io.metadata.clone(),
        key_fields: args.fields,
        formulas: args.formulas,
        before_all: args.before_all,
    };
    pivot(&args.io.source(), &args.io.output, &opts)
}

fn run(command: Command) -> Result<usize> {
    match command {
        Command::Csv(CsvCommand::ToCsv(args)) => run_to_csv(args),
        Command::Csv(CsvCommand::Pivot(args)) => run_pivot(args),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("cw: {}", e);
        process::exit(1);
    }

    match run(cli.command) {
        Ok(records) => debug!(records, "Finished"),
        Err(e) => {
            eprintln!("cw: {}", e);
            process::exit(1);
        }
    }
}
