use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use sql_refs_core::analyzer::extract::{extract_references_from_bytes, extract_references_tagged, ReferenceRecord};
use sql_refs_core::analyzer::metadata::{IndexOptions, ReferenceIndex};
use sql_refs_core::error::{ExtractError, Result};
use sql_refs_core::export::{self, OutputFormat, DEFAULT_EXPORT_FILE};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "List the tables referenced by SQL scripts", long_about = None)]
struct Cli {
    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract references from one script (file or STDIN) and print them
    Extract(ExtractArgs),
    /// Extract references from every SQL file under a directory and export them
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Read the script from this file instead of STDIN
    #[arg(long)]
    input: Option<PathBuf>,

    /// Value of the File Name column (defaults to the input file name, or N/A)
    #[arg(long)]
    source_tag: Option<String>,

    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// STDIN is a JSON object {"sql": "...", "source_tag": "..."}
    #[arg(long, conflicts_with = "input")]
    stdin_json: bool,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory (or single file) to scan
    root: PathBuf,

    /// Export file; `-` prints to STDOUT
    #[arg(short, long, default_value = DEFAULT_EXPORT_FILE)]
    output: PathBuf,

    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// File extension to include (repeatable)
    #[arg(long = "ext", default_values_t = vec!["sql".to_string()])]
    extensions: Vec<String>,

    /// Reuse results for unchanged files across runs
    #[arg(long, env = "SQL_REFS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ExtractRequest {
    sql: String,
    #[serde(default)]
    source_tag: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Scan(args) => run_scan(args),
    };
    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let records = if args.stdin_json {
        let request = read_request(&read_stdin()?)?;
        let tag = args.source_tag.or(request.source_tag);
        extract_references_tagged(&request.sql, tag.as_deref())
    } else if let Some(path) = &args.input {
        let bytes = std::fs::read(path)?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let tag = args.source_tag.or(file_name);
        extract_references_from_bytes(&bytes, tag.as_deref())?
    } else {
        let mut bytes = Vec::new();
        io::stdin().read_to_end(&mut bytes)?;
        extract_references_from_bytes(&bytes, args.source_tag.as_deref())?
    };

    print_records(&records, args.format)
}

fn run_scan(args: ScanArgs) -> Result<()> {
    if !args.root.exists() {
        return Err(ExtractError::InvalidInput(format!("{} does not exist", args.root.display())));
    }
    let options = IndexOptions {
        extensions: args.extensions,
        cache_dir: args.cache_dir,
        ..Default::default()
    };
    let index = ReferenceIndex::index_directory(&args.root, &options);
    for entry in index.failures.iter() {
        eprintln!("skipped {}: {}", entry.key(), entry.value());
    }

    let records = index.records();
    if args.output.as_os_str() == "-" {
        return print_records(&records, args.format);
    }
    export::export_to_path(&records, &args.output, args.format)?;
    eprintln!("Results exported to {}", args.output.display());
    Ok(())
}

fn print_records(records: &[ReferenceRecord], format: OutputFormat) -> Result<()> {
    let rendered = export::render(records, format)?;
    if rendered.ends_with('\n') {
        print!("{rendered}");
    } else {
        println!("{rendered}");
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;
    String::from_utf8(buf).map_err(|e| ExtractError::InvalidInput(format!("STDIN is not valid UTF-8: {e}")))
}

/// A request whose `sql` is anything but a JSON string is rejected, not coerced.
fn read_request(raw: &str) -> Result<ExtractRequest> {
    serde_json::from_str(raw).map_err(|e| ExtractError::InvalidInput(format!("expected {{\"sql\": string}}: {e}")))
}
