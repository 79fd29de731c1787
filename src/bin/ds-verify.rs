//! DS Verify CLI
//!
//! Command-line interface for verifying data graphs against Domain
//! Specifications.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value as Json;

use ds_verify::{
    lexical_report, parse_input, InputKind, ReportFormat, SchemaOrgOracle, VerificationReport,
    Verifier, VerifyError, VocabularyOracle,
};

#[derive(Parser)]
#[command(name = "ds-verify")]
#[command(about = "Verify data graphs against Domain Specifications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a data graph against a Domain Specification
    Verify {
        /// Data graph file
        data: PathBuf,

        /// Domain Specification file
        ds: PathBuf,

        /// Local vocabulary file(s); skips remote fetching when given
        #[arg(long = "vocab")]
        vocab: Vec<PathBuf>,

        /// Report format: ds (default) or shacl
        #[arg(long, default_value = "ds")]
        format: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip the sh:targetClass check on the root entity
        #[arg(long)]
        ignore_target_matching: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Verify {
            data,
            ds,
            vocab,
            format,
            pretty,
            output,
            ignore_target_matching,
        } => run_verify(VerifyArgs {
            data,
            ds,
            vocab,
            format,
            pretty,
            output,
            ignore_target_matching,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct VerifyArgs {
    data: PathBuf,
    ds: PathBuf,
    vocab: Vec<PathBuf>,
    format: String,
    pretty: bool,
    output: Option<PathBuf>,
    ignore_target_matching: bool,
}

fn run_verify(args: VerifyArgs) -> Result<(), u8> {
    let format = match args.format.as_str() {
        "ds" => ReportFormat::Ds,
        "shacl" => ReportFormat::Shacl,
        other => {
            eprintln!("Error: unknown report format '{other}' (expected 'ds' or 'shacl')");
            return Err(2);
        }
    };

    let report = build_report(&args)?;

    let rendered = report.render(format);
    let json_output = if args.pretty {
        serde_json::to_string_pretty(&rendered)
    } else {
        serde_json::to_string(&rendered)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    if report.verdict.is_conformant() {
        Ok(())
    } else {
        Err(1)
    }
}

/// Lexical failures of either input become the report itself; only setup
/// problems (files, vocabularies) abort with an error exit code.
fn build_report(args: &VerifyArgs) -> Result<VerificationReport, u8> {
    let data_text = read_text(&args.data)?;
    let ds_text = read_text(&args.ds)?;

    let data_json = match parse_input(&data_text, InputKind::DataGraph) {
        Ok(json) => json,
        Err(entry) => return Ok(lexical_report(entry, InputKind::DataGraph)),
    };
    let ds_json = match parse_input(&ds_text, InputKind::DomainSpecification) {
        Ok(json) => json,
        Err(entry) => return Ok(lexical_report(entry, InputKind::DomainSpecification)),
    };

    let oracle = build_oracle(&ds_json, &args.vocab)?;
    let verifier = Verifier::new(oracle);
    Ok(verifier.verify_with(&data_json, &ds_json, args.ignore_target_matching))
}

fn build_oracle(ds: &Json, vocab_files: &[PathBuf]) -> Result<Arc<dyn VocabularyOracle>, u8> {
    if vocab_files.is_empty() {
        return remote_oracle(ds);
    }
    let mut docs = Vec::with_capacity(vocab_files.len());
    for path in vocab_files {
        let text = read_text(path)?;
        let doc = serde_json::from_str(&text)
            .map_err(|source| fail(VerifyError::InvalidJson { source }))?;
        docs.push(doc);
    }
    let oracle = SchemaOrgOracle::from_vocabularies(&docs).map_err(fail)?;
    Ok(Arc::new(oracle))
}

/// Fetches the vocabularies the DS names (its `ds:usedVocabularies` plus the
/// schema.org release dump) and caches the oracle process-wide.
#[cfg(feature = "remote")]
fn remote_oracle(ds: &Json) -> Result<Arc<dyn VocabularyOracle>, u8> {
    use ds_verify::{global_registry, load_vocabulary_url, vocabulary_urls, FlatDs};

    let flat = FlatDs::from_document(ds).map_err(fail)?;
    let urls = vocabulary_urls(&flat).map_err(fail)?;
    global_registry()
        .get_or_init(&urls, || {
            let docs = urls
                .iter()
                .map(|url| load_vocabulary_url(url))
                .collect::<Result<Vec<_>, _>>()?;
            let oracle = SchemaOrgOracle::from_vocabularies(&docs)?;
            Ok(Arc::new(oracle) as Arc<dyn VocabularyOracle>)
        })
        .map_err(fail)
}

#[cfg(not(feature = "remote"))]
fn remote_oracle(_ds: &Json) -> Result<Arc<dyn VocabularyOracle>, u8> {
    eprintln!(
        "Error: no --vocab files given and this build has no 'remote' feature; pass local vocabulary files"
    );
    Err(2)
}

fn fail(e: VerifyError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn read_text(path: &Path) -> Result<String, u8> {
    std::fs::read_to_string(path).map_err(|source| {
        let err = if source.kind() == std::io::ErrorKind::NotFound {
            VerifyError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            VerifyError::ReadError {
                path: path.to_path_buf(),
                source,
            }
        };
        fail(err)
    })
}
