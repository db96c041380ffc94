//! CLI entrypoint for the libio harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use libio_core::stdio::{Stream, copy_file};
use libio_harness::structured_log::{self, LogEmitter, now_utc};
use libio_harness::{ConformanceReport, HarnessError, PropertySuite};

/// Conformance and inspection tooling for libio streams.
#[derive(Debug, Parser)]
#[command(name = "libio-harness")]
#[command(about = "Conformance harness for libio streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the stream property suite against scratch files.
    Verify {
        /// Directory for scratch files.
        #[arg(long, default_value_os_t = std::env::temp_dir().join("libio-harness"))]
        work_dir: PathBuf,
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0x1B10_5EED")]
        seed: String,
        /// Random inputs per property.
        #[arg(long, default_value_t = 16)]
        cases: usize,
        /// Only run properties whose name contains this.
        #[arg(long)]
        filter: Option<String>,
        /// JSONL log path (stderr when absent).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Markdown report path; a `.json` twin is written next to it.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Keep scratch files and write an artifact index for them.
        #[arg(long)]
        keep_files: bool,
    },
    /// Print the metadata of a file as seen through an open stream.
    Stat {
        path: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Dump a file as fixed-width bit fields, MSB first.
    Bits {
        path: PathBuf,
        /// Field width in bits (1..=64).
        #[arg(long, default_value_t = 8)]
        width: u32,
        /// Stop after this many fields.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Copy a file through two streams.
    Copy { src: PathBuf, dst: PathBuf },
    /// Check a JSONL log against the record schema.
    ValidateLog { path: PathBuf },
}

fn parse_seed(raw: &str) -> Result<u64, HarnessError> {
    let cleaned = raw.replace('_', "");
    let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse(),
    };
    parsed.map_err(|_| HarnessError::Usage(format!("bad seed '{raw}'")))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Verify {
            work_dir,
            seed,
            cases,
            filter,
            log,
            report,
            keep_files,
        } => {
            let seed = parse_seed(&seed)?;
            let run_id = format!("seed-{seed:x}");
            let mut emitter = match &log {
                Some(path) => LogEmitter::to_file(path, "properties", &run_id)?,
                None => LogEmitter::to_stderr("properties", &run_id),
            };

            let run = PropertySuite::new(&work_dir, seed)
                .with_cases(cases)
                .keep_files(keep_files)
                .run(filter.as_deref(), &mut emitter)?;

            let report_doc = ConformanceReport {
                title: String::from("libio Stream Properties"),
                seed,
                timestamp: now_utc(),
                summary: run.summary,
                metrics: Some(libio_runtime::global_metrics().snapshot()),
            };
            eprintln!(
                "Verification complete: total={}, passed={}, failed={}",
                report_doc.summary.total, report_doc.summary.passed, report_doc.summary.failed
            );

            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                std::fs::write(&report_path, report_doc.to_markdown())?;
                std::fs::write(report_path.with_extension("json"), report_doc.to_json())?;
            }
            if keep_files {
                let index_path = work_dir.join("artifact_index.json");
                std::fs::write(&index_path, run.artifacts.to_json()?)?;
                eprintln!("Artifact index written to {}", index_path.display());
            }

            if !report_doc.summary.all_passed() {
                return Err("Property verification failed".into());
            }
        }
        Command::Stat { path, json } => {
            let mut stream = Stream::open(&path, "r")?;
            let status = stream.try_metadata()?;
            stream.close()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                let view = libio_core::meta::StatusView::new(Some(status));
                println!("path:     {}", path.display());
                println!("type:     {:?}", view.file_type());
                println!("size:     {} ({})", view.size(), view.human_size());
                println!("device:   {}", view.device_id());
                println!("inode:    {}", view.inode());
                println!("links:    {}", view.link_count());
                println!("owner:    {}:{}", view.uid(), view.gid());
                println!("mode:     {:o}", status.mode & 0o7777);
                println!("accessed: {}", view.accessed());
                println!("modified: {}", view.modified());
                println!("changed:  {}", view.changed());
            }
        }
        Command::Bits { path, width, limit } => {
            if !(1..=64).contains(&width) {
                return Err(HarnessError::Usage(format!("width {width} not in 1..=64")).into());
            }
            let mut stream = Stream::open(&path, "rb")?;
            let mut fields = 0usize;
            while limit.is_none_or(|max| fields < max) {
                match stream.get_bits(width) {
                    Ok(value) => {
                        println!("{value:0w$b}", w = width as usize);
                        fields += 1;
                    }
                    Err(err) if err.is_eof() => break,
                    Err(err) => return Err(err.into()),
                }
            }
            stream.close()?;
            eprintln!("{fields} field(s) of {width} bit(s)");
        }
        Command::Copy { src, dst } => {
            let copied = copy_file(&src, &dst)?;
            eprintln!(
                "Copied {copied} bytes from {} to {}",
                src.display(),
                dst.display()
            );
        }
        Command::ValidateLog { path } => {
            let (lines, errors) = structured_log::validate_log_file(&path)?;
            for err in &errors {
                eprintln!("{err}");
            }
            eprintln!("{lines} line(s), {} error(s)", errors.len());
            if !errors.is_empty() {
                return Err(HarnessError::InvalidLog {
                    count: errors.len(),
                }
                .into());
            }
        }
    }

    Ok(())
}
