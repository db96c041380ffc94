//! JSONL log records for harness runs.
//!
//! - [`LogEntry`]: one record, four required fields plus optional context.
//! - [`LogEmitter`]: writes records with sequential `suite::run::seq` ids.
//! - [`ArtifactIndex`]: SHA-256 digests of the files a run produced.
//! - [`validate_log_line`] / [`validate_log_file`]: schema checks.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HarnessError;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Result of one checked case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Error,
}

/// Which workflow produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Unit,
    Property,
    Cli,
    Bench,
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "fatal"];
const OUTCOMES: [&str; 4] = ["pass", "fail", "skip", "error"];
const PHASES: [&str; 4] = ["unit", "property", "cli", "bench"];

/// One structured log record.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    /// Stream operation under test (`put_bits`, `seek`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    /// File the stream was opened on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            suite: None,
            phase: None,
            case: None,
            op: None,
            path: None,
            outcome: None,
            errno: None,
            bytes: None,
            latency_ns: None,
            artifact_refs: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    #[must_use]
    pub fn with_case(mut self, case: impl Into<String>) -> Self {
        self.case = Some(case.into());
        self
    }

    /// Set the stream operation and the file it ran against.
    #[must_use]
    pub fn with_op(mut self, op: impl Into<String>, path: Option<&Path>) -> Self {
        self.op = Some(op.into());
        self.path = path.map(|p| p.display().to_string());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    #[must_use]
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_latency_ns(mut self, ns: u64) -> Self {
        self.latency_ns = Some(ns);
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, refs: Vec<String>) -> Self {
        self.artifact_refs = Some(refs);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Artifact index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Files produced by one run, each pinned by its digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub suite: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>, suite: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            suite: suite.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Record an artifact whose digest is already known.
    pub fn add(
        &mut self,
        path: impl Into<String>,
        kind: impl Into<String>,
        sha256: impl Into<String>,
    ) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            path: path.into(),
            kind: kind.into(),
            sha256: sha256.into(),
            size_bytes: None,
            description: None,
        });
        self
    }

    /// Hash `path` and record it with its size.
    pub fn add_file(
        &mut self,
        path: &Path,
        kind: impl Into<String>,
        description: Option<String>,
    ) -> Result<&mut Self, HarnessError> {
        let data = fs::read(path).map_err(|e| HarnessError::io(path, e))?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&data),
            size_bytes: Some(data.len() as u64),
            description,
        });
        Ok(self)
    }

    /// Paths whose current contents no longer match the recorded digest.
    pub fn stale_entries(&self) -> Vec<&ArtifactEntry> {
        self.artifacts
            .iter()
            .filter(|a| match fs::read(&a.path) {
                Ok(data) => !sha256_hex(&data).eq_ignore_ascii_case(&a.sha256),
                Err(_) => true,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// In-memory log sink that stays readable after the emitter takes it.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes JSONL records to a file, stderr or a [`LogBuffer`].
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    suite: String,
    run_id: String,
}

impl LogEmitter {
    pub fn to_file(path: &Path, suite: &str, run_id: &str) -> io::Result<Self> {
        let file = fs::File::create(path)?;
        Ok(Self::with_writer(
            Box::new(io::BufWriter::new(file)),
            suite,
            run_id,
        ))
    }

    #[must_use]
    pub fn to_stderr(suite: &str, run_id: &str) -> Self {
        Self::with_writer(Box::new(io::stderr()), suite, run_id)
    }

    /// Emitter over a fresh [`LogBuffer`]; the returned handle reads it back.
    #[must_use]
    pub fn to_buffer(suite: &str, run_id: &str) -> (Self, LogBuffer) {
        let buffer = LogBuffer::default();
        let emitter = Self::with_writer(Box::new(buffer.clone()), suite, run_id);
        (emitter, buffer)
    }

    fn with_writer(writer: Box<dyn Write>, suite: &str, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            suite: suite.to_string(),
            run_id: run_id.to_string(),
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{}::{:03}", self.suite, self.run_id, self.seq)
    }

    /// Emit a bare record with a generated trace id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event).with_suite(&self.suite);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Emit a prepared record, filling in the trace id and suite if unset.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.suite.is_none() {
            entry.suite = Some(self.suite.clone());
        }
        self.write_line(&entry)
    }

    fn write_line(&mut self, entry: &LogEntry) -> io::Result<()> {
        let line = entry.to_jsonl().map_err(io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

fn check_enum(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    allowed: &[&str],
    line_number: usize,
    errors: &mut Vec<LogValidationError>,
) {
    if let Some(value) = obj.get(field).and_then(|v| v.as_str())
        && !allowed.contains(&value)
    {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message: format!("invalid {field}: '{value}'"),
        });
    }
}

/// Validate one JSONL line; on success the parsed entry is returned.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<json>".to_string(),
                message: format!("invalid JSON: {e}"),
            });
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        errors.push(LogValidationError {
            line_number,
            field: "<root>".to_string(),
            message: "expected JSON object".to_string(),
        });
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(LogValidationError {
                line_number,
                field: field.to_string(),
                message: "required field missing".to_string(),
            });
        }
    }

    check_enum(obj, "level", &LEVELS, line_number, &mut errors);
    check_enum(obj, "outcome", &OUTCOMES, line_number, &mut errors);
    check_enum(obj, "phase", &PHASES, line_number, &mut errors);

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && trace_id.split("::").count() != 3
    {
        errors.push(LogValidationError {
            line_number,
            field: "trace_id".to_string(),
            message: format!("trace_id should be <suite>::<run_id>::<seq>, got: '{trace_id}'"),
        });
    }

    // A failing case must say why.
    if obj.get("outcome").and_then(|v| v.as_str()) == Some("fail")
        && obj.get("details").is_none()
        && obj.get("errno").is_none()
    {
        errors.push(LogValidationError {
            line_number,
            field: "details".to_string(),
            message: "fail records need details or errno".to_string(),
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value::<LogEntry>(value).map_err(|e| {
        vec![LogValidationError {
            line_number,
            field: "<deserialization>".to_string(),
            message: format!("failed to deserialize: {e}"),
        }]
    })
}

/// Validate a JSONL file; returns the non-blank line count and all errors.
pub fn validate_log_file(path: &Path) -> io::Result<(usize, Vec<LogValidationError>)> {
    let content = fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc() -> String {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(elapsed.as_secs(), elapsed.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60,
    )
}

/// Proleptic Gregorian date for a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
