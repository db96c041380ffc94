//! Property suite over real files, and the result records it produces.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use libio_core::meta::StatusView;
use libio_core::stdio::{SeekOrigin, StdioError, Stream, copy_file};
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::structured_log::{ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, Phase};

/// Result of checking a single property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub case_name: String,
    /// Interface the property exercises (`fgetbits`, `fstat`, ...).
    pub reference: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    pub diff: Option<String>,
}

impl VerificationResult {
    fn compare(case_name: &str, reference: &str, expected: String, actual: String) -> Self {
        let passed = expected == actual;
        let diff = (!passed).then(|| format!("- {expected}\n+ {actual}"));
        Self {
            case_name: case_name.to_string(),
            reference: reference.to_string(),
            passed,
            expected,
            actual,
            diff,
        }
    }

    fn errored(case_name: &str, reference: &str, err: &HarnessError) -> Self {
        Self {
            case_name: case_name.to_string(),
            reference: reference.to_string(),
            passed: false,
            expected: "no error".to_string(),
            actual: err.to_string(),
            diff: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<VerificationResult>,
}

impl VerificationSummary {
    #[must_use]
    pub fn from_results(results: Vec<VerificationResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total,
            passed,
            failed: total - passed,
            results,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// What one suite run produced.
#[derive(Debug)]
pub struct SuiteRun {
    pub summary: VerificationSummary,
    /// Data files left behind when the suite keeps them.
    pub artifacts: ArtifactIndex,
}

/// xorshift64*.
#[derive(Debug, Clone)]
pub struct Rng(u64);

impl Rng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }
}

type Check = fn(&Path, &mut Rng, usize) -> Result<(String, String), HarnessError>;

const PROPERTIES: [(&str, &str, Check); 10] = [
    ("byte_round_trip", "fwrite/fread", byte_round_trip),
    ("bit_round_trip", "fputbits/fgetbits", bit_round_trip),
    ("padded_close", "fputbit/fclose", padded_close),
    ("commit_before_byte_write", "fputbits/fputc", commit_before_byte_write),
    ("tell_tracks_writes", "ftell", tell_tracks_writes),
    ("end_of_data", "fgetc/fgetbit/feof", end_of_data),
    ("single_file_type", "freg/fdir/...", single_file_type),
    ("permission_bits", "fuser_r/.../fother_x", permission_bits),
    ("copy_preserves_bytes", "fcopy", copy_preserves_bytes),
    ("write_to_read_stream", "fputc/ferror", write_to_read_stream),
];

/// Runs every stream property against files in a scratch directory.
#[derive(Debug, Clone)]
pub struct PropertySuite {
    work_dir: PathBuf,
    seed: u64,
    cases: usize,
    keep_files: bool,
}

impl PropertySuite {
    pub fn new(work_dir: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            work_dir: work_dir.into(),
            seed,
            cases: 16,
            keep_files: false,
        }
    }

    /// Random inputs drawn per property.
    #[must_use]
    pub fn with_cases(mut self, cases: usize) -> Self {
        self.cases = cases.max(1);
        self
    }

    #[must_use]
    pub fn keep_files(mut self, keep: bool) -> Self {
        self.keep_files = keep;
        self
    }

    #[must_use]
    pub fn property_names() -> Vec<&'static str> {
        PROPERTIES.iter().map(|(name, _, _)| *name).collect()
    }

    /// Run all properties, or only those whose name contains `filter`.
    pub fn run(&self, filter: Option<&str>, log: &mut LogEmitter) -> Result<SuiteRun, HarnessError> {
        fs::create_dir_all(&self.work_dir).map_err(|e| HarnessError::io(&self.work_dir, e))?;
        let run_id = format!("seed-{:x}", self.seed);
        let mut artifacts = ArtifactIndex::new(&run_id, "properties");
        let mut results = Vec::new();

        log.emit_entry(
            LogEntry::new("", LogLevel::Info, "suite_start")
                .with_phase(Phase::Property)
                .with_details(serde_json::json!({ "seed": self.seed, "cases": self.cases })),
        )
        .map_err(|e| HarnessError::io(&self.work_dir, e))?;

        for (idx, (name, reference, check)) in PROPERTIES.iter().enumerate() {
            if filter.is_some_and(|f| !name.contains(f)) {
                continue;
            }
            let path = self.work_dir.join(format!("{name}-{}.bin", std::process::id()));
            let mut rng = Rng::new(self.seed ^ ((idx as u64 + 1) << 32));

            let started = Instant::now();
            let outcome = check(&path, &mut rng, self.cases);
            let latency = started.elapsed().as_nanos() as u64;

            let result = match &outcome {
                Ok((expected, actual)) => {
                    VerificationResult::compare(name, reference, expected.clone(), actual.clone())
                }
                Err(err) => VerificationResult::errored(name, reference, err),
            };

            let mut entry = LogEntry::new(
                "",
                if result.passed { LogLevel::Info } else { LogLevel::Error },
                "case_done",
            )
            .with_phase(Phase::Property)
            .with_case(*name)
            .with_op(*reference, Some(path.as_path()))
            .with_latency_ns(latency)
            .with_outcome(match (&outcome, result.passed) {
                (Err(_), _) => Outcome::Error,
                (Ok(_), true) => Outcome::Pass,
                (Ok(_), false) => Outcome::Fail,
            });
            if let Err(HarnessError::Stream(err)) = &outcome {
                entry = entry.with_errno(err.errno());
            }
            if !result.passed {
                entry = entry.with_details(serde_json::json!({
                    "expected": result.expected,
                    "actual": result.actual,
                }));
            }

            if self.keep_files && path.exists() {
                artifacts.add_file(&path, "data", Some(format!("input for {name}")))?;
                entry = entry.with_artifacts(vec![path.display().to_string()]);
            } else {
                let _ = fs::remove_file(&path);
            }
            log.emit_entry(entry)
                .map_err(|e| HarnessError::io(&self.work_dir, e))?;
            results.push(result);
        }

        let summary = VerificationSummary::from_results(results);
        log.emit_entry(
            LogEntry::new("", LogLevel::Info, "suite_done")
                .with_phase(Phase::Property)
                .with_details(serde_json::json!({
                    "total": summary.total,
                    "passed": summary.passed,
                    "failed": summary.failed,
                })),
        )
        .and_then(|()| log.flush())
        .map_err(|e| HarnessError::io(&self.work_dir, e))?;

        Ok(SuiteRun { summary, artifacts })
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn random_bytes(rng: &mut Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.next_u64() as u8).collect()
}

fn byte_round_trip(
    path: &Path,
    rng: &mut Rng,
    cases: usize,
) -> Result<(String, String), HarnessError> {
    let mut mismatches = Vec::new();
    for case in 0..cases {
        let len = rng.below(3 * 8192) as usize;
        let data = random_bytes(rng, len);

        let mut out = Stream::open(path, "wb")?;
        out.write(&data)?;
        out.close()?;

        let mut input = Stream::open(path, "rb")?;
        let mut back = vec![0u8; len + 1];
        let n = input.read(&mut back)?;
        input.close()?;
        if n != len || back[..len] != data[..] {
            mismatches.push(format!("case {case}: wrote {len}, read {n}"));
        }
    }
    Ok(("[]".to_string(), format!("{mismatches:?}")))
}

fn bit_round_trip(
    path: &Path,
    rng: &mut Rng,
    _cases: usize,
) -> Result<(String, String), HarnessError> {
    let mut s = Stream::open(path, "w+b")?;
    let mut mismatches = Vec::new();
    for n in 1..=64u32 {
        let mask = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
        for value in [0, mask, rng.next_u64() & mask] {
            s.seek(0, SeekOrigin::Start)?;
            s.put_bits(value, n)?;
            s.seek(0, SeekOrigin::Start)?;
            let back = s.get_bits(n)?;
            if back != value {
                mismatches.push(format!("width {n}: {value:#x} -> {back:#x}"));
            }
        }
    }
    s.close()?;
    Ok(("[]".to_string(), format!("{mismatches:?}")))
}

fn padded_close(
    path: &Path,
    rng: &mut Rng,
    cases: usize,
) -> Result<(String, String), HarnessError> {
    let mut problems = Vec::new();
    for case in 0..cases {
        let count = 1 + rng.below(200) as usize;
        let bits: Vec<bool> = (0..count).map(|_| rng.next_u64() & 1 == 1).collect();

        let mut out = Stream::open(path, "wb")?;
        for &bit in &bits {
            out.put_bit(bit)?;
        }
        out.close()?;

        let raw = fs::read(path).map_err(|e| HarnessError::io(path, e))?;
        if raw.len() != count.div_ceil(8) {
            problems.push(format!("case {case}: {count} bits gave {} bytes", raw.len()));
            continue;
        }
        let spare = raw.len() * 8 - count;
        if spare > 0 && raw[raw.len() - 1] & ((1u8 << spare) - 1) != 0 {
            problems.push(format!("case {case}: nonzero padding"));
        }

        let mut input = Stream::open(path, "rb")?;
        let back: Vec<bool> = (0..count)
            .map(|_| input.get_bit().map(|b| b == 1))
            .collect::<Result<_, _>>()?;
        input.close()?;
        if back != bits {
            problems.push(format!("case {case}: bits differ"));
        }
    }
    Ok(("[]".to_string(), format!("{problems:?}")))
}

fn commit_before_byte_write(
    path: &Path,
    _rng: &mut Rng,
    _cases: usize,
) -> Result<(String, String), HarnessError> {
    let mut expected = Vec::new();
    let mut actual = Vec::new();
    for k in 1..8u32 {
        let mut s = Stream::open(path, "wb")?;
        s.put_bits((1u64 << k) - 1, k)?;
        s.put_byte(b'Z')?;
        s.close()?;
        expected.push(vec![0xFFu8 << (8 - k), b'Z']);
        actual.push(fs::read(path).map_err(|e| HarnessError::io(path, e))?);
    }
    Ok((format!("{expected:?}"), format!("{actual:?}")))
}

fn tell_tracks_writes(
    path: &Path,
    rng: &mut Rng,
    _cases: usize,
) -> Result<(String, String), HarnessError> {
    let total = 1 + rng.below(20_000);
    let mut s = Stream::open(path, "w+")?;
    let mut bad = Vec::new();
    for k in 1..=total {
        s.put_byte(b'.')?;
        if k % 997 == 0 || k == total {
            let at = s.tell()?;
            if at != k {
                bad.push((k, at));
            }
        }
    }
    s.seek(0, SeekOrigin::Start)?;
    let start = s.tell()?;
    s.close()?;
    let len = fs::metadata(path).map_err(|e| HarnessError::io(path, e))?.len();
    Ok((
        format!("bad=[] start=0 len={total}"),
        format!("bad={bad:?} start={start} len={len}"),
    ))
}

fn end_of_data(
    path: &Path,
    rng: &mut Rng,
    _cases: usize,
) -> Result<(String, String), HarnessError> {
    let byte = rng.next_u64() as u8;
    fs::write(path, [byte]).map_err(|e| HarnessError::io(path, e))?;
    let mut s = Stream::open(path, "r")?;

    let first = s.get_byte()?;
    let byte_eod = matches!(s.get_byte(), Err(StdioError::EndOfData)) && s.is_eof();
    s.seek(0, SeekOrigin::Start)?;
    let cleared = !s.is_eof();
    let bits = s.get_bits(8)?;
    let bit_eod = matches!(s.get_bit(), Err(StdioError::EndOfData)) && s.is_eof();
    let error_flag = s.is_error();
    s.close()?;

    Ok((
        format!("first={byte} byte_eod=true cleared=true bits={byte} bit_eod=true error=false"),
        format!(
            "first={first} byte_eod={byte_eod} cleared={cleared} bits={bits} bit_eod={bit_eod} error={error_flag}"
        ),
    ))
}

fn type_flags(view: &StatusView) -> [bool; 7] {
    [
        view.is_block_device(),
        view.is_char_device(),
        view.is_fifo(),
        view.is_regular(),
        view.is_dir(),
        view.is_symlink(),
        view.is_socket(),
    ]
}

fn single_file_type(
    path: &Path,
    rng: &mut Rng,
    _cases: usize,
) -> Result<(String, String), HarnessError> {
    let len = rng.below(4096) as usize;
    fs::write(path, random_bytes(rng, len)).map_err(|e| HarnessError::io(path, e))?;
    let mut s = Stream::open(path, "r")?;
    let view = s.metadata();
    s.close()?;
    let set = type_flags(&view).iter().filter(|&&f| f).count();
    Ok((
        format!("types=1 regular=true size={len}"),
        format!("types={set} regular={} size={}", view.is_regular(), view.size()),
    ))
}

fn permission_bits(
    path: &Path,
    rng: &mut Rng,
    cases: usize,
) -> Result<(String, String), HarnessError> {
    fs::write(path, b"").map_err(|e| HarnessError::io(path, e))?;
    let mut s = Stream::open(path, "r")?;
    let mut expected = Vec::new();
    let mut actual = Vec::new();
    for _ in 0..cases {
        let mode = (rng.next_u64() & 0o777) as u32;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| HarnessError::io(path, e))?;
        let view = s.refresh_metadata();
        let got = [
            view.user_read(),
            view.user_write(),
            view.user_exec(),
            view.group_read(),
            view.group_write(),
            view.group_exec(),
            view.other_read(),
            view.other_write(),
            view.other_exec(),
        ]
        .iter()
        .fold(0u32, |acc, &b| (acc << 1) | u32::from(b));
        expected.push(format!("{mode:03o}"));
        actual.push(format!("{got:03o}"));
    }
    s.close()?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| HarnessError::io(path, e))?;
    Ok((expected.join(","), actual.join(",")))
}

fn copy_preserves_bytes(
    path: &Path,
    rng: &mut Rng,
    _cases: usize,
) -> Result<(String, String), HarnessError> {
    let len = rng.below(5 * 8192) as usize;
    let data = random_bytes(rng, len);
    fs::write(path, &data).map_err(|e| HarnessError::io(path, e))?;
    let dst = path.with_extension("copy");
    let copied = copy_file(path, &dst)?;
    let back = fs::read(&dst).map_err(|e| HarnessError::io(&dst, e))?;
    let _ = fs::remove_file(&dst);
    Ok((
        format!("copied={len} same=true"),
        format!("copied={copied} same={}", back == data),
    ))
}

fn write_to_read_stream(
    path: &Path,
    _rng: &mut Rng,
    _cases: usize,
) -> Result<(String, String), HarnessError> {
    fs::write(path, b"abc").map_err(|e| HarnessError::io(path, e))?;
    let mut s = Stream::open(path, "r")?;
    let errno = s.put_byte(b'x').err().map(|e| e.errno());
    let flagged = s.is_error();
    s.clear_err();
    let cleared = !s.is_error();
    s.close()?;
    Ok((
        format!(
            "errno={:?} error=true cleared=true",
            Some(libio_core::errno::EBADF)
        ),
        format!("errno={errno:?} error={flagged} cleared={cleared}"),
    ))
}
