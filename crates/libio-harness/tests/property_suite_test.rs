//! End-to-end run of the property suite on real scratch files.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use libio_harness::structured_log::{LogEmitter, Outcome, validate_log_line};
use libio_harness::{ConformanceReport, PropertySuite};

const SUITE_SEED: u64 = 0x5EED_0F_B175;

fn scratch_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
}

#[test]
fn full_suite_passes_and_logs_every_case() {
    let dir = scratch_dir("libio-suite");
    let (mut log, buffer) = LogEmitter::to_buffer("properties", "test");
    let run = PropertySuite::new(&dir, SUITE_SEED)
        .with_cases(6)
        .run(None, &mut log)
        .unwrap();

    for r in &run.summary.results {
        assert!(r.passed, "{}: expected {} got {}", r.case_name, r.expected, r.actual);
    }
    assert_eq!(run.summary.total, PropertySuite::property_names().len());
    assert!(run.artifacts.artifacts.is_empty());

    let text = buffer.contents();
    let entries: Vec<_> = text
        .lines()
        .enumerate()
        .map(|(i, line)| validate_log_line(line, i + 1).unwrap())
        .collect();
    // suite_start + one per case + suite_done
    assert_eq!(entries.len(), run.summary.total + 2);
    assert_eq!(entries[0].event, "suite_start");
    assert_eq!(entries.last().unwrap().event, "suite_done");
    assert!(
        entries[1..entries.len() - 1]
            .iter()
            .all(|e| e.outcome == Some(Outcome::Pass) && e.latency_ns.is_some())
    );

    let leftovers = std::fs::read_dir(&dir).unwrap().count();
    assert_eq!(leftovers, 0, "scratch files should be removed");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn filter_and_kept_files_feed_the_artifact_index() {
    let dir = scratch_dir("libio-suite-keep");
    let (mut log, _buffer) = LogEmitter::to_buffer("properties", "keep");
    let run = PropertySuite::new(&dir, SUITE_SEED)
        .with_cases(2)
        .keep_files(true)
        .run(Some("round_trip"), &mut log)
        .unwrap();

    let names: Vec<_> = run
        .summary
        .results
        .iter()
        .map(|r| r.case_name.as_str())
        .collect();
    assert_eq!(names, ["byte_round_trip", "bit_round_trip"]);
    assert!(run.summary.all_passed());
    assert_eq!(run.artifacts.artifacts.len(), 2);
    assert!(run.artifacts.stale_entries().is_empty());
    assert!(
        run.artifacts
            .artifacts
            .iter()
            .all(|a| a.sha256.len() == 64 && a.size_bytes.is_some())
    );

    let report = ConformanceReport {
        title: "kept".to_string(),
        seed: SUITE_SEED,
        timestamp: libio_harness::structured_log::now_utc(),
        summary: run.summary,
        metrics: None,
    };
    assert!(report.to_markdown().contains("| bit_round_trip | fputbits/fgetbits | PASS |"));
    let _ = std::fs::remove_dir_all(&dir);
}
