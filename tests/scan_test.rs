mod fixtures;

use codesift::aggregate::DiagnosticKind;
use codesift::output::OutputFormatter;
use codesift::{CancellationToken, Category, DetectorRegistry, Engine, ScanResult, UnitInput};
use fixtures::fixture_path;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn scan_fixture(language: &str, name: &str) -> ScanResult {
    Engine::new()
        .scan(&[UnitInput::path(fixture_path(language, Some(name)))])
        .unwrap()
}

fn ids(result: &ScanResult) -> BTreeSet<&str> {
    result.findings.iter().map(|f| f.detector_id.as_str()).collect()
}

#[test]
fn test_bad_code_covers_every_category_of_defect() {
    let result = scan_fixture("java", "BadCode.java");
    let found = ids(&result);
    for expected in [
        "hardcoded-secret",
        "sql-injection",
        "command-injection",
        "weak-hash",
        "silent-failure",
        "resource-leak",
        "quadratic-sort",
        "naive-recursion",
        "string-concat-in-loop",
        "o(n)-membership-on-list",
        "deep-nesting",
        "long-parameter-list",
        "mutable-global-state",
    ] {
        assert!(found.contains(expected), "missing {expected}: {found:?}");
    }
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.summary.units_scanned, 1);
    assert_eq!(result.summary.total_findings, result.findings.len());
    assert_eq!(result.summary.by_severity.total(), result.findings.len());
}

#[test]
fn test_bad_code_findings_are_ranked() {
    let result = scan_fixture("java", "BadCode.java");
    for pair in result.findings.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.severity >= b.severity);
        if a.severity == b.severity {
            assert!((a.line(), a.column()) <= (b.line(), b.column()));
        }
    }
    assert!(result
        .findings
        .iter()
        .all(|f| (0.0..=1.0).contains(&f.confidence)));
}

#[test]
fn test_scan_is_idempotent() {
    let first = scan_fixture("java", "BadCode.java");
    let second = scan_fixture("java", "BadCode.java");
    let render = |r: &ScanResult| OutputFormatter::format(r, codesift::cli::OutputFormat::Json).unwrap();
    assert_eq!(render(&first), render(&second));
}

#[test]
fn test_clean_code_has_no_security_findings() {
    let result = scan_fixture("java", "CleanCode.java");
    let found = ids(&result);
    assert!(
        result.findings.iter().all(|f| f.category != Category::Security),
        "{found:?}"
    );
    assert!(!found.contains("resource-leak"));
    assert!(!found.contains("string-concat-in-loop"));
    assert!(!found.contains("o(n)-membership-on-list"));
}

#[test]
fn test_python_performance_fixture() {
    let result = scan_fixture("python", "performance.py");
    let found = ids(&result);
    assert!(found.contains("string-concat-in-loop"));
    assert!(found.contains("o(n)-membership-on-list"));
    assert!(found.contains("naive-recursion"));
    assert_eq!(result.summary.by_category.performance, result.findings.len());
}

#[test]
fn test_nothing_reported_inside_comments_or_literals() {
    let result = scan_fixture("python", "literals.py");
    assert!(result.findings.is_empty(), "{:?}", result.findings);
}

#[test]
fn test_re_registered_detector_is_deduplicated() {
    let input = [UnitInput::path(fixture_path("java", Some("BadCode.java")))];
    let baseline = Engine::new().scan(&input).unwrap();

    let secret = DetectorRegistry::global().get("hardcoded-secret").unwrap();
    let engine = Engine::builder()
        .with_shared_detector(secret)
        .build()
        .unwrap();
    assert_eq!(engine.registry().len(), DetectorRegistry::global().len() + 1);
    let doubled = engine.scan(&input).unwrap();

    assert_eq!(baseline.findings, doubled.findings);
}

#[test]
fn test_unparseable_unit_does_not_block_siblings() {
    let result = Engine::new()
        .scan(&[
            UnitInput::path(fixture_path("python", Some("broken.py"))),
            UnitInput::path(fixture_path("python", Some("performance.py"))),
        ])
        .unwrap();

    let partial: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::PartialParse)
        .collect();
    assert_eq!(partial.len(), 1);
    assert!(partial[0].unit.ends_with("broken.py"));
    assert!(result.units.iter().any(|u| u.partial_parse));
    assert!(result
        .findings
        .iter()
        .any(|f| f.file.ends_with("performance.py")));
}

#[test]
fn test_directory_scan_orders_units_by_path() {
    let files = codesift::source::collect_sources(&fixture_path("java", None)).unwrap();
    let count = files.len();
    assert!(count > 2);
    let inputs: Vec<UnitInput> = files.into_iter().rev().map(UnitInput::path).collect();
    let result = Engine::new().scan(&inputs).unwrap();

    let units: Vec<&str> = result.units.iter().map(|u| u.file.as_str()).collect();
    let mut sorted = units.clone();
    sorted.sort();
    assert_eq!(units, sorted);
    assert_eq!(result.summary.units_scanned, count);
}

#[test]
fn test_deeply_nested_unit_does_not_take_down_siblings() {
    let long_concat = format!("q = \"a\"{}\n", " + b".repeat(50_000));
    let nested_calls = format!("x = {}y{}\n", "f(".repeat(600), ")".repeat(600));
    let inputs = [
        UnitInput::buffer("concat.py", long_concat),
        UnitInput::buffer("calls.py", nested_calls),
        UnitInput::path(fixture_path("python", Some("performance.py"))),
    ];

    let alone = Engine::new().scan(&inputs[2..]).unwrap();
    let result = Engine::new().scan(&inputs).unwrap();

    assert_eq!(result.summary.units_scanned, 3);
    for deep in ["concat.py", "calls.py"] {
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.unit == deep && d.kind == DiagnosticKind::PartialParse),
            "{deep}: {:?}",
            result.diagnostics
        );
    }
    let sibling: Vec<_> = result
        .findings
        .iter()
        .filter(|f| f.file.ends_with("performance.py"))
        .cloned()
        .collect();
    assert!(!sibling.is_empty());
    assert_eq!(sibling, alone.findings);
}

#[test]
fn test_cancelled_before_start_returns_partial_result() {
    let token = CancellationToken::new();
    token.cancel();
    let result = Engine::new()
        .scan_with(&[UnitInput::path(fixture_path("java", Some("BadCode.java")))], &token)
        .unwrap();
    assert!(result.partial);
    assert_eq!(result.summary.units_scanned, 0);
}

#[test]
fn test_in_memory_buffer_with_language_hint() {
    let result = Engine::new()
        .scan(&[UnitInput::buffer(
            "snippet",
            "import hashlib\n\ndef store(password):\n    return hashlib.md5(password.encode()).hexdigest()\n",
        )
        .with_language(codesift::Language::Python)])
        .unwrap();
    assert_eq!(ids(&result).into_iter().collect::<Vec<_>>(), vec!["weak-hash"]);
    assert_eq!(result.findings[0].file, "snippet");
}
