mod fixtures;

use codesift::{DetectorRegistry, Engine, EngineConfig, ScanResult, UnitInput};
use fixtures::fixture_path;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One detector with a fixture it must flag and one it must leave alone.
struct Case {
    id: &'static str,
    flagged: (&'static str, &'static str),
    clean: (&'static str, &'static str),
}

const CASES: &[Case] = &[
    Case {
        id: "hardcoded-secret",
        flagged: ("python", "hardcoded_secret_flagged.py"),
        clean: ("python", "hardcoded_secret_clean.py"),
    },
    Case {
        id: "sql-injection",
        flagged: ("java", "SqlInjectionFlagged.java"),
        clean: ("python", "sql_injection_clean.py"),
    },
    Case {
        id: "command-injection",
        flagged: ("python", "command_injection_flagged.py"),
        clean: ("python", "command_injection_clean.py"),
    },
    Case {
        id: "code-injection",
        flagged: ("python", "code_injection_flagged.py"),
        clean: ("python", "code_injection_clean.py"),
    },
    Case {
        id: "weak-hash",
        flagged: ("java", "WeakHashFlagged.java"),
        clean: ("java", "WeakHashClean.java"),
    },
    Case {
        id: "silent-failure",
        flagged: ("python", "silent_failure_flagged.py"),
        clean: ("python", "silent_failure_clean.py"),
    },
    Case {
        id: "resource-leak",
        flagged: ("java", "ResourceLeakFlagged.java"),
        clean: ("python", "resource_leak_clean.py"),
    },
    Case {
        id: "quadratic-sort",
        flagged: ("python", "quadratic_sort_flagged.py"),
        clean: ("python", "quadratic_sort_clean.py"),
    },
    Case {
        id: "naive-recursion",
        flagged: ("java", "NaiveRecursionFlagged.java"),
        clean: ("python", "naive_recursion_clean.py"),
    },
    Case {
        id: "string-concat-in-loop",
        flagged: ("java", "StringConcatFlagged.java"),
        clean: ("python", "string_concat_clean.py"),
    },
    Case {
        id: "o(n)-membership-on-list",
        flagged: ("python", "list_membership_flagged.py"),
        clean: ("python", "list_membership_clean.py"),
    },
    Case {
        id: "query-in-loop",
        flagged: ("python", "query_in_loop_flagged.py"),
        clean: ("java", "QueryInLoopClean.java"),
    },
    Case {
        id: "deep-nesting",
        flagged: ("java", "DeepNestingFlagged.java"),
        clean: ("python", "deep_nesting_clean.py"),
    },
    Case {
        id: "long-parameter-list",
        flagged: ("java", "LongParameterListFlagged.java"),
        clean: ("python", "long_parameter_list_clean.py"),
    },
    Case {
        id: "missing-equality-contract",
        flagged: ("java", "EqualityContractFlagged.java"),
        clean: ("java", "EqualityContractClean.java"),
    },
    Case {
        id: "mutable-global-state",
        flagged: ("rust", "mutable_global_flagged.rs"),
        clean: ("rust", "mutable_global_clean.rs"),
    },
];

fn detector_fixture((language, name): (&str, &str)) -> PathBuf {
    fixture_path(language, Some("detectors")).join(name)
}

fn scan_with_only(id: &str, path: PathBuf) -> ScanResult {
    let config = EngineConfig {
        only_detectors: Some(vec![id.to_string()]),
        ..EngineConfig::default()
    };
    Engine::builder()
        .with_config(config)
        .build()
        .unwrap()
        .scan(&[UnitInput::path(path)])
        .unwrap()
}

#[test]
fn test_every_builtin_detector_has_fixtures() {
    let covered: BTreeSet<&str> = CASES.iter().map(|case| case.id).collect();
    let registered: BTreeSet<&str> = DetectorRegistry::global().ids().into_iter().collect();
    assert_eq!(covered, registered);
}

#[test]
fn test_each_detector_flags_its_fixture() {
    for case in CASES {
        let path = detector_fixture(case.flagged);
        let result = scan_with_only(case.id, path.clone());
        assert!(
            result.diagnostics.is_empty(),
            "{}: {:?}",
            path.display(),
            result.diagnostics
        );
        assert!(
            !result.findings.is_empty(),
            "{} raised nothing on {}",
            case.id,
            path.display()
        );
        assert!(result.findings.iter().all(|f| f.detector_id == case.id));
    }
}

#[test]
fn test_each_detector_is_quiet_on_its_clean_fixture() {
    for case in CASES {
        let path = detector_fixture(case.clean);
        let result = scan_with_only(case.id, path.clone());
        assert!(
            result.diagnostics.is_empty(),
            "{}: {:?}",
            path.display(),
            result.diagnostics
        );
        assert!(
            result.findings.is_empty(),
            "{} fired on {}: {:?}",
            case.id,
            path.display(),
            result.findings
        );
    }
}
