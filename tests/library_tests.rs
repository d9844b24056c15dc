// ABOUTME: Two-phase module loading against real directories: exports,
// caching, constraints, search paths, and cycle detection

use serial_test::serial;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use flowby::builtins::default_system_names;
use flowby::config::ModuleConfig;
use flowby::context::{ExecutionContext, RecordingActionHost, RecordingLogger};
use flowby::interp::{ExitOutcome, Interpreter};
use flowby::parser::{parse_source, ParseOptions};
use flowby::value::Value;

fn test_dir() -> PathBuf {
    PathBuf::from("./test_flowby_modules")
}

fn setup() -> PathBuf {
    let dir = test_dir();
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("lib")).unwrap();
    dir
}

fn cleanup(dir: &PathBuf) {
    let _ = fs::remove_dir_all(dir);
}

/// Run `source` as if it were the given file, with a quiet context.
fn run_at(dir: &PathBuf, file: &str, source: &str) -> (ExitOutcome, Interpreter) {
    let main_path = dir.join(file);
    fs::write(&main_path, source).unwrap();

    let context = ExecutionContext::builder()
        .logger(Rc::new(RecordingLogger::default()))
        .actions(Rc::new(RefCell::new(RecordingActionHost::new())))
        .modules(ModuleConfig {
            search_roots: vec![dir.join("lib")],
            strict_imports: true,
        })
        .build();

    let program = parse_source(
        source,
        ParseOptions::with_system_names(default_system_names()),
    )
    .unwrap_or_else(|e| panic!("parse failed: {}", e));

    let mut interp = Interpreter::with_origin(context, Some(main_path));
    let outcome = interp.run_program(&program);
    (outcome, interp)
}

const LIB_U: &str = "library u\nexport function greet(name):\n    return \"hi \" + name\nlet helper = 1\n";

#[test]
#[serial]
fn test_two_phase_load_and_member_call() {
    let dir = setup();
    fs::write(dir.join("lib/u.flow"), LIB_U).unwrap();

    let (outcome, interp) = run_at(
        &dir,
        "main.flow",
        "import u from \"lib/u.flow\"\nlet r = u.greet(\"a\")",
    );
    assert_eq!(outcome, ExitOutcome::Completed);
    assert_eq!(
        interp.globals().get("r").unwrap().to_display_string(),
        "hi a"
    );

    cleanup(&dir);
}

#[test]
#[serial]
fn test_unexported_member_raises() {
    let dir = setup();
    fs::write(dir.join("lib/u.flow"), LIB_U).unwrap();

    let (outcome, _) = run_at(
        &dir,
        "main.flow",
        "import u from \"lib/u.flow\"\nlet r = u.helper",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("not exported"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}

#[test]
#[serial]
fn test_from_import_members() {
    let dir = setup();
    fs::write(
        dir.join("lib/u.flow"),
        "library u\nexport const version = 3\nexport function greet(name):\n    return \"hi \" + name\n",
    )
    .unwrap();

    let (outcome, interp) = run_at(
        &dir,
        "main.flow",
        "from \"lib/u.flow\" import greet, version\nlet r = greet(\"b\")\nlet v = version",
    );
    assert_eq!(outcome, ExitOutcome::Completed);
    assert_eq!(
        interp.globals().get("r").unwrap().to_display_string(),
        "hi b"
    );
    assert!(matches!(
        interp.globals().get("v").unwrap(),
        Value::Int(3)
    ));

    cleanup(&dir);
}

#[test]
#[serial]
fn test_from_import_unknown_name_raises() {
    let dir = setup();
    fs::write(dir.join("lib/u.flow"), LIB_U).unwrap();

    let (outcome, _) = run_at(
        &dir,
        "main.flow",
        "from \"lib/u.flow\" import shout\nlog \"unreached\"",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("not exported"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}

#[test]
#[serial]
fn test_reimport_returns_cached_exports() {
    let dir = setup();
    // The library counts loads through a side effect the second import
    // must not repeat: loading twice would shadow the file.
    fs::write(dir.join("lib/u.flow"), LIB_U).unwrap();

    let (outcome, interp) = run_at(
        &dir,
        "main.flow",
        "import u from \"lib/u.flow\"\nimport again from \"lib/u.flow\"\nlet a = u.greet(\"x\")\nlet b = again.greet(\"x\")",
    );
    assert_eq!(outcome, ExitOutcome::Completed);

    // Same exports table: the exported function is the identical value.
    let a = interp.globals().get("u").unwrap();
    let b = interp.globals().get("again").unwrap();
    match (a, b) {
        (Value::Namespace(na), Value::Namespace(nb)) => {
            let fa = na.get("greet").unwrap();
            let fb = nb.get("greet").unwrap();
            assert!(fa.value_eq(&fb), "exports differ between imports");
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}

#[test]
#[serial]
fn test_library_name_must_match_stem() {
    let dir = setup();
    fs::write(
        dir.join("lib/util.flow"),
        "library helpers\nexport const v = 1\n",
    )
    .unwrap();

    let (outcome, _) = run_at(
        &dir,
        "main.flow",
        "import util from \"lib/util.flow\"\nlog \"unreached\"",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(
                message.contains("helpers") && message.contains("util"),
                "{}",
                message
            );
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}

#[test]
#[serial]
fn test_non_library_file_refused_when_strict() {
    let dir = setup();
    fs::write(dir.join("lib/plain.flow"), "const v = 1\n").unwrap();

    let (outcome, _) = run_at(
        &dir,
        "main.flow",
        "import plain from \"lib/plain.flow\"\nlog \"unreached\"",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("not a library"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}

#[test]
#[serial]
fn test_non_library_file_implicitly_exports_when_relaxed() {
    let dir = setup();
    fs::write(
        dir.join("lib/plain.flow"),
        "const v = 41\nfunction bump(x):\n    return x + 1\n",
    )
    .unwrap();
    let main_path = dir.join("main.flow");
    let source = "import plain from \"lib/plain.flow\"\nlet r = plain.bump(plain.v)";
    fs::write(&main_path, source).unwrap();

    let context = ExecutionContext::builder()
        .logger(Rc::new(RecordingLogger::default()))
        .modules(ModuleConfig {
            search_roots: vec![dir.join("lib")],
            strict_imports: false,
        })
        .build();
    let program = parse_source(
        source,
        ParseOptions::with_system_names(default_system_names()),
    )
    .unwrap();
    let mut interp = Interpreter::with_origin(context, Some(main_path));
    let outcome = interp.run_program(&program);

    assert_eq!(outcome, ExitOutcome::Completed);
    assert!(matches!(
        interp.globals().get("r").unwrap(),
        Value::Int(42)
    ));

    cleanup(&dir);
}

#[test]
#[serial]
fn test_library_with_action_refused() {
    let dir = setup();
    fs::write(
        dir.join("lib/bad.flow"),
        "library bad\nnavigate to \"https://x.test\"\n",
    )
    .unwrap();

    let (outcome, _) = run_at(
        &dir,
        "main.flow",
        "import bad from \"lib/bad.flow\"\nlog \"unreached\"",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("not allowed"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}

#[test]
#[serial]
fn test_circular_import_detected() {
    let dir = setup();
    fs::write(
        dir.join("lib/a.flow"),
        "library a\nimport b from \"b.flow\"\nexport const va = 1\n",
    )
    .unwrap();
    fs::write(
        dir.join("lib/b.flow"),
        "library b\nimport a from \"a.flow\"\nexport const vb = 2\n",
    )
    .unwrap();

    let (outcome, _) = run_at(
        &dir,
        "main.flow",
        "import a from \"lib/a.flow\"\nlog \"unreached\"",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("circular import"), "{}", message);
            assert!(message.contains("a.flow"), "{}", message);
            assert!(message.contains("b.flow"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}

#[test]
#[serial]
fn test_nested_imports_resolve_relative_to_importer() {
    let dir = setup();
    fs::write(
        dir.join("lib/outer.flow"),
        "library outer\nimport inner from \"inner.flow\"\nexport function twice(x):\n    return inner.double(x)\n",
    )
    .unwrap();
    fs::write(
        dir.join("lib/inner.flow"),
        "library inner\nexport function double(x):\n    return x * 2\n",
    )
    .unwrap();

    let (outcome, interp) = run_at(
        &dir,
        "main.flow",
        "import outer from \"lib/outer.flow\"\nlet r = outer.twice(21)",
    );
    assert_eq!(outcome, ExitOutcome::Completed);
    assert!(matches!(
        interp.globals().get("r").unwrap(),
        Value::Int(42)
    ));

    cleanup(&dir);
}

#[test]
#[serial]
fn test_search_roots_fallback() {
    let dir = setup();
    fs::write(
        dir.join("lib/shared.flow"),
        "library shared\nexport const flag = True\n",
    )
    .unwrap();

    // The import path has no directory component: only the configured
    // search roots can find it.
    let (outcome, interp) = run_at(
        &dir,
        "main.flow",
        "import shared from \"shared.flow\"\nlet f = shared.flag",
    );
    assert_eq!(outcome, ExitOutcome::Completed);
    assert!(matches!(
        interp.globals().get("f").unwrap(),
        Value::Bool(true)
    ));

    cleanup(&dir);
}

#[test]
#[serial]
fn test_library_parse_failure_is_module_error() {
    let dir = setup();
    fs::write(dir.join("lib/broken.flow"), "library broken\nexport const = \n").unwrap();

    let (outcome, _) = run_at(
        &dir,
        "main.flow",
        "import broken from \"lib/broken.flow\"\nlog \"unreached\"",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("broken.flow"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }

    cleanup(&dir);
}
