// ABOUTME: End-to-end scenarios exercising the whole pipeline: lexer,
// parser, interpreter, evaluator, and the built-in dispatch shell

use std::cell::RefCell;
use std::rc::Rc;

use flowby::builtins::default_system_names;
use flowby::context::{
    ExecutionContext, LogEvent, QueuedInput, RecordingActionHost, RecordingLogger,
};
use flowby::error::{FlowError, LexError, SemanticError};
use flowby::interp::{ExitOutcome, Interpreter};
use flowby::parser::{parse_source, ParseOptions};
use flowby::value::Value;

/// Parse with the default system names.
fn parse(src: &str) -> flowby::ast::Program {
    parse_source(src, ParseOptions::with_system_names(default_system_names()))
        .unwrap_or_else(|e| panic!("parse failed: {}", e))
}

/// Run a program on a quiet context and hand back the interpreter so tests
/// can inspect the globals.
fn run_quiet(src: &str) -> (ExitOutcome, Interpreter) {
    let context = ExecutionContext::builder()
        .logger(Rc::new(RecordingLogger::default()))
        .actions(Rc::new(RefCell::new(RecordingActionHost::new())))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse(src));
    (outcome, interp)
}

fn expect_completed(src: &str) -> Interpreter {
    let (outcome, interp) = run_quiet(src);
    assert_eq!(outcome, ExitOutcome::Completed, "program failed");
    interp
}

fn global(interp: &Interpreter, name: &str) -> Value {
    interp
        .globals()
        .get(name)
        .unwrap_or_else(|| panic!("global '{}' not defined", name))
}

// ============================================================================
// Short-circuit evaluation
// ============================================================================

#[test]
fn test_and_short_circuits_without_side_effects() {
    let interp = expect_completed(
        "let triggered = False\nfunction side():\n    triggered = True\n    return True\nlet x = False and side()",
    );
    assert!(matches!(global(&interp, "x"), Value::Bool(false)));
    assert!(matches!(global(&interp, "triggered"), Value::Bool(false)));
}

#[test]
fn test_or_short_circuits() {
    let interp = expect_completed(
        "let triggered = False\nfunction side():\n    triggered = True\n    return False\nlet x = 1 or side()",
    );
    assert!(matches!(global(&interp, "x"), Value::Int(1)));
    assert!(matches!(global(&interp, "triggered"), Value::Bool(false)));
}

#[test]
fn test_and_returns_deciding_operand_unchanged() {
    let interp = expect_completed("let a = 0 and True\nlet b = 2 and 3\nlet c = \"\" or [1]");
    assert!(matches!(global(&interp, "a"), Value::Int(0)));
    assert!(matches!(global(&interp, "b"), Value::Int(3)));
    assert!(matches!(global(&interp, "c"), Value::List(_)));
}

// ============================================================================
// Closures
// ============================================================================

#[test]
fn test_closure_capture_counter() {
    let interp = expect_completed(
        "function makeCounter():\n    let count = 0\n    function inc():\n        count = count + 1\n        return count\n    return inc\nlet c = makeCounter()\nlet a = c()\nlet b = c()",
    );
    assert!(matches!(global(&interp, "a"), Value::Int(1)));
    assert!(matches!(global(&interp, "b"), Value::Int(2)));
}

#[test]
fn test_two_counters_are_independent() {
    let interp = expect_completed(
        "function makeCounter():\n    let count = 0\n    function inc():\n        count = count + 1\n        return count\n    return inc\nlet c1 = makeCounter()\nlet c2 = makeCounter()\nlet a = c1()\nlet b = c1()\nlet d = c2()",
    );
    assert!(matches!(global(&interp, "b"), Value::Int(2)));
    assert!(matches!(global(&interp, "d"), Value::Int(1)));
}

#[test]
fn test_lambda_closure_captures_at_evaluation() {
    let interp = expect_completed(
        "function adder(n):\n    return x => x + n\nlet add5 = adder(5)\nlet r = add5(10)",
    );
    assert!(matches!(global(&interp, "r"), Value::Int(15)));
}

// ============================================================================
// Loops and iteration
// ============================================================================

#[test]
fn test_enumerate_multi_var_unpacking() {
    let interp = expect_completed(
        "let total = 0\nfor i, v in enumerate([10, 20, 30]):\n    total = total + i * v",
    );
    assert!(matches!(global(&interp, "total"), Value::Int(80)));
}

#[test]
fn test_for_over_dict_yields_keys() {
    let interp = expect_completed(
        "let keys = \"\"\nfor k in {a: 1, b: 2}:\n    keys = keys + k",
    );
    assert_eq!(global(&interp, "keys").to_display_string(), "ab");
}

#[test]
fn test_for_over_string_yields_chars() {
    let interp = expect_completed(
        "let count = 0\nfor ch in \"abc\":\n    count = count + 1",
    );
    assert!(matches!(global(&interp, "count"), Value::Int(3)));
}

#[test]
fn test_break_and_continue() {
    let interp = expect_completed(
        "let total = 0\nfor i in range(10):\n    if i == 3:\n        continue\n    if i == 6:\n        break\n    total = total + i",
    );
    // 0 + 1 + 2 + 4 + 5
    assert!(matches!(global(&interp, "total"), Value::Int(12)));
}

#[test]
fn test_while_loop_guard_trips() {
    let (outcome, _) = run_quiet("let i = 0\nwhile True:\n    i = i + 1");
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("10000"), "message was: {}", message);
            assert!(message.contains("line 2"), "message was: {}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_while_loop_scope_restored_after_break() {
    let interp = expect_completed(
        "let n = 0\nwhile n < 5:\n    let local = n\n    n = n + 1\n    if local == 2:\n        break\nlet after = n",
    );
    assert!(matches!(global(&interp, "after"), Value::Int(3)));
    assert!(interp.globals().get("local").is_none());
}

#[test]
fn test_unpack_arity_mismatch_fails() {
    let (outcome, _) = run_quiet("for a, b in [[1, 2, 3]]:\n    log a");
    assert!(matches!(outcome, ExitOutcome::Failed { .. }));
}

// ============================================================================
// Static checks (lexer and parser)
// ============================================================================

#[test]
fn test_two_space_indent_is_a_lex_error() {
    let err = parse_source(
        "step \"x\":\n  log \"hi\"",
        ParseOptions::with_system_names(default_system_names()),
    )
    .unwrap_err();
    assert_eq!(
        err,
        FlowError::Lex(LexError::IndentNotMultiple { width: 2, line: 2 })
    );
}

#[test]
fn test_use_before_declaration_caught_at_parse_time() {
    let err = parse_source(
        "log x\nlet x = 1",
        ParseOptions::with_system_names(default_system_names()),
    )
    .unwrap_err();
    match err {
        FlowError::Semantic(violations) => {
            assert!(matches!(
                violations[0],
                SemanticError::UndefinedVariable { ref name, line: 1 } if name == "x"
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

// ============================================================================
// when / step / exit
// ============================================================================

#[test]
fn test_when_selects_single_case() {
    let interp = expect_completed(
        "let x = 2\nlet hit = \"\"\nwhen x:\n    1 or 2:\n        hit = \"low\"\n    3:\n        hit = \"three\"\n    otherwise:\n        hit = \"other\"",
    );
    assert_eq!(global(&interp, "hit").to_display_string(), "low");
}

#[test]
fn test_when_otherwise_default() {
    let interp = expect_completed(
        "let x = 99\nlet hit = \"\"\nwhen x:\n    1:\n        hit = \"one\"\n    otherwise:\n        hit = \"other\"",
    );
    assert_eq!(global(&interp, "hit").to_display_string(), "other");
}

#[test]
fn test_step_logs_and_shares_scope() {
    let logger = Rc::new(RecordingLogger::default());
    let context = ExecutionContext::builder()
        .logger(logger.clone())
        .actions(Rc::new(RefCell::new(RecordingActionHost::new())))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome =
        interp.run_program(&parse("step \"login\":\n    let x = 1\nlet y = x + 1"));
    assert_eq!(outcome, ExitOutcome::Completed);

    let events = logger.events.borrow();
    assert!(events
        .iter()
        .any(|e| matches!(e, LogEvent::StepEntered { label, .. } if label == "login")));
}

#[test]
fn test_exit_nonzero_fails_run() {
    let (outcome, _) = run_quiet("exit 2, \"bad\"");
    assert_eq!(
        outcome,
        ExitOutcome::Failed {
            code: 2,
            message: "bad".to_string()
        }
    );
}

#[test]
fn test_exit_zero_completes() {
    let (outcome, _) = run_quiet("exit\nlog \"unreachable\"");
    assert_eq!(outcome, ExitOutcome::Completed);
}

#[test]
fn test_exit_inside_function_reaches_top() {
    let (outcome, _) = run_quiet(
        "function bail():\n    exit 7, \"from deep\"\n    return 1\nlet x = bail()",
    );
    assert_eq!(
        outcome,
        ExitOutcome::Failed {
            code: 7,
            message: "from deep".to_string()
        }
    );
}

// ============================================================================
// Functions: arity, recursion policy
// ============================================================================

#[test]
fn test_wrong_arity_rejected() {
    let (outcome, _) = run_quiet("function f(a, b):\n    return a\nlet x = f(1)");
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("expected 2 arguments, got 1"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_recursion_refused_by_default() {
    let (outcome, _) = run_quiet(
        "function f(n):\n    if n == 0:\n        return 0\n    return f(n - 1)\nlet x = f(3)",
    );
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("recursive call to 'f'"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_recursion_allowed_when_configured() {
    let mut limits = flowby::config::RunLimits::default();
    limits.allow_recursion = true;
    let context = ExecutionContext::builder()
        .limits(limits)
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse(
        "function fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\nlet x = fact(5)",
    ));
    assert_eq!(outcome, ExitOutcome::Completed);
    assert!(matches!(global(&interp, "x"), Value::Int(120)));
}

#[test]
fn test_call_depth_cap_with_recursion_allowed() {
    let mut limits = flowby::config::RunLimits::default();
    limits.allow_recursion = true;
    limits.max_call_depth = 16;
    let context = ExecutionContext::builder()
        .limits(limits)
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse(
        "function down(n):\n    return down(n - 1)\nlet x = down(100)",
    ));
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("call depth exceeded 16"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_falling_off_function_end_returns_none() {
    let interp = expect_completed("function noop():\n    let a = 1\nlet r = noop()");
    assert!(matches!(global(&interp, "r"), Value::None));
}

// ============================================================================
// Values, f-strings, collections
// ============================================================================

#[test]
fn test_fstring_rendering_matches_str_rule() {
    let interp = expect_completed(
        "let name = \"ada\"\nlet n = 3\nlet msg = f\"{name} has {n} items ({2.0})\"",
    );
    assert_eq!(
        global(&interp, "msg").to_display_string(),
        "ada has 3 items (2.0)"
    );
}

#[test]
fn test_fstring_without_fragments_equals_literal() {
    let interp = expect_completed("let a = f\"plain text\"\nlet b = \"plain text\"");
    assert!(global(&interp, "a").value_eq(&global(&interp, "b")));
}

#[test]
fn test_list_mutation_through_alias() {
    let interp = expect_completed("let xs = [1, 2]\nlet ys = xs\nys[0] = 99\nlet r = xs[0]");
    assert!(matches!(global(&interp, "r"), Value::Int(99)));
}

#[test]
fn test_dict_member_and_index_access() {
    let interp = expect_completed(
        "let d = {name: \"ada\", age: 36}\nlet a = d.name\nlet b = d[\"age\"]\nd.city = \"london\"\nlet c = d.city",
    );
    assert_eq!(global(&interp, "a").to_display_string(), "ada");
    assert!(matches!(global(&interp, "b"), Value::Int(36)));
    assert_eq!(global(&interp, "c").to_display_string(), "london");
}

#[test]
fn test_negative_index_wraps() {
    let interp = expect_completed("let xs = [1, 2, 3]\nlet last = xs[-1]");
    assert!(matches!(global(&interp, "last"), Value::Int(3)));
}

#[test]
fn test_index_out_of_range_fails() {
    let (outcome, _) = run_quiet("let xs = [1]\nlet x = xs[5]");
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("index 5 out of range"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_builtin_namespace_dispatch() {
    let interp = expect_completed(
        "let a = Math.abs(-3)\nlet b = Math.max(1, 9, 4)\nlet c = JSON.parse(\"[1, 2]\")\nlet d = util.upper(\"hi\")",
    );
    assert!(matches!(global(&interp, "a"), Value::Int(3)));
    assert!(matches!(global(&interp, "b"), Value::Int(9)));
    assert_eq!(global(&interp, "c").to_display_string(), "[1, 2]");
    assert_eq!(global(&interp, "d").to_display_string(), "HI");
}

#[test]
fn test_unknown_namespace_method_fails() {
    let (outcome, _) = run_quiet("let x = Math.cbrt(8)");
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("no method 'cbrt'"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_higher_order_builtins_with_lambdas() {
    let interp = expect_completed(
        "let double = x => x * 2\nlet xs = [1, 2, 3]\nlet r = double(xs[2])",
    );
    assert!(matches!(global(&interp, "r"), Value::Int(6)));
}

// ============================================================================
// Actions
// ============================================================================

#[test]
fn test_actions_reach_the_host_in_order() {
    let host = Rc::new(RefCell::new(RecordingActionHost::new()));
    let context = ExecutionContext::builder()
        .actions(host.clone())
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse(
        "navigate to \"https://shop.test\"\ntype \"cats\" into \"#search\"\nclick \"#go\"\nwait 1\nscreenshot \"results\"",
    ));
    assert_eq!(outcome, ExitOutcome::Completed);

    let host = host.borrow();
    let kinds: Vec<&str> = host.executed.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(kinds, vec!["navigate", "type", "click", "wait", "screenshot"]);
    assert_eq!(
        host.executed[0].1.get("url").unwrap().to_display_string(),
        "https://shop.test"
    );
    assert_eq!(
        host.executed[1].1.get("text").unwrap().to_display_string(),
        "cats"
    );
}

#[test]
fn test_extract_binds_host_value() {
    let host = Rc::new(RefCell::new(
        RecordingActionHost::new().respond_to("extract", Value::string("42.99")),
    ));
    let context = ExecutionContext::builder()
        .actions(host)
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse(
        "extract \"#price\" into price\nassert price == \"42.99\"",
    ));
    assert_eq!(outcome, ExitOutcome::Completed);
}

#[test]
fn test_action_failure_carries_line() {
    let host = Rc::new(RefCell::new(RecordingActionHost {
        fail_on: Some("click".to_string()),
        ..RecordingActionHost::new()
    }));
    let context = ExecutionContext::builder()
        .actions(host)
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse("let sel = \"#go\"\nclick sel"));
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("line 2"), "{}", message);
            assert!(message.contains("click"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_assert_failure_message() {
    let (outcome, _) = run_quiet("assert 1 == 2, \"math is broken\"");
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("math is broken"));
            assert!(message.contains("line 1"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_selector_expressions_evaluated() {
    let host = Rc::new(RefCell::new(RecordingActionHost::new()));
    let context = ExecutionContext::builder()
        .actions(host.clone())
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse(
        "let row = 3\nclick f\"#table tr[{row}] .edit\"",
    ));
    assert_eq!(outcome, ExitOutcome::Completed);
    let host = host.borrow();
    assert_eq!(
        host.executed[0].1.get("selector").unwrap().to_display_string(),
        "#table tr[3] .edit"
    );
}

#[test]
fn test_host_namespace_replaces_page_stub() {
    struct FakePage;
    impl flowby::context::NamespaceCall for FakePage {
        fn name(&self) -> &str {
            "page"
        }
        fn invoke(
            &self,
            method: &str,
            _args: &[Value],
            _kwargs: &flowby::context::Kwargs,
        ) -> Result<Value, flowby::error::RuntimeErrorKind> {
            match method {
                "title" => Ok(Value::string("Shop")),
                _ => Err(flowby::error::RuntimeErrorKind::UnknownMethod {
                    namespace: "page".to_string(),
                    method: method.to_string(),
                }),
            }
        }
    }

    let context = ExecutionContext::builder()
        .namespace(Rc::new(FakePage))
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse("let t = page.title()\nassert t == \"Shop\""));
    assert_eq!(outcome, ExitOutcome::Completed);
}

// ============================================================================
// input()
// ============================================================================

#[test]
fn test_input_uses_queue() {
    let context = ExecutionContext::builder()
        .input(Rc::new(RefCell::new(QueuedInput {
            queue: vec![Value::string("ada")],
        })))
        .logger(Rc::new(RecordingLogger::default()))
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse("let name = input(\"who?\")"));
    assert_eq!(outcome, ExitOutcome::Completed);
    assert_eq!(global(&interp, "name").to_display_string(), "ada");
}

#[test]
fn test_input_falls_back_to_default() {
    let interp = expect_completed("let name = input(\"who?\", default = \"anon\")");
    assert_eq!(global(&interp, "name").to_display_string(), "anon");
}

#[test]
fn test_input_required_in_non_interactive() {
    let (outcome, _) = run_quiet("let name = input(\"who?\")");
    match outcome {
        ExitOutcome::Failed { message, .. } => {
            assert!(message.contains("not interactive"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
}

// ============================================================================
// log
// ============================================================================

#[test]
fn test_log_emits_structured_event() {
    let logger = Rc::new(RecordingLogger::default());
    let context = ExecutionContext::builder()
        .logger(logger.clone())
        .build();
    let mut interp = Interpreter::new(context);
    let outcome = interp.run_program(&parse("log \"hello\"\nlog 42"));
    assert_eq!(outcome, ExitOutcome::Completed);

    let events = logger.events.borrow();
    let texts: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            LogEvent::ScriptLog { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["hello", "42"]);
}
