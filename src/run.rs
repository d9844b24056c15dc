// ABOUTME: Program entry: source text + context -> ExitOutcome

use std::path::PathBuf;

use crate::builtins::system_names_for;
use crate::context::ExecutionContext;
use crate::interp::{ExitOutcome, Interpreter};
use crate::parser::{parse_source, ParseOptions};

/// Lex, parse, and execute a complete program. Front-end failures (lex,
/// parse, accumulated semantic violations) and uncaught runtime errors all
/// surface as `Failed`; `exit 0` and normal completion are `Completed`.
pub fn run(source: &str, origin: &str, context: ExecutionContext) -> ExitOutcome {
    let options = ParseOptions {
        file_stem: None,
        system_names: system_names_for(&context),
    };

    let program = match parse_source(source, options) {
        Ok(program) => program,
        Err(e) => {
            return ExitOutcome::Failed {
                code: 1,
                message: format!("{}: {}", origin, e),
            }
        }
    };

    let origin_path = if origin.is_empty() {
        None
    } else {
        Some(PathBuf::from(origin))
    };
    let mut interpreter = Interpreter::with_origin(context, origin_path);
    interpreter.run_program(&program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ExitOutcome;

    #[test]
    fn test_trivial_program_completes() {
        let outcome = run("let x = 1", "test.flow", ExecutionContext::with_defaults());
        assert_eq!(outcome, ExitOutcome::Completed);
    }

    #[test]
    fn test_parse_failure_is_failed_outcome() {
        let outcome = run("log missing", "test.flow", ExecutionContext::with_defaults());
        match outcome {
            ExitOutcome::Failed { code, message } => {
                assert_eq!(code, 1);
                assert!(message.contains("undefined variable 'missing'"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exit_zero_completes() {
        let outcome = run("exit 0", "test.flow", ExecutionContext::with_defaults());
        assert_eq!(outcome, ExitOutcome::Completed);
    }

    #[test]
    fn test_exit_nonzero_fails_with_message() {
        let outcome = run(
            "exit 3, \"nothing to do\"",
            "test.flow",
            ExecutionContext::with_defaults(),
        );
        assert_eq!(
            outcome,
            ExitOutcome::Failed {
                code: 3,
                message: "nothing to do".to_string()
            }
        );
    }
}
