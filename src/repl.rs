// ABOUTME: Interactive REPL: reads statements (including indented blocks),
// executes them against a persistent interpreter, prints outcomes

use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::collections::HashSet;

use crate::ast::Stmt;
use crate::builtins::system_names_for;
use crate::config::{WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use crate::context::ExecutionContext;
use crate::highlighter::FlowbyHelper;
use crate::interp::{ExitOutcome, Interpreter};
use crate::parser::{parse_source, ParseOptions};

const HISTORY_FILE: &str = ".flowby_history";

/// Run the interactive loop until Ctrl-D or `exit`.
pub fn run_repl(context: ExecutionContext) -> Result<(), Box<dyn std::error::Error>> {
    let base_names = system_names_for(&context);
    let help_text = builtin_help(&context);
    let mut interpreter = Interpreter::new(context);
    // Names defined in earlier snippets stay resolvable in later ones.
    let mut session_names: HashSet<String> = HashSet::new();

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<FlowbyHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(FlowbyHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);
    println!("{}", WELCOME_FOOTER);

    loop {
        let snippet = match read_snippet(&mut rl) {
            Ok(Some(snippet)) => snippet,
            Ok(None) => break,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };
        if snippet.trim().is_empty() {
            continue;
        }
        if snippet.trim() == ":help" {
            println!("{}", help_text);
            continue;
        }

        let mut system_names = base_names.clone();
        system_names.extend(session_names.iter().cloned());
        let options = ParseOptions {
            file_stem: None,
            system_names,
        };

        let program = match parse_source(&snippet, options) {
            Ok(program) => program,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        for stmt in &program.statements {
            note_defined_names(stmt, &mut session_names);
        }

        match interpreter.run_program(&program) {
            ExitOutcome::Completed => {}
            ExitOutcome::Failed { code, message } => {
                eprintln!("{}", message);
                if message.starts_with("exit") || code != 1 {
                    break;
                }
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}

/// Read one statement, continuing across lines while a block is open: a
/// line ending in `:` starts a block that runs until a blank line.
fn read_snippet(
    rl: &mut Editor<FlowbyHelper, rustyline::history::DefaultHistory>,
) -> Result<Option<String>, ReadlineError> {
    let first = match rl.readline(">>> ") {
        Ok(line) => line,
        Err(ReadlineError::Interrupted) => return Ok(Some(String::new())),
        Err(ReadlineError::Eof) => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut snippet = first.clone();
    if !first.trim_end().ends_with(':') {
        return Ok(Some(snippet));
    }

    loop {
        match rl.readline("... ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    return Ok(Some(snippet));
                }
                snippet.push('\n');
                snippet.push_str(&line);
            }
            Err(ReadlineError::Interrupted) => return Ok(Some(String::new())),
            Err(ReadlineError::Eof) => return Ok(Some(snippet)),
            Err(e) => return Err(e),
        }
    }
}

/// One line per builtin, grouped under the namespace roots.
fn builtin_help(context: &ExecutionContext) -> String {
    let mut out = String::from("Namespaces:\n");
    let roots: Vec<&str> = context.namespaces.names().collect();
    out.push_str("  ");
    out.push_str(&roots.join(", "));
    out.push_str("\n\nFunctions:\n");
    for entry in context.builtins.entries() {
        out.push_str(&format!(
            "  {:<12} [{}] {}\n",
            entry.name, entry.category, entry.summary
        ));
    }
    out
}

fn note_defined_names(stmt: &Stmt, names: &mut HashSet<String>) {
    match stmt {
        Stmt::Let { name, .. }
        | Stmt::Const { name, .. }
        | Stmt::FunctionDef { name, .. }
        | Stmt::ImportAll { alias: name, .. } => {
            names.insert(name.clone());
        }
        Stmt::ImportMembers {
            names: imported, ..
        } => {
            names.extend(imported.iter().cloned());
        }
        Stmt::Action {
            action: crate::ast::ActionStmt::Extract { into, .. },
            ..
        } => {
            names.insert(into.clone());
        }
        Stmt::Export { decl, .. } => note_defined_names(decl, names),
        _ => {}
    }
}
