// ABOUTME: Error taxonomy for every stage of the Flowby pipeline

use thiserror::Error;

/// Lexing failures. Lexing halts at the first of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("line {line}, column {column}: unexpected character '{ch}'")]
    InvalidCharacter { ch: char, line: usize, column: usize },

    #[error("line {line}, column {column}: unterminated string literal")]
    UnterminatedString { line: usize, column: usize },

    #[error("line {line}, column {column}: invalid escape sequence '\\{ch}'")]
    InvalidEscape { ch: char, line: usize, column: usize },

    #[error("line {line}: indentation of {width} is not a multiple of 4")]
    IndentNotMultiple { width: usize, line: usize },

    #[error("line {line}: dedent to width {width} does not match any open block")]
    MisalignedDedent { width: usize, line: usize },

    #[error("line {line}, column {column}: unterminated expression in f-string")]
    UnterminatedFragment { line: usize, column: usize },
}

/// Structural parse failures that stop the parser cold.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("line {line}: block is never closed")]
    UnclosedBlock { line: usize },

    #[error("line {line}: 'library' must be the first statement in the file")]
    LibraryOrdering { line: usize },
}

/// Semantic violations. The parser accumulates these and keeps going;
/// a nonempty list fails the parse as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("line {line}: undefined variable '{name}'")]
    UndefinedVariable { name: String, line: usize },

    #[error("line {line}: cannot reassign constant '{name}'")]
    ConstReassignment { name: String, line: usize },

    #[error("line {line}: '{name}' is already declared in this scope")]
    DuplicateDeclaration { name: String, line: usize },

    #[error("line {line}: '{name}' is a built-in name and cannot be redeclared")]
    ShadowsBuiltin { name: String, line: usize },

    #[error("line {line}: 'break' outside of a loop")]
    BreakOutsideLoop { line: usize },

    #[error("line {line}: 'continue' outside of a loop")]
    ContinueOutsideLoop { line: usize },

    #[error("line {line}: 'return' outside of a function")]
    ReturnOutsideFunction { line: usize },

    #[error("line {line}: {what} is not allowed at the top level of a library file")]
    LibraryConstraint { what: String, line: usize },

    #[error("line {line}: library is named '{declared}' but the file stem is '{expected}'")]
    LibraryNameMismatch {
        declared: String,
        expected: String,
        line: usize,
    },

    #[error("line {line}: 'export' must wrap a const or function declaration")]
    InvalidExport { line: usize },
}

/// A runtime failure: a kind plus the source line it surfaced at.
///
/// Built-in functions and namespace hosts produce bare [`RuntimeErrorKind`]s;
/// the evaluator stamps the line on before propagating.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("{callee}: expected {expected} argument{}, got {actual}", if *.expected == 1 { "" } else { "s" })]
    WrongArity {
        callee: String,
        expected: usize,
        actual: usize,
    },

    #[error("{callee}: {message}")]
    BadArgument { callee: String, message: String },

    #[error("value of type {type_name} is not callable")]
    NotCallable { type_name: String },

    #[error("value of type {type_name} is not iterable")]
    NotIterable { type_name: String },

    #[error("cannot unpack element of type {type_name} into {arity} loop variables")]
    UnpackMismatch { type_name: String, arity: usize },

    #[error("operator '{op}' is not defined for {lhs} and {rhs}")]
    BadOperands {
        op: String,
        lhs: String,
        rhs: String,
    },

    #[error("operator '{op}' is not defined for {operand}")]
    BadUnaryOperand { op: String, operand: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{op}'")]
    IntegerOverflow { op: String },

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key '{key}' not found")]
    KeyMissing { key: String },

    #[error("member '{member}' not found on {type_name}")]
    MemberNotFound { member: String, type_name: String },

    #[error("'{member}' is not exported by library '{library}'")]
    MemberNotExported { member: String, library: String },

    #[error("namespace '{namespace}' has no method '{method}'")]
    UnknownMethod { namespace: String, method: String },

    #[error("while loop exceeded {limit} iterations")]
    LoopLimitExceeded { limit: usize },

    #[error("assertion failed: {message}")]
    AssertionFailed { message: String },

    #[error("action '{action}' failed: {message}")]
    ActionFailed { action: String, message: String },

    #[error("recursive call to '{name}' is not permitted")]
    RecursionRefused { name: String },

    #[error("call depth exceeded {limit}")]
    CallDepthExceeded { limit: usize },

    #[error("input required but the session is not interactive")]
    InputRequired,

    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("cannot reassign constant '{name}'")]
    ConstReassigned { name: String },

    #[error("{message}")]
    Host { message: String },
}

impl RuntimeErrorKind {
    /// Stamp a source line on this kind, producing a propagatable error.
    pub fn at(self, line: usize) -> RuntimeError {
        RuntimeError { kind: self, line }
    }

    pub fn bad_argument(callee: &str, message: impl Into<String>) -> Self {
        RuntimeErrorKind::BadArgument {
            callee: callee.to_string(),
            message: message.into(),
        }
    }

    pub fn wrong_arity(callee: &str, expected: usize, actual: usize) -> Self {
        RuntimeErrorKind::WrongArity {
            callee: callee.to_string(),
            expected,
            actual,
        }
    }
}

/// A module-loading failure: a kind plus the line of the import statement
/// it surfaced at.
///
/// The loader produces bare [`ModuleErrorKind`]s (it never sees source
/// positions); the interpreter stamps the import line on.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {kind}")]
pub struct ModuleError {
    pub kind: ModuleErrorKind,
    pub line: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModuleErrorKind {
    #[error("module '{path}' not found")]
    NotFound { path: String },

    #[error("circular import: {}", cycle.join(" -> "))]
    CircularImport { cycle: Vec<String> },

    #[error("'{path}' is not a library file (missing 'library' declaration)")]
    NotALibrary { path: String },

    #[error("cannot read module '{path}': {message}")]
    Io { path: String, message: String },

    #[error("error in library '{path}': {message}")]
    LoadFailed { path: String, message: String },
}

impl ModuleErrorKind {
    /// Stamp the import statement's line on this kind.
    pub fn at(self, line: usize) -> ModuleError {
        ModuleError { kind: self, line }
    }
}

/// The top-level error type every stage feeds into.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{} semantic error(s):\n{}", .0.len(), .0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\n"))]
    Semantic(Vec<SemanticError>),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

impl FlowError {
    /// The source line this error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            FlowError::Lex(e) => Some(match e {
                LexError::InvalidCharacter { line, .. }
                | LexError::UnterminatedString { line, .. }
                | LexError::InvalidEscape { line, .. }
                | LexError::IndentNotMultiple { line, .. }
                | LexError::MisalignedDedent { line, .. }
                | LexError::UnterminatedFragment { line, .. } => *line,
            }),
            FlowError::Parse(e) => Some(match e {
                ParseError::UnexpectedToken { line, .. }
                | ParseError::UnclosedBlock { line }
                | ParseError::LibraryOrdering { line } => *line,
            }),
            FlowError::Runtime(e) => Some(e.line),
            FlowError::Module(e) => Some(e.line),
            FlowError::Semantic(_) => None,
        }
    }

    /// Stable message key consulted by the i18n resolver.
    pub fn message_key(&self) -> &'static str {
        match self {
            FlowError::Lex(_) => "error.lex",
            FlowError::Parse(_) => "error.parse",
            FlowError::Semantic(_) => "error.semantic",
            FlowError::Runtime(e) => match e.kind {
                RuntimeErrorKind::AssertionFailed { .. } => "error.runtime.assertion",
                RuntimeErrorKind::LoopLimitExceeded { .. } => "error.runtime.loop-limit",
                RuntimeErrorKind::ActionFailed { .. } => "error.runtime.action",
                _ => "error.runtime",
            },
            FlowError::Module(_) => "error.module",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_carries_line() {
        let err = RuntimeErrorKind::DivisionByZero.at(7);
        assert_eq!(err.line, 7);
        assert_eq!(err.to_string(), "line 7: division by zero");
    }

    #[test]
    fn test_arity_message_pluralization() {
        let one = RuntimeErrorKind::wrong_arity("greet", 1, 3);
        assert_eq!(one.to_string(), "greet: expected 1 argument, got 3");

        let two = RuntimeErrorKind::wrong_arity("greet", 2, 0);
        assert_eq!(two.to_string(), "greet: expected 2 arguments, got 0");
    }

    #[test]
    fn test_semantic_errors_joined() {
        let err = FlowError::Semantic(vec![
            SemanticError::UndefinedVariable {
                name: "x".to_string(),
                line: 1,
            },
            SemanticError::BreakOutsideLoop { line: 4 },
        ]);
        let text = err.to_string();
        assert!(text.contains("undefined variable 'x'"));
        assert!(text.contains("'break' outside of a loop"));
    }

    #[test]
    fn test_circular_import_names_cycle() {
        let err = ModuleErrorKind::CircularImport {
            cycle: vec![
                "a.flow".to_string(),
                "b.flow".to_string(),
                "a.flow".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "circular import: a.flow -> b.flow -> a.flow"
        );
        assert_eq!(
            err.at(4).to_string(),
            "line 4: circular import: a.flow -> b.flow -> a.flow"
        );
    }
}
