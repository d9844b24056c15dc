// ABOUTME: Abstract syntax tree produced by the parser. Every node carries
// the source line it started on.

/// A parsed program: the ordered top-level statements plus the library
/// name when the file opened with a `library` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub library_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
        line: usize,
    },
    Const {
        name: String,
        value: Expr,
        line: usize,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
        line: usize,
    },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
        line: usize,
    },
    When {
        subject: Expr,
        cases: Vec<WhenCase>,
        line: usize,
    },
    For {
        vars: Vec<String>,
        iterable: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Break {
        line: usize,
    },
    Continue {
        line: usize,
    },
    Step {
        label: String,
        body: Vec<Stmt>,
        line: usize,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
        line: usize,
    },
    Return {
        value: Option<Expr>,
        line: usize,
    },
    Library {
        name: String,
        line: usize,
    },
    Export {
        decl: Box<Stmt>,
        line: usize,
    },
    ImportAll {
        alias: String,
        path: String,
        line: usize,
    },
    ImportMembers {
        names: Vec<String>,
        path: String,
        line: usize,
    },
    Exit {
        code: Option<Expr>,
        message: Option<Expr>,
        line: usize,
    },
    Log {
        value: Expr,
        line: usize,
    },
    Action {
        action: ActionStmt,
        line: usize,
    },
    Expr {
        expr: Expr,
        line: usize,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Let { line, .. }
            | Stmt::Const { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::If { line, .. }
            | Stmt::When { line, .. }
            | Stmt::For { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line }
            | Stmt::Step { line, .. }
            | Stmt::FunctionDef { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Library { line, .. }
            | Stmt::Export { line, .. }
            | Stmt::ImportAll { line, .. }
            | Stmt::ImportMembers { line, .. }
            | Stmt::Exit { line, .. }
            | Stmt::Log { line, .. }
            | Stmt::Action { line, .. }
            | Stmt::Expr { line, .. } => *line,
        }
    }

    /// Short description used in library-constraint diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Stmt::Let { .. } => "a 'let' declaration",
            Stmt::Const { .. } => "a 'const' declaration",
            Stmt::Assign { .. } => "an assignment",
            Stmt::If { .. } => "an 'if' statement",
            Stmt::When { .. } => "a 'when' statement",
            Stmt::For { .. } => "a 'for' loop",
            Stmt::While { .. } => "a 'while' loop",
            Stmt::Break { .. } => "'break'",
            Stmt::Continue { .. } => "'continue'",
            Stmt::Step { .. } => "a step block",
            Stmt::FunctionDef { .. } => "a function definition",
            Stmt::Return { .. } => "'return'",
            Stmt::Library { .. } => "a 'library' declaration",
            Stmt::Export { .. } => "an 'export'",
            Stmt::ImportAll { .. } | Stmt::ImportMembers { .. } => "an import",
            Stmt::Exit { .. } => "'exit'",
            Stmt::Log { .. } => "a 'log' statement",
            Stmt::Action { .. } => "an action",
            Stmt::Expr { .. } => "an expression statement",
        }
    }
}

/// The left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    Member { object: Expr, member: String },
    Index { object: Expr, index: Expr },
}

/// One arm of a `when` block: the literal labels it matches (empty for
/// `otherwise`) and the body to run.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenCase {
    pub labels: Vec<Expr>,
    pub otherwise: bool,
    pub body: Vec<Stmt>,
    pub line: usize,
}

/// Domain actions delegated to the [`ActionHost`](crate::context::ActionHost).
#[derive(Debug, Clone, PartialEq)]
pub enum ActionStmt {
    Navigate { url: Expr },
    Click { selector: Expr },
    TypeText { text: Expr, selector: Expr },
    WaitSeconds { seconds: Expr },
    WaitFor { selector: Expr },
    Assert { cond: Expr, message: Option<Expr> },
    Screenshot { name: Option<Expr> },
    Scroll { target: Expr },
    Extract { source: Expr, into: String },
    Check { selector: Expr },
    Hover { selector: Expr },
    Upload { file: Expr, selector: Expr },
    Select { option: Expr, selector: Expr },
}

impl ActionStmt {
    /// The action name passed to the host.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionStmt::Navigate { .. } => "navigate",
            ActionStmt::Click { .. } => "click",
            ActionStmt::TypeText { .. } => "type",
            ActionStmt::WaitSeconds { .. } | ActionStmt::WaitFor { .. } => "wait",
            ActionStmt::Assert { .. } => "assert",
            ActionStmt::Screenshot { .. } => "screenshot",
            ActionStmt::Scroll { .. } => "scroll",
            ActionStmt::Extract { .. } => "extract",
            ActionStmt::Check { .. } => "check",
            ActionStmt::Hover { .. } => "hover",
            ActionStmt::Upload { .. } => "upload",
            ActionStmt::Select { .. } => "select",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

/// One piece of a parsed f-string template.
#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        line: usize,
    },
    Identifier {
        name: String,
        line: usize,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: usize,
    },
    Member {
        object: Box<Expr>,
        member: String,
        line: usize,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        line: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
        line: usize,
    },
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
        line: usize,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
        line: usize,
    },
    FString {
        parts: Vec<FStringPart>,
        line: usize,
    },
    Array {
        items: Vec<Expr>,
        line: usize,
    },
    Object {
        entries: Vec<(String, Expr)>,
        line: usize,
    },
    Input {
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
        line: usize,
    },
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Literal { line, .. }
            | Expr::Identifier { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Member { line, .. }
            | Expr::Index { line, .. }
            | Expr::Call { line, .. }
            | Expr::MethodCall { line, .. }
            | Expr::Lambda { line, .. }
            | Expr::FString { line, .. }
            | Expr::Array { line, .. }
            | Expr::Object { line, .. }
            | Expr::Input { line, .. } => *line,
        }
    }
}
