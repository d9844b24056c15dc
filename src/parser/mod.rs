// ABOUTME: Recursive-descent parser: token stream -> AST, accumulating
// semantic violations (scope, const, loop-context, library constraints)

mod expr;

use std::collections::HashSet;

use crate::ast::{ActionStmt, Expr, Program, Stmt, WhenCase};
use crate::error::{FlowError, ParseError, SemanticError};
use crate::lexer::{lex, TokenStream};
use crate::symbols::{AssignError, DefineError, Symbol, SymbolKind, SymbolTable};
use crate::token::{Token, TokenKind};

/// Knobs for one parse.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Expected library name (the file stem) when parsing an imported file.
    pub file_stem: Option<String>,
    /// Names that always resolve: namespace roots, built-in functions,
    /// host-injected globals.
    pub system_names: HashSet<String>,
}

impl ParseOptions {
    pub fn with_system_names(system_names: HashSet<String>) -> Self {
        ParseOptions {
            file_stem: None,
            system_names,
        }
    }
}

/// Lex and parse a complete source text.
pub fn parse_source(source: &str, options: ParseOptions) -> Result<Program, FlowError> {
    let tokens = lex(source)?;
    Parser::new(tokens, options).parse()
}

pub struct Parser {
    tokens: TokenStream,
    pos: usize,
    symbols: SymbolTable,
    violations: Vec<SemanticError>,
    loop_depth: usize,
    function_depth: usize,
    library_mode: bool,
    file_stem: Option<String>,
}

impl Parser {
    pub fn new(tokens: TokenStream, options: ParseOptions) -> Self {
        Parser {
            tokens,
            pos: 0,
            symbols: SymbolTable::new(options.system_names),
            violations: Vec::new(),
            loop_depth: 0,
            function_depth: 0,
            library_mode: false,
            file_stem: options.file_stem,
        }
    }

    pub fn parse(mut self) -> Result<Program, FlowError> {
        let mut statements = Vec::new();
        let mut library_name = None;

        self.skip_newlines();
        while !self.check(TokenKind::Eof) {
            let first = statements.is_empty();
            let stmt = self.statement()?;

            match &stmt {
                Stmt::Library { name, line } => {
                    if !first {
                        return Err(ParseError::LibraryOrdering { line: *line }.into());
                    }
                    self.library_mode = true;
                    if let Some(stem) = &self.file_stem {
                        if name != stem {
                            self.violations.push(SemanticError::LibraryNameMismatch {
                                declared: name.clone(),
                                expected: stem.clone(),
                                line: *line,
                            });
                        }
                    }
                    library_name = Some(name.clone());
                }
                other if self.library_mode => {
                    if !matches!(
                        other,
                        Stmt::Let { .. }
                            | Stmt::Const { .. }
                            | Stmt::FunctionDef { .. }
                            | Stmt::Export { .. }
                            | Stmt::ImportAll { .. }
                            | Stmt::ImportMembers { .. }
                    ) {
                        self.violations.push(SemanticError::LibraryConstraint {
                            what: other.describe().to_string(),
                            line: other.line(),
                        });
                    }
                }
                _ => {}
            }

            statements.push(stmt);
            self.skip_newlines();
        }

        if self.violations.is_empty() {
            Ok(Program {
                statements,
                library_name,
            })
        } else {
            Err(FlowError::Semantic(self.violations))
        }
    }

    // ========================================================================
    // Statement dispatch
    // ========================================================================

    fn statement(&mut self) -> Result<Stmt, FlowError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Let => self.let_decl(false),
            TokenKind::Const => self.let_decl(true),
            TokenKind::If => self.if_stmt(),
            TokenKind::When => self.when_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Break => {
                self.advance();
                if self.loop_depth == 0 {
                    self.violations
                        .push(SemanticError::BreakOutsideLoop { line: token.line });
                }
                self.end_statement()?;
                Ok(Stmt::Break { line: token.line })
            }
            TokenKind::Continue => {
                self.advance();
                if self.loop_depth == 0 {
                    self.violations
                        .push(SemanticError::ContinueOutsideLoop { line: token.line });
                }
                self.end_statement()?;
                Ok(Stmt::Continue { line: token.line })
            }
            TokenKind::Step => self.step_stmt(),
            TokenKind::Function => self.function_def(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Library => self.library_decl(),
            TokenKind::Export => self.export_stmt(),
            TokenKind::Import => self.import_all(),
            TokenKind::From => self.import_members(),
            TokenKind::Resource => self.resource_stmt(),
            TokenKind::Exit => self.exit_stmt(),
            TokenKind::Log => {
                self.advance();
                let value = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Log {
                    value,
                    line: token.line,
                })
            }
            TokenKind::Navigate
            | TokenKind::Click
            | TokenKind::Type
            | TokenKind::Wait
            | TokenKind::Assert
            | TokenKind::Screenshot
            | TokenKind::Scroll
            | TokenKind::Extract
            | TokenKind::Check
            | TokenKind::Hover
            | TokenKind::Upload
            | TokenKind::Select => self.action_stmt(),
            _ => self.expr_or_assign(),
        }
    }

    fn let_decl(&mut self, is_const: bool) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let name = self.expect_identifier("a variable name")?;
        self.expect(TokenKind::Assign, "'='")?;
        let value = self.expression()?;
        self.end_statement()?;

        self.define_symbol(
            &name,
            if is_const {
                SymbolKind::Const
            } else {
                SymbolKind::Variable
            },
            kw.line,
        );

        Ok(if is_const {
            Stmt::Const {
                name,
                value,
                line: kw.line,
            }
        } else {
            Stmt::Let {
                name,
                value,
                line: kw.line,
            }
        })
    }

    fn if_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let cond = self.expression()?;
        let then_block = self.block()?;
        let else_block = if self.check(TokenKind::Else) {
            self.advance();
            if self.check(TokenKind::If) {
                // `else if` chains nest as a one-statement else block.
                Some(vec![self.if_stmt()?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
            line: kw.line,
        })
    }

    fn when_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let subject = self.expression()?;
        self.expect(TokenKind::Colon, "':'")?;
        self.expect(TokenKind::Newline, "end of line")?;
        self.expect(TokenKind::Indent, "an indented block")?;
        self.skip_newlines();

        let mut cases: Vec<WhenCase> = Vec::new();
        while !self.check(TokenKind::Dedent) {
            if self.check(TokenKind::Eof) {
                return Err(ParseError::UnclosedBlock { line: kw.line }.into());
            }
            if cases.last().is_some_and(|c| c.otherwise) {
                let tok = self.peek().clone();
                return Err(ParseError::UnexpectedToken {
                    expected: "no case after 'otherwise'".to_string(),
                    found: tok.to_string(),
                    line: tok.line,
                }
                .into());
            }

            let case_line = self.peek().line;
            if self.check(TokenKind::Otherwise) {
                self.advance();
                let body = self.block()?;
                cases.push(WhenCase {
                    labels: Vec::new(),
                    otherwise: true,
                    body,
                    line: case_line,
                });
            } else {
                let mut labels = vec![self.case_literal()?];
                while self.check(TokenKind::Or) {
                    self.advance();
                    labels.push(self.case_literal()?);
                }
                let body = self.block()?;
                cases.push(WhenCase {
                    labels,
                    otherwise: false,
                    body,
                    line: case_line,
                });
            }
            self.skip_newlines();
        }
        self.expect(TokenKind::Dedent, "dedent")?;

        Ok(Stmt::When {
            subject,
            cases,
            line: kw.line,
        })
    }

    fn for_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let mut vars = vec![self.expect_identifier("a loop variable")?];
        while self.check(TokenKind::Comma) {
            self.advance();
            vars.push(self.expect_identifier("a loop variable")?);
        }
        self.expect(TokenKind::In, "'in'")?;
        let iterable = self.expression()?;

        self.symbols.push();
        for v in &vars {
            self.define_symbol(v, SymbolKind::Variable, kw.line);
        }
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        self.symbols.pop();

        Ok(Stmt::For {
            vars,
            iterable,
            body: body?,
            line: kw.line,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let cond = self.expression()?;

        self.symbols.push();
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        self.symbols.pop();

        Ok(Stmt::While {
            cond,
            body: body?,
            line: kw.line,
        })
    }

    fn step_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let label = self.expect(TokenKind::Str, "a step label string")?.lexeme;
        let body = self.block()?;
        Ok(Stmt::Step {
            label,
            body,
            line: kw.line,
        })
    }

    fn function_def(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let name = self.expect_identifier("a function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            params.push(self.expect_identifier("a parameter name")?);
            while self.check(TokenKind::Comma) {
                self.advance();
                params.push(self.expect_identifier("a parameter name")?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        // The name is visible in the enclosing scope before the body is
        // parsed, so the body may reference it.
        self.define_symbol(&name, SymbolKind::Function, kw.line);

        self.symbols.push();
        for p in &params {
            self.define_symbol(p, SymbolKind::Parameter, kw.line);
        }
        self.function_depth += 1;
        // A function body is a fresh loop context: `break` inside it cannot
        // target a loop surrounding the definition.
        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.block();
        self.loop_depth = saved_loop_depth;
        self.function_depth -= 1;
        self.symbols.pop();

        Ok(Stmt::FunctionDef {
            name,
            params,
            body: body?,
            line: kw.line,
        })
    }

    fn return_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        if self.function_depth == 0 {
            self.violations
                .push(SemanticError::ReturnOutsideFunction { line: kw.line });
        }
        let value = if self.check(TokenKind::Newline)
            || self.check(TokenKind::Dedent)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.expression()?)
        };
        self.end_statement()?;
        Ok(Stmt::Return {
            value,
            line: kw.line,
        })
    }

    fn library_decl(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let name = self.expect_identifier("a library name")?;
        self.end_statement()?;
        Ok(Stmt::Library {
            name,
            line: kw.line,
        })
    }

    fn export_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let decl = match self.peek().kind {
            TokenKind::Const => self.let_decl(true)?,
            TokenKind::Function => self.function_def()?,
            _ => {
                self.violations
                    .push(SemanticError::InvalidExport { line: kw.line });
                self.statement()?
            }
        };
        Ok(Stmt::Export {
            decl: Box::new(decl),
            line: kw.line,
        })
    }

    fn import_all(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let alias = self.expect_identifier("an import alias")?;
        self.expect(TokenKind::From, "'from'")?;
        let path = self.expect(TokenKind::Str, "a module path string")?.lexeme;
        self.end_statement()?;
        self.define_symbol(&alias, SymbolKind::Import, kw.line);
        Ok(Stmt::ImportAll {
            alias,
            path,
            line: kw.line,
        })
    }

    fn import_members(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let path = self.expect(TokenKind::Str, "a module path string")?.lexeme;
        self.expect(TokenKind::Import, "'import'")?;
        let mut names = vec![self.expect_identifier("an imported name")?];
        while self.check(TokenKind::Comma) {
            self.advance();
            names.push(self.expect_identifier("an imported name")?);
        }
        self.end_statement()?;
        for n in &names {
            self.define_symbol(n, SymbolKind::Import, kw.line);
        }
        Ok(Stmt::ImportMembers {
            names,
            path,
            line: kw.line,
        })
    }

    /// Legacy form: `resource NAME from "path"` desugars to
    /// `let NAME = Resource("path")`.
    fn resource_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let name = self.expect_identifier("a resource name")?;
        self.expect(TokenKind::From, "'from'")?;
        let path = self.expect(TokenKind::Str, "a resource path string")?;
        self.end_statement()?;
        self.define_symbol(&name, SymbolKind::Variable, kw.line);
        Ok(Stmt::Let {
            name,
            value: Expr::Call {
                callee: Box::new(Expr::Identifier {
                    name: "Resource".to_string(),
                    line: kw.line,
                }),
                args: vec![Expr::Literal {
                    value: crate::ast::Literal::Str(path.lexeme),
                    line: kw.line,
                }],
                kwargs: Vec::new(),
                line: kw.line,
            },
            line: kw.line,
        })
    }

    fn exit_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let mut code = None;
        let mut message = None;
        if !self.check(TokenKind::Newline)
            && !self.check(TokenKind::Dedent)
            && !self.check(TokenKind::Eof)
        {
            code = Some(self.expression()?);
            if self.check(TokenKind::Comma) {
                self.advance();
                message = Some(self.expression()?);
            }
        }
        self.end_statement()?;
        Ok(Stmt::Exit {
            code,
            message,
            line: kw.line,
        })
    }

    fn action_stmt(&mut self) -> Result<Stmt, FlowError> {
        let kw = self.advance();
        let action = match kw.kind {
            TokenKind::Navigate => {
                self.expect(TokenKind::To, "'to'")?;
                ActionStmt::Navigate {
                    url: self.expression()?,
                }
            }
            TokenKind::Click => ActionStmt::Click {
                selector: self.expression()?,
            },
            TokenKind::Type => {
                let text = self.expression()?;
                self.expect(TokenKind::Into, "'into'")?;
                ActionStmt::TypeText {
                    text,
                    selector: self.expression()?,
                }
            }
            TokenKind::Wait => {
                if self.check(TokenKind::For) {
                    self.advance();
                    ActionStmt::WaitFor {
                        selector: self.expression()?,
                    }
                } else {
                    ActionStmt::WaitSeconds {
                        seconds: self.expression()?,
                    }
                }
            }
            TokenKind::Assert => {
                let cond = self.expression()?;
                let message = if self.check(TokenKind::Comma) {
                    self.advance();
                    Some(self.expression()?)
                } else {
                    None
                };
                ActionStmt::Assert { cond, message }
            }
            TokenKind::Screenshot => {
                let name = if self.check(TokenKind::Newline)
                    || self.check(TokenKind::Dedent)
                    || self.check(TokenKind::Eof)
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                ActionStmt::Screenshot { name }
            }
            TokenKind::Scroll => {
                self.expect(TokenKind::To, "'to'")?;
                ActionStmt::Scroll {
                    target: self.expression()?,
                }
            }
            TokenKind::Extract => {
                let source = self.expression()?;
                self.expect(TokenKind::Into, "'into'")?;
                let into = self.expect_identifier("a variable name")?;
                match self.symbols.assign(&into) {
                    Err(AssignError::NotFound) => {
                        self.define_symbol(&into, SymbolKind::Variable, kw.line);
                    }
                    Err(AssignError::IsConst) => {
                        self.violations.push(SemanticError::ConstReassignment {
                            name: into.clone(),
                            line: kw.line,
                        });
                    }
                    Ok(()) => {}
                }
                ActionStmt::Extract { source, into }
            }
            TokenKind::Check => ActionStmt::Check {
                selector: self.expression()?,
            },
            TokenKind::Hover => ActionStmt::Hover {
                selector: self.expression()?,
            },
            TokenKind::Upload => {
                let file = self.expression()?;
                self.expect(TokenKind::Into, "'into'")?;
                ActionStmt::Upload {
                    file,
                    selector: self.expression()?,
                }
            }
            TokenKind::Select => {
                let option = self.expression()?;
                self.expect(TokenKind::From, "'from'")?;
                ActionStmt::Select {
                    option,
                    selector: self.expression()?,
                }
            }
            _ => unreachable!("statement dispatch routed a non-action token"),
        };
        self.end_statement()?;
        Ok(Stmt::Action {
            action,
            line: kw.line,
        })
    }

    fn expr_or_assign(&mut self) -> Result<Stmt, FlowError> {
        let line = self.peek().line;
        let expr = self.expression()?;

        if self.check(TokenKind::Assign) {
            self.advance();
            let target = self.to_assign_target(expr)?;
            let value = self.expression()?;
            self.end_statement()?;
            return Ok(Stmt::Assign {
                target,
                value,
                line,
            });
        }

        self.end_statement()?;
        Ok(Stmt::Expr { expr, line })
    }

    fn to_assign_target(&mut self, expr: Expr) -> Result<crate::ast::AssignTarget, FlowError> {
        use crate::ast::AssignTarget;
        match expr {
            Expr::Identifier { name, line } => {
                match self.symbols.assign(&name) {
                    Err(AssignError::NotFound) if !self.symbols.is_system(&name) => {
                        // Already reported as use-before-declaration when the
                        // identifier itself was parsed.
                    }
                    Err(AssignError::IsConst) => {
                        self.violations.push(SemanticError::ConstReassignment {
                            name: name.clone(),
                            line,
                        });
                    }
                    _ => {}
                }
                Ok(AssignTarget::Name(name))
            }
            Expr::Member { object, member, .. } => Ok(AssignTarget::Member {
                object: *object,
                member,
            }),
            Expr::Index { object, index, .. } => Ok(AssignTarget::Index {
                object: *object,
                index: *index,
            }),
            other => Err(ParseError::UnexpectedToken {
                expected: "an assignable target".to_string(),
                found: "an expression".to_string(),
                line: other.line(),
            }
            .into()),
        }
    }

    // ========================================================================
    // Blocks and helpers
    // ========================================================================

    /// `:` NEWLINE INDENT statement+ DEDENT
    fn block(&mut self) -> Result<Vec<Stmt>, FlowError> {
        let open_line = self.peek().line;
        self.expect(TokenKind::Colon, "':'")?;
        self.expect(TokenKind::Newline, "end of line")?;
        self.expect(TokenKind::Indent, "an indented block")?;
        self.skip_newlines();

        let mut statements = Vec::new();
        while !self.check(TokenKind::Dedent) {
            if self.check(TokenKind::Eof) {
                return Err(ParseError::UnclosedBlock { line: open_line }.into());
            }
            statements.push(self.statement()?);
            self.skip_newlines();
        }
        self.expect(TokenKind::Dedent, "dedent")?;
        Ok(statements)
    }

    fn define_symbol(&mut self, name: &str, kind: SymbolKind, line: usize) {
        let result = self.symbols.define(Symbol {
            name: name.to_string(),
            kind,
            defined_at_line: line,
        });
        match result {
            Err(DefineError::Duplicate) => {
                self.violations.push(SemanticError::DuplicateDeclaration {
                    name: name.to_string(),
                    line,
                });
            }
            Err(DefineError::ShadowsBuiltin) => {
                self.violations.push(SemanticError::ShadowsBuiltin {
                    name: name.to_string(),
                    line,
                });
            }
            Ok(()) => {}
        }
    }

    pub(crate) fn note_identifier_use(&mut self, name: &str, line: usize) {
        if !self.symbols.exists(name) {
            self.violations.push(SemanticError::UndefinedVariable {
                name: name.to_string(),
                line,
            });
        }
    }

    fn end_statement(&mut self) -> Result<(), FlowError> {
        if self.check(TokenKind::Newline) {
            self.advance();
            Ok(())
        } else if self.check(TokenKind::Eof) || self.check(TokenKind::Dedent) {
            Ok(())
        } else {
            let tok = self.peek().clone();
            Err(ParseError::UnexpectedToken {
                expected: "end of statement".to_string(),
                found: tok.to_string(),
                line: tok.line,
            }
            .into())
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            Err(ParseError::UnexpectedToken {
                expected: what.to_string(),
                found: tok.to_string(),
                line: tok.line,
            })
        }
    }

    /// An identifier, also accepting the contextual keywords (`to`, `into`,
    /// `from`, `where`, `as`) where the grammar wants a plain name.
    pub(crate) fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        if self.check(TokenKind::Identifier) || self.peek().kind.is_contextual() {
            Ok(self.advance().lexeme)
        } else {
            let tok = self.peek().clone();
            Err(ParseError::UnexpectedToken {
                expected: what.to_string(),
                found: tok.to_string(),
                line: tok.line,
            })
        }
    }

    /// Swap in a fragment token stream, run `f`, and restore. Used to parse
    /// f-string expression fragments against the same symbol table.
    pub(crate) fn with_fragment<T>(
        &mut self,
        tokens: TokenStream,
        f: impl FnOnce(&mut Self) -> Result<T, FlowError>,
    ) -> Result<T, FlowError> {
        let saved_tokens = std::mem::replace(&mut self.tokens, tokens);
        let saved_pos = std::mem::replace(&mut self.pos, 0);
        let result = f(self);
        self.tokens = saved_tokens;
        self.pos = saved_pos;
        result
    }
}
