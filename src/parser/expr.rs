// ABOUTME: Expression grammar: precedence climbing from `or` down to
// primaries, plus f-string fragment parsing and lambda detection

use super::Parser;
use crate::ast::{BinaryOp, Expr, FStringPart, Literal, UnaryOp};
use crate::error::{FlowError, ParseError};
use crate::lexer::{lex, split_fstring, RawFragment};
use crate::symbols::{Symbol, SymbolKind};
use crate::token::TokenKind;

impl Parser {
    /// Entry point: lowest precedence is `or`.
    pub(crate) fn expression(&mut self) -> Result<Expr, FlowError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, FlowError> {
        let mut lhs = self.and_expr()?;
        while self.check(TokenKind::Or) {
            let line = self.advance().line;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, FlowError> {
        let mut lhs = self.not_expr()?;
        while self.check(TokenKind::And) {
            let line = self.advance().line;
            let rhs = self.not_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, FlowError> {
        if self.check(TokenKind::Not) {
            let line = self.advance().line;
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                line,
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, FlowError> {
        let lhs = self.additive()?;
        let op = match self.peek().kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            _ => return Ok(lhs),
        };
        let line = self.advance().line;
        let rhs = self.additive()?;

        // Comparisons are non-associative: `a < b < c` is rejected.
        if matches!(
            self.peek().kind,
            TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
        ) {
            let tok = self.peek().clone();
            return Err(ParseError::UnexpectedToken {
                expected: "no chained comparison".to_string(),
                found: tok.to_string(),
                line: tok.line,
            }
            .into());
        }

        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            line,
        })
    }

    fn additive(&mut self) -> Result<Expr, FlowError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, FlowError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FlowError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.postfix(),
        };
        let line = self.advance().line;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            line,
        })
    }

    fn postfix(&mut self) -> Result<Expr, FlowError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    let line = self.advance().line;
                    let member = self.expect_identifier("a member name")?;
                    if self.check(TokenKind::LParen) {
                        self.advance();
                        let (args, kwargs) = self.call_args()?;
                        expr = Expr::MethodCall {
                            object: Box::new(expr),
                            method: member,
                            args,
                            kwargs,
                            line,
                        };
                    } else {
                        expr = Expr::Member {
                            object: Box::new(expr),
                            member,
                            line,
                        };
                    }
                }
                TokenKind::LBracket => {
                    let line = self.advance().line;
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        line,
                    };
                }
                TokenKind::LParen => {
                    let line = self.advance().line;
                    let (args, kwargs) = self.call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        kwargs,
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, FlowError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                let value = token.lexeme.parse::<i64>().map_err(|_| {
                    ParseError::UnexpectedToken {
                        expected: "an integer in range".to_string(),
                        found: token.lexeme.clone(),
                        line: token.line,
                    }
                })?;
                Ok(Expr::Literal {
                    value: Literal::Int(value),
                    line: token.line,
                })
            }
            TokenKind::Number => {
                self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    ParseError::UnexpectedToken {
                        expected: "a number".to_string(),
                        found: token.lexeme.clone(),
                        line: token.line,
                    }
                })?;
                Ok(Expr::Literal {
                    value: Literal::Float(value),
                    line: token.line,
                })
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Str(token.lexeme),
                    line: token.line,
                })
            }
            TokenKind::FString => {
                self.advance();
                self.fstring(&token.lexeme, token.line)
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(true),
                    line: token.line,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(false),
                    line: token.line,
                })
            }
            TokenKind::NoneLit => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::None,
                    line: token.line,
                })
            }
            TokenKind::Input => {
                self.advance();
                self.expect(TokenKind::LParen, "'('")?;
                let (args, kwargs) = self.call_args()?;
                Ok(Expr::Input {
                    args,
                    kwargs,
                    line: token.line,
                })
            }
            TokenKind::Identifier => {
                if self.peek_at(1).is(TokenKind::FatArrow) {
                    return self.lambda_single_param();
                }
                self.advance();
                self.note_identifier_use(&token.lexeme, token.line);
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    line: token.line,
                })
            }
            kind if kind.is_contextual() => {
                if self.peek_at(1).is(TokenKind::FatArrow) {
                    return self.lambda_single_param();
                }
                self.advance();
                self.note_identifier_use(&token.lexeme, token.line);
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    line: token.line,
                })
            }
            TokenKind::LParen => {
                if self.lambda_ahead() {
                    return self.lambda_param_list();
                }
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    items.push(self.expression()?);
                    if self.check(TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(Expr::Array {
                    items,
                    line: token.line,
                })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(TokenKind::RBrace) {
                    let key = if self.check(TokenKind::Str) {
                        self.advance().lexeme
                    } else {
                        self.expect_identifier("an object key")?
                    };
                    self.expect(TokenKind::Colon, "':'")?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if self.check(TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                Ok(Expr::Object {
                    entries,
                    line: token.line,
                })
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "an expression".to_string(),
                found: token.to_string(),
                line: token.line,
            }
            .into()),
        }
    }

    // ========================================================================
    // Lambdas
    // ========================================================================

    /// Bounded lookahead from a `(`: does `( [ident (, ident)*]? ) =>` follow?
    fn lambda_ahead(&self) -> bool {
        debug_assert!(self.check(TokenKind::LParen));
        let mut i = 1;
        if self.peek_at(i).is(TokenKind::RParen) {
            return self.peek_at(i + 1).is(TokenKind::FatArrow);
        }
        loop {
            let tok = self.peek_at(i);
            if !(tok.is(TokenKind::Identifier) || tok.kind.is_contextual()) {
                return false;
            }
            i += 1;
            match self.peek_at(i).kind {
                TokenKind::Comma => i += 1,
                TokenKind::RParen => return self.peek_at(i + 1).is(TokenKind::FatArrow),
                _ => return false,
            }
        }
    }

    fn lambda_single_param(&mut self) -> Result<Expr, FlowError> {
        let param = self.advance();
        self.expect(TokenKind::FatArrow, "'=>'")?;
        self.lambda_body(vec![param.lexeme], param.line)
    }

    fn lambda_param_list(&mut self) -> Result<Expr, FlowError> {
        let open = self.advance();
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            params.push(self.expect_identifier("a parameter name")?);
            if self.check(TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::FatArrow, "'=>'")?;
        self.lambda_body(params, open.line)
    }

    fn lambda_body(&mut self, params: Vec<String>, line: usize) -> Result<Expr, FlowError> {
        self.symbols_push_params(&params, line);
        let body = self.expression();
        self.symbols_pop();
        Ok(Expr::Lambda {
            params,
            body: Box::new(body?),
            line,
        })
    }

    fn symbols_push_params(&mut self, params: &[String], line: usize) {
        self.symbols.push();
        for p in params {
            // Lambda parameters may shadow; duplicates are silently merged
            // the way call binding would behave anyway.
            let _ = self.symbols.define(Symbol {
                name: p.clone(),
                kind: SymbolKind::Parameter,
                defined_at_line: line,
            });
        }
    }

    fn symbols_pop(&mut self) {
        self.symbols.pop();
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Parse arguments after `(` up to and including `)`. `name = expr`
    /// entries become kwargs; everything else is positional.
    pub(crate) fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), FlowError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.check(TokenKind::RParen) {
            // `type` is a keyword elsewhere but a legal kwarg name here
            // (`input(prompt, type = "int")`).
            let is_kwarg = (self.check(TokenKind::Identifier)
                || self.check(TokenKind::Type)
                || self.peek().kind.is_contextual())
                && self.peek_at(1).is(TokenKind::Assign);
            if is_kwarg {
                let name = self.advance().lexeme;
                self.advance(); // '='
                let value = self.expression()?;
                kwargs.push((name, value));
            } else {
                args.push(self.expression()?);
            }
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok((args, kwargs))
    }

    // ========================================================================
    // when-case literals
    // ========================================================================

    pub(crate) fn case_literal(&mut self) -> Result<Expr, FlowError> {
        let negate = if self.check(TokenKind::Minus) {
            self.advance();
            true
        } else {
            false
        };
        let token = self.peek().clone();
        let value = match token.kind {
            TokenKind::Integer => {
                self.advance();
                let n = token.lexeme.parse::<i64>().map_err(|_| {
                    ParseError::UnexpectedToken {
                        expected: "an integer in range".to_string(),
                        found: token.lexeme.clone(),
                        line: token.line,
                    }
                })?;
                Literal::Int(if negate { -n } else { n })
            }
            TokenKind::Number => {
                self.advance();
                let n = token.lexeme.parse::<f64>().map_err(|_| {
                    ParseError::UnexpectedToken {
                        expected: "a number".to_string(),
                        found: token.lexeme.clone(),
                        line: token.line,
                    }
                })?;
                Literal::Float(if negate { -n } else { n })
            }
            TokenKind::Str if !negate => {
                self.advance();
                Literal::Str(token.lexeme)
            }
            TokenKind::True if !negate => {
                self.advance();
                Literal::Bool(true)
            }
            TokenKind::False if !negate => {
                self.advance();
                Literal::Bool(false)
            }
            TokenKind::NoneLit if !negate => {
                self.advance();
                Literal::None
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a literal case label".to_string(),
                    found: token.to_string(),
                    line: token.line,
                }
                .into())
            }
        };
        Ok(Expr::Literal {
            value,
            line: token.line,
        })
    }

    // ========================================================================
    // F-strings
    // ========================================================================

    /// Split the raw interior and parse each expression fragment against
    /// the current symbol table, so use-before-declaration applies inside
    /// f-strings too.
    fn fstring(&mut self, raw: &str, line: usize) -> Result<Expr, FlowError> {
        let mut parts = Vec::new();
        for fragment in split_fstring(raw, line)? {
            match fragment {
                RawFragment::Literal(text) => parts.push(FStringPart::Literal(text)),
                RawFragment::Expr(src) => {
                    let tokens = lex(&src)?;
                    let mut expr = self.with_fragment(tokens, |p| {
                        p.skip_fragment_newlines();
                        let e = p.expression()?;
                        p.skip_fragment_newlines();
                        if !p.check(TokenKind::Eof) {
                            let tok = p.peek().clone();
                            return Err(ParseError::UnexpectedToken {
                                expected: "end of f-string expression".to_string(),
                                found: tok.to_string(),
                                line,
                            }
                            .into());
                        }
                        Ok(e)
                    })?;
                    set_lines(&mut expr, line);
                    parts.push(FStringPart::Expr(expr));
                }
            }
        }
        Ok(Expr::FString { parts, line })
    }

    fn skip_fragment_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }
}

/// Rewrite every line in an expression subtree. F-string fragments are lexed
/// standalone, so their positions restart at 1; this pins them back to the
/// f-string's own line.
fn set_lines(expr: &mut Expr, new_line: usize) {
    match expr {
        Expr::Literal { line, .. } | Expr::Identifier { line, .. } => *line = new_line,
        Expr::Binary { lhs, rhs, line, .. } => {
            *line = new_line;
            set_lines(lhs, new_line);
            set_lines(rhs, new_line);
        }
        Expr::Unary { operand, line, .. } => {
            *line = new_line;
            set_lines(operand, new_line);
        }
        Expr::Member { object, line, .. } => {
            *line = new_line;
            set_lines(object, new_line);
        }
        Expr::Index {
            object,
            index,
            line,
        } => {
            *line = new_line;
            set_lines(object, new_line);
            set_lines(index, new_line);
        }
        Expr::Call {
            callee,
            args,
            kwargs,
            line,
        } => {
            *line = new_line;
            set_lines(callee, new_line);
            for a in args {
                set_lines(a, new_line);
            }
            for (_, v) in kwargs {
                set_lines(v, new_line);
            }
        }
        Expr::MethodCall {
            object,
            args,
            kwargs,
            line,
            ..
        } => {
            *line = new_line;
            set_lines(object, new_line);
            for a in args {
                set_lines(a, new_line);
            }
            for (_, v) in kwargs {
                set_lines(v, new_line);
            }
        }
        Expr::Lambda { body, line, .. } => {
            *line = new_line;
            set_lines(body, new_line);
        }
        Expr::FString { parts, line } => {
            *line = new_line;
            for part in parts {
                if let FStringPart::Expr(e) = part {
                    set_lines(e, new_line);
                }
            }
        }
        Expr::Array { items, line } => {
            *line = new_line;
            for i in items {
                set_lines(i, new_line);
            }
        }
        Expr::Object { entries, line } => {
            *line = new_line;
            for (_, v) in entries {
                set_lines(v, new_line);
            }
        }
        Expr::Input {
            args,
            kwargs,
            line,
        } => {
            *line = new_line;
            for a in args {
                set_lines(a, new_line);
            }
            for (_, v) in kwargs {
                set_lines(v, new_line);
            }
        }
    }
}
