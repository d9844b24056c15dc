// ABOUTME: Canonical textual rendering of a parsed program. A printed
// program re-parses to a structurally identical AST.

use crate::ast::{
    ActionStmt, AssignTarget, Expr, FStringPart, Literal, Program, Stmt, UnaryOp, WhenCase,
};

const INDENT: &str = "    ";

/// Render a whole program as canonical source.
pub fn print_program(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.statements {
        print_stmt(stmt, 0, &mut out);
    }
    out
}

fn push_line(depth: usize, text: &str, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn print_block(body: &[Stmt], depth: usize, out: &mut String) {
    for stmt in body {
        print_stmt(stmt, depth, out);
    }
}

fn print_stmt(stmt: &Stmt, depth: usize, out: &mut String) {
    match stmt {
        Stmt::Let { name, value, .. } => {
            push_line(depth, &format!("let {} = {}", name, print_expr(value)), out);
        }
        Stmt::Const { name, value, .. } => {
            push_line(depth, &format!("const {} = {}", name, print_expr(value)), out);
        }
        Stmt::Assign { target, value, .. } => {
            let target = match target {
                AssignTarget::Name(name) => name.clone(),
                AssignTarget::Member { object, member } => {
                    format!("{}.{}", print_expr(object), member)
                }
                AssignTarget::Index { object, index } => {
                    format!("{}[{}]", print_expr(object), print_expr(index))
                }
            };
            push_line(depth, &format!("{} = {}", target, print_expr(value)), out);
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
            ..
        } => {
            push_line(depth, &format!("if {}:", print_expr(cond)), out);
            print_block(then_block, depth + 1, out);
            if let Some(else_block) = else_block {
                push_line(depth, "else:", out);
                print_block(else_block, depth + 1, out);
            }
        }
        Stmt::When { subject, cases, .. } => {
            push_line(depth, &format!("when {}:", print_expr(subject)), out);
            for WhenCase {
                labels,
                otherwise,
                body,
                ..
            } in cases
            {
                let label = if *otherwise {
                    "otherwise".to_string()
                } else {
                    labels
                        .iter()
                        .map(print_expr)
                        .collect::<Vec<_>>()
                        .join(" or ")
                };
                push_line(depth + 1, &format!("{}:", label), out);
                print_block(body, depth + 2, out);
            }
        }
        Stmt::For {
            vars,
            iterable,
            body,
            ..
        } => {
            push_line(
                depth,
                &format!("for {} in {}:", vars.join(", "), print_expr(iterable)),
                out,
            );
            print_block(body, depth + 1, out);
        }
        Stmt::While { cond, body, .. } => {
            push_line(depth, &format!("while {}:", print_expr(cond)), out);
            print_block(body, depth + 1, out);
        }
        Stmt::Break { .. } => push_line(depth, "break", out),
        Stmt::Continue { .. } => push_line(depth, "continue", out),
        Stmt::Step { label, body, .. } => {
            push_line(depth, &format!("step {}:", quote(label)), out);
            print_block(body, depth + 1, out);
        }
        Stmt::FunctionDef {
            name, params, body, ..
        } => {
            push_line(
                depth,
                &format!("function {}({}):", name, params.join(", ")),
                out,
            );
            print_block(body, depth + 1, out);
        }
        Stmt::Return { value, .. } => match value {
            Some(value) => push_line(depth, &format!("return {}", print_expr(value)), out),
            None => push_line(depth, "return", out),
        },
        Stmt::Library { name, .. } => push_line(depth, &format!("library {}", name), out),
        Stmt::Export { decl, .. } => {
            let mut inner = String::new();
            print_stmt(decl, depth, &mut inner);
            for _ in 0..depth {
                out.push_str(INDENT);
            }
            out.push_str("export ");
            out.push_str(inner.trim_start());
        }
        Stmt::ImportAll { alias, path, .. } => {
            push_line(depth, &format!("import {} from {}", alias, quote(path)), out);
        }
        Stmt::ImportMembers { names, path, .. } => {
            push_line(
                depth,
                &format!("from {} import {}", quote(path), names.join(", ")),
                out,
            );
        }
        Stmt::Exit { code, message, .. } => {
            let text = match (code, message) {
                (None, _) => "exit".to_string(),
                (Some(code), None) => format!("exit {}", print_expr(code)),
                (Some(code), Some(message)) => {
                    format!("exit {}, {}", print_expr(code), print_expr(message))
                }
            };
            push_line(depth, &text, out);
        }
        Stmt::Log { value, .. } => push_line(depth, &format!("log {}", print_expr(value)), out),
        Stmt::Action { action, .. } => print_action(action, depth, out),
        Stmt::Expr { expr, .. } => push_line(depth, &print_expr(expr), out),
    }
}

fn print_action(action: &ActionStmt, depth: usize, out: &mut String) {
    let text = match action {
        ActionStmt::Navigate { url } => format!("navigate to {}", print_expr(url)),
        ActionStmt::Click { selector } => format!("click {}", print_expr(selector)),
        ActionStmt::TypeText { text, selector } => {
            format!("type {} into {}", print_expr(text), print_expr(selector))
        }
        ActionStmt::WaitSeconds { seconds } => format!("wait {}", print_expr(seconds)),
        ActionStmt::WaitFor { selector } => format!("wait for {}", print_expr(selector)),
        ActionStmt::Assert { cond, message } => match message {
            Some(message) => {
                format!("assert {}, {}", print_expr(cond), print_expr(message))
            }
            None => format!("assert {}", print_expr(cond)),
        },
        ActionStmt::Screenshot { name } => match name {
            Some(name) => format!("screenshot {}", print_expr(name)),
            None => "screenshot".to_string(),
        },
        ActionStmt::Scroll { target } => format!("scroll to {}", print_expr(target)),
        ActionStmt::Extract { source, into } => {
            format!("extract {} into {}", print_expr(source), into)
        }
        ActionStmt::Check { selector } => format!("check {}", print_expr(selector)),
        ActionStmt::Hover { selector } => format!("hover {}", print_expr(selector)),
        ActionStmt::Upload { file, selector } => {
            format!("upload {} into {}", print_expr(file), print_expr(selector))
        }
        ActionStmt::Select { option, selector } => {
            format!("select {} from {}", print_expr(option), print_expr(selector))
        }
    };
    push_line(depth, &text, out);
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn print_literal(literal: &Literal) -> String {
    match literal {
        Literal::Int(n) => n.to_string(),
        Literal::Float(n) => {
            if n.fract() == 0.0 && n.is_finite() {
                format!("{:.1}", n)
            } else {
                n.to_string()
            }
        }
        Literal::Str(s) => quote(s),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::None => "None".to_string(),
    }
}

/// Render an expression, parenthesizing every compound operand so the
/// output re-parses with identical structure regardless of precedence.
pub fn print_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal { value, .. } => print_literal(value),
        Expr::Identifier { name, .. } => name.clone(),
        Expr::Binary { op, lhs, rhs, .. } => {
            format!(
                "{} {} {}",
                print_operand(lhs),
                op.symbol(),
                print_operand(rhs)
            )
        }
        Expr::Unary { op, operand, .. } => match op {
            UnaryOp::Not => format!("not {}", print_operand(operand)),
            _ => format!("{}{}", op.symbol(), print_operand(operand)),
        },
        Expr::Member { object, member, .. } => {
            format!("{}.{}", print_operand(object), member)
        }
        Expr::Index { object, index, .. } => {
            format!("{}[{}]", print_operand(object), print_expr(index))
        }
        Expr::Call {
            callee,
            args,
            kwargs,
            ..
        } => format!(
            "{}({})",
            print_operand(callee),
            print_args(args, kwargs)
        ),
        Expr::MethodCall {
            object,
            method,
            args,
            kwargs,
            ..
        } => format!(
            "{}.{}({})",
            print_operand(object),
            method,
            print_args(args, kwargs)
        ),
        Expr::Lambda { params, body, .. } => {
            format!("({}) => {}", params.join(", "), print_expr(body))
        }
        Expr::FString { parts, .. } => {
            let mut out = String::from("f\"");
            for part in parts {
                match part {
                    FStringPart::Literal(text) => {
                        for ch in text.chars() {
                            match ch {
                                '"' => out.push_str("\\\""),
                                '\\' => out.push_str("\\\\"),
                                '\n' => out.push_str("\\n"),
                                '{' => out.push_str("\\{"),
                                '}' => out.push_str("\\}"),
                                other => out.push(other),
                            }
                        }
                    }
                    FStringPart::Expr(inner) => {
                        out.push('{');
                        out.push_str(&print_expr(inner));
                        out.push('}');
                    }
                }
            }
            out.push('"');
            out
        }
        Expr::Array { items, .. } => {
            let inner: Vec<String> = items.iter().map(print_expr).collect();
            format!("[{}]", inner.join(", "))
        }
        Expr::Object { entries, .. } => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), print_expr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Expr::Input { args, kwargs, .. } => {
            format!("input({})", print_args(args, kwargs))
        }
    }
}

fn print_args(args: &[Expr], kwargs: &[(String, Expr)]) -> String {
    let mut parts: Vec<String> = args.iter().map(print_expr).collect();
    for (name, value) in kwargs {
        parts.push(format!("{} = {}", name, print_expr(value)));
    }
    parts.join(", ")
}

/// Operands of compound expressions get parentheses unless they are atoms.
fn print_operand(expr: &Expr) -> String {
    match expr {
        Expr::Literal { .. }
        | Expr::Identifier { .. }
        | Expr::Member { .. }
        | Expr::Index { .. }
        | Expr::Call { .. }
        | Expr::MethodCall { .. }
        | Expr::Array { .. }
        | Expr::FString { .. }
        | Expr::Input { .. } => print_expr(expr),
        _ => format!("({})", print_expr(expr)),
    }
}
