// ABOUTME: Lexer turning Flowby source into a token stream, with Python-style
// INDENT/DEDENT synthesis driven by a stack of indentation widths

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{digit1, one_of},
    combinator::{opt, recognize},
    sequence::pair,
    IResult, Parser,
};

use crate::error::LexError;
use crate::token::{keyword_kind, Token, TokenKind};

/// Tab characters in leading whitespace count as this many spaces.
const TAB_WIDTH: usize = 4;

/// Indentation must be a multiple of this.
const INDENT_UNIT: usize = 4;

/// An ordered, finite token sequence ending in EOF.
pub type TokenStream = Vec<Token>;

/// Lex a complete source text into a token stream.
///
/// CRLF line endings are normalized; blank lines and comment-only lines
/// produce no tokens at all. Bracket depth suppresses NEWLINE and the
/// indentation machinery, so expressions may span lines inside `( [ {`.
pub fn lex(source: &str) -> Result<TokenStream, LexError> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut bracket_depth: usize = 0;
    let mut line_no = 0;

    for raw_line in source.split('\n') {
        line_no += 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        let (width, content) = measure_indent(line);
        if content.is_empty() || content.starts_with('#') {
            continue;
        }

        if bracket_depth == 0 {
            if width % INDENT_UNIT != 0 {
                return Err(LexError::IndentNotMultiple {
                    width,
                    line: line_no,
                });
            }
            let top = *indents.last().unwrap_or(&0);
            if width > top {
                indents.push(width);
                tokens.push(Token::new(TokenKind::Indent, "", line_no, 1));
            } else if width < top {
                while indents.last().is_some_and(|&w| w > width) {
                    indents.pop();
                    tokens.push(Token::new(TokenKind::Dedent, "", line_no, 1));
                }
                if *indents.last().unwrap_or(&0) != width {
                    return Err(LexError::MisalignedDedent {
                        width,
                        line: line_no,
                    });
                }
            }
        }

        let had_tokens = scan_line(line, line_no, &mut tokens, &mut bracket_depth)?;
        if bracket_depth == 0 && had_tokens {
            tokens.push(Token::new(
                TokenKind::Newline,
                "",
                line_no,
                line.chars().count() + 1,
            ));
        }
    }

    let eof_line = line_no + 1;
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token::new(TokenKind::Dedent, "", eof_line, 1));
    }
    tokens.push(Token::new(TokenKind::Eof, "", eof_line, 1));
    Ok(tokens)
}

/// Leading whitespace width (tabs expanded) and the rest of the line.
fn measure_indent(line: &str) -> (usize, &str) {
    let mut width = 0;
    for (idx, ch) in line.char_indices() {
        match ch {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH,
            _ => return (width, &line[idx..]),
        }
    }
    (width, "")
}

/// Tokenize the contents of one line, updating bracket depth as brackets
/// open and close. Returns whether any token was produced.
fn scan_line(
    line: &str,
    line_no: usize,
    tokens: &mut Vec<Token>,
    bracket_depth: &mut usize,
) -> Result<bool, LexError> {
    let mut rest = line;
    let mut produced = false;

    loop {
        let trimmed = rest.trim_start_matches([' ', '\t']);
        rest = trimmed;
        if rest.is_empty() || rest.starts_with('#') {
            break;
        }

        let column = line.chars().count() - rest.chars().count() + 1;

        if rest.starts_with("f\"") || rest.starts_with("f'") {
            let (consumed, raw) = scan_fstring(rest, line_no, column)?;
            tokens.push(Token::new(TokenKind::FString, raw, line_no, column));
            rest = &rest[consumed..];
            produced = true;
            continue;
        }

        if rest.starts_with('"') || rest.starts_with('\'') {
            let (consumed, unescaped) = scan_string(rest, line_no, column)?;
            tokens.push(Token::new(TokenKind::Str, unescaped, line_no, column));
            rest = &rest[consumed..];
            produced = true;
            continue;
        }

        if let Ok((after, text)) = number(rest) {
            let kind = if text.contains('.') || text.contains('e') || text.contains('E') {
                TokenKind::Number
            } else {
                TokenKind::Integer
            };
            tokens.push(Token::new(kind, text, line_no, column));
            rest = after;
            produced = true;
            continue;
        }

        if let Ok((after, word)) = identifier(rest) {
            let kind = keyword_kind(word).unwrap_or(TokenKind::Identifier);
            tokens.push(Token::new(kind, word, line_no, column));
            rest = after;
            produced = true;
            continue;
        }

        if let Ok((after, op)) = operator(rest) {
            let kind = operator_kind(op);
            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    *bracket_depth += 1;
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    *bracket_depth = bracket_depth.saturating_sub(1);
                }
                _ => {}
            }
            tokens.push(Token::new(kind, op, line_no, column));
            rest = after;
            produced = true;
            continue;
        }

        let ch = rest.chars().next().unwrap_or('?');
        return Err(LexError::InvalidCharacter {
            ch,
            line: line_no,
            column,
        });
    }

    Ok(produced)
}

// ============================================================================
// nom scanners for line-internal tokens
// ============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize((
        digit1,
        opt(pair(nom::character::complete::char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("=="),
        tag("!="),
        tag("<="),
        tag(">="),
        tag("=>"),
        tag("="),
        tag("<"),
        tag(">"),
        tag("+"),
        tag("-"),
        tag("*"),
        tag("/"),
        tag("%"),
        tag("("),
        tag(")"),
        tag("["),
        tag("]"),
        tag("{"),
        tag("}"),
        tag(":"),
        tag(","),
    ))
    .parse(input)
    .or_else(|_: nom::Err<nom::error::Error<&str>>| tag(".").parse(input))
}

fn operator_kind(op: &str) -> TokenKind {
    match op {
        "==" => TokenKind::EqEq,
        "!=" => TokenKind::NotEq,
        "<=" => TokenKind::LtEq,
        ">=" => TokenKind::GtEq,
        "=>" => TokenKind::FatArrow,
        "=" => TokenKind::Assign,
        "<" => TokenKind::Lt,
        ">" => TokenKind::Gt,
        "+" => TokenKind::Plus,
        "-" => TokenKind::Minus,
        "*" => TokenKind::Star,
        "/" => TokenKind::Slash,
        "%" => TokenKind::Percent,
        "(" => TokenKind::LParen,
        ")" => TokenKind::RParen,
        "[" => TokenKind::LBracket,
        "]" => TokenKind::RBracket,
        "{" => TokenKind::LBrace,
        "}" => TokenKind::RBrace,
        ":" => TokenKind::Colon,
        "," => TokenKind::Comma,
        "." => TokenKind::Dot,
        _ => unreachable!("operator table out of sync"),
    }
}

// ============================================================================
// String and f-string scanning (hand-rolled: escapes and positions)
// ============================================================================

/// Scan a quoted string starting at `input[0]`. Returns (bytes consumed,
/// unescaped contents).
fn scan_string(input: &str, line: usize, column: usize) -> Result<(usize, String), LexError> {
    let mut chars = input.char_indices();
    let (_, quote) = chars.next().expect("caller checked first char");
    let mut out = String::new();

    while let Some((idx, ch)) = chars.next() {
        if ch == quote {
            return Ok((idx + ch.len_utf8(), out));
        }
        if ch == '\\' {
            match chars.next() {
                Some((_, esc)) => out.push(unescape(esc).ok_or(LexError::InvalidEscape {
                    ch: esc,
                    line,
                    column: column + idx,
                })?),
                None => return Err(LexError::UnterminatedString { line, column }),
            }
        } else {
            out.push(ch);
        }
    }
    Err(LexError::UnterminatedString { line, column })
}

fn unescape(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        '0' => Some('\0'),
        '{' => Some('{'),
        '}' => Some('}'),
        _ => None,
    }
}

/// Scan an f-string starting at the `f`. Returns (bytes consumed, raw
/// interior). Brace depth is tracked so expression fragments may contain
/// nested braces and string literals containing the closing quote.
fn scan_fstring(input: &str, line: usize, column: usize) -> Result<(usize, String), LexError> {
    let mut chars = input.char_indices();
    chars.next(); // 'f'
    let (_, quote) = chars.next().expect("caller checked prefix");
    let mut brace_depth = 0usize;
    let mut raw = String::new();

    while let Some((idx, ch)) = chars.next() {
        if brace_depth == 0 && ch == quote {
            return Ok((idx + ch.len_utf8(), raw));
        }
        match ch {
            '{' => brace_depth += 1,
            '}' => brace_depth = brace_depth.saturating_sub(1),
            '\\' if brace_depth == 0 => {
                raw.push(ch);
                if let Some((_, esc)) = chars.next() {
                    raw.push(esc);
                }
                continue;
            }
            '"' | '\'' if brace_depth > 0 => {
                // An inner string literal inside an expression fragment:
                // skip to its closing quote so it cannot end the f-string.
                raw.push(ch);
                let inner_quote = ch;
                for (_, inner) in chars.by_ref() {
                    raw.push(inner);
                    if inner == inner_quote {
                        break;
                    }
                }
                continue;
            }
            _ => {}
        }
        raw.push(ch);
    }
    Err(LexError::UnterminatedString { line, column })
}

/// One piece of an f-string interior.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFragment {
    Literal(String),
    Expr(String),
}

/// Split an f-string's raw interior into literal and expression fragments.
/// The parser lexes and parses each `Expr` fragment into a real AST subtree.
pub fn split_fstring(raw: &str, line: usize) -> Result<Vec<RawFragment>, LexError> {
    let mut fragments = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.char_indices();

    while let Some((idx, ch)) = chars.next() {
        if ch == '\\' {
            if let Some((_, esc)) = chars.next() {
                literal.push(unescape(esc).ok_or(LexError::InvalidEscape {
                    ch: esc,
                    line,
                    column: idx + 1,
                })?);
            }
            continue;
        }
        if ch != '{' {
            literal.push(ch);
            continue;
        }

        if !literal.is_empty() {
            fragments.push(RawFragment::Literal(std::mem::take(&mut literal)));
        }

        let mut expr = String::new();
        let mut depth = 1usize;
        let mut closed = false;
        for (_, inner) in chars.by_ref() {
            match inner {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        closed = true;
                        break;
                    }
                }
                _ => {}
            }
            expr.push(inner);
        }
        if !closed {
            return Err(LexError::UnterminatedFragment {
                line,
                column: idx + 1,
            });
        }
        fragments.push(RawFragment::Expr(expr));
    }

    if !literal.is_empty() {
        fragments.push(RawFragment::Literal(literal));
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_source_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("\n\n# only a comment\n"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("let x = 1"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Integer,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_indent_dedent_matching() {
        let src = "if x:\n    log x\nlet y = 2";
        let ks = kinds(src);
        let indents = ks.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = ks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn test_dedents_closed_at_eof() {
        let src = "if x:\n    if y:\n        log x";
        let ks = kinds(src);
        let indents = ks.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = ks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
        assert_eq!(*ks.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn test_two_space_indent_rejected() {
        let err = lex("step \"x\":\n  log \"hi\"").unwrap_err();
        assert_eq!(err, LexError::IndentNotMultiple { width: 2, line: 2 });
    }

    #[test]
    fn test_misaligned_dedent_rejected() {
        let src = "if x:\n        log x\n    log x";
        let err = lex(src).unwrap_err();
        assert_eq!(err, LexError::MisalignedDedent { width: 4, line: 3 });
    }

    #[test]
    fn test_tabs_expand_to_four() {
        let src = "if x:\n\tlog x";
        let ks = kinds(src);
        assert!(ks.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_brackets_suppress_newline() {
        let src = "let xs = [1,\n    2,\n    3]";
        let ks = kinds(src);
        assert_eq!(
            ks.iter().filter(|k| **k == TokenKind::Newline).count(),
            1,
            "only the closing line emits NEWLINE"
        );
        assert!(!ks.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_string_escapes() {
        let toks = lex(r#"let s = "a\nb""#).unwrap();
        let s = toks.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(s.lexeme, "a\nb");
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex("let s = \"oops").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { line: 1, .. }));
    }

    #[test]
    fn test_invalid_escape() {
        let err = lex(r#"let s = "a\qb""#).unwrap_err();
        assert!(matches!(err, LexError::InvalidEscape { ch: 'q', .. }));
    }

    #[test]
    fn test_numbers() {
        let toks = lex("1 2.5 3e10 42").unwrap();
        let kinds: Vec<_> = toks
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Integer | TokenKind::Number))
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Integer,
                TokenKind::Number,
                TokenKind::Number,
                TokenKind::Integer,
            ]
        );
    }

    #[test]
    fn test_maximal_munch_operators() {
        let toks = lex("a <= b == c => d").unwrap();
        let ops = toks
            .iter()
            .filter(|t| {
                matches!(
                    t.kind,
                    TokenKind::LtEq | TokenKind::EqEq | TokenKind::FatArrow
                )
            })
            .count();
        assert_eq!(ops, 3);
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        let toks = lex("let Resource = while_x").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Let);
        assert_eq!(toks[1].kind, TokenKind::Identifier);
        assert_eq!(toks[1].lexeme, "Resource");
        assert_eq!(toks[3].kind, TokenKind::Identifier);
        assert_eq!(toks[3].lexeme, "while_x");
    }

    #[test]
    fn test_comment_discarded() {
        let ks = kinds("let x = 1  # trailing comment");
        assert_eq!(ks.len(), 6); // let, x, =, 1, NEWLINE, EOF
    }

    #[test]
    fn test_fstring_captured_raw() {
        let toks = lex(r#"log f"hi {name}!""#).unwrap();
        let f = toks.iter().find(|t| t.kind == TokenKind::FString).unwrap();
        assert_eq!(f.lexeme, "hi {name}!");
    }

    #[test]
    fn test_fstring_with_inner_string() {
        let toks = lex(r#"log f"v: {d["k"]}""#).unwrap();
        let f = toks.iter().find(|t| t.kind == TokenKind::FString).unwrap();
        assert_eq!(f.lexeme, r#"v: {d["k"]}"#);
    }

    #[test]
    fn test_split_fstring_fragments() {
        let parts = split_fstring("hi {name}, {a + b}!", 1).unwrap();
        assert_eq!(
            parts,
            vec![
                RawFragment::Literal("hi ".to_string()),
                RawFragment::Expr("name".to_string()),
                RawFragment::Literal(", ".to_string()),
                RawFragment::Expr("a + b".to_string()),
                RawFragment::Literal("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_fstring_nested_braces() {
        let parts = split_fstring("x {{\"k\": 1}[\"k\"]} y", 1);
        // Nested braces are tracked, so the expression fragment is intact.
        let parts = parts.unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[1],
            RawFragment::Expr("{\"k\": 1}[\"k\"]".to_string())
        );
    }

    #[test]
    fn test_positions_are_one_based() {
        let toks = lex("let x = 1").unwrap();
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (1, 5));
    }

    #[test]
    fn test_crlf_normalized() {
        let ks = kinds("let x = 1\r\nlet y = 2\r\n");
        assert_eq!(
            ks.iter().filter(|k| **k == TokenKind::Newline).count(),
            2
        );
    }

    #[test]
    fn test_every_indent_has_matching_dedent() {
        let src = "step \"a\":\n    if x:\n        log x\n    log x\nlog x";
        let ks = kinds(src);
        let mut depth = 0i32;
        for k in &ks {
            match k {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }
}
