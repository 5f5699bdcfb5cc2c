//! Tokenizer with automatic semicolon insertion.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tok {
    Ident,
    Int,
    Float,
    Imag,
    Char,
    String,
    RawString,
    Op,
    /// Explicit `;` or one inserted at a line end (text `"\n"`).
    Semi,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub tok: Tok,
    /// Source text; string literals keep their quotes.
    pub text: String,
    pub line: u32,
    pub col: u32,
}

impl Token {
    /// Whether the token is the operator `op`.
    pub fn is_op(&self, op: &str) -> bool {
        self.tok == Tok::Op && self.text == op
    }

    /// Whether the token is the keyword `kw`.
    pub fn is_keyword(&self, kw: &str) -> bool {
        self.tok == Tok::Ident && self.text == kw
    }

    /// Human-readable form used in "found X" messages.
    pub fn describe(&self) -> String {
        match self.tok {
            Tok::Eof => "EOF".to_string(),
            Tok::Semi if self.text == "\n" => "newline".to_string(),
            _ => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Comment {
    /// Comment text without markers.
    pub text: String,
    pub line: u32,
    pub end_line: u32,
    /// Code precedes the comment on its first line.
    pub trailing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub line: u32,
    pub col: u32,
    pub msg: String,
}

pub(crate) const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "~",
];

pub(crate) fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

struct Lexer<'a> {
    src: &'a [u8],
    at: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
}

/// Splits `src` into tokens and comments.
pub(crate) fn tokenize(src: &str) -> Result<(Vec<Token>, Vec<Comment>), LexError> {
    let mut lexer = Lexer {
        src: src.as_bytes(),
        at: 0,
        line: 1,
        col: 1,
        tokens: Vec::new(),
        comments: Vec::new(),
    };
    lexer.run()?;
    Ok((lexer.tokens, lexer.comments))
}

impl Lexer<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.at).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.at + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.at += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if byte & 0xC0 != 0x80 {
            // continuation bytes of a UTF-8 sequence do not advance the column
            self.col += 1;
        }
        Some(byte)
    }

    fn error(&self, line: u32, col: u32, msg: impl Into<String>) -> LexError {
        LexError {
            line,
            col,
            msg: msg.into(),
        }
    }

    fn needs_semicolon(&self) -> bool {
        let Some(last) = self.tokens.last() else {
            return false;
        };
        match last.tok {
            Tok::Ident => {
                !is_keyword(&last.text)
                    || matches!(
                        last.text.as_str(),
                        "break" | "continue" | "fallthrough" | "return"
                    )
            }
            Tok::Int | Tok::Float | Tok::Imag | Tok::Char | Tok::String | Tok::RawString => true,
            Tok::Op => matches!(last.text.as_str(), ")" | "]" | "}" | "++" | "--"),
            Tok::Semi | Tok::Eof => false,
        }
    }

    fn insert_semicolon(&mut self, line: u32, col: u32) {
        if self.needs_semicolon() {
            self.tokens.push(Token {
                tok: Tok::Semi,
                text: "\n".to_string(),
                line,
                col,
            });
        }
    }

    fn push(&mut self, tok: Tok, start: usize, line: u32, col: u32) {
        let text = String::from_utf8_lossy(&self.src[start..self.at]).into_owned();
        let tok = if tok == Tok::Op && text == ";" {
            Tok::Semi
        } else {
            tok
        };
        self.tokens.push(Token {
            tok,
            text,
            line,
            col,
        });
    }

    fn code_on_line(&self, line: u32) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| t.line == line && !(t.tok == Tok::Semi && t.text == "\n"))
    }

    fn run(&mut self) -> Result<(), LexError> {
        while let Some(byte) = self.peek() {
            let (line, col, start) = (self.line, self.col, self.at);
            match byte {
                b'\n' => {
                    self.insert_semicolon(line, col);
                    self.bump();
                }
                b' ' | b'\t' | b'\r' => {
                    self.bump();
                }
                b'/' if self.peek_at(1) == Some(b'/') => self.line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.block_comment()?,
                b'"' => {
                    self.string_literal(b'"')?;
                    self.push(Tok::String, start, line, col);
                }
                b'\'' => {
                    self.string_literal(b'\'')?;
                    self.push(Tok::Char, start, line, col);
                }
                b'`' => {
                    self.bump();
                    loop {
                        match self.bump() {
                            Some(b'`') => break,
                            Some(_) => {}
                            None => return Err(self.error(line, col, "raw string literal not terminated")),
                        }
                    }
                    self.push(Tok::RawString, start, line, col);
                }
                b'0'..=b'9' => {
                    let tok = self.number();
                    self.push(tok, start, line, col);
                }
                b'.' if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                    let tok = self.number();
                    self.push(tok, start, line, col);
                }
                b if b == b'_' || b.is_ascii_alphabetic() || b >= 0x80 => {
                    while self
                        .peek()
                        .is_some_and(|b| b == b'_' || b.is_ascii_alphanumeric() || b >= 0x80)
                    {
                        self.bump();
                    }
                    self.push(Tok::Ident, start, line, col);
                }
                _ => {
                    let rest = &self.src[self.at..];
                    let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(op.as_bytes()))
                    else {
                        return Err(self.error(
                            line,
                            col,
                            format!("invalid character {:?}", char::from(byte)),
                        ));
                    };
                    for _ in 0..op.len() {
                        self.bump();
                    }
                    self.push(Tok::Op, start, line, col);
                }
            }
        }
        self.insert_semicolon(self.line, self.col);
        self.tokens.push(Token {
            tok: Tok::Eof,
            text: String::new(),
            line: self.line,
            col: self.col,
        });
        Ok(())
    }

    fn line_comment(&mut self) {
        let (line, start) = (self.line, self.at);
        let trailing = self.code_on_line(line);
        while self.peek().is_some_and(|b| b != b'\n') {
            self.bump();
        }
        let raw = String::from_utf8_lossy(&self.src[start + 2..self.at]).into_owned();
        self.comments.push(Comment {
            text: raw.strip_prefix(' ').unwrap_or(&raw).trim_end().to_string(),
            line,
            end_line: line,
            trailing,
        });
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let (line, col, start) = (self.line, self.col, self.at);
        let trailing = self.code_on_line(line);
        self.bump();
        self.bump();
        loop {
            match self.peek() {
                None => return Err(self.error(line, col, "comment not terminated")),
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let end_line = self.line;
        if end_line > line {
            // a multi-line comment acts like a newline
            self.insert_semicolon(line, col);
        }
        let raw = String::from_utf8_lossy(&self.src[start + 2..self.at - 2]).into_owned();
        self.comments.push(Comment {
            text: raw.trim().to_string(),
            line,
            end_line,
            trailing,
        });
        Ok(())
    }

    fn string_literal(&mut self, quote: u8) -> Result<(), LexError> {
        let (line, col) = (self.line, self.col);
        self.bump();
        loop {
            match self.bump() {
                Some(b'\\') => {
                    self.bump();
                }
                Some(b) if b == quote => return Ok(()),
                Some(b'\n') | None => {
                    let what = if quote == b'"' { "string" } else { "rune" };
                    return Err(self.error(line, col, format!("{what} literal not terminated")));
                }
                Some(_) => {}
            }
        }
    }

    fn number(&mut self) -> Tok {
        let mut tok = Tok::Int;
        let hex = self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X'));
        let prefixed = matches!(self.peek_at(1), Some(b'b' | b'B' | b'o' | b'O'));
        if hex || (self.peek() == Some(b'0') && prefixed) {
            self.bump();
            self.bump();
        }
        loop {
            match self.peek() {
                Some(b'0'..=b'9' | b'_') => {
                    self.bump();
                }
                Some(b'a'..=b'f' | b'A'..=b'F') if hex => {
                    self.bump();
                }
                Some(b'.') if self.peek_at(1) != Some(b'.') => {
                    tok = Tok::Float;
                    self.bump();
                }
                Some(b'e' | b'E') if !hex => {
                    tok = Tok::Float;
                    self.bump();
                    if matches!(self.peek(), Some(b'+' | b'-')) {
                        self.bump();
                    }
                }
                Some(b'p' | b'P') if hex => {
                    tok = Tok::Float;
                    self.bump();
                    if matches!(self.peek(), Some(b'+' | b'-')) {
                        self.bump();
                    }
                }
                Some(b'i') => {
                    self.bump();
                    return Tok::Imag;
                }
                _ => return tok,
            }
        }
    }
}
