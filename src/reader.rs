//! Prolog lexer and parser.
//!
//! The tokenizer produces name, variable, number, string and punctuation
//! tokens with line/column positions, applying the character-conversion
//! table to unquoted text when the flag is on. The parser is an
//! operator-precedence (Pratt) parser over a snapshot of the current
//! operator table, taken per term so `op/3` directives take effect for the
//! terms that follow them. It additionally handles `(..)`, `[..|..]` list
//! notation, `{..}` curly terms and quoted atoms with escape sequences.
//!
//! Every successful read returns the term together with the mapping from
//! source-level variable names to the variables created, so callers can
//! report bindings after execution. `_` is a fresh variable at each
//! occurrence. After a syntax error the stream is restartable: `recover`
//! skips to the next end token.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use parking_lot::Mutex;

use crate::backend::environment::{DoubleQuotes, Environment};
use crate::backend::error::PrologError;
use crate::backend::operators::OperatorTable;
use crate::backend::streams::PrologStream;
use crate::backend::symbol::atom;
use crate::backend::term::Term;

/// Characters that form symbolic atoms
const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

fn is_symbol_char(c: char) -> bool {
    SYMBOL_CHARS.contains(c)
}

fn is_alnum(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A parse error with its source position. `cause` carries a stream fault
/// when reading from a Prolog stream raised one.
#[derive(Debug)]
pub struct ReadError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub cause: Option<PrologError>,
}

impl ReadError {
    fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        ReadError {
            message: message.into(),
            line,
            column,
            cause: None,
        }
    }

    /// The error as a throwable `syntax_error` ball (or the underlying
    /// stream fault)
    pub fn into_prolog_error(self) -> PrologError {
        match self.cause {
            Some(e) => e,
            None => PrologError::syntax_error(&format!(
                "{} at line {}, column {}",
                self.message, self.line, self.column
            )),
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error: {} at line {}, column {}",
            self.message, self.line, self.column
        )
    }
}

impl std::error::Error for ReadError {}

/// Where the lexer pulls characters from
pub trait CharSource {
    fn next_char(&mut self) -> Result<Option<char>, PrologError>;
}

/// In-memory source text
pub struct StrSource {
    chars: Vec<char>,
    pos: usize,
}

impl StrSource {
    pub fn new(text: &str) -> Self {
        StrSource {
            chars: text.chars().collect(),
            pos: 0,
        }
    }
}

impl CharSource for StrSource {
    fn next_char(&mut self) -> Result<Option<char>, PrologError> {
        if self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            self.pos += 1;
            Ok(Some(c))
        } else {
            Ok(None)
        }
    }
}

/// Characters drawn from a Prolog text input stream (read/1)
pub struct StreamSource {
    stream: Arc<Mutex<PrologStream>>,
}

impl StreamSource {
    pub fn new(stream: Arc<Mutex<PrologStream>>) -> Self {
        StreamSource { stream }
    }
}

impl CharSource for StreamSource {
    fn next_char(&mut self) -> Result<Option<char>, PrologError> {
        self.stream.lock().get_char()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unquoted, quoted or symbolic atom name
    Name(String),
    Var(String),
    Int(BigInt),
    Float(f64),
    Decimal(BigDecimal),
    /// Double-quoted string (interpretation depends on the double_quotes flag)
    Str(String),
    /// `(` preceded by layout
    Open,
    /// `(` immediately following a name token (functional notation)
    OpenCT,
    Close,
    OpenList,
    CloseList,
    OpenCurly,
    CloseCurly,
    Comma,
    Bar,
    /// Clause terminator `.`
    End,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(s) => write!(f, "{}", s),
            Token::Var(s) => write!(f, "{}", s),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(x) => write!(f, "{}", x),
            Token::Decimal(d) => write!(f, "{}d", d),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Open | Token::OpenCT => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::OpenList => write!(f, "["),
            Token::CloseList => write!(f, "]"),
            Token::OpenCurly => write!(f, "{{"),
            Token::CloseCurly => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Bar => write!(f, "|"),
            Token::End => write!(f, "."),
            Token::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
enum LastToken {
    None,
    Name,
    Other,
}

pub struct Lexer<S: CharSource> {
    env: Environment,
    source: S,
    lookahead: VecDeque<char>,
    line: usize,
    column: usize,
    /// Position of the token most recently produced
    token_line: usize,
    token_column: usize,
    /// Whether layout preceded the most recent token
    token_had_layout: bool,
    last_token: LastToken,
}

impl<S: CharSource> Lexer<S> {
    pub fn new(env: Environment, source: S) -> Self {
        Lexer {
            env,
            source,
            lookahead: VecDeque::new(),
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            token_had_layout: false,
            last_token: LastToken::None,
        }
    }

    pub fn position(&self) -> (usize, usize) {
        (self.token_line, self.token_column)
    }

    fn fault(&self, e: PrologError) -> ReadError {
        ReadError {
            message: "stream fault".to_string(),
            line: self.line,
            column: self.column,
            cause: Some(e),
        }
    }

    fn err(&self, message: impl Into<String>) -> ReadError {
        ReadError::new(message, self.line, self.column)
    }

    fn fill(&mut self, n: usize) -> Result<(), ReadError> {
        while self.lookahead.len() < n {
            match self.source.next_char() {
                Ok(Some(c)) => self.lookahead.push_back(c),
                Ok(None) => break,
                Err(e) => return Err(self.fault(e)),
            }
        }
        Ok(())
    }

    /// Peek without consuming; positions unchanged
    fn peek(&mut self) -> Result<Option<char>, ReadError> {
        self.fill(1)?;
        Ok(self.lookahead.front().copied())
    }

    fn peek_at(&mut self, offset: usize) -> Result<Option<char>, ReadError> {
        self.fill(offset + 1)?;
        Ok(self.lookahead.get(offset).copied())
    }

    /// Consume one raw character
    fn bump(&mut self) -> Result<Option<char>, ReadError> {
        self.fill(1)?;
        match self.lookahead.pop_front() {
            Some(c) => {
                if c == '\n' {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += 1;
                }
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    /// Peek with the character-conversion table applied (unquoted text)
    fn peek_conv(&mut self) -> Result<Option<char>, ReadError> {
        Ok(self.peek()?.map(|c| self.env.convert_char(c)))
    }

    /// Skip layout and comments. Returns whether anything was skipped
    /// (used to distinguish `f(` from `f (`).
    fn skip_layout(&mut self) -> Result<bool, ReadError> {
        let mut skipped = false;
        loop {
            match self.peek()? {
                Some(c) if c.is_whitespace() => {
                    self.bump()?;
                    skipped = true;
                }
                Some('%') => {
                    skipped = true;
                    while let Some(c) = self.bump()? {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_at(1)? == Some('*') => {
                    skipped = true;
                    self.bump()?;
                    self.bump()?;
                    // Flat block comment; nesting is not supported
                    loop {
                        match self.bump()? {
                            Some('*') if self.peek()? == Some('/') => {
                                self.bump()?;
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.err("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(skipped),
            }
        }
    }

    /// Produce the next token
    pub fn next_token(&mut self) -> Result<Token, ReadError> {
        let had_layout = self.skip_layout()?;
        self.token_line = self.line;
        self.token_column = self.column;
        self.token_had_layout = had_layout;
        let prev = self.last_token;
        let token = self.scan_token(had_layout, prev)?;
        self.last_token = match token {
            Token::Name(_) => LastToken::Name,
            Token::Eof => LastToken::None,
            _ => LastToken::Other,
        };
        Ok(token)
    }

    fn scan_token(&mut self, had_layout: bool, prev: LastToken) -> Result<Token, ReadError> {
        let c = match self.peek_conv()? {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };
        match c {
            '(' => {
                self.bump()?;
                if !had_layout && prev == LastToken::Name {
                    Ok(Token::OpenCT)
                } else {
                    Ok(Token::Open)
                }
            }
            ')' => {
                self.bump()?;
                Ok(Token::Close)
            }
            '[' => {
                self.bump()?;
                Ok(Token::OpenList)
            }
            ']' => {
                self.bump()?;
                Ok(Token::CloseList)
            }
            '{' => {
                self.bump()?;
                Ok(Token::OpenCurly)
            }
            '}' => {
                self.bump()?;
                Ok(Token::CloseCurly)
            }
            ',' => {
                self.bump()?;
                Ok(Token::Comma)
            }
            '|' => {
                self.bump()?;
                Ok(Token::Bar)
            }
            '!' => {
                self.bump()?;
                Ok(Token::Name("!".to_string()))
            }
            ';' => {
                self.bump()?;
                Ok(Token::Name(";".to_string()))
            }
            '\'' => self.read_quoted_atom(),
            '"' => self.read_string(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c == '_' || c.is_uppercase() => {
                let mut name = String::new();
                while let Some(c) = self.peek_conv()? {
                    if is_alnum(c) {
                        name.push(c);
                        self.bump()?;
                    } else {
                        break;
                    }
                }
                Ok(Token::Var(name))
            }
            c if c.is_lowercase() && c.is_alphabetic() => {
                let mut name = String::new();
                while let Some(c) = self.peek_conv()? {
                    if is_alnum(c) {
                        name.push(c);
                        self.bump()?;
                    } else {
                        break;
                    }
                }
                Ok(Token::Name(name))
            }
            c if is_symbol_char(c) => {
                let mut name = String::new();
                while let Some(c) = self.peek_conv()? {
                    if is_symbol_char(c) {
                        name.push(c);
                        self.bump()?;
                    } else {
                        break;
                    }
                }
                // A lone `.` followed by layout, a comment or EOF ends the clause
                if name == "." {
                    match self.peek()? {
                        None => return Ok(Token::End),
                        Some(c) if c.is_whitespace() || c == '%' => return Ok(Token::End),
                        _ => {}
                    }
                }
                Ok(Token::Name(name))
            }
            other => {
                self.bump()?;
                Err(self.err(format!("unexpected character '{}'", other)))
            }
        }
    }

    fn read_escape(&mut self, quote: char) -> Result<Option<char>, ReadError> {
        let c = match self.bump()? {
            None => return Err(self.err("unterminated escape sequence")),
            Some(c) => c,
        };
        let out = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '`' => '`',
            // Escaped newline continues the token with no character
            '\n' => return Ok(None),
            'x' => {
                let mut hex = String::new();
                while let Some(h) = self.peek()? {
                    if h.is_ascii_hexdigit() {
                        hex.push(h);
                        self.bump()?;
                    } else {
                        break;
                    }
                }
                if self.peek()? == Some('\\') {
                    self.bump()?;
                } else {
                    return Err(self.err("missing \\ after \\x escape"));
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| self.err("invalid hexadecimal escape"))?;
                char::from_u32(code).ok_or_else(|| self.err("escape beyond character range"))?
            }
            d if d.is_digit(8) => {
                let mut oct = String::from(d);
                while let Some(o) = self.peek()? {
                    if o.is_digit(8) {
                        oct.push(o);
                        self.bump()?;
                    } else {
                        break;
                    }
                }
                if self.peek()? == Some('\\') {
                    self.bump()?;
                } else {
                    return Err(self.err("missing \\ after octal escape"));
                }
                let code = u32::from_str_radix(&oct, 8)
                    .map_err(|_| self.err("invalid octal escape"))?;
                char::from_u32(code).ok_or_else(|| self.err("escape beyond character range"))?
            }
            other => {
                return Err(self.err(format!(
                    "invalid escape '\\{}' in {} quoted token",
                    other, quote
                )))
            }
        };
        Ok(Some(out))
    }

    fn read_quoted_atom(&mut self) -> Result<Token, ReadError> {
        self.bump()?; // opening quote
        let mut name = String::new();
        loop {
            match self.bump()? {
                None => return Err(self.err("unterminated quoted atom")),
                Some('\'') => {
                    if self.peek()? == Some('\'') {
                        self.bump()?;
                        name.push('\'');
                    } else {
                        return Ok(Token::Name(name));
                    }
                }
                Some('\\') => {
                    if let Some(c) = self.read_escape('\'')? {
                        name.push(c);
                    }
                }
                Some(c) => name.push(c),
            }
        }
    }

    fn read_string(&mut self) -> Result<Token, ReadError> {
        self.bump()?; // opening quote
        let mut text = String::new();
        loop {
            match self.bump()? {
                None => return Err(self.err("unterminated string")),
                Some('"') => {
                    if self.peek()? == Some('"') {
                        self.bump()?;
                        text.push('"');
                    } else {
                        return Ok(Token::Str(text));
                    }
                }
                Some('\\') => {
                    if let Some(c) = self.read_escape('"')? {
                        text.push(c);
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn read_radix_digits(&mut self, radix: u32, what: &str) -> Result<BigInt, ReadError> {
        let mut digits = String::new();
        while let Some(c) = self.peek()? {
            if c.is_digit(radix) {
                digits.push(c);
                self.bump()?;
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return Err(self.err(format!("missing digits in {} literal", what)));
        }
        BigInt::parse_bytes(digits.as_bytes(), radix)
            .ok_or_else(|| self.err(format!("invalid {} literal", what)))
    }

    /// True when a `d`/`D` at the current position is a decimal suffix
    /// rather than the start of a following name token
    fn decimal_suffix_follows(&mut self) -> Result<bool, ReadError> {
        match self.peek()? {
            Some('d') | Some('D') => Ok(!matches!(self.peek_at(1)?, Some(c) if is_alnum(c))),
            _ => Ok(false),
        }
    }

    fn read_number(&mut self) -> Result<Token, ReadError> {
        let mut digits = String::new();
        while let Some(c) = self.peek_conv()? {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump()?;
            } else {
                break;
            }
        }
        // Radix and character-code forms only apply to a bare leading zero
        if digits == "0" {
            match self.peek()? {
                Some('\'') => {
                    self.bump()?;
                    let c = match self.bump()? {
                        None => return Err(self.err("missing character after 0'")),
                        Some('\\') => self
                            .read_escape('\'')?
                            .ok_or_else(|| self.err("empty escape after 0'"))?,
                        Some('\'') => {
                            if self.peek()? == Some('\'') {
                                self.bump()?;
                                '\''
                            } else {
                                return Err(self.err("expected '' after 0'"));
                            }
                        }
                        Some(c) => c,
                    };
                    return Ok(Token::Int(BigInt::from(c as u32)));
                }
                Some('x') | Some('X') => {
                    self.bump()?;
                    return Ok(Token::Int(self.read_radix_digits(16, "hexadecimal")?));
                }
                Some('o') | Some('O') => {
                    self.bump()?;
                    return Ok(Token::Int(self.read_radix_digits(8, "octal")?));
                }
                Some('b') | Some('B') => {
                    self.bump()?;
                    return Ok(Token::Int(self.read_radix_digits(2, "binary")?));
                }
                _ => {}
            }
        }
        // Fraction: the dot must be followed by a digit, otherwise it is
        // the end token
        let mut is_float = false;
        if self.peek()? == Some('.')
            && matches!(self.peek_at(1)?, Some(c) if c.is_ascii_digit())
        {
            is_float = true;
            digits.push('.');
            self.bump()?;
            while let Some(c) = self.peek_conv()? {
                if c.is_ascii_digit() {
                    digits.push(c);
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        // Exponent
        if matches!(self.peek()?, Some('e') | Some('E')) {
            let sign_ok = match self.peek_at(1)? {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => {
                    matches!(self.peek_at(2)?, Some(c) if c.is_ascii_digit())
                }
                _ => false,
            };
            if sign_ok {
                is_float = true;
                digits.push('e');
                self.bump()?;
                if matches!(self.peek()?, Some('+') | Some('-')) {
                    digits.push(self.bump()?.expect("sign peeked"));
                }
                while let Some(c) = self.peek()? {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        self.bump()?;
                    } else {
                        break;
                    }
                }
            }
        }
        // Decimal suffix
        if self.decimal_suffix_follows()? {
            self.bump()?;
            let d = BigDecimal::from_str(&digits)
                .map_err(|_| self.err("invalid decimal literal"))?;
            return Ok(Token::Decimal(d));
        }
        if is_float {
            let f = f64::from_str(&digits).map_err(|_| self.err("invalid float literal"))?;
            Ok(Token::Float(f))
        } else {
            let n = BigInt::parse_bytes(digits.as_bytes(), 10)
                .ok_or_else(|| self.err("invalid integer literal"))?;
            Ok(Token::Int(n))
        }
    }
}

/// A successful read: the term plus the source-level variable-name map
#[derive(Debug)]
pub struct ReadResult {
    pub term: Term,
    /// (name, variable) pairs in first-occurrence order; `_` is excluded
    pub variables: Vec<(String, Term)>,
}

/// Reads a sequence of terms, taking a fresh operator-table snapshot per
/// term so directives between terms take effect
pub struct TermStream<S: CharSource> {
    env: Environment,
    lexer: Lexer<S>,
}

impl TermStream<StrSource> {
    pub fn from_text(env: &Environment, text: &str) -> Self {
        TermStream {
            env: env.clone(),
            lexer: Lexer::new(env.clone(), StrSource::new(text)),
        }
    }
}

impl TermStream<StreamSource> {
    pub fn from_stream(env: &Environment, stream: Arc<Mutex<PrologStream>>) -> Self {
        TermStream {
            env: env.clone(),
            lexer: Lexer::new(env.clone(), StreamSource::new(stream)),
        }
    }
}

impl<S: CharSource> TermStream<S> {
    /// Line number of the most recent token, for load-error records
    pub fn line(&self) -> usize {
        self.lexer.position().0
    }

    /// Read the next term, or None at end of input
    pub fn next_term(&mut self) -> Result<Option<ReadResult>, ReadError> {
        let ops = self.env.operator_snapshot();
        let first = self.lexer.next_token()?;
        if first == Token::Eof {
            return Ok(None);
        }
        let gap = self.lexer.token_had_layout;
        let mut parser = Parser {
            env: self.env.clone(),
            ops,
            lexer: &mut self.lexer,
            current: first,
            current_gap: gap,
            variables: Vec::new(),
        };
        let term = parser.parse_clause()?;
        let variables = parser.variables;
        Ok(Some(ReadResult { term, variables }))
    }

    /// Skip tokens to just past the next end token, so reading can resume
    /// after a syntax error
    pub fn recover(&mut self) {
        loop {
            match self.lexer.next_token() {
                Ok(Token::End) | Ok(Token::Eof) => return,
                Ok(_) => {}
                Err(_) => {
                    // Skip the offending character and keep scanning
                    if matches!(self.lexer.bump(), Ok(None) | Err(_)) {
                        return;
                    }
                }
            }
        }
    }
}

struct Parser<'l, S: CharSource> {
    env: Environment,
    ops: OperatorTable,
    lexer: &'l mut Lexer<S>,
    current: Token,
    /// Whether layout preceded `current` (negative literals require
    /// the sign glued to the number)
    current_gap: bool,
    variables: Vec<(String, Term)>,
}

impl<'l, S: CharSource> Parser<'l, S> {
    fn err(&self, message: impl Into<String>) -> ReadError {
        let (line, column) = self.lexer.position();
        ReadError::new(message, line, column)
    }

    fn advance(&mut self) -> Result<(), ReadError> {
        self.current = self.lexer.next_token()?;
        self.current_gap = self.lexer.token_had_layout;
        Ok(())
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ReadError> {
        if &self.current == expected {
            self.advance()
        } else {
            Err(self.err(format!("expected {} but found '{}'", what, self.current)))
        }
    }

    /// Parse one clause-level term terminated by the end token
    fn parse_clause(&mut self) -> Result<Term, ReadError> {
        let (term, _) = self.parse(1200)?;
        match &self.current {
            Token::End => Ok(term),
            Token::Eof => Err(self.err("operator expected before end of file")),
            other => Err(self.err(format!("operator expected before '{}'", other))),
        }
    }

    /// Variable for a source name; `_` is always fresh
    fn variable(&mut self, name: &str) -> Term {
        if name == "_" {
            return Term::var();
        }
        if let Some((_, v)) = self.variables.iter().find(|(n, _)| n == name) {
            return v.clone();
        }
        let v = Term::var();
        self.variables.push((name.to_string(), v.clone()));
        v
    }

    fn string_term(&self, text: &str) -> Term {
        match self.env.double_quotes() {
            DoubleQuotes::Codes => Term::list(
                text.chars()
                    .map(|c| Term::Int(BigInt::from(c as u32)))
                    .collect(),
            ),
            DoubleQuotes::Chars => Term::list(
                text.chars()
                    .map(|c| Term::atom(&c.to_string()))
                    .collect(),
            ),
            DoubleQuotes::Atom => Term::atom(text),
        }
    }

    fn token_starts_term(token: &Token) -> bool {
        matches!(
            token,
            Token::Name(_)
                | Token::Var(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Decimal(_)
                | Token::Str(_)
                | Token::Open
                | Token::OpenCT
                | Token::OpenList
                | Token::OpenCurly
        )
    }

    /// Parse a term of at most the given priority. Returns the term and
    /// the priority of its principal operator (0 for non-operator terms).
    fn parse(&mut self, max_prec: u16) -> Result<(Term, u16), ReadError> {
        let (left, left_prec) = self.parse_primary(max_prec)?;
        self.parse_operators(left, left_prec, max_prec)
    }

    fn parse_primary(&mut self, max_prec: u16) -> Result<(Term, u16), ReadError> {
        let token = self.current.clone();
        match token {
            Token::Int(n) => {
                self.advance()?;
                Ok((Term::Int(n), 0))
            }
            Token::Float(f) => {
                self.advance()?;
                Ok((Term::Float(f), 0))
            }
            Token::Decimal(d) => {
                self.advance()?;
                Ok((Term::Decimal(d), 0))
            }
            Token::Var(name) => {
                self.advance()?;
                Ok((self.variable(&name), 0))
            }
            Token::Str(text) => {
                self.advance()?;
                Ok((self.string_term(&text), 0))
            }
            Token::Open | Token::OpenCT => {
                self.advance()?;
                let (term, _) = self.parse(1200)?;
                self.expect(&Token::Close, "')'")?;
                Ok((term, 0))
            }
            Token::OpenList => {
                self.advance()?;
                if self.current == Token::CloseList {
                    self.advance()?;
                    return Ok((Term::nil(), 0));
                }
                let mut items = Vec::new();
                loop {
                    let (item, _) = self.parse(999)?;
                    items.push(item);
                    match &self.current {
                        Token::Comma => {
                            self.advance()?;
                        }
                        Token::Bar => {
                            self.advance()?;
                            let (tail, _) = self.parse(999)?;
                            self.expect(&Token::CloseList, "']'")?;
                            return Ok((Term::partial_list(items, tail), 0));
                        }
                        Token::CloseList => {
                            self.advance()?;
                            return Ok((Term::list(items), 0));
                        }
                        other => {
                            return Err(
                                self.err(format!("expected ',', '|' or ']' but found '{}'", other))
                            )
                        }
                    }
                }
            }
            Token::OpenCurly => {
                self.advance()?;
                if self.current == Token::CloseCurly {
                    self.advance()?;
                    return Ok((Term::atom("{}"), 0));
                }
                let (inner, _) = self.parse(1200)?;
                self.expect(&Token::CloseCurly, "'}'")?;
                Ok((Term::compound("{}", vec![inner]), 0))
            }
            Token::Name(name) => {
                self.advance()?;
                // Functional notation binds tightest
                if self.current == Token::OpenCT {
                    self.advance()?;
                    let args = self.parse_arguments()?;
                    return Ok((Term::compound(&name, args), 0));
                }
                // A `-` glued to a number literal (no layout between)
                // negates it; `- 1` stays a prefix application
                if name == "-" && !self.current_gap {
                    match self.current.clone() {
                        Token::Int(n) => {
                            self.advance()?;
                            return Ok((Term::Int(-n), 0));
                        }
                        Token::Float(f) => {
                            self.advance()?;
                            return Ok((Term::Float(-f), 0));
                        }
                        Token::Decimal(d) => {
                            self.advance()?;
                            return Ok((Term::Decimal(-d), 0));
                        }
                        _ => {}
                    }
                }
                // Prefix operator application
                if let Some(def) = self.ops.prefix(atom(&name)) {
                    if def.priority <= max_prec
                        && Self::token_starts_term(&self.current)
                        && !self.operand_is_infix_only()
                    {
                        let (_, arg_max) = def.arg_priorities();
                        let (arg, _) = self.parse(arg_max)?;
                        return Ok((Term::compound(&name, vec![arg]), def.priority));
                    }
                }
                Ok((Term::atom(&name), 0))
            }
            Token::Comma | Token::Bar => Err(self.err(format!("unexpected '{}'", token))),
            Token::Close | Token::CloseList | Token::CloseCurly => {
                Err(self.err(format!("unexpected '{}'", token)))
            }
            Token::End => Err(self.err("unexpected end of clause")),
            Token::Eof => Err(self.err("unexpected end of file")),
        }
    }

    /// An operand name that only has infix/postfix definitions cannot
    /// start a term; the operator before it is then a plain atom
    /// (e.g. `f(-, *)` or `X = mod`).
    fn operand_is_infix_only(&self) -> bool {
        match &self.current {
            Token::Name(n) => {
                let a = atom(n);
                self.ops.prefix(a).is_none()
                    && (self.ops.infix(a).is_some() || self.ops.postfix(a).is_some())
            }
            _ => false,
        }
    }

    /// Arguments of functional notation: arg-priority terms separated by
    /// commas, closed by ')'
    fn parse_arguments(&mut self) -> Result<Vec<Term>, ReadError> {
        let mut args = Vec::new();
        loop {
            let (arg, _) = self.parse(999)?;
            args.push(arg);
            match &self.current {
                Token::Comma => {
                    self.advance()?;
                }
                Token::Close => {
                    self.advance()?;
                    return Ok(args);
                }
                other => {
                    return Err(self.err(format!("expected ',' or ')' but found '{}'", other)))
                }
            }
        }
    }

    fn parse_operators(
        &mut self,
        mut left: Term,
        mut left_prec: u16,
        max_prec: u16,
    ) -> Result<(Term, u16), ReadError> {
        loop {
            match self.current.clone() {
                // ',' is the 1000 xfy conjunction operator
                Token::Comma if max_prec >= 1000 && left_prec < 1000 => {
                    self.advance()?;
                    let (right, _) = self.parse(1000)?;
                    left = Term::compound(",", vec![left, right]);
                    left_prec = 1000;
                }
                // '|' reads as ';' at 1100 xfy
                Token::Bar if max_prec >= 1100 && left_prec < 1100 => {
                    self.advance()?;
                    let (right, _) = self.parse(1100)?;
                    left = Term::compound(";", vec![left, right]);
                    left_prec = 1100;
                }
                Token::Name(name) => {
                    let a = atom(&name);
                    if let Some(def) = self.ops.infix(a) {
                        let (lmax, rmax) = def.arg_priorities();
                        if def.priority <= max_prec && left_prec <= lmax {
                            self.advance()?;
                            let (right, _) = self.parse(rmax)?;
                            left = Term::compound(&name, vec![left, right]);
                            left_prec = def.priority;
                            continue;
                        }
                    }
                    if let Some(def) = self.ops.postfix(a) {
                        let (lmax, _) = def.arg_priorities();
                        if def.priority <= max_prec && left_prec <= lmax {
                            self.advance()?;
                            left = Term::compound(&name, vec![left]);
                            left_prec = def.priority;
                            continue;
                        }
                    }
                    return Ok((left, left_prec));
                }
                _ => return Ok((left, left_prec)),
            }
        }
    }
}

/// Read the first term of `text`, failing when none is present
pub fn parse_term(env: &Environment, text: &str) -> Result<ReadResult, ReadError> {
    let mut stream = TermStream::from_text(env, text);
    match stream.next_term()? {
        Some(r) => Ok(r),
        None => Err(ReadError::new("no term found", 1, 1)),
    }
}

/// Read every term of `text`
pub fn parse_program(env: &Environment, text: &str) -> Result<Vec<ReadResult>, ReadError> {
    let mut stream = TermStream::from_text(env, text);
    let mut out = Vec::new();
    while let Some(r) = stream.next_term()? {
        out.push(r);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::operators::OpType;
    use crate::backend::symbol::tag;

    fn env() -> Environment {
        Environment::new()
    }

    fn parse(text: &str) -> Term {
        parse_term(&env(), text).unwrap().term
    }

    #[test]
    fn test_atoms_and_numbers() {
        assert!(parse("foo.").is_atom("foo"));
        assert_eq!(parse("42."), Term::int(42));
        assert_eq!(parse("-7."), Term::int(-7));
        assert_eq!(parse("3.5."), Term::Float(3.5));
        assert_eq!(parse("1.0e3."), Term::Float(1000.0));
        assert_eq!(parse("0xff."), Term::int(255));
        assert_eq!(parse("0o17."), Term::int(15));
        assert_eq!(parse("0b101."), Term::int(5));
        assert_eq!(parse("0'a."), Term::int(97));
        assert_eq!(parse("0' ."), Term::int(32));
    }

    #[test]
    fn test_decimal_literals() {
        match parse("3.25d.") {
            Term::Decimal(d) => assert_eq!(d, BigDecimal::from_str("3.25").unwrap()),
            other => panic!("expected decimal, got {:?}", other),
        }
        match parse("7d.") {
            Term::Decimal(d) => assert_eq!(d, BigDecimal::from_str("7").unwrap()),
            other => panic!("expected decimal, got {:?}", other),
        }
        // `3dog` is the integer 3 followed by an atom, not a decimal
        let results = parse_program(&env(), "f(3, dog).").unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_quoted_atoms_and_escapes() {
        assert!(parse("'hello world'.").is_atom("hello world"));
        assert!(parse("'it''s'.").is_atom("it's"));
        assert!(parse("'a\\nb'.").is_atom("a\nb"));
        assert!(parse("'\\x41\\'.").is_atom("A"));
    }

    #[test]
    fn test_operator_precedence_shapes() {
        // 2 + 3 * 4 parses as +(2, *(3, 4))
        let t = parse("2 + 3 * 4.");
        match t.deref() {
            Term::Compound(c) => {
                assert_eq!(c.tag, tag("+", 2));
                assert_eq!(c.args[0], Term::int(2));
                match c.args[1].deref() {
                    Term::Compound(inner) => assert_eq!(inner.tag, tag("*", 2)),
                    other => panic!("expected compound, got {:?}", other),
                }
            }
            other => panic!("expected compound, got {:?}", other),
        }
        // left associativity of yfx: 1 - 2 - 3 is -( -(1,2), 3)
        let t = parse("1 - 2 - 3.");
        match t.deref() {
            Term::Compound(c) => {
                assert_eq!(c.tag, tag("-", 2));
                assert_eq!(c.args[1], Term::int(3));
            }
            other => panic!("expected compound, got {:?}", other),
        }
        // right associativity of xfy: a , b , c is ','(a, ','(b, c))
        let t = parse("(a , b , c).");
        match t.deref() {
            Term::Compound(c) => {
                assert_eq!(c.tag, tag(",", 2));
                assert!(c.args[0].is_atom("a"));
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_clause_and_directive_shapes() {
        let t = parse("p(X) :- q(X), r(X).");
        assert_eq!(t.callable_tag().unwrap(), tag(":-", 2));
        let t = parse(":- dynamic(p/1).");
        assert_eq!(t.callable_tag().unwrap(), tag(":-", 1));
    }

    #[test]
    fn test_lists() {
        let t = parse("[1, 2, 3].");
        assert_eq!(t.list_elements().unwrap().len(), 3);
        let t = parse("[H | T].");
        match t.deref() {
            Term::Compound(c) => {
                assert_eq!(c.tag, tag(".", 2));
                assert!(matches!(c.args[1].deref(), Term::Var(_)));
            }
            other => panic!("expected list cell, got {:?}", other),
        }
        assert!(parse("[].").is_nil());
    }

    #[test]
    fn test_curly_and_parens() {
        let t = parse("{a, b}.");
        assert_eq!(t.callable_tag().unwrap(), tag("{}", 1));
        assert!(parse("{}.").is_atom("{}"));
        assert_eq!(parse("(1 + 2) * 3.").callable_tag().unwrap(), tag("*", 2));
    }

    #[test]
    fn test_strings_honor_double_quotes_flag() {
        let e = env();
        let t = parse_term(&e, "\"ab\".").unwrap().term;
        let items = t.list_elements().unwrap();
        assert_eq!(items[0], Term::int(97));
        e.set_flag(&Term::atom("double_quotes"), &Term::atom("chars"))
            .unwrap();
        let t = parse_term(&e, "\"ab\".").unwrap().term;
        let items = t.list_elements().unwrap();
        assert!(items[0].is_atom("a"));
        e.set_flag(&Term::atom("double_quotes"), &Term::atom("atom"))
            .unwrap();
        let t = parse_term(&e, "\"ab\".").unwrap().term;
        assert!(t.is_atom("ab"));
    }

    #[test]
    fn test_variable_map() {
        let r = parse_term(&env(), "f(X, Y, X, _, _).").unwrap();
        let names: Vec<&str> = r.variables.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["X", "Y"]);
        match r.term.deref() {
            Term::Compound(c) => {
                assert_eq!(c.args[0], c.args[2], "repeated name is one variable");
                assert_ne!(c.args[3], c.args[4], "_ is fresh each occurrence");
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_user_declared_operator() {
        let e = env();
        e.with_operators_mut(|ops| ops.declare(700, OpType::Xfx, atom("likes")))
            .unwrap();
        let t = parse_term(&e, "mary likes wine.").unwrap().term;
        match t.deref() {
            Term::Compound(c) => {
                assert_eq!(c.tag, tag("likes", 2));
                assert!(c.args[0].is_atom("mary"));
                assert!(c.args[1].is_atom("wine"));
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_minus_and_operator_as_atom() {
        let t = parse("- X.");
        assert_eq!(t.callable_tag().unwrap(), tag("-", 1));
        let t = parse("a - -1.");
        match t.deref() {
            Term::Compound(c) => assert_eq!(c.args[1], Term::int(-1)),
            other => panic!("expected compound, got {:?}", other),
        }
        // operator as plain argument
        let t = parse("f(-, *).");
        match t.deref() {
            Term::Compound(c) => {
                assert!(c.args[0].is_atom("-"));
                assert!(c.args[1].is_atom("*"));
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_functional_notation_requires_adjacency() {
        let t = parse("f(1).");
        assert_eq!(t.callable_tag().unwrap(), tag("f", 1));
        // with layout, `- (1)` is prefix application to a parenthesized term
        let t = parse("- (1).");
        assert_eq!(t.callable_tag().unwrap(), tag("-", 1));
    }

    #[test]
    fn test_errors_have_positions() {
        let err = parse_term(&env(), "f(1,\n   ]).").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("]"));
        let err = parse_term(&env(), "'unterminated.").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_recovery_after_error() {
        let e = env();
        let mut stream = TermStream::from_text(&e, "broken ] term. ok_fact.");
        assert!(stream.next_term().is_err());
        stream.recover();
        let r = stream.next_term().unwrap().unwrap();
        assert!(r.term.is_atom("ok_fact"));
        assert!(stream.next_term().unwrap().is_none());
    }

    #[test]
    fn test_comments() {
        let e = env();
        let terms =
            parse_program(&e, "% line comment\na. /* block */ b. /* multi\nline */ c.").unwrap();
        assert_eq!(terms.len(), 3);
        let err = parse_term(&e, "/* never closed").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_multiple_terms_and_end_detection() {
        let e = env();
        let terms = parse_program(&e, "a. b.  c(1).").unwrap();
        assert_eq!(terms.len(), 3);
        // '.' glued to other symbol characters is not an end token
        let t = parse("X =.. L.");
        assert_eq!(t.callable_tag().unwrap(), tag("=..", 2));
    }

    #[test]
    fn test_conjunction_in_clause_body() {
        let t = parse("a :- b, c, d.");
        match t.deref() {
            Term::Compound(c) => {
                assert_eq!(c.tag, tag(":-", 2));
                let body = c.args[1].deref();
                assert_eq!(body.callable_tag().unwrap(), tag(",", 2));
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }
}
