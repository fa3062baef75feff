use crate::error::Span;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Dot,
    Semicolon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // One or two character tokens
    PlusPlus,
    MinusMinus,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,

    // Literals
    Identifier,
    Str,
    Integer,
    Float,

    // Keywords
    Set,
    Bind,
    If,
    Else,
    While,
    For,
    True,
    False,
    Function,
    Return,
    Null,
    Break,
    Continue,
    IntType,
    FloatType,
    BoolType,
    StringType,

    // Special
    Eof,
    LexError,
    Unknown,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Dot => "'.'",
            TokenKind::Semicolon => "';'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::PlusPlus => "'++'",
            TokenKind::MinusMinus => "'--'",
            TokenKind::Bang => "'!'",
            TokenKind::BangEqual => "'!='",
            TokenKind::Equal => "'='",
            TokenKind::EqualEqual => "'=='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Amp => "'&'",
            TokenKind::AmpAmp => "'&&'",
            TokenKind::Pipe => "'|'",
            TokenKind::PipePipe => "'||'",
            TokenKind::Identifier => "identifier",
            TokenKind::Str => "string literal",
            TokenKind::Integer => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::Set => "'set'",
            TokenKind::Bind => "'bind'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Function => "'function'",
            TokenKind::Return => "'return'",
            TokenKind::Null => "'null'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::IntType => "'int'",
            TokenKind::FloatType => "'float'",
            TokenKind::BoolType => "'bool'",
            TokenKind::StringType => "'string'",
            TokenKind::Eof => "end of input",
            TokenKind::LexError => "malformed literal",
            TokenKind::Unknown => "unknown character",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text for most tokens; decoded contents for string literals.
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, span: Span) -> Self {
        Self { kind, lexeme, span }
    }
}

fn keyword(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "let" | "set" => TokenKind::Set,
        "bind" => TokenKind::Bind,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "function" => TokenKind::Function,
        "return" => TokenKind::Return,
        "null" => TokenKind::Null,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "int" => TokenKind::IntType,
        "float" => TokenKind::FloatType,
        "bool" => TokenKind::BoolType,
        "string" => TokenKind::StringType,
        _ => return None,
    };
    Some(kind)
}

/// Pull-based tokenizer. Malformed input never aborts lexing: it shows up as
/// `LexError` or `Unknown` tokens for the parser to reject.
pub struct Lexer {
    source: String,
    start: usize,
    current: usize,
}

impl Lexer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            start: 0,
            current: 0,
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        self.start = self.current;

        let c = match self.advance() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, String::new(), Span::single(self.current)),
        };

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            '{' => self.make_token(TokenKind::LeftBrace),
            '}' => self.make_token(TokenKind::RightBrace),
            '[' => self.make_token(TokenKind::LeftBracket),
            ']' => self.make_token(TokenKind::RightBracket),
            ',' => self.make_token(TokenKind::Comma),
            ':' => self.make_token(TokenKind::Colon),
            ';' => self.make_token(TokenKind::Semicolon),
            '*' => self.make_token(TokenKind::Star),
            '/' => self.make_token(TokenKind::Slash),
            '%' => self.make_token(TokenKind::Percent),
            '+' => self.one_or_two('+', TokenKind::PlusPlus, TokenKind::Plus),
            '-' => self.one_or_two('-', TokenKind::MinusMinus, TokenKind::Minus),
            '=' => self.one_or_two('=', TokenKind::EqualEqual, TokenKind::Equal),
            '!' => self.one_or_two('=', TokenKind::BangEqual, TokenKind::Bang),
            '<' => self.one_or_two('=', TokenKind::LessEqual, TokenKind::Less),
            '>' => self.one_or_two('=', TokenKind::GreaterEqual, TokenKind::Greater),
            '&' => self.one_or_two('&', TokenKind::AmpAmp, TokenKind::Amp),
            '|' => self.one_or_two('|', TokenKind::PipePipe, TokenKind::Pipe),
            '"' => self.string(),
            c if c.is_ascii_digit() || c == '.' => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            _ => self.make_token(TokenKind::Unknown),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\n' | '\r') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while !matches!(self.peek(), Some('\n') | None) {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.source[self.current..].chars().next()?;
        self.current += c.len_utf8();
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next()
    }

    fn one_or_two(&mut self, second: char, double: TokenKind, single: TokenKind) -> Token {
        if self.peek() == Some(second) {
            self.advance();
            self.make_token(double)
        } else {
            self.make_token(single)
        }
    }

    fn string(&mut self) -> Token {
        let mut contents = String::new();

        loop {
            match self.advance() {
                None => {
                    return Token::new(
                        TokenKind::LexError,
                        self.source[self.start..self.current].to_string(),
                        Span::new(self.start, self.current),
                    );
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => contents.push('\n'),
                    Some('t') => contents.push('\t'),
                    Some('r') => contents.push('\r'),
                    Some('\\') => contents.push('\\'),
                    Some('"') => contents.push('"'),
                    Some(other) => {
                        contents.push('\\');
                        contents.push(other);
                    }
                    None => contents.push('\\'),
                },
                Some(c) => contents.push(c),
            }
        }

        Token::new(TokenKind::Str, contents, Span::new(self.start, self.current))
    }

    fn number(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let dots = text.matches('.').count();

        let kind = match dots {
            _ if text == "." => TokenKind::Dot,
            0 if text.parse::<i64>().is_ok() => TokenKind::Integer,
            0 => TokenKind::LexError,
            1 => TokenKind::Float,
            _ => TokenKind::LexError,
        };

        self.make_token(kind)
    }

    fn identifier(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let kind = keyword(text).unwrap_or(TokenKind::Identifier);
        self.make_token(kind)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            self.source[self.start..self.current].to_string(),
            Span::new(self.start, self.current),
        )
    }
}

impl Iterator for Lexer {
    type Item = Token;

    /// Yields tokens up to, but not including, `Eof`.
    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}
