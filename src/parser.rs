use crate::ast::{
    BinaryOp, Expr, FunctionDecl, Program, Stmt, TypeAnnotation, UnaryOp, UpdateOp,
};
use crate::error::{ErrorKind, SlateError, Span};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;
use std::fmt::Display;
use std::rc::Rc;

/// Deepest nesting of statements and expressions the parser accepts.
pub const MAX_NESTING: usize = 256;

/// Recursive-descent parser holding exactly one token of lookahead.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    previous_end: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous_end: 0,
            depth: 0,
        }
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(Lexer::new(source))
    }

    pub fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    pub fn parse_program(&mut self) -> Result<Program, SlateError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(Program { statements })
    }

    pub fn parse_statement(&mut self) -> Result<Stmt, SlateError> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Stmt, SlateError> {
        match self.current.kind {
            TokenKind::Set => self.declaration(false),
            TokenKind::Bind => self.declaration(true),
            TokenKind::Break => {
                let span = self.advance().span;
                self.terminator();
                Ok(Stmt::Break { span })
            }
            TokenKind::Continue => {
                let span = self.advance().span;
                self.terminator();
                Ok(Stmt::Continue { span })
            }
            TokenKind::Identifier => self.identifier_statement(),
            TokenKind::LeftBrace => {
                let (statements, span) = self.block()?;
                Ok(Stmt::Block { statements, span })
            }
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::PlusPlus | TokenKind::MinusMinus => self.update_statement(),
            TokenKind::Function => self.function_declaration(),
            TokenKind::Return => self.return_statement(),
            _ => self.expression_statement(),
        }
    }

    /// Consume the current token if it is `kind`, otherwise fail naming both kinds.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token, SlateError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind))
        }
    }

    fn expect_with_help(&mut self, kind: TokenKind, help: &str) -> Result<Token, SlateError> {
        self.expect(kind).map_err(|mut error| {
            if error.help.is_none() {
                error.help = Some(help.to_string());
            }
            error
        })
    }

    fn declaration(&mut self, constant: bool) -> Result<Stmt, SlateError> {
        let keyword = self.advance();
        let start = keyword.span.start;

        let name = self
            .expect_with_help(
                TokenKind::Identifier,
                &format!("Declarations look like: {} name = value;", keyword.lexeme),
            )?
            .lexeme;

        let annotation = if self.match_kind(TokenKind::Colon) {
            Some(self.type_annotation()?)
        } else {
            None
        };

        self.expect_with_help(
            TokenKind::Equal,
            "Every declaration needs an initial value: set x = 0;",
        )?;
        let initializer = self.expression()?;
        self.terminator();

        let span = self.span_from(start);
        Ok(if constant {
            Stmt::ConstDecl {
                name,
                annotation,
                initializer,
                span,
            }
        } else {
            Stmt::VarDecl {
                name,
                annotation,
                initializer,
                span,
            }
        })
    }

    fn type_annotation(&mut self) -> Result<TypeAnnotation, SlateError> {
        let annotation = match self.current.kind {
            TokenKind::IntType => TypeAnnotation::Int,
            TokenKind::FloatType => TypeAnnotation::Float,
            TokenKind::BoolType => TypeAnnotation::Bool,
            TokenKind::StringType => TypeAnnotation::Str,
            _ => {
                let mut error = self.unexpected("type name");
                error.help = Some("Valid types are int, float, bool and string.".to_string());
                return Err(error);
            }
        };
        self.advance();
        Ok(annotation)
    }

    /// Statements that begin with an identifier, told apart by the token after it.
    fn identifier_statement(&mut self) -> Result<Stmt, SlateError> {
        let name_token = self.advance();
        let start = name_token.span.start;
        let name = name_token.lexeme;

        match self.current.kind {
            TokenKind::LeftBracket => {
                self.advance();
                let index = self.expression()?;
                self.expect(TokenKind::RightBracket)?;

                if self.match_kind(TokenKind::Equal) {
                    let value = self.expression()?;
                    self.terminator();
                    return Ok(Stmt::IndexAssign {
                        name,
                        index,
                        value,
                        span: self.span_from(start),
                    });
                }

                let access = Expr::Index {
                    name,
                    index: Box::new(index),
                    span: self.span_from(start),
                };
                let expr = self.continue_expression(access)?;
                Ok(self.finish_expression_statement(expr, start))
            }
            TokenKind::LeftParen => {
                let call = self.finish_call(name, start)?;
                let expr = self.continue_expression(call)?;
                Ok(self.finish_expression_statement(expr, start))
            }
            TokenKind::Equal => {
                self.advance();
                let value = self.expression()?;
                self.terminator();
                Ok(Stmt::Assign {
                    name,
                    value,
                    span: self.span_from(start),
                })
            }
            _ => {
                let variable = Expr::Variable {
                    name,
                    span: self.span_from(start),
                };
                let expr = self.continue_expression(variable)?;
                Ok(self.finish_expression_statement(expr, start))
            }
        }
    }

    fn block(&mut self) -> Result<(Vec<Stmt>, Span), SlateError> {
        let start = self.expect(TokenKind::LeftBrace)?.span.start;
        let mut statements = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        self.expect_with_help(
            TokenKind::RightBrace,
            "Block statements must be closed with '}' after the opening '{'.",
        )?;
        Ok((statements, self.span_from(start)))
    }

    fn if_statement(&mut self) -> Result<Stmt, SlateError> {
        let start = self.advance().span.start;

        self.expect_with_help(
            TokenKind::LeftParen,
            "If statements require parentheses around the condition: if (condition) { ... }",
        )?;
        let condition = self.expression()?;
        self.expect_with_help(
            TokenKind::RightParen,
            "If conditions must be enclosed in parentheses: if (condition) { ... }",
        )?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: self.span_from(start),
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, SlateError> {
        let start = self.advance().span.start;

        self.expect(TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen)?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While {
            condition,
            body,
            span: self.span_from(start),
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, SlateError> {
        let start = self.advance().span.start;
        self.expect(TokenKind::LeftParen)?;

        // The initializer statement swallows its own ';'
        let initializer = if self.match_kind(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        self.expect_with_help(
            TokenKind::RightParen,
            "For loops look like: for (set i = 0; i < n; i = i + 1) { ... }",
        )?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            span: self.span_from(start),
        })
    }

    fn update_statement(&mut self) -> Result<Stmt, SlateError> {
        let operator_token = self.advance();
        let start = operator_token.span.start;
        let operator = if operator_token.kind == TokenKind::PlusPlus {
            UpdateOp::Increment
        } else {
            UpdateOp::Decrement
        };

        let name = self
            .expect_with_help(
                TokenKind::Identifier,
                &format!("'{}' must be followed by a variable name", operator_token.lexeme),
            )?
            .lexeme;
        self.terminator();

        let span = self.span_from(start);
        Ok(Stmt::Expression {
            expr: Expr::Update {
                name,
                operator,
                span,
            },
            span,
        })
    }

    fn function_declaration(&mut self) -> Result<Stmt, SlateError> {
        let start = self.advance().span.start;
        let name = self
            .expect_with_help(
                TokenKind::Identifier,
                "Functions need a name: function add(a, b) { ... }",
            )?
            .lexeme;

        self.expect(TokenKind::LeftParen)?;
        let mut params: Vec<String> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let param = self.expect(TokenKind::Identifier)?;
                if params.contains(&param.lexeme) {
                    return Err(SlateError::parse_error(
                        param.span,
                        format!("Duplicate parameter '{}' in function '{}'", param.lexeme, name),
                    ));
                }
                params.push(param.lexeme);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;

        let (body, _) = self.block()?;

        Ok(Stmt::Function(Rc::new(FunctionDecl {
            name,
            params,
            body,
            span: self.span_from(start),
        })))
    }

    fn return_statement(&mut self) -> Result<Stmt, SlateError> {
        let start = self.advance().span.start;

        let value = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RightBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };
        self.terminator();

        Ok(Stmt::Return {
            value,
            span: self.span_from(start),
        })
    }

    fn expression_statement(&mut self) -> Result<Stmt, SlateError> {
        let start = self.current.span.start;
        let expr = self.expression()?;
        Ok(self.finish_expression_statement(expr, start))
    }

    fn finish_expression_statement(&mut self, expr: Expr, start: usize) -> Stmt {
        self.terminator();
        Stmt::Expression {
            expr,
            span: self.span_from(start),
        }
    }

    pub fn expression(&mut self) -> Result<Expr, SlateError> {
        self.nested(|parser| {
            let left = parser.term()?;
            parser.expression_tail(left)
        })
    }

    /// Run one level of recursive descent, failing once `MAX_NESTING` levels
    /// are open.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SlateError>,
    ) -> Result<T, SlateError> {
        if self.depth >= MAX_NESTING {
            return Err(SlateError::parse_error_with_help(
                self.current.span,
                format!("Nesting deeper than {} levels", MAX_NESTING),
                "Split the expression or statement into smaller pieces.".to_string(),
            ));
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| parse(self));
        self.depth -= 1;
        result
    }

    /// Resume expression parsing with an already-parsed leftmost factor.
    fn continue_expression(&mut self, factor: Expr) -> Result<Expr, SlateError> {
        let left = self.term_tail(factor)?;
        self.expression_tail(left)
    }

    // Arithmetic, comparison, logical and bitwise operators share one tier.
    fn expression_tail(&mut self, mut left: Expr) -> Result<Expr, SlateError> {
        while let Some(operator) = self.tier_operator() {
            let operator_token = self.advance();
            let operand_span = self.current.span;
            let right = self.term().map_err(|error| {
                self.missing_operand(error, &operator_token, operand_span)
            })?;
            let span = left.span().to(right.span());
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn tier_operator(&self) -> Option<BinaryOp> {
        let operator = match self.current.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Subtract,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            TokenKind::EqualEqual => BinaryOp::Equal,
            TokenKind::BangEqual => BinaryOp::NotEqual,
            TokenKind::AmpAmp => BinaryOp::And,
            TokenKind::PipePipe => BinaryOp::Or,
            TokenKind::Amp => BinaryOp::BitAnd,
            TokenKind::Pipe => BinaryOp::BitOr,
            _ => return None,
        };
        Some(operator)
    }

    fn term(&mut self) -> Result<Expr, SlateError> {
        let left = self.factor()?;
        self.term_tail(left)
    }

    fn term_tail(&mut self, mut left: Expr) -> Result<Expr, SlateError> {
        loop {
            let operator = match self.current.kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            let operator_token = self.advance();
            let operand_span = self.current.span;
            let right = self.factor().map_err(|error| {
                self.missing_operand(error, &operator_token, operand_span)
            })?;
            let span = left.span().to(right.span());
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }
    }

    fn factor(&mut self) -> Result<Expr, SlateError> {
        let span = self.current.span;

        match self.current.kind {
            TokenKind::Integer => {
                let token = self.advance();
                let value = token.lexeme.parse::<i64>().map_err(|_| {
                    SlateError::lex_error(span, format!("Invalid integer '{}'", token.lexeme))
                })?;
                Ok(Expr::Integer { value, span })
            }
            TokenKind::Float => {
                let token = self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    SlateError::lex_error(span, format!("Invalid float '{}'", token.lexeme))
                })?;
                Ok(Expr::Float { value, span })
            }
            TokenKind::Str => {
                let value = self.advance().lexeme;
                Ok(Expr::Str { value, span })
            }
            TokenKind::True | TokenKind::False => {
                let value = self.advance().kind == TokenKind::True;
                Ok(Expr::Boolean { value, span })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null { span })
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect_with_help(
                    TokenKind::RightParen,
                    "Every '(' needs a matching ')'.",
                )?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.array_literal(),
            TokenKind::Identifier => {
                let name = self.advance().lexeme;
                match self.current.kind {
                    TokenKind::LeftParen => self.finish_call(name, span.start),
                    TokenKind::LeftBracket => {
                        self.advance();
                        let index = self.expression()?;
                        self.expect(TokenKind::RightBracket)?;
                        Ok(Expr::Index {
                            name,
                            index: Box::new(index),
                            span: self.span_from(span.start),
                        })
                    }
                    _ => Ok(Expr::Variable { name, span }),
                }
            }
            TokenKind::Bang | TokenKind::Minus => {
                let operator = if self.advance().kind == TokenKind::Bang {
                    UnaryOp::Not
                } else {
                    UnaryOp::Negate
                };
                let operand = self.nested(Self::factor)?;
                Ok(Expr::Unary {
                    operator,
                    span: span.to(operand.span()),
                    operand: Box::new(operand),
                })
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn array_literal(&mut self) -> Result<Expr, SlateError> {
        let start = self.advance().span.start;
        let mut elements = Vec::new();

        if !self.check(TokenKind::RightBracket) {
            loop {
                elements.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect_with_help(
            TokenKind::RightBracket,
            "Array elements are separated by ',' and closed with ']'.",
        )?;
        Ok(Expr::Array {
            elements,
            span: self.span_from(start),
        })
    }

    fn finish_call(&mut self, name: String, start: usize) -> Result<Expr, SlateError> {
        self.expect(TokenKind::LeftParen)?;
        let mut args = Vec::new();

        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect_with_help(
            TokenKind::RightParen,
            "Function arguments must be closed with ')'.",
        )?;
        Ok(Expr::Call {
            name,
            args,
            span: self.span_from(start),
        })
    }

    fn missing_operand(&self, error: SlateError, operator: &Token, operand_span: Span) -> SlateError {
        // Only a failure on the operand's first token means the operand is
        // missing. Lexical errors are more useful than a generic message.
        if error.kind != ErrorKind::ParseError || error.span != operand_span {
            return error;
        }
        SlateError::parse_error_with_help(
            error.span,
            format!(
                "Expected expression after '{}', found {}",
                operator.lexeme,
                describe(&self.current)
            ),
            format!("The '{}' operator requires expressions on both sides.", operator.lexeme),
        )
    }

    fn unexpected(&self, expected: impl Display) -> SlateError {
        let token = &self.current;
        match token.kind {
            TokenKind::LexError => SlateError::lex_error(
                token.span,
                format!("Malformed literal {}", token.lexeme),
            ),
            _ => SlateError::parse_error(
                token.span,
                format!("Expected {}, found {}", expected, describe(token)),
            ),
        }
    }

    fn terminator(&mut self) {
        self.match_kind(TokenKind::Semicolon);
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.previous_end.max(start))
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        let token = std::mem::replace(&mut self.current, next);
        self.previous_end = token.span.end;
        token
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier => format!("identifier '{}'", token.lexeme),
        TokenKind::Integer | TokenKind::Float => format!("{} {}", token.kind, token.lexeme),
        TokenKind::Str => format!("string \"{}\"", token.lexeme),
        TokenKind::Unknown => format!("unknown character '{}'", token.lexeme),
        _ => token.kind.to_string(),
    }
}

/// Lex and parse a whole source text.
pub fn parse(source: &str) -> Result<Program, SlateError> {
    Parser::from_source(source).parse_program()
}
