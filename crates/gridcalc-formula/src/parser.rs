//! Formula parser
//!
//! A hand-written tokenizer and recursive descent parser for A1-style
//! formulas.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::{CellError, CellRef, RangeRef};

/// Deepest nesting of parentheses, calls, signs and powers the parser accepts
pub const MAX_NESTING: usize = 100;

/// Parse a formula string into an AST
///
/// The leading `=` is optional.
///
/// # Example
/// ```rust
/// use gridcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("='Q1 Sales'!B2*2").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);
    if formula.trim().is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }

    let mut parser = FormulaParser::new(formula)?;
    let expr = parser.parse_expression()?;

    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current_token()
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String), // Function name or bare name
    CellRef(String),    // Cell reference like A1, $A$1
    SheetRef(String),   // Sheet qualifier like Sheet1! or 'My Sheet'!

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    // End of input
    Eof,
}

struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
    depth: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: Token::Eof,
            depth: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            '=' => Some(Token::Equal),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match c {
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Ok(Token::LessEqual)
                    }
                    Some('>') => {
                        self.advance();
                        Ok(Token::NotEqual)
                    }
                    _ => Ok(Token::LessThan),
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::GreaterEqual);
                }
                Ok(Token::GreaterThan)
            }
            '"' => self.scan_string(),
            '\'' => self.scan_quoted_sheet(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |n| n.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' || c == '$' || c == '#' => {
                Ok(self.scan_identifier_or_ref())
            }
            other => Err(FormulaError::Parse(format!(
                "Unexpected character '{}' at position {}",
                other, self.pos
            ))),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated string literal".into())),
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> FormulaResult<Token> {
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated sheet name".into())),
            }
        }

        if self.peek_char() != Some('!') {
            return Err(FormulaError::Parse(format!(
                "Expected '!' after sheet name '{}'",
                name
            )));
        }
        self.advance();
        Ok(Token::SheetRef(name))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent only when digits follow, so "2E" is left alone
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_char_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_char_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FormulaError::Parse(format!("Invalid number '{}'", text)))
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        // Error literals (#VALUE!, #DIV/0!, #N/A, ...)
        if self.peek_char() == Some('#') {
            let start = self.pos;
            self.advance();
            while self.peek_char().map_or(false, |c| {
                c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?')
            }) {
                self.advance();
            }
            let text = &self.input[start..self.pos];
            return match CellError::parse(text) {
                Some(err) => Token::Error(err),
                None => Token::Identifier(text.to_string()),
            };
        }

        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        let call = self.peek_char_after_whitespace() == Some('(');
        if !call {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Boolean(false);
            }
            // LOG10( is a function, LOG10 alone is a cell
            if is_cell_reference(text) {
                return Token::CellRef(text.to_string());
            }
        }

        Token::Identifier(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn peek_char_after_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let next = self.scan_token()?;
        Ok(std::mem::replace(&mut self.current_token, next))
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Unary minus/plus
    // 6. Exponentiation: ^ (right associative)
    // 7. Postfix percent
    // 8. Range: :
    // 9. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume()?;
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    /// Every nested sub-expression passes through here, so this is where
    /// nesting depth is bounded
    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::Parse(format!(
                "Formula nests deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = self.parse_signed();
        self.depth -= 1;
        result
    }

    fn parse_signed(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.consume()?;
                let operand = self.parse_unary()?;
                Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => {
                self.consume()?;
                self.parse_unary()
            }
            _ => self.parse_exponent(),
        }
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let base = self.parse_postfix()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume()?;
            // Right associative; the exponent may carry its own sign (2^-1)
            let exponent = self.parse_unary()?;
            return Ok(binary(BinaryOperator::Power, base, exponent));
        }

        Ok(base)
    }

    fn parse_postfix(&mut self) -> FormulaResult<FormulaExpr> {
        let mut expr = self.parse_range()?;

        let mut percents = 0;
        while matches!(self.current_token(), Token::Percent) {
            percents += 1;
            if percents > MAX_NESTING {
                return Err(FormulaError::Parse("Too many '%' operators".into()));
            }
            self.consume()?;
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(left);
        }
        self.consume()?;

        let FormulaExpr::CellRef(start) = left else {
            return Err(FormulaError::InvalidReference(
                "':' must join two cell references".into(),
            ));
        };

        let end = match self.consume()? {
            Token::CellRef(text) => parse_cell(None, &text)?,
            Token::SheetRef(sheet) => match self.consume()? {
                Token::CellRef(text) => parse_cell(Some(sheet), &text)?,
                other => return Err(missing_cell_after_sheet(&sheet, &other)),
            },
            other => {
                return Err(FormulaError::InvalidReference(format!(
                    "Expected cell reference after ':', got {:?}",
                    other
                )))
            }
        };

        Ok(FormulaExpr::RangeRef(RangeRef::new(start, end)))
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume()?;
                Ok(FormulaExpr::Number(n))
            }

            Token::String(s) => {
                self.consume()?;
                Ok(FormulaExpr::String(s))
            }

            Token::Boolean(b) => {
                self.consume()?;
                Ok(FormulaExpr::Boolean(b))
            }

            Token::Error(e) => {
                self.consume()?;
                Ok(FormulaExpr::Error(e))
            }

            Token::LeftParen => {
                self.consume()?;
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::SheetRef(sheet) => {
                self.consume()?;
                match self.consume()? {
                    Token::CellRef(text) => Ok(FormulaExpr::CellRef(parse_cell(Some(sheet), &text)?)),
                    other => Err(missing_cell_after_sheet(&sheet, &other)),
                }
            }

            Token::CellRef(text) => {
                self.consume()?;
                Ok(FormulaExpr::CellRef(parse_cell(None, &text)?))
            }

            Token::Identifier(name) => {
                self.consume()?;
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftBrace)?;

        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if !matches!(self.current_token(), Token::RightBrace) {
            current_row.push(self.parse_expression()?);

            loop {
                match self.current_token() {
                    Token::Comma => {
                        self.consume()?;
                        current_row.push(self.parse_expression()?);
                    }
                    Token::Semicolon => {
                        self.consume()?;
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_expression()?);
                    }
                    Token::RightBrace => break,
                    _ => {
                        return Err(FormulaError::Parse(
                            "Expected ',' ';' or '}' in array".into(),
                        ))
                    }
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }

        if rows.windows(2).any(|w| w[0].len() != w[1].len()) {
            return Err(FormulaError::Parse("Array rows must have equal length".into()));
        }

        self.expect(&Token::RightBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    /// One function argument; an empty slot between commas is `Missing`
    fn parse_argument(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Comma | Token::RightParen => Ok(FormulaExpr::Missing),
            _ => self.parse_expression(),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_argument()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume()?;
                args.push(self.parse_argument()?);
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// A cell token that is shaped like a reference but out of bounds (`A0`,
/// `XFE1048577`) is an invalid reference, not a syntax error
fn parse_cell(sheet: Option<String>, text: &str) -> FormulaResult<CellRef> {
    let mut cell = CellRef::parse(text).map_err(FormulaError::from)?;
    cell.sheet = sheet;
    Ok(cell)
}

fn missing_cell_after_sheet(sheet: &str, found: &Token) -> FormulaError {
    let found = match found {
        Token::Identifier(text) | Token::CellRef(text) => text.clone(),
        Token::Number(n) => n.to_string(),
        other => format!("{:?}", other),
    };
    FormulaError::InvalidReference(format!(
        "'{}' after '{}!' is not a cell reference",
        found, sheet
    ))
}

/// `[$]letters[$]digits`, nothing else
fn is_cell_reference(text: &str) -> bool {
    let rest = text.strip_prefix('$').unwrap_or(text);
    let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 || letters > 3 {
        return false;
    }
    let rest = &rest[letters..];
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}
