//! Path query parser
//!
//! Recursive-descent over the path text with a byte cursor. Every error
//! carries the byte position where parsing stopped.

use serde_json::{Number, Value};

use super::ast::{
    CompareOp, FieldPath, FilterExpr, FunctionCall, FunctionName, Operand, Pattern, Segment,
    SliceSpec,
};
use super::errors::{PathResult, PathSyntaxError};

/// Parses a full path query beginning at `$`
pub fn parse_path(input: &str) -> PathResult<Vec<Segment>> {
    let mut parser = Parser::new(input);
    let segments = parser.path()?;
    parser.finish()?;
    Ok(segments)
}

/// Parses a standalone filter expression
pub fn parse_filter(input: &str) -> PathResult<FilterExpr> {
    let mut parser = Parser::new(input);
    let expr = parser.or_expr()?;
    parser.finish()?;
    Ok(expr)
}

/// Parses a member path: `a.b`, `@.a.b`, `@['a b']`, or `@`
pub fn parse_field_path(input: &str) -> PathResult<FieldPath> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PathSyntaxError::syntax(0, "empty member path"));
    }
    let mut parser = Parser::new(trimmed);
    let path = if trimmed.starts_with('@') {
        parser.field_path()?
    } else {
        let mut segments = vec![parser.identifier()?];
        while parser.eat('.') {
            segments.push(parser.identifier()?);
        }
        FieldPath::new(segments)
    };
    parser.finish()?;
    Ok(path)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if self.remaining().starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, reason: impl Into<String>) -> PathSyntaxError {
        PathSyntaxError::syntax(self.pos, reason)
    }

    fn expect(&mut self, expected: char) -> PathResult<()> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn finish(&mut self) -> PathResult<()> {
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
        }
    }

    // ---- path ----

    fn path(&mut self) -> PathResult<Vec<Segment>> {
        self.skip_ws();
        if !self.eat('$') {
            return Err(self.error("path must start at the document root '$'"));
        }

        let mut segments = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('.') => {
                    self.bump();
                    if self.peek() == Some('.') {
                        return Err(self.error("descendant segments are not supported"));
                    }
                    if self.eat('*') {
                        segments.push(Segment::Wildcard);
                    } else {
                        segments.push(Segment::Name(self.identifier()?));
                    }
                }
                Some('[') => segments.push(self.bracket()?),
                _ => break,
            }
        }
        Ok(segments)
    }

    fn identifier(&mut self) -> PathResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.bump();
            }
            _ => return Err(self.error("expected member name")),
        }
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.bump();
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn bracket(&mut self) -> PathResult<Segment> {
        self.expect('[')?;
        self.skip_ws();

        let segment = match self.peek() {
            Some('*') => {
                self.bump();
                Segment::Wildcard
            }
            Some('?') => {
                self.bump();
                Segment::Filter(self.or_expr()?)
            }
            Some('\'') | Some('"') => Segment::Name(self.quoted()?),
            Some(c) if c == ':' || c == '-' || c.is_ascii_digit() => self.index_or_slice()?,
            Some(c) => return Err(self.error(format!("unexpected '{}' in brackets", c))),
            None => return Err(self.error("unterminated '['")),
        };

        self.expect(']')?;
        Ok(segment)
    }

    fn index_or_slice(&mut self) -> PathResult<Segment> {
        let first = self.optional_integer()?;
        self.skip_ws();
        if !self.eat(':') {
            return match first {
                Some(i) => Ok(Segment::Index(i)),
                None => Err(self.error("expected index")),
            };
        }

        let end = self.optional_integer()?;
        self.skip_ws();
        let step = if self.eat(':') {
            self.optional_integer()?
        } else {
            None
        };
        Ok(Segment::Slice(SliceSpec::new(first, end, step)))
    }

    fn optional_integer(&mut self) -> PathResult<Option<i64>> {
        self.skip_ws();
        let start = self.pos;
        self.eat('-');
        let digits = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == digits {
            if self.pos != start {
                return Err(self.error("expected digits after '-'"));
            }
            return Ok(None);
        }
        self.input[start..self.pos]
            .parse()
            .map(Some)
            .map_err(|_| PathSyntaxError::syntax(start, "integer out of range"))
    }

    /// Quoted string with JSON-style escapes; `\'` is also accepted.
    fn quoted(&mut self) -> PathResult<String> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected quoted string")),
        };

        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> PathResult<char> {
        let c = match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('b') => '\u{8}',
            Some('f') => '\u{c}',
            Some(c @ ('/' | '\\' | '\'' | '"')) => c,
            Some('u') => return self.unicode_escape(),
            Some(c) => return Err(self.error(format!("invalid escape '\\{}'", c))),
            None => return Err(self.error("unterminated escape")),
        };
        Ok(c)
    }

    fn unicode_escape(&mut self) -> PathResult<char> {
        let high = self.hex4()?;
        if (0xD800..0xDC00).contains(&high) {
            if !self.eat_str("\\u") {
                return Err(self.error("unpaired surrogate"));
            }
            let low = self.hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error("invalid low surrogate"));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code).ok_or_else(|| self.error("invalid code point"));
        }
        char::from_u32(high).ok_or_else(|| self.error("invalid code point"))
    }

    fn hex4(&mut self) -> PathResult<u32> {
        let start = self.pos;
        let digits = self.remaining().get(..4).unwrap_or("");
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PathSyntaxError::syntax(start, "expected 4 hex digits"));
        }
        self.pos += 4;
        u32::from_str_radix(digits, 16).map_err(|_| PathSyntaxError::syntax(start, "bad hex"))
    }

    // ---- filter expressions ----

    fn or_expr(&mut self) -> PathResult<FilterExpr> {
        let mut left = self.and_expr()?;
        loop {
            self.skip_ws();
            if !self.eat_str("||") {
                return Ok(left);
            }
            let right = self.and_expr()?;
            left = FilterExpr::or(left, right);
        }
    }

    fn and_expr(&mut self) -> PathResult<FilterExpr> {
        let mut left = self.unary()?;
        loop {
            self.skip_ws();
            if !self.eat_str("&&") {
                return Ok(left);
            }
            let right = self.unary()?;
            left = FilterExpr::and(left, right);
        }
    }

    fn unary(&mut self) -> PathResult<FilterExpr> {
        self.skip_ws();
        if self.peek() == Some('!') && !self.remaining().starts_with("!=") {
            self.bump();
            return Ok(FilterExpr::Not(Box::new(self.unary()?)));
        }
        if self.eat('(') {
            let inner = self.or_expr()?;
            self.expect(')')?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PathResult<FilterExpr> {
        let start = self.pos;
        let left = self.operand()?;
        self.skip_ws();

        let Some(op) = self.compare_op() else {
            return match left {
                Operand::Path(path) => Ok(FilterExpr::Exists(path)),
                Operand::Function(call) if call.name.is_test() => Ok(FilterExpr::Function(call)),
                Operand::Function(call) => Err(PathSyntaxError::syntax(
                    start,
                    format!("{}() must be compared", call.name.as_str()),
                )),
                Operand::Literal(_) => Err(self.error("expected comparison operator")),
            };
        };

        self.check_comparable(&left, start)?;
        self.skip_ws();
        let right_start = self.pos;
        let right = self.operand()?;
        self.check_comparable(&right, right_start)?;
        Ok(FilterExpr::Comparison { left, op, right })
    }

    fn check_comparable(&self, operand: &Operand, at: usize) -> PathResult<()> {
        match operand {
            Operand::Function(call) if call.name.is_test() => Err(PathSyntaxError::syntax(
                at,
                format!("{}() yields a logical result and cannot be compared", call.name.as_str()),
            )),
            _ => Ok(()),
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        const OPS: [(&str, CompareOp); 6] = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ];
        OPS.iter()
            .find(|(text, _)| self.eat_str(text))
            .map(|(_, op)| *op)
    }

    fn operand(&mut self) -> PathResult<Operand> {
        self.skip_ws();
        match self.peek() {
            Some('@') => Ok(Operand::Path(self.field_path()?)),
            Some(c) if c.is_ascii_alphabetic() => {
                let keyword_start = self.pos;
                for (word, value) in [
                    ("true", Value::Bool(true)),
                    ("false", Value::Bool(false)),
                    ("null", Value::Null),
                ] {
                    if self.eat_str(word) && !self.peek().is_some_and(|c| c.is_alphanumeric()) {
                        return Ok(Operand::Literal(value));
                    }
                    self.pos = keyword_start;
                }
                Ok(Operand::Function(self.function()?))
            }
            Some('\'') | Some('"') => Ok(Operand::Literal(Value::String(self.quoted()?))),
            Some(c) if c == '-' || c.is_ascii_digit() => Ok(Operand::Literal(self.number()?)),
            Some(c) => Err(self.error(format!("unexpected '{}' in filter", c))),
            None => Err(self.error("unexpected end of filter")),
        }
    }

    fn field_path(&mut self) -> PathResult<FieldPath> {
        self.expect('@')?;
        let mut segments = Vec::new();
        loop {
            if self.eat('.') {
                segments.push(self.identifier()?);
            } else if self.remaining().starts_with("['") || self.remaining().starts_with("[\"") {
                self.bump();
                segments.push(self.quoted()?);
                self.expect(']')?;
            } else {
                return Ok(FieldPath::new(segments));
            }
        }
    }

    fn function(&mut self) -> PathResult<FunctionCall> {
        let start = self.pos;
        let name_text = self.identifier()?;
        let name = FunctionName::from_name(&name_text)
            .ok_or_else(|| PathSyntaxError::syntax(start, format!("unknown function '{}'", name_text)))?;

        self.expect('(')?;
        let mut args = Vec::new();
        let mut pattern_at = None;
        self.skip_ws();
        if !self.eat(')') {
            loop {
                self.skip_ws();
                let arg_start = self.pos;
                let arg = self.operand()?;
                if args.len() == 1 {
                    pattern_at = Some(arg_start);
                }
                args.push(arg);
                self.skip_ws();
                if self.eat(')') {
                    break;
                }
                self.expect(',')?;
            }
        }

        if args.len() != name.arity() {
            return Err(PathSyntaxError::syntax(
                start,
                format!(
                    "{}() takes {} argument(s), got {}",
                    name.as_str(),
                    name.arity(),
                    args.len()
                ),
            ));
        }

        let pattern = match (name, args.get(1)) {
            (FunctionName::Length, _) => None,
            (_, Some(Operand::Literal(Value::String(source)))) => {
                let at = pattern_at.unwrap_or(start);
                let anchored = name == FunctionName::Match;
                Some(
                    Pattern::compile(source, anchored)
                        .map_err(|e| PathSyntaxError::pattern(at, source, e))?,
                )
            }
            _ => {
                return Err(PathSyntaxError::syntax(
                    pattern_at.unwrap_or(start),
                    format!("{}() pattern must be a string literal", name.as_str()),
                ))
            }
        };

        Ok(FunctionCall {
            name,
            args,
            pattern,
        })
    }

    fn number(&mut self) -> PathResult<Value> {
        let start = self.pos;
        self.eat('-');
        let int_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == int_start {
            return Err(self.error("expected digits"));
        }

        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            let frac = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.pos == frac {
                return Err(self.error("expected digits after '.'"));
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if !self.eat('+') {
                self.eat('-');
            }
            let exp = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.pos == exp {
                return Err(self.error("expected exponent digits"));
            }
        }

        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::from(i));
            }
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| PathSyntaxError::syntax(start, "invalid number"))
    }
}
