//! Single-pass compiler: a Pratt parser over the token stream that emits
//! bytecode straight into a [`Chunk`]. There is no intermediate AST.

use crate::chunk::{Chunk, OpCode};
use crate::lexer::{self, LexError, Token};
use crate::object::Heap;
use crate::source::Span;
use crate::value::Value;

/// Constant indices are a single operand byte.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// Deepest allowed chain of groupings and unary operators.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub code: &'static str,
    pub span: Span,
    pub message: String,
    /// Text of the offending token, `None` at end of input.
    pub lexeme: Option<String>,
}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError {
            code: e.kind.code(),
            span: e.span(),
            message: e.to_string(),
            lexeme: Some(e.snippet),
        }
    }
}

type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }

    /// Binding power of `token` in infix position.
    fn of(token: &Token) -> Precedence {
        match token {
            Token::Minus | Token::Plus => Precedence::Term,
            Token::Slash | Token::Star => Precedence::Factor,
            Token::BangEqual | Token::EqualEqual => Precedence::Equality,
            Token::Greater | Token::GreaterEqual | Token::Less | Token::LessEqual => {
                Precedence::Comparison
            }
            _ => Precedence::None,
        }
    }
}

struct Compiler<'h> {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    end: Span,
    chunk: Chunk,
    depth: usize,
    heap: &'h mut Heap,
    source: &'h str,
}

impl<'h> Compiler<'h> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.pos).map(|(_, s)| *s).unwrap_or(self.end)
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, s)| *s)
            .unwrap_or(Span::UNKNOWN)
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token, code: &'static str, message: &str) -> Result<()> {
        if self.peek() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_at_current(code, message))
        }
    }

    fn error_at(&self, span: Span, at_end: bool, code: &'static str, message: &str) -> CompileError {
        CompileError {
            code,
            span,
            message: message.to_string(),
            lexeme: if at_end { None } else { self.source.get(span.start..span.end).map(str::to_string) },
        }
    }

    fn error_at_current(&self, code: &'static str, message: &str) -> CompileError {
        self.error_at(self.peek_span(), self.peek().is_none(), code, message)
    }

    // ---- Emission ----

    fn emit_op(&mut self, op: OpCode, span: Span) {
        self.chunk.write_op(op, span);
    }

    fn emit_ops(&mut self, a: OpCode, b: OpCode, span: Span) {
        self.emit_op(a, span);
        self.emit_op(b, span);
    }

    fn make_constant(&mut self, value: Value, span: Span) -> Result<u8> {
        if self.chunk.constants.count() >= MAX_CONSTANTS {
            return Err(self.error_at(span, false, "LOX-C004", "Too many constants in one chunk."));
        }
        Ok(self.chunk.add_constant(value) as u8)
    }

    fn emit_constant(&mut self, value: Value, span: Span) -> Result<()> {
        let index = self.make_constant(value, span)?;
        self.emit_op(OpCode::Constant, span);
        self.chunk.write(index, span);
        Ok(())
    }

    // ---- Expressions ----

    fn expression(&mut self) -> Result<()> {
        self.parse_precedence(Precedence::Assignment)
    }

    fn parse_precedence(&mut self, precedence: Precedence) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_at_current("LOX-C005", "Expression nested too deeply."));
        }
        self.depth += 1;
        let result = self.parse_operand(precedence);
        self.depth -= 1;
        result
    }

    fn parse_operand(&mut self, precedence: Precedence) -> Result<()> {
        let Some((token, span)) = self.advance() else {
            return Err(self.error_at(self.end, true, "LOX-C001", "Expect expression."));
        };
        self.prefix(token, span)?;

        while let Some(next) = self.peek() {
            if precedence > Precedence::of(next) {
                break;
            }
            let Some((operator, span)) = self.advance() else { break };
            self.binary(operator, span)?;
        }
        Ok(())
    }

    fn prefix(&mut self, token: Token, span: Span) -> Result<()> {
        match token {
            Token::LeftParen => self.grouping(),
            Token::Minus => self.unary(OpCode::Negate, span),
            Token::Bang => self.unary(OpCode::Not, span),
            Token::Number(n) => self.emit_constant(Value::Number(n), span),
            Token::Str(s) => {
                let handle = self.heap.alloc_string(s);
                self.emit_constant(Value::Obj(handle), span)
            }
            Token::True => {
                self.emit_op(OpCode::True, span);
                Ok(())
            }
            Token::False => {
                self.emit_op(OpCode::False, span);
                Ok(())
            }
            Token::Nil => {
                self.emit_op(OpCode::Nil, span);
                Ok(())
            }
            _ => Err(self.error_at(span, false, "LOX-C001", "Expect expression.")),
        }
    }

    fn grouping(&mut self) -> Result<()> {
        self.expression()?;
        self.expect(&Token::RightParen, "LOX-C002", "Expect ')' after expression.")
    }

    fn unary(&mut self, op: OpCode, span: Span) -> Result<()> {
        self.parse_precedence(Precedence::Unary)?;
        self.emit_op(op, span);
        Ok(())
    }

    fn binary(&mut self, operator: Token, span: Span) -> Result<()> {
        self.parse_precedence(Precedence::of(&operator).next())?;
        match operator {
            Token::Plus => self.emit_op(OpCode::Add, span),
            Token::Minus => self.emit_op(OpCode::Subtract, span),
            Token::Star => self.emit_op(OpCode::Multiply, span),
            Token::Slash => self.emit_op(OpCode::Divide, span),
            Token::EqualEqual => self.emit_op(OpCode::Equal, span),
            Token::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not, span),
            Token::Greater => self.emit_op(OpCode::Greater, span),
            Token::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not, span),
            Token::Less => self.emit_op(OpCode::Less, span),
            Token::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not, span),
            _ => {}
        }
        Ok(())
    }
}

/// Compiles one expression into a chunk that ends in `Return`.
///
/// String literals are allocated in `heap` as they are parsed. On error the
/// caller owns rolling those allocations back, see [`Heap::mark`].
pub fn compile(source: &str, heap: &mut Heap) -> Result<Chunk> {
    let tokens = lexer::lex(source)?;
    let end = Span { start: source.len(), end: source.len() };
    let mut compiler = Compiler { tokens, pos: 0, end, chunk: Chunk::new(), depth: 0, heap, source };

    compiler.expression()?;
    if compiler.peek().is_some() {
        return Err(compiler.error_at_current("LOX-C003", "Expect end of expression."));
    }
    let span = compiler.previous_span();
    compiler.emit_op(OpCode::Return, span);

    tracing::debug!(
        bytes = compiler.chunk.len(),
        constants = compiler.chunk.constants.count(),
        "compiled chunk"
    );
    Ok(compiler.chunk)
}
