use crate::source::Span;
use crate::value::{Value, ValueArray};

/// Single-byte instruction tags. `Constant` is followed by a one-byte
/// index into the chunk's constant pool; every other opcode has no operands.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Constant = 0,
    Nil = 1,
    True = 2,
    False = 3,
    Equal = 4,
    Greater = 5,
    Less = 6,
    Add = 7,
    Subtract = 8,
    Multiply = 9,
    Divide = 10,
    Not = 11,
    Negate = 12,
    Return = 13,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => OpCode::Constant,
            1 => OpCode::Nil,
            2 => OpCode::True,
            3 => OpCode::False,
            4 => OpCode::Equal,
            5 => OpCode::Greater,
            6 => OpCode::Less,
            7 => OpCode::Add,
            8 => OpCode::Subtract,
            9 => OpCode::Multiply,
            10 => OpCode::Divide,
            11 => OpCode::Not,
            12 => OpCode::Negate,
            13 => OpCode::Return,
            _ => return None,
        })
    }
}

/// Compiled bytecode plus its constant pool. `spans[i]` is the source range
/// that produced `code[i]`.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub spans: Vec<Span>,
    pub constants: ValueArray,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn write(&mut self, byte: u8, span: Span) {
        self.code.push(byte);
        self.spans.push(span);
    }

    pub fn write_op(&mut self, op: OpCode, span: Span) {
        self.write(op as u8, span);
    }

    /// Appends `value` to the constant pool and returns its index.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.write(value);
        self.constants.count() - 1
    }

    pub fn span_at(&self, offset: usize) -> Span {
        self.spans.get(offset).copied().unwrap_or(Span::UNKNOWN)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}
