//! Stack-based bytecode virtual machine.
//!
//! A [`Vm`] owns its operand stack and the [`Heap`] of every object created
//! while compiling or running code. Chunks are borrowed for the duration of
//! one run; the stack and instruction pointer are reset at the start of each
//! run, so a fault in one call never leaks into the next.

pub mod stack;

use crate::chunk::{Chunk, OpCode};
use crate::compiler::{self, CompileError};
use crate::config::VmConfig;
use crate::object::Heap;
use crate::source::Span;
use crate::value::Value;
use stack::Stack;

/// Process exit status for a source that failed to compile.
pub const EXIT_COMPILE_ERROR: u8 = 65;
/// Process exit status for a run that faulted.
pub const EXIT_RUNTIME_ERROR: u8 = 70;
/// Process exit status when the source could not be read.
pub const EXIT_IO_ERROR: u8 = 74;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("Stack overflow (capacity {capacity}).")]
    StackOverflow { capacity: usize },
    #[error("Stack underflow.")]
    StackUnderflow,
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Unknown opcode {op}.")]
    UnknownOpcode { op: u8 },
    #[error("Instruction at offset {offset} is missing its operand.")]
    TruncatedInstruction { offset: usize },
    #[error("Constant index {index} is out of range.")]
    ConstantOutOfRange { index: usize },
    #[error("{0}")]
    Type(&'static str),
    #[error("Reference to a freed object.")]
    DanglingObject,
    #[error("Instruction budget of {limit} exhausted.")]
    InstructionBudgetExhausted { limit: u64 },
}

impl VmError {
    pub fn code(&self) -> &'static str {
        match self {
            VmError::StackOverflow { .. } => "LOX-R001",
            VmError::StackUnderflow => "LOX-R002",
            VmError::DivisionByZero => "LOX-R003",
            VmError::UnknownOpcode { .. } => "LOX-R004",
            VmError::TruncatedInstruction { .. } => "LOX-R005",
            VmError::ConstantOutOfRange { .. } => "LOX-R006",
            VmError::Type(_) => "LOX-R007",
            VmError::DanglingObject => "LOX-R008",
            VmError::InstructionBudgetExhausted { .. } => "LOX-R009",
        }
    }
}

pub type VmResult<T> = Result<T, VmError>;

/// A fault plus the instruction that raised it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: VmError,
    /// Byte offset of the faulting opcode within the chunk.
    pub offset: usize,
    pub span: Span,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    pub fn exit_code(&self) -> u8 {
        match self {
            InterpretError::Compile(_) => EXIT_COMPILE_ERROR,
            InterpretError::Runtime(_) => EXIT_RUNTIME_ERROR,
        }
    }
}

enum Flow {
    Continue,
    Return(Value),
}

pub struct Vm {
    config: VmConfig,
    stack: Stack,
    heap: Heap,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Vm {
            stack: Stack::new(config.stack_capacity),
            heap: Heap::new(),
            config,
        }
    }

    /// Compiles `source` and runs it. A compile error leaves the stack and
    /// the object list exactly as they were.
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        tracing::debug!(len = source.len(), "interpret");
        let mark = self.heap.mark();
        let chunk = match compiler::compile(source, &mut self.heap) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.heap.release_since(mark);
                tracing::debug!(code = e.code, "compile failed");
                return Err(e.into());
            }
        };
        Ok(self.run_chunk(&chunk)?)
    }

    /// Runs `chunk` from its first byte on a fresh stack.
    pub fn run_chunk(&mut self, chunk: &Chunk) -> Result<Value, RuntimeError> {
        self.stack.reset();
        let mut ip = 0;
        let mut executed: u64 = 0;

        loop {
            let offset = ip;
            let flow = self.budget_check(executed).and_then(|()| self.step(chunk, &mut ip));
            executed += 1;
            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return(value)) => return Ok(value),
                Err(kind) => {
                    tracing::debug!(offset, error = %kind, "runtime fault");
                    return Err(RuntimeError { kind, offset, span: chunk.span_at(offset) });
                }
            }
        }
    }

    fn budget_check(&self, executed: u64) -> VmResult<()> {
        match self.config.instruction_budget {
            Some(limit) if executed >= limit => Err(VmError::InstructionBudgetExhausted { limit }),
            _ => Ok(()),
        }
    }

    fn step(&mut self, chunk: &Chunk, ip: &mut usize) -> VmResult<Flow> {
        let offset = *ip;
        let Some(&byte) = chunk.code.get(offset) else {
            // ran off the end without a Return
            return Ok(Flow::Return(Value::Nil));
        };
        *ip += 1;
        let op = OpCode::from_u8(byte).ok_or(VmError::UnknownOpcode { op: byte })?;

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(offset, ?op, stack = %self.stack.render(&self.heap), "dispatch");
        }

        match op {
            OpCode::Constant => {
                let index = *chunk
                    .code
                    .get(*ip)
                    .ok_or(VmError::TruncatedInstruction { offset })? as usize;
                *ip += 1;
                let value = chunk
                    .constants
                    .get(index)
                    .ok_or(VmError::ConstantOutOfRange { index })?;
                self.stack.push(value)?;
            }
            OpCode::Nil => self.stack.push(Value::Nil)?,
            OpCode::True => self.stack.push(Value::Bool(true))?,
            OpCode::False => self.stack.push(Value::Bool(false))?,
            OpCode::Equal => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                self.stack.push(Value::Bool(a.equals(b, &self.heap)))?;
            }
            OpCode::Greater => self.numeric_binary(|a, b| Ok(Value::Bool(a > b)))?,
            OpCode::Less => self.numeric_binary(|a, b| Ok(Value::Bool(a < b)))?,
            OpCode::Add => self.add()?,
            OpCode::Subtract => self.numeric_binary(|a, b| Ok(Value::Number(a - b)))?,
            OpCode::Multiply => self.numeric_binary(|a, b| Ok(Value::Number(a * b)))?,
            OpCode::Divide => self.numeric_binary(|a, b| {
                if b == 0.0 {
                    return Err(VmError::DivisionByZero);
                }
                Ok(Value::Number(a / b))
            })?,
            OpCode::Not => {
                let v = self.stack.pop()?;
                self.stack.push(Value::Bool(v.is_falsey()))?;
            }
            OpCode::Negate => {
                let n = self
                    .stack
                    .pop()?
                    .as_number()
                    .ok_or(VmError::Type("Operand must be a number."))?;
                self.stack.push(Value::Number(-n))?;
            }
            OpCode::Return => return Ok(Flow::Return(self.stack.pop()?)),
        }
        Ok(Flow::Continue)
    }

    fn numeric_binary(&mut self, op: impl FnOnce(f64, f64) -> VmResult<Value>) -> VmResult<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => self.stack.push(op(a, b)?),
            _ => Err(VmError::Type("Operands must be numbers.")),
        }
    }

    fn add(&mut self) -> VmResult<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let result = match (a, b) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::Obj(a), Value::Obj(b)) => {
                let left = self.heap.get(a).ok_or(VmError::DanglingObject)?;
                let right = self.heap.get(b).ok_or(VmError::DanglingObject)?;
                let joined = match (left.as_str(), right.as_str()) {
                    (Some(l), Some(r)) => format!("{l}{r}"),
                    _ => return Err(VmError::Type("Operands must be two numbers or two strings.")),
                };
                Value::Obj(self.heap.alloc_string(joined))
            }
            _ => return Err(VmError::Type("Operands must be two numbers or two strings.")),
        };
        self.stack.push(result)
    }

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.stack.push(value)
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop()
    }

    pub fn peek(&self, distance: usize) -> VmResult<Value> {
        self.stack.peek(distance)
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Allocates a string owned by this VM.
    pub fn alloc_string(&mut self, s: impl Into<String>) -> Value {
        Value::Obj(self.heap.alloc_string(s))
    }

    pub fn object_count(&self) -> usize {
        self.heap.len()
    }

    /// Releases every heap object and empties the stack. Idempotent.
    pub fn free(&mut self) {
        self.stack.reset();
        self.heap.free_all();
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new(VmConfig::default())
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STACK_MAX;
    use crate::object::HeapStats;

    fn chunk_of(constants: &[Value], code: &[u8]) -> Chunk {
        let mut chunk = Chunk::new();
        for c in constants {
            chunk.add_constant(*c);
        }
        for b in code {
            chunk.write(*b, Span::UNKNOWN);
        }
        chunk
    }

    fn run_source(source: &str) -> Result<Value, InterpretError> {
        Vm::default().interpret(source)
    }

    fn runtime_kind(source: &str) -> VmError {
        match run_source(source) {
            Err(InterpretError::Runtime(e)) => e.kind,
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    const C: u8 = OpCode::Constant as u8;

    #[test]
    fn add_two_constants() {
        let chunk = chunk_of(
            &[Value::Number(1.0), Value::Number(2.0)],
            &[C, 0, C, 1, OpCode::Add as u8, OpCode::Return as u8],
        );
        let mut vm = Vm::default();
        assert_eq!(vm.run_chunk(&chunk), Ok(Value::Number(3.0)));
    }

    #[test]
    fn divide_by_zero_faults() {
        let chunk = chunk_of(
            &[Value::Number(1.0), Value::Number(0.0)],
            &[C, 0, C, 1, OpCode::Divide as u8, OpCode::Return as u8],
        );
        let err = Vm::default().run_chunk(&chunk).unwrap_err();
        assert_eq!(err.kind, VmError::DivisionByZero);
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn arithmetic_on_empty_stack_underflows() {
        let chunk = chunk_of(&[], &[OpCode::Multiply as u8, OpCode::Return as u8]);
        let err = Vm::default().run_chunk(&chunk).unwrap_err();
        assert_eq!(err.kind, VmError::StackUnderflow);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn return_on_empty_stack_underflows() {
        let chunk = chunk_of(&[], &[OpCode::Return as u8]);
        assert_eq!(Vm::default().run_chunk(&chunk).unwrap_err().kind, VmError::StackUnderflow);
    }

    #[test]
    fn unknown_opcode_faults() {
        let chunk = chunk_of(&[], &[OpCode::Nil as u8, 0xEE]);
        let err = Vm::default().run_chunk(&chunk).unwrap_err();
        assert_eq!(err.kind, VmError::UnknownOpcode { op: 0xEE });
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn constant_without_operand() {
        let chunk = chunk_of(&[Value::Nil], &[C]);
        assert_eq!(
            Vm::default().run_chunk(&chunk).unwrap_err().kind,
            VmError::TruncatedInstruction { offset: 0 }
        );
    }

    #[test]
    fn constant_index_out_of_range() {
        let chunk = chunk_of(&[Value::Nil], &[C, 3, OpCode::Return as u8]);
        assert_eq!(
            Vm::default().run_chunk(&chunk).unwrap_err().kind,
            VmError::ConstantOutOfRange { index: 3 }
        );
    }

    #[test]
    fn running_off_the_end_yields_nil() {
        let chunk = chunk_of(&[], &[OpCode::True as u8]);
        assert_eq!(Vm::default().run_chunk(&chunk), Ok(Value::Nil));
        assert_eq!(Vm::default().run_chunk(&Chunk::new()), Ok(Value::Nil));
    }

    #[test]
    fn stack_overflow_is_runtime_error() {
        let code: Vec<u8> = std::iter::repeat(OpCode::Nil as u8).take(STACK_MAX + 1).collect();
        let err = Vm::default().run_chunk(&chunk_of(&[], &code)).unwrap_err();
        assert_eq!(err.kind, VmError::StackOverflow { capacity: STACK_MAX });
        assert_eq!(err.offset, STACK_MAX);
    }

    #[test]
    fn custom_stack_capacity() {
        let mut vm = Vm::new(VmConfig { stack_capacity: 2, ..VmConfig::default() });
        assert!(vm.interpret("1 + 2").is_ok());
        let err = vm.run_chunk(&chunk_of(&[], &[OpCode::Nil as u8; 3])).unwrap_err();
        assert_eq!(err.kind, VmError::StackOverflow { capacity: 2 });
    }

    #[test]
    fn unbounded_stack_capacity_is_accepted() {
        let mut vm = Vm::new(VmConfig { stack_capacity: usize::MAX, ..VmConfig::default() });
        assert_eq!(vm.interpret("1 + 2").unwrap(), Value::Number(3.0));
        assert_eq!(vm.peek(usize::MAX), Err(VmError::StackUnderflow));
    }

    #[test]
    fn deep_nesting_is_a_compile_error() {
        let mut vm = Vm::default();
        let source = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let err = vm.interpret(&source).unwrap_err();
        assert!(matches!(&err, InterpretError::Compile(e) if e.code == "LOX-C005"));
        assert_eq!(err.exit_code(), EXIT_COMPILE_ERROR);

        let err = vm.interpret(&format!("{}1", "-".repeat(200_000))).unwrap_err();
        assert!(matches!(&err, InterpretError::Compile(e) if e.code == "LOX-C005"));
        assert_eq!(vm.interpret("-(-1)").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn public_push_pop() {
        let mut vm = Vm::default();
        vm.push(Value::Number(1.0)).unwrap();
        vm.push(Value::Bool(true)).unwrap();
        assert_eq!(vm.peek(0), Ok(Value::Bool(true)));
        assert_eq!(vm.pop(), Ok(Value::Bool(true)));
        assert_eq!(vm.pop(), Ok(Value::Number(1.0)));
        assert_eq!(vm.pop(), Err(VmError::StackUnderflow));
    }

    #[test]
    fn vm_recovers_after_fault() {
        let mut vm = Vm::default();
        assert!(vm.interpret("1 / 0").is_err());
        assert_eq!(vm.interpret("2 * 21").unwrap(), Value::Number(42.0));
    }

    #[test]
    fn expressions_evaluate() {
        assert_eq!(run_source("-(1 + 2) * 3 - -4").unwrap(), Value::Number(-5.0));
        assert_eq!(run_source("10 / 4").unwrap(), Value::Number(2.5));
        assert_eq!(run_source("!(5 - 4 > 3 * 2 == !nil)").unwrap(), Value::Bool(true));
        assert_eq!(run_source("1 <= 1").unwrap(), Value::Bool(true));
        assert_eq!(run_source("2 >= 3").unwrap(), Value::Bool(false));
        assert_eq!(run_source("nil != false").unwrap(), Value::Bool(true));
        assert_eq!(run_source("!0").unwrap(), Value::Bool(false));
    }

    #[test]
    fn type_mismatches() {
        assert_eq!(runtime_kind("1 + true"), VmError::Type("Operands must be two numbers or two strings."));
        assert_eq!(runtime_kind("\"a\" + 1"), VmError::Type("Operands must be two numbers or two strings."));
        assert_eq!(runtime_kind("1 < nil"), VmError::Type("Operands must be numbers."));
        assert_eq!(runtime_kind("-\"x\""), VmError::Type("Operand must be a number."));
    }

    #[test]
    fn runtime_error_carries_span() {
        let err = match run_source("1 +\n  true") {
            Err(InterpretError::Runtime(e)) => e,
            other => panic!("expected runtime error, got {:?}", other),
        };
        assert_eq!(err.span, Span { start: 2, end: 3 });
    }

    #[test]
    fn string_concatenation_is_tracked() {
        let mut vm = Vm::default();
        let v = vm.interpret(r#""st" + "ri" + "ng" == "string""#).unwrap();
        assert_eq!(v, Value::Bool(true));
        // four literals plus two intermediate concatenations
        assert_eq!(vm.object_count(), 6);

        let s = vm.interpret(r#""a" + "b""#).unwrap();
        assert_eq!(s.display(vm.heap()).to_string(), "ab");
        assert_eq!(vm.object_count(), 9);
    }

    #[test]
    fn compile_error_leaves_vm_untouched() {
        let mut vm = Vm::default();
        vm.interpret("\"keep\"").unwrap();
        vm.push(Value::Number(7.0)).unwrap();
        let before = (vm.stack_len(), vm.object_count(), vm.heap().head());

        let err = vm.interpret("\"leak\" + (").unwrap_err();
        assert!(matches!(err, InterpretError::Compile(_)));
        assert_eq!(err.exit_code(), EXIT_COMPILE_ERROR);
        assert_eq!((vm.stack_len(), vm.object_count(), vm.heap().head()), before);
    }

    #[test]
    fn free_releases_each_object_once() {
        let mut vm = Vm::default();
        vm.interpret(r#""a" + "b" + "c""#).unwrap();
        assert_eq!(vm.object_count(), 5);
        vm.free();
        assert_eq!(vm.heap().stats(), HeapStats { allocated: 5, freed: 5 });
        vm.free();
        assert_eq!(vm.heap().stats(), HeapStats { allocated: 5, freed: 5 });
        assert_eq!(vm.object_count(), 0);
    }

    #[test]
    fn value_outliving_free_is_not_resolved() {
        let mut vm = Vm::default();
        let s = vm.interpret(r#""x""#).unwrap();
        vm.free();
        assert_eq!(s.display(vm.heap()).to_string(), "<freed>");
    }

    #[test]
    fn instruction_budget() {
        // Constant, Constant, Add, Return
        let mut vm = Vm::new(VmConfig { instruction_budget: Some(4), ..VmConfig::default() });
        assert_eq!(vm.interpret("1 + 2").unwrap(), Value::Number(3.0));
        let err = match vm.interpret("1 + 2 + 3") {
            Err(InterpretError::Runtime(e)) => e,
            other => panic!("expected runtime error, got {:?}", other),
        };
        assert_eq!(err.kind, VmError::InstructionBudgetExhausted { limit: 4 });
        assert_eq!(err.offset, 7);
    }

    #[test]
    fn error_codes_and_exit_codes() {
        assert_eq!(VmError::DivisionByZero.code(), "LOX-R003");
        let err = InterpretError::Runtime(RuntimeError {
            kind: VmError::StackUnderflow,
            offset: 0,
            span: Span::UNKNOWN,
        });
        assert_eq!(err.exit_code(), EXIT_RUNTIME_ERROR);
        assert_eq!(err.to_string(), "Stack underflow.");
    }
}
