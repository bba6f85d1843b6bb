//! loxvm: a stack-based bytecode virtual machine for Lox expressions.
//!
//! Source text is scanned by [`lexer`], compiled in a single pass by
//! [`compiler`] into a [`chunk::Chunk`], and executed by [`vm::Vm`].

pub mod chunk;
pub mod compiler;
pub mod config;
pub mod diagnostic;
pub mod lexer;
pub mod object;
pub mod source;
pub mod value;
pub mod vm;

pub use config::VmConfig;
pub use value::Value;
pub use vm::{InterpretError, Vm};
