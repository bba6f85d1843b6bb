use crate::object::{Heap, ObjRef};

/// One runtime datum. Object values are non-owning handles into a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Nil,
    Obj(ObjRef),
}

impl Value {
    pub fn as_number(self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_falsey(self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Language-level equality; strings compare by content.
    pub fn equals(self, other: Value, heap: &Heap) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Obj(a), Value::Obj(b)) => {
                a == b || matches!((heap.as_str(a), heap.as_str(b)), (Some(x), Some(y)) if x == y)
            }
            _ => false,
        }
    }

    /// Renders this value; object contents are looked up in `heap`.
    pub fn display(self, heap: &Heap) -> ValueDisplay<'_> {
        ValueDisplay { value: self, heap }
    }
}

pub struct ValueDisplay<'a> {
    value: Value,
    heap: &'a Heap,
}

impl std::fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value {
            // f64 Display is the shortest text that parses back to the same bits
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Obj(r) => match self.heap.get(r) {
                Some(obj) => write!(f, "{}", obj),
                None => write!(f, "<freed>"),
            },
        }
    }
}

/// Prints one value to stdout without a trailing newline.
pub fn print_value(value: Value, heap: &Heap) {
    print!("{}", value.display(heap));
}

const MIN_CAPACITY: usize = 8;

/// Growable array of values; the constant pool of every chunk.
///
/// Capacity is tracked explicitly and doubles (from a floor of 8) whenever a
/// write would exceed it.
#[derive(Debug, Clone, Default)]
pub struct ValueArray {
    values: Vec<Value>,
    capacity: usize,
}

impl ValueArray {
    pub fn new() -> Self {
        ValueArray { values: Vec::new(), capacity: 0 }
    }

    pub fn write(&mut self, value: Value) {
        if self.values.len() == self.capacity {
            let grown = (self.capacity * 2).max(MIN_CAPACITY);
            self.values.reserve_exact(grown - self.values.len());
            self.capacity = grown;
        }
        self.values.push(value);
    }

    /// Releases the backing buffer. Safe to call repeatedly.
    pub fn free(&mut self) {
        self.values = Vec::new();
        self.capacity = 0;
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.values.iter().copied()
    }
}
