//! Bounded operand stack.

use super::{VmError, VmResult};
use crate::config::STACK_MAX;
use crate::object::Heap;
use crate::value::Value;

#[derive(Debug)]
pub struct Stack {
    values: Vec<Value>,
    capacity: usize,
}

impl Stack {
    /// Reserves at most `STACK_MAX` slots up front; larger limits grow on demand.
    pub fn new(capacity: usize) -> Self {
        Stack { values: Vec::with_capacity(capacity.min(STACK_MAX)), capacity }
    }

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.values.len() >= self.capacity {
            return Err(VmError::StackOverflow { capacity: self.capacity });
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.values.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn peek(&self, distance: usize) -> VmResult<Value> {
        self.values
            .len()
            .checked_sub(distance.checked_add(1).ok_or(VmError::StackUnderflow)?)
            .map(|i| self.values[i])
            .ok_or(VmError::StackUnderflow)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// `[ a ][ b ]` rendering, bottom to top, for execution traces.
    pub fn render(&self, heap: &Heap) -> String {
        self.values.iter().map(|v| format!("[ {} ]", v.display(heap))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_order() {
        let mut stack = Stack::new(STACK_MAX);
        for i in 0..10 {
            stack.push(Value::Number(i as f64)).unwrap();
        }
        for i in (0..10).rev() {
            assert_eq!(stack.pop().unwrap(), Value::Number(i as f64));
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_empty_underflows() {
        let mut stack = Stack::new(STACK_MAX);
        stack.push(Value::Nil).unwrap();
        stack.pop().unwrap();
        assert!(matches!(stack.pop(), Err(VmError::StackUnderflow)));
    }

    #[test]
    fn overflow_on_push_past_capacity() {
        let mut stack = Stack::new(STACK_MAX);
        for _ in 0..STACK_MAX {
            stack.push(Value::Bool(true)).unwrap();
        }
        assert!(matches!(
            stack.push(Value::Bool(true)),
            Err(VmError::StackOverflow { capacity: STACK_MAX })
        ));
        assert_eq!(stack.len(), STACK_MAX);
    }

    #[test]
    fn peek_by_distance() {
        let mut stack = Stack::new(4);
        stack.push(Value::Number(1.0)).unwrap();
        stack.push(Value::Number(2.0)).unwrap();
        assert_eq!(stack.peek(0).unwrap(), Value::Number(2.0));
        assert_eq!(stack.peek(1).unwrap(), Value::Number(1.0));
        assert!(stack.peek(2).is_err());
        assert!(matches!(stack.peek(usize::MAX), Err(VmError::StackUnderflow)));
    }

    #[test]
    fn huge_capacity_does_not_preallocate() {
        let mut stack = Stack::new(usize::MAX);
        for i in 0..STACK_MAX * 2 {
            stack.push(Value::Number(i as f64)).unwrap();
        }
        assert_eq!(stack.len(), STACK_MAX * 2);
        assert_eq!(stack.peek(0).unwrap(), Value::Number((STACK_MAX * 2 - 1) as f64));
    }

    #[test]
    fn render_bottom_to_top() {
        let heap = Heap::new();
        let mut stack = Stack::new(4);
        stack.push(Value::Number(1.0)).unwrap();
        stack.push(Value::Nil).unwrap();
        assert_eq!(stack.render(&heap), "[ 1 ][ nil ]");
    }
}
