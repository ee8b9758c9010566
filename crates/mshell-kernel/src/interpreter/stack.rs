//! The evaluation stack.

use crate::error::{ErrorKind, KindResult};
use crate::value::Value;

/// A value stack with underflow-checked pops.
///
/// Every pop names the operator asking for it so underflow errors say who
/// needed how many items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stack(Vec<Value>);

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// Fail unless at least `needed` items are present.
    pub fn require(&self, op: &str, needed: usize) -> KindResult<()> {
        if self.0.len() < needed {
            return Err(ErrorKind::StackUnderflow {
                op: op.to_string(),
                needed,
                found: self.0.len(),
            });
        }
        Ok(())
    }

    pub fn pop(&mut self, op: &str) -> KindResult<Value> {
        self.require(op, 1)?;
        self.0.pop().ok_or_else(|| ErrorKind::StackUnderflow {
            op: op.to_string(),
            needed: 1,
            found: 0,
        })
    }

    /// Pop two items, returned in push order: `(deeper, top)`.
    pub fn pop2(&mut self, op: &str) -> KindResult<(Value, Value)> {
        self.require(op, 2)?;
        let top = self.pop(op)?;
        let below = self.pop(op)?;
        Ok((below, top))
    }

    /// Pop three items, returned in push order.
    pub fn pop3(&mut self, op: &str) -> KindResult<(Value, Value, Value)> {
        self.require(op, 3)?;
        let c = self.pop(op)?;
        let b = self.pop(op)?;
        let a = self.pop(op)?;
        Ok((a, b, c))
    }

    /// Item `depth` places below the top (0 is the top).
    pub fn peek(&self, depth: usize) -> Option<&Value> {
        self.0.len().checked_sub(depth + 1).and_then(|i| self.0.get(i))
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Stack {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_order() {
        let mut stack = Stack::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let (a, b) = stack.pop2("swap").expect("two items");
        assert_eq!((a, b), (Value::Int(2), Value::Int(3)));
        assert_eq!(stack.as_slice().len(), 1);
    }

    #[test]
    fn underflow_names_the_operator() {
        let mut stack = Stack::from(vec![Value::Int(1)]);
        match stack.pop2("swap") {
            Err(ErrorKind::StackUnderflow { op, needed, found }) => {
                assert_eq!((op.as_str(), needed, found), ("swap", 2, 1));
            }
            other => panic!("expected underflow, got {other:?}"),
        }
        assert_eq!(stack.as_slice().len(), 1, "failed pop must not consume");
    }

    #[test]
    fn peek_depth() {
        let stack = Stack::from(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(stack.peek(0), Some(&Value::Int(2)));
        assert_eq!(stack.peek(1), Some(&Value::Int(1)));
        assert_eq!(stack.peek(2), None);
    }
}
