//! Plain data carried over the wire: nil, integers and pairs
//!
//! Values arrive from the peer, so they can nest arbitrarily deep in either
//! position of a pair. Every traversal below keeps its work on the heap.
use core::fmt;

use arbitrary::Arbitrary;

pub type Integer = i64;

// Nil comes first so `arbitrary` falls back to it once input runs out,
// which keeps generated trees finite.
#[derive(Default, Arbitrary)]
pub enum Value {
    #[default]
    Nil,
    Integer(Integer),
    Cons(Box<Value>, Box<Value>),
}

impl Value {
    pub fn pair(head: Value, tail: Value) -> Self {
        Self::Cons(Box::new(head), Box::new(tail))
    }

    /// Builds a `nil`-terminated list
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        let items: Vec<_> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Self::Nil, |tail, head| Self::pair(head, tail))
    }

    pub fn as_integer(&self) -> Option<Integer> {
        match self {
            Self::Integer(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(&Value, &Value)> {
        match self {
            Self::Cons(head, tail) => Some((head, tail)),
            _ => None,
        }
    }

    /// The elements of a `nil`-terminated list, `None` for anything else
    pub fn as_list(&self) -> Option<Vec<&Value>> {
        let mut items = vec![];
        let mut cursor = self;
        loop {
            match cursor {
                Self::Nil => return Some(items),
                Self::Cons(head, tail) => {
                    items.push(head.as_ref());
                    cursor = tail;
                }
                Self::Integer(_) => return None,
            }
        }
    }
}

/// Post-order walk shared by the structural operations: `leaf` maps
/// nil/integers, `pair` combines the results of a head and its tail.
fn fold<'v, T>(
    value: &'v Value,
    mut leaf: impl FnMut(&'v Value) -> T,
    mut pair: impl FnMut(T, T) -> T,
) -> T {
    enum Task<'v> {
        Visit(&'v Value),
        Combine,
    }
    let mut tasks = vec![Task::Visit(value)];
    let mut done = vec![];
    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(Value::Cons(head, tail)) => {
                tasks.push(Task::Combine);
                tasks.push(Task::Visit(tail));
                tasks.push(Task::Visit(head));
            }
            Task::Visit(leaf_value) => done.push(leaf(leaf_value)),
            Task::Combine => match (done.pop(), done.pop()) {
                (Some(tail), Some(head)) => done.push(pair(head, tail)),
                _ => unreachable!("a pair is combined after both of its components"),
            },
        }
    }
    match done.pop() {
        Some(result) => result,
        None => unreachable!("the root always produces a result"),
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        fold(
            self,
            |leaf| match leaf {
                Self::Integer(int) => Self::Integer(*int),
                _ => Self::Nil,
            },
            Self::pair,
        )
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        let Self::Cons(head, tail) = self else {
            return;
        };
        if !matches!(**head, Self::Cons(..)) && !matches!(**tail, Self::Cons(..)) {
            return;
        }
        // unlink children so each box is dropped with nil contents
        let mut pending = vec![std::mem::take(&mut **head), std::mem::take(&mut **tail)];
        while let Some(mut value) = pending.pop() {
            if let Self::Cons(head, tail) = &mut value {
                pending.push(std::mem::take(&mut **head));
                pending.push(std::mem::take(&mut **tail));
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            match pair {
                (Self::Nil, Self::Nil) => {}
                (Self::Integer(a), Self::Integer(b)) if a == b => {}
                (Self::Cons(a_head, a_tail), Self::Cons(b_head, b_tail)) => {
                    pending.push((&**a_tail, &**b_tail));
                    pending.push((&**a_head, &**b_head));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Value {}

impl From<Integer> for Value {
    fn from(value: Integer) -> Self {
        Self::Integer(value)
    }
}

impl From<(Integer, Integer)> for Value {
    fn from((x, y): (Integer, Integer)) -> Self {
        Self::pair(Self::Integer(x), Self::Integer(y))
    }
}

// Lists print as `[a, b]`, other pairs as `(head, tail)`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Task<'v> {
            Value(&'v Value),
            // the tail chain of an improper pair never ends in nil, so its
            // tails need no list check
            Improper(&'v Value),
            Text(&'static str),
        }
        let mut tasks = vec![Task::Value(self)];
        while let Some(task) = tasks.pop() {
            let value = match task {
                Task::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Task::Improper(value) => value,
                Task::Value(value) => {
                    if let Some(items) = value.as_list().filter(|items| !items.is_empty()) {
                        tasks.push(Task::Text("]"));
                        for (i, item) in items.into_iter().enumerate().rev() {
                            tasks.push(Task::Value(item));
                            if i > 0 {
                                tasks.push(Task::Text(", "));
                            }
                        }
                        tasks.push(Task::Text("["));
                        continue;
                    }
                    value
                }
            };
            match value {
                Self::Nil => f.write_str("nil")?,
                Self::Integer(int) => write!(f, "{int}")?,
                Self::Cons(head, tail) => {
                    tasks.push(Task::Text(")"));
                    tasks.push(match tail.as_ref() {
                        Self::Cons(..) => Task::Improper(tail),
                        tail => Task::Value(tail),
                    });
                    tasks.push(Task::Text(", "));
                    tasks.push(Task::Value(head));
                    tasks.push(Task::Text("("));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
