//! A World owns every expression node an interpreter will ever look at.
//!
//! Nodes are hash-consed: asking for the same integer, symbol or application
//! twice hands back the same [`ExprRef`], so comparing handles is comparing
//! structure.

use core::fmt;
use std::{cell::OnceCell, collections::HashMap};

use builtin::Builtin;
use value::{Integer, Value};

pub mod builtin;
pub mod fuel;
pub mod value;

/// Handle to a canonical node inside a [`World`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprRef(usize);

/// A named operator. Built-ins get their tag assigned when interned so the
/// evaluator can dispatch on it without looking at the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    name: lasso::Spur,
    builtin: Option<Builtin>,
}

impl Symbol {
    pub fn builtin(&self) -> Option<Builtin> {
        self.builtin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expr {
    Integer(Integer),
    Symbol(Symbol),
    Application(ExprRef, ExprRef),
}

#[derive(Debug)]
struct Node {
    expr: Expr,
    // set at most once, to the fully reduced form of this node
    memo: OnceCell<ExprRef>,
}

pub struct World {
    /// interner
    rodeo: lasso::Rodeo,
    nodes: Vec<Node>,
    integers: HashMap<Integer, ExprRef>,
    symbols: HashMap<lasso::Spur, ExprRef>,
    applications: HashMap<(ExprRef, ExprRef), ExprRef>,
    builtins: [ExprRef; Builtin::ALL.len()],
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("nodes", &self.nodes.len())
            .field("symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}

impl World {
    pub fn new() -> Self {
        let mut world = Self {
            rodeo: lasso::Rodeo::default(),
            nodes: vec![],
            integers: HashMap::default(),
            symbols: HashMap::default(),
            applications: HashMap::default(),
            builtins: [ExprRef(0); Builtin::ALL.len()],
        };
        for builtin in Builtin::ALL {
            let handle = world.intern_symbol(builtin.name());
            world.builtins[builtin as usize] = handle;
        }
        world
    }

    fn push(&mut self, expr: Expr) -> ExprRef {
        let handle = ExprRef(self.nodes.len());
        self.nodes.push(Node {
            expr,
            memo: OnceCell::new(),
        });
        handle
    }

    pub fn intern_integer(&mut self, value: Integer) -> ExprRef {
        if let Some(handle) = self.integers.get(&value) {
            return *handle;
        }
        let handle = self.push(Expr::Integer(value));
        self.integers.insert(value, handle);
        handle
    }

    pub fn intern_symbol(&mut self, name: impl AsRef<str>) -> ExprRef {
        let name = name.as_ref();
        let key = self.rodeo.get_or_intern(name);
        if let Some(handle) = self.symbols.get(&key) {
            return *handle;
        }
        let handle = self.push(Expr::Symbol(Symbol {
            name: key,
            builtin: Builtin::from_name(name),
        }));
        self.symbols.insert(key, handle);
        handle
    }

    /// Both children must already be canonical handles of this world.
    pub fn intern_application(&mut self, op: ExprRef, arg: ExprRef) -> ExprRef {
        if let Some(handle) = self.applications.get(&(op, arg)) {
            return *handle;
        }
        let handle = self.push(Expr::Application(op, arg));
        self.applications.insert((op, arg), handle);
        handle
    }

    /// Shorthand for `ap (ap op first) second`
    pub fn intern_application2(&mut self, op: ExprRef, first: ExprRef, second: ExprRef) -> ExprRef {
        let partial = self.intern_application(op, first);
        self.intern_application(partial, second)
    }

    pub fn intern_pair(&mut self, head: ExprRef, tail: ExprRef) -> ExprRef {
        self.intern_application2(self.builtin(Builtin::Cons), head, tail)
    }

    /// Interns plain data as `cons`/`nil` nodes. Every pair built here is
    /// already reduced and is memoized as its own fixed point.
    pub fn intern_value(&mut self, value: &Value) -> ExprRef {
        enum Task<'v> {
            Visit(&'v Value),
            Pair,
        }
        let mut tasks = vec![Task::Visit(value)];
        let mut done = vec![];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(Value::Nil) => done.push(self.builtin(Builtin::Nil)),
                Task::Visit(Value::Integer(int)) => done.push(self.intern_integer(*int)),
                Task::Visit(Value::Cons(head, tail)) => {
                    tasks.push(Task::Pair);
                    tasks.push(Task::Visit(tail));
                    tasks.push(Task::Visit(head));
                }
                Task::Pair => {
                    let (Some(tail), Some(head)) = (done.pop(), done.pop()) else {
                        unreachable!("a pair is built after both of its components")
                    };
                    let pair = self.intern_pair(head, tail);
                    self.set_memo(pair, pair);
                    done.push(pair);
                }
            }
        }
        match done.pop() {
            Some(handle) => handle,
            None => unreachable!("the root value always yields a node"),
        }
    }

    /// Looks up a symbol without creating it
    pub fn lookup_symbol(&self, name: impl AsRef<str>) -> Option<ExprRef> {
        let key = self.rodeo.get(name.as_ref())?;
        self.symbols.get(&key).copied()
    }

    pub fn builtin(&self, builtin: Builtin) -> ExprRef {
        self.builtins[builtin as usize]
    }

    pub fn expr(&self, handle: ExprRef) -> Expr {
        self.nodes[handle.0].expr
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        self.rodeo.resolve(&symbol.name)
    }

    pub fn memo(&self, handle: ExprRef) -> Option<ExprRef> {
        self.nodes[handle.0].memo.get().copied()
    }

    /// Records the reduced form of `handle`. Later writes are ignored: any
    /// two reductions of the same canonical node agree.
    pub fn set_memo(&self, handle: ExprRef, reduced: ExprRef) {
        let memo = &self.nodes[handle.0].memo;
        if let Err(rejected) = memo.set(reduced) {
            debug_assert_eq!(memo.get(), Some(&rejected));
        }
    }

    /// Number of distinct nodes created so far
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_builtin(&self, handle: ExprRef, builtin: Builtin) -> bool {
        self.builtin(builtin) == handle
    }

    /// Splits `ap (ap cons head) tail` into `(head, tail)`
    pub fn as_pair(&self, handle: ExprRef) -> Option<(ExprRef, ExprRef)> {
        let Expr::Application(partial, tail) = self.expr(handle) else {
            return None;
        };
        let Expr::Application(cons, head) = self.expr(partial) else {
            return None;
        };
        self.is_builtin(cons, Builtin::Cons).then_some((head, tail))
    }

    /// Structural view of an already reduced nil/integer/pair tree. No
    /// reduction happens here; see `Interpreter::force_value` for that.
    pub fn to_value(&self, handle: ExprRef) -> Option<Value> {
        enum Task {
            Visit(ExprRef),
            Pair,
        }
        let mut tasks = vec![Task::Visit(handle)];
        let mut done = vec![];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(handle) => match self.expr(handle) {
                    Expr::Integer(int) => done.push(Value::Integer(int)),
                    Expr::Symbol(sym) if sym.builtin == Some(Builtin::Nil) => done.push(Value::Nil),
                    _ => {
                        let (head, tail) = self.as_pair(handle)?;
                        tasks.push(Task::Pair);
                        tasks.push(Task::Visit(tail));
                        tasks.push(Task::Visit(head));
                    }
                },
                Task::Pair => {
                    let (Some(tail), Some(head)) = (done.pop(), done.pop()) else {
                        unreachable!("a pair is built after both of its components")
                    };
                    done.push(Value::pair(head, tail));
                }
            }
        }
        done.pop()
    }

    pub fn display(&self, handle: ExprRef) -> ExprDisplay<'_> {
        ExprDisplay {
            world: self,
            handle,
        }
    }
}

/// Prints an expression back in the prefix notation the parser reads
pub struct ExprDisplay<'w> {
    world: &'w World,
    handle: ExprRef,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // explicit stack so left-nested `ap ap ap ...` chains don't recurse
        let mut pending = vec![self.handle];
        let mut first = true;
        while let Some(handle) = pending.pop() {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            match self.world.expr(handle) {
                Expr::Integer(int) => write!(f, "{int}")?,
                Expr::Symbol(sym) => write!(f, "{}", self.world.symbol_name(sym))?,
                Expr::Application(op, arg) => {
                    write!(f, "ap")?;
                    pending.push(arg);
                    pending.push(op);
                }
            }
        }
        Ok(())
    }
}
