use crate::{
    parser::{parse_expr, ParseError},
    world::{
        builtin::Builtin,
        fuel::Fuel,
        value::{Integer, Value},
        Expr, ExprRef, World,
    },
};

use super::{FunctionTable, LoadError};

/// Bounds on a single top-level evaluation.
///
/// Each level of `max_depth` costs a few native stack frames. The default
/// fits the 2 MiB stack of a spawned thread; raise it together with the
/// stack of the thread that evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// reduction steps
    pub fuel: i32,
    /// nested evaluations, each of which costs native stack
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            fuel: 50_000_000,
            max_depth: 500,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("expected an integer, found `{0}`")]
    NotAnInteger(Box<str>),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("ran out of fuel after {0} reduction steps")]
    OutOfFuel(u64),
    #[error("evaluation nested deeper than {0} levels")]
    DepthExceeded(usize),
    #[error("expected {expected}, found `{found}`")]
    UnexpectedShape {
        expected: &'static str,
        found: Box<str>,
    },
}

/// Lazy graph reducer over a [`World`] and a frozen [`FunctionTable`].
///
/// Every reduced node remembers its normal form, so shared sub-terms are
/// only ever reduced once per interpreter.
#[derive(Debug)]
pub struct Interpreter {
    world: World,
    functions: FunctionTable,
    limits: Limits,
    fuel: Fuel,
    steps: u64,
}

impl Interpreter {
    /// Freezes `functions`, they stay fixed for the lifetime of the interpreter
    pub fn new(world: World, mut functions: FunctionTable, limits: Limits) -> Self {
        functions.freeze();
        Self {
            world,
            functions,
            limits,
            fuel: Fuel::empty(),
            steps: 0,
        }
    }

    /// Loads a program listing into a fresh world
    pub fn load(source: &str, limits: Limits) -> Result<Self, LoadError> {
        let mut world = World::default();
        let mut functions = FunctionTable::new();
        functions.load(&mut world, source)?;
        Ok(Self::new(world, functions, limits))
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Total reduction steps taken by this interpreter
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn parse(&mut self, source: &str) -> Result<ExprRef, ParseError> {
        parse_expr(&mut self.world, source)
    }

    /// Reduces `expr` to its fixed point
    pub fn evaluate(&mut self, expr: ExprRef) -> Result<ExprRef, EvalError> {
        self.refuel();
        let before = self.steps;
        let result = self.eval(expr, 0);
        tracing::trace!(steps = self.steps - before, ok = result.is_ok(), "evaluated");
        result
    }

    /// Evaluates `expr` and every pair component below it into plain data
    pub fn force_value(&mut self, expr: ExprRef) -> Result<Value, EvalError> {
        self.refuel();
        self.force(expr)
    }

    fn refuel(&mut self) {
        self.fuel.refill(self.limits.fuel, self.limits.fuel);
    }

    fn force(&mut self, expr: ExprRef) -> Result<Value, EvalError> {
        enum Task {
            Force(ExprRef),
            Pair,
        }
        let mut tasks = vec![Task::Force(expr)];
        let mut done = vec![];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Force(expr) => {
                    let reduced = self.eval(expr, 0)?;
                    match self.world.expr(reduced) {
                        Expr::Integer(int) => done.push(Value::Integer(int)),
                        _ if self.world.is_builtin(reduced, Builtin::Nil) => done.push(Value::Nil),
                        _ => {
                            let Some((head, tail)) = self.world.as_pair(reduced) else {
                                return Err(self.unexpected("nil, an integer or a pair", reduced));
                            };
                            tasks.push(Task::Pair);
                            tasks.push(Task::Force(tail));
                            tasks.push(Task::Force(head));
                        }
                    }
                }
                Task::Pair => {
                    let (Some(tail), Some(head)) = (done.pop(), done.pop()) else {
                        unreachable!("a pair is built after both of its components")
                    };
                    done.push(Value::pair(head, tail));
                }
            }
        }
        match done.pop() {
            Some(value) => Ok(value),
            None => unreachable!("forcing always yields a value"),
        }
    }

    fn unexpected(&self, expected: &'static str, found: ExprRef) -> EvalError {
        EvalError::UnexpectedShape {
            expected,
            found: self.world.display(found).to_string().into(),
        }
    }

    fn eval(&mut self, expr: ExprRef, depth: usize) -> Result<ExprRef, EvalError> {
        if let Some(done) = self.world.memo(expr) {
            return Ok(done);
        }
        if depth > self.limits.max_depth {
            return Err(EvalError::DepthExceeded(self.limits.max_depth));
        }
        let mut current = expr;
        loop {
            let next = self.try_reduce(current, depth)?;
            if next == current {
                break;
            }
            current = next;
        }
        self.world.set_memo(current, current);
        self.world.set_memo(expr, current);
        Ok(current)
    }

    fn integer(&mut self, expr: ExprRef, depth: usize) -> Result<Integer, EvalError> {
        let reduced = self.eval(expr, depth)?;
        match self.world.expr(reduced) {
            Expr::Integer(int) => Ok(int),
            _ => Err(EvalError::NotAnInteger(
                self.world.display(reduced).to_string().into(),
            )),
        }
    }

    fn boolean(&self, value: bool) -> ExprRef {
        self.world
            .builtin(if value { Builtin::T } else { Builtin::F })
    }

    /// A single reduction step. Returns `expr` itself once nothing applies.
    fn try_reduce(&mut self, expr: ExprRef, depth: usize) -> Result<ExprRef, EvalError> {
        if let Some(done) = self.world.memo(expr) {
            return Ok(done);
        }
        self.steps += 1;
        self.fuel.consume(1);
        if !self.fuel.should_continue() {
            return Err(EvalError::OutOfFuel(self.steps));
        }
        match self.world.expr(expr) {
            Expr::Integer(_) => Ok(expr),
            Expr::Symbol(_) => Ok(self.functions.get(expr).unwrap_or(expr)),
            Expr::Application(op, x) => self.reduce_application(expr, op, x, depth + 1),
        }
    }

    // Arguments are named from the most recently applied one backwards:
    // in `ap ap ap op z y x`, `x` is the last operand.
    fn reduce_application(
        &mut self,
        expr: ExprRef,
        op: ExprRef,
        x: ExprRef,
        depth: usize,
    ) -> Result<ExprRef, EvalError> {
        let fun = self.eval(op, depth)?;
        let builtin = match self.world.expr(fun) {
            Expr::Symbol(sym) => sym.builtin(),
            Expr::Application(op2, y) => return self.reduce_binary(expr, op2, y, x, depth),
            Expr::Integer(_) => None,
        };
        if builtin == Some(Builtin::Neg) {
            let int = self.integer(x, depth)?;
            let neg = int.checked_neg().ok_or(EvalError::Overflow)?;
            return Ok(self.world.intern_integer(neg));
        }
        let world = &mut self.world;
        let reduced = match builtin {
            Some(Builtin::I) => x,
            Some(Builtin::Nil) => world.builtin(Builtin::T),
            Some(Builtin::IsNil) => {
                let t = world.builtin(Builtin::T);
                let tf = world.intern_application(t, world.builtin(Builtin::F));
                let ttf = world.intern_application(t, tf);
                world.intern_application(x, ttf)
            }
            Some(Builtin::Car) => world.intern_application(x, world.builtin(Builtin::T)),
            Some(Builtin::Cdr) => world.intern_application(x, world.builtin(Builtin::F)),
            _ => expr,
        };
        Ok(reduced)
    }

    fn reduce_binary(
        &mut self,
        expr: ExprRef,
        op2: ExprRef,
        y: ExprRef,
        x: ExprRef,
        depth: usize,
    ) -> Result<ExprRef, EvalError> {
        let fun2 = self.eval(op2, depth)?;
        let builtin = match self.world.expr(fun2) {
            Expr::Symbol(sym) => sym.builtin(),
            Expr::Application(op3, z) => return self.reduce_ternary(expr, op3, z, y, x, depth),
            Expr::Integer(_) => None,
        };
        let reduced = match builtin {
            Some(Builtin::T) => y,
            Some(Builtin::F) => x,
            Some(Builtin::Add) => {
                let (x, y) = (self.integer(x, depth)?, self.integer(y, depth)?);
                let sum = y.checked_add(x).ok_or(EvalError::Overflow)?;
                self.world.intern_integer(sum)
            }
            Some(Builtin::Mul) => {
                let (x, y) = (self.integer(x, depth)?, self.integer(y, depth)?);
                let product = y.checked_mul(x).ok_or(EvalError::Overflow)?;
                self.world.intern_integer(product)
            }
            Some(Builtin::Div) => {
                let (x, y) = (self.integer(x, depth)?, self.integer(y, depth)?);
                if x == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                // truncates toward zero
                let quotient = y.checked_div(x).ok_or(EvalError::Overflow)?;
                self.world.intern_integer(quotient)
            }
            Some(Builtin::Lt) => {
                let (x, y) = (self.integer(x, depth)?, self.integer(y, depth)?);
                self.boolean(y < x)
            }
            Some(Builtin::Eq) => {
                let (x, y) = (self.integer(x, depth)?, self.integer(y, depth)?);
                self.boolean(x == y)
            }
            Some(Builtin::Cons) => {
                // pairs are built eagerly from reduced components
                let head = self.eval(y, depth)?;
                let tail = self.eval(x, depth)?;
                let pair = self.world.intern_pair(head, tail);
                self.world.set_memo(pair, pair);
                pair
            }
            _ => expr,
        };
        Ok(reduced)
    }

    fn reduce_ternary(
        &mut self,
        expr: ExprRef,
        op3: ExprRef,
        z: ExprRef,
        y: ExprRef,
        x: ExprRef,
        depth: usize,
    ) -> Result<ExprRef, EvalError> {
        let fun3 = self.eval(op3, depth)?;
        let Expr::Symbol(sym) = self.world.expr(fun3) else {
            return Ok(expr);
        };
        let world = &mut self.world;
        let reduced = match sym.builtin() {
            Some(Builtin::S) => {
                let zx = world.intern_application(z, x);
                let yx = world.intern_application(y, x);
                world.intern_application(zx, yx)
            }
            Some(Builtin::C) => world.intern_application2(z, x, y),
            Some(Builtin::B) => {
                let yx = world.intern_application(y, x);
                world.intern_application(z, yx)
            }
            // a pair applied to a selector hands it both components
            Some(Builtin::Cons) => world.intern_application2(x, z, y),
            _ => expr,
        };
        Ok(reduced)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::{EvalError, Interpreter, Limits};
    use crate::world::{value::Value, Expr};

    fn interpreter(program: &str) -> Interpreter {
        let_assert!(Ok(interpreter) = Interpreter::load(program, Limits::default()));
        interpreter
    }

    /// Evaluates `source` and prints the result in prefix form
    fn eval(interpreter: &mut Interpreter, source: &str) -> Result<String, EvalError> {
        let_assert!(Ok(expr) = interpreter.parse(source));
        let reduced = interpreter.evaluate(expr)?;
        Ok(interpreter.world().display(reduced).to_string())
    }

    fn eval_value(interpreter: &mut Interpreter, source: &str) -> Result<Value, EvalError> {
        let_assert!(Ok(expr) = interpreter.parse(source));
        interpreter.force_value(expr)
    }

    #[test]
    fn identities() {
        let mut interp = interpreter("");
        check!(eval(&mut interp, "ap i 7").as_deref() == Ok("7"));
        check!(eval(&mut interp, "ap i ap ap add 1 2").as_deref() == Ok("3"));
        check!(eval(&mut interp, "ap ap t 1 2").as_deref() == Ok("1"));
        check!(eval(&mut interp, "ap ap f 1 2").as_deref() == Ok("2"));
        check!(eval(&mut interp, "ap ap t 1 unbound").as_deref() == Ok("1"));
        check!(eval(&mut interp, "ap ap add 2 3").as_deref() == Ok("5"));
        check!(eval(&mut interp, "ap ap mul 4 -2").as_deref() == Ok("-8"));
        check!(eval(&mut interp, "ap neg 14").as_deref() == Ok("-14"));
        check!(eval(&mut interp, "ap nil 99").as_deref() == Ok("t"));
    }

    #[test]
    fn division_truncates_toward_zero() {
        let mut interp = interpreter("");
        check!(eval(&mut interp, "ap ap div 7 2").as_deref() == Ok("3"));
        check!(eval(&mut interp, "ap ap div -7 2").as_deref() == Ok("-3"));
        check!(eval(&mut interp, "ap ap div 7 -2").as_deref() == Ok("-3"));
        check!(eval(&mut interp, "ap ap div 1 0") == Err(EvalError::DivisionByZero));
    }

    #[test]
    fn comparisons_take_operands_in_order() {
        let mut interp = interpreter("");
        check!(eval(&mut interp, "ap ap lt 1 2").as_deref() == Ok("t"));
        check!(eval(&mut interp, "ap ap lt 2 1").as_deref() == Ok("f"));
        check!(eval(&mut interp, "ap ap lt 2 2").as_deref() == Ok("f"));
        check!(eval(&mut interp, "ap ap eq 3 3").as_deref() == Ok("t"));
        check!(eval(&mut interp, "ap ap eq 3 -3").as_deref() == Ok("f"));
    }

    #[test]
    fn combinators() {
        let mut interp = interpreter("");
        check!(eval(&mut interp, "ap ap ap s add inc 1").is_err());
        check!(eval(&mut interp, "ap ap ap s mul ap add 1 6").as_deref() == Ok("42"));
        check!(eval(&mut interp, "ap ap ap c add 1 2").as_deref() == Ok("3"));
        check!(eval(&mut interp, "ap ap ap c div 2 10").as_deref() == Ok("5"));
        check!(eval(&mut interp, "ap ap ap b neg ap add 1 2").as_deref() == Ok("-3"));
        check!(eval(&mut interp, "ap ap s t 1").as_deref() == Ok("ap ap s t 1"));
    }

    #[test]
    fn pairs_and_selectors() {
        let mut interp = interpreter("");
        check!(eval(&mut interp, "ap car ap ap cons 1 2").as_deref() == Ok("1"));
        check!(eval(&mut interp, "ap cdr ap ap cons 1 2").as_deref() == Ok("2"));
        check!(eval(&mut interp, "ap isnil nil").as_deref() == Ok("t"));
        check!(eval(&mut interp, "ap isnil ap ap cons 1 2").as_deref() == Ok("f"));
        check!(eval(&mut interp, "ap ap ap cons 1 2 add").as_deref() == Ok("3"));
        // pair components are reduced as soon as the pair is
        check!(
            eval(&mut interp, "ap ap cons ap neg 1 ap ap cons ap i 2 nil").as_deref()
                == Ok("ap ap cons -1 ap ap cons 2 nil")
        );
    }

    #[test]
    fn irreducible_terms_are_their_own_fixed_point() {
        let mut interp = interpreter("");
        check!(eval(&mut interp, "ap add 1").as_deref() == Ok("ap add 1"));
        check!(eval(&mut interp, "ap 1 2").as_deref() == Ok("ap 1 2"));
        check!(eval(&mut interp, "galaxy").as_deref() == Ok("galaxy"));
        check!(eval(&mut interp, "ap galaxy 1").as_deref() == Ok("ap galaxy 1"));
    }

    #[test]
    fn user_functions_recurse_by_name() {
        let mut interp = interpreter(
            "inc = ap add 1\n\
             pwr2 = ap ap s ap ap c ap eq 0 1 ap ap b ap mul 2 ap ap b pwr2 ap add -1\n",
        );
        check!(eval(&mut interp, "ap inc ap inc 0").as_deref() == Ok("2"));
        check!(eval(&mut interp, "ap pwr2 0").as_deref() == Ok("1"));
        check!(eval(&mut interp, "ap pwr2 8").as_deref() == Ok("256"));
        check!(eval(&mut interp, "ap pwr2 62").as_deref() == Ok("4611686018427387904"));
        check!(eval(&mut interp, "ap pwr2 63") == Err(EvalError::Overflow));
    }

    #[test]
    fn evaluation_is_memoized() {
        let mut interp = interpreter("pwr2 = ap ap s ap ap c ap eq 0 1 ap ap b ap mul 2 ap ap b pwr2 ap add -1");
        let_assert!(Ok(expr) = interp.parse("ap pwr2 10"));
        let_assert!(Ok(first) = interp.evaluate(expr));
        let steps = interp.steps();
        check!(steps > 0);
        let_assert!(Ok(second) = interp.evaluate(expr));
        check!(first == second);
        check!(interp.steps() == steps);
        check!(interp.world().expr(first) == Expr::Integer(1024));
        check!(interp.world().memo(expr) == Some(first));
    }

    #[test]
    fn type_errors() {
        let mut interp = interpreter("");
        let_assert!(Err(EvalError::NotAnInteger(found)) = eval(&mut interp, "ap ap add nil 1"));
        check!(found.as_ref() == "nil");
        let_assert!(Err(EvalError::NotAnInteger(found)) = eval(&mut interp, "ap neg ap add 1"));
        check!(found.as_ref() == "ap add 1");
        check!(
            eval(&mut interp, "ap neg -9223372036854775808") == Err(EvalError::Overflow)
        );
        check!(
            eval(&mut interp, "ap ap div -9223372036854775808 -1") == Err(EvalError::Overflow)
        );
    }

    #[test]
    fn runaway_reduction_runs_out_of_fuel() {
        let limits = Limits {
            fuel: 10_000,
            ..Limits::default()
        };
        let_assert!(Ok(mut interp) = Interpreter::load("spin = ap i spin", limits));
        let_assert!(Ok(spin) = interp.parse("spin"));
        let_assert!(Err(EvalError::OutOfFuel(_)) = interp.evaluate(spin));

        // fuel is refilled per top-level evaluation
        check!(eval(&mut interp, "ap ap add 1 1").as_deref() == Ok("2"));
    }

    #[test]
    fn deep_recursion_is_reported() {
        let limits = Limits {
            max_depth: 100,
            ..Limits::default()
        };
        let_assert!(Ok(mut interp) = Interpreter::load("deep = ap ap add 1 deep", limits));
        check!(eval(&mut interp, "deep") == Err(EvalError::DepthExceeded(100)));
    }

    #[test]
    fn default_limits_stop_before_the_stack_does() {
        let limits = Limits::default();
        let_assert!(Ok(mut interp) = Interpreter::load("deep = ap ap add 1 deep", limits));
        check!(eval(&mut interp, "deep") == Err(EvalError::DepthExceeded(limits.max_depth)));
    }

    #[test]
    fn long_lists_force_under_default_limits() {
        let mut interp = interpreter("");
        let list = Value::list((0..20_000).map(Value::Integer));
        let handle = interp.world_mut().intern_value(&list);
        check!(interp.force_value(handle) == Ok(list.clone()));
        // interned data is already reduced
        check!(interp.steps() == 0);
        check!(interp.world_mut().intern_value(&list) == handle);
    }

    #[test]
    fn force_value_reduces_nested_data() {
        let mut interp = interpreter("xs = ap ap cons ap inc 0 ap ap cons ap ap cons 2 3 nil\ninc = ap add 1");
        check!(
            eval_value(&mut interp, "xs")
                == Ok(Value::list([1.into(), (2, 3).into()]))
        );
        check!(eval_value(&mut interp, "ap neg 5") == Ok(Value::Integer(-5)));
        let_assert!(
            Err(EvalError::UnexpectedShape { found, .. }) = eval_value(&mut interp, "ap ap cons add nil")
        );
        check!(found.as_ref() == "add");
    }
}
