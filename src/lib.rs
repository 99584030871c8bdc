pub mod lexer;
pub mod modem;
pub mod parser;
pub mod runtime;
pub mod world;

pub use parser::{parse_expr, parse_program, Definition, ParseError};
pub use runtime::{
    interpreter::{EvalError, Interpreter, Limits},
    protocol::{Image, Point, Protocol, ProtocolError, Transport},
    BoxError, FunctionTable, LoadError,
};
pub use world::{builtin::Builtin, fuel::Fuel, value, Expr, ExprRef, World};
