//! runtimes are responsible for reading worlds and executing on its contents (relative to a specific program)

use core::fmt;
use std::collections::HashMap;

use crate::{
    parser::{parse_program, ParseError},
    world::{Expr, ExprRef, World},
};

pub mod interpreter;
pub mod protocol;

/// Errors raised by code outside the library, such as a [`protocol::Transport`]
pub struct BoxError(pub Box<dyn std::error::Error + Send + Sync>);

impl<E> From<E> for BoxError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(value: E) -> Self {
        Self(Box::new(value))
    }
}

impl fmt::Debug for BoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for BoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("function table is frozen")]
pub struct FrozenError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("`{0}` is a built-in and cannot be redefined")]
    BuiltinRedefinition(Box<str>),
    #[error(transparent)]
    Frozen(#[from] FrozenError),
}

/// Name to definition bindings of a loaded program.
///
/// Keys are interned symbol nodes, so lookups during reduction never touch
/// the symbol text. Recursion happens by looking a name up again, the table
/// never builds cyclic nodes.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    bindings: HashMap<ExprRef, ExprRef>,
    /// This will make all [`Self::define`]s fail
    is_frozen: bool,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the frozen flag. This is not a reversible operation.
    pub fn freeze(&mut self) {
        self.is_frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    pub fn get(&self, symbol: ExprRef) -> Option<ExprRef> {
        self.bindings.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binds `symbol` to `body`, replacing and returning any earlier
    /// definition.
    ///
    /// Fails if the table is frozen. `symbol` must be a symbol node.
    pub fn define(&mut self, symbol: ExprRef, body: ExprRef) -> Result<Option<ExprRef>, FrozenError> {
        (!self.is_frozen)
            .then(|| self.bindings.insert(symbol, body))
            .ok_or(FrozenError)
    }

    /// Parses a program listing and binds every definition in it
    pub fn load(&mut self, world: &mut World, source: &str) -> Result<(), LoadError> {
        if self.is_frozen {
            return Err(FrozenError.into());
        }
        let definitions = parse_program(world, source)?;
        tracing::debug!(definitions = definitions.len(), "loading program");
        for definition in definitions {
            let symbol = world.intern_symbol(&definition.name);
            if let Expr::Symbol(sym) = world.expr(symbol) {
                if sym.builtin().is_some() {
                    return Err(LoadError::BuiltinRedefinition(definition.name));
                }
            }
            if self.define(symbol, definition.body)?.is_some() {
                tracing::warn!(name = %definition.name, "definition replaces an earlier one");
            }
        }
        Ok(())
    }
}
