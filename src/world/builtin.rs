use core::fmt;

/// The fixed combinator vocabulary. Names are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // pairs and selectors
    Cons,
    T,
    F,
    Nil,

    // unary
    Neg,
    I,
    IsNil,
    Car,
    Cdr,

    // integer arithmetic and comparison
    Add,
    Mul,
    Div,
    Lt,
    Eq,

    // combinators
    S,
    C,
    B,
}

impl Builtin {
    /// In declaration order, so `ALL[b as usize] == b`
    pub const ALL: [Builtin; 17] = [
        Self::Cons,
        Self::T,
        Self::F,
        Self::Nil,
        Self::Neg,
        Self::I,
        Self::IsNil,
        Self::Car,
        Self::Cdr,
        Self::Add,
        Self::Mul,
        Self::Div,
        Self::Lt,
        Self::Eq,
        Self::S,
        Self::C,
        Self::B,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Cons => "cons",
            Self::T => "t",
            Self::F => "f",
            Self::Nil => "nil",
            Self::Neg => "neg",
            Self::I => "i",
            Self::IsNil => "isnil",
            Self::Car => "car",
            Self::Cdr => "cdr",
            Self::Add => "add",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Lt => "lt",
            Self::Eq => "eq",
            Self::S => "s",
            Self::C => "c",
            Self::B => "b",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
