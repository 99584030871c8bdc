//! The `0`/`1` wire encoding exchanged with the remote peer.
//!
//! | value | bits |
//! |---|---|
//! | `nil` | `00` |
//! | `(a, b)` | `11` a b |
//! | `n >= 0` | `01` unary(k) magnitude |
//! | `n < 0` | `10` unary(k) magnitude |
//!
//! `unary(k)` is `k` ones and a closing zero, the magnitude follows in exactly
//! `4k` bits, most significant first.

use std::fmt::Write;

use crate::world::{
    value::{Integer, Value},
    ExprRef, World,
};

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum CodecError {
    #[error("unknown type tag `{tag}` at bit {offset}")]
    UnknownTag { tag: Box<str>, offset: usize },
    #[error("input ends at bit {offset} in the middle of a value")]
    Truncated { offset: usize },
    #[error("{count} unconsumed bits after a complete value")]
    TrailingBits { count: usize },
    #[error("invalid character {found:?} at position {offset}, expected `0` or `1`")]
    InvalidCharacter { found: char, offset: usize },
    #[error("magnitude at bit {offset} does not fit in a 64-bit integer")]
    MagnitudeTooLarge { offset: usize },
    #[error("`{0}` is not nil, an integer or a pair")]
    NotModulatable(Box<str>),
}

fn push_number(out: &mut String, number: Integer) {
    out.push_str(if number >= 0 { "01" } else { "10" });
    let magnitude = number.unsigned_abs();
    let groups = (u64::BITS - magnitude.leading_zeros()).div_ceil(4) as usize;
    for _ in 0..groups {
        out.push('1');
    }
    out.push('0');
    if groups > 0 {
        // writing into a String cannot fail
        _ = write!(out, "{magnitude:0width$b}", width = groups * 4);
    }
}

fn push_value(out: &mut String, value: &Value) {
    // pre-order: a pair's tag, then its head, then its tail
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Nil => out.push_str("00"),
            Value::Integer(int) => push_number(out, *int),
            Value::Cons(head, tail) => {
                out.push_str("11");
                pending.push(tail);
                pending.push(head);
            }
        }
    }
}

pub fn modulate_number(number: Integer) -> String {
    let mut out = String::new();
    push_number(&mut out, number);
    out
}

pub fn modulate_value(value: &Value) -> String {
    let mut out = String::new();
    push_value(&mut out, value);
    out
}

/// Modulates a reduced expression. Fails when the expression is not a plain
/// nil/integer/pair tree.
pub fn modulate(world: &World, expr: ExprRef) -> Result<String, CodecError> {
    let value = world
        .to_value(expr)
        .ok_or_else(|| CodecError::NotModulatable(world.display(expr).to_string().into()))?;
    Ok(modulate_value(&value))
}

/// Cursor over the bit string; offsets in errors are relative to the start
/// of the original input.
struct Bits<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Bits<'a> {
    fn new(input: &'a str) -> Result<Self, CodecError> {
        if let Some((offset, found)) = input.char_indices().find(|(_, c)| !matches!(c, '0' | '1')) {
            return Err(CodecError::InvalidCharacter { found, offset });
        }
        Ok(Self { input, offset: 0 })
    }

    fn rest(&self) -> &'a str {
        &self.input[self.offset..]
    }

    fn bit(&mut self) -> Result<bool, CodecError> {
        match self.rest().as_bytes().first() {
            Some(b) => {
                self.offset += 1;
                Ok(*b == b'1')
            }
            None => Err(CodecError::Truncated {
                offset: self.offset,
            }),
        }
    }

    fn tag(&mut self) -> Result<(bool, bool), CodecError> {
        Ok((self.bit()?, self.bit()?))
    }

    fn number(&mut self, negative: bool) -> Result<Integer, CodecError> {
        let start = self.offset;
        let mut groups = 0usize;
        while self.bit()? {
            groups += 1;
        }
        // 2^63 is the largest magnitude any i64 can have
        const LIMIT: u64 = 1 << 63;
        let mut magnitude: u64 = 0;
        for _ in 0..groups * 4 {
            let bit = u64::from(self.bit()?);
            magnitude = match magnitude.checked_mul(2) {
                Some(shifted) if shifted + bit <= LIMIT => shifted + bit,
                _ => return Err(CodecError::MagnitudeTooLarge { offset: start }),
            };
        }
        if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            Integer::try_from(magnitude).ok()
        }
        .ok_or(CodecError::MagnitudeTooLarge { offset: start })
    }

    fn value(&mut self) -> Result<Value, CodecError> {
        // peer data can nest arbitrarily deep through heads as well as tails,
        // so open pairs are counted on the heap instead of recursing
        enum Slot {
            Head,
            Tail(Value),
        }
        let mut open: Vec<Slot> = vec![];
        loop {
            let mut done = match self.tag()? {
                (false, false) => Value::Nil,
                (false, true) => Value::Integer(self.number(false)?),
                (true, false) => Value::Integer(self.number(true)?),
                (true, true) => {
                    open.push(Slot::Head);
                    continue;
                }
            };
            loop {
                match open.pop() {
                    None => return Ok(done),
                    Some(Slot::Head) => {
                        open.push(Slot::Tail(done));
                        break;
                    }
                    Some(Slot::Tail(head)) => done = Value::pair(head, done),
                }
            }
        }
    }
}

/// Decodes one value from the front of `bits` and hands back what is left
pub fn demodulate_prefix(bits: &str) -> Result<(Value, &str), CodecError> {
    let mut cursor = Bits::new(bits)?;
    let value = cursor.value()?;
    Ok((value, cursor.rest()))
}

pub fn demodulate_value(bits: &str) -> Result<Value, CodecError> {
    match demodulate_prefix(bits)? {
        (value, "") => Ok(value),
        (_, rest) => Err(CodecError::TrailingBits { count: rest.len() }),
    }
}

pub fn demodulate_number(bits: &str) -> Result<Integer, CodecError> {
    let mut cursor = Bits::new(bits)?;
    let number = match cursor.tag()? {
        (false, true) => cursor.number(false)?,
        (true, false) => cursor.number(true)?,
        (a, b) => {
            return Err(CodecError::UnknownTag {
                tag: format!("{}{}", u8::from(a), u8::from(b)).into(),
                offset: 0,
            })
        }
    };
    match cursor.rest().len() {
        0 => Ok(number),
        count => Err(CodecError::TrailingBits { count }),
    }
}

/// Demodulates straight into interned expression nodes
pub fn demodulate(world: &mut World, bits: &str) -> Result<ExprRef, CodecError> {
    let value = demodulate_value(bits)?;
    Ok(world.intern_value(&value))
}
