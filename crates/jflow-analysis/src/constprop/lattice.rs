//! Constant lattice for integer propagation
//!
//! Three levels, ordered `Undef ⊑ Constant(c) ⊑ Nac`:
//! - `Undef` (bottom) = no value has reached this point yet
//! - `Constant(c)` = always the integer `c`; distinct constants are incomparable
//! - `Nac` (top) = not a constant
//!
//! Meet moves up the order: `Undef` is its identity and `Nac` absorbs.

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Undef,
    Constant(i64),
    Nac,
}

impl Value {
    pub fn is_undef(self) -> bool {
        matches!(self, Value::Undef)
    }

    pub fn is_constant(self) -> bool {
        matches!(self, Value::Constant(_))
    }

    pub fn is_nac(self) -> bool {
        matches!(self, Value::Nac)
    }

    pub fn as_constant(self) -> Option<i64> {
        match self {
            Value::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Least value above both operands in the `Undef ⊑ Constant ⊑ Nac` order
    pub fn meet(self, other: Value) -> Value {
        match (self, other) {
            (Value::Nac, _) | (_, Value::Nac) => Value::Nac,
            (Value::Undef, v) | (v, Value::Undef) => v,
            (Value::Constant(a), Value::Constant(b)) if a == b => Value::Constant(a),
            (Value::Constant(_), Value::Constant(_)) => Value::Nac,
        }
    }

    /// `self ⊑ other`
    pub fn is_at_most(self, other: Value) -> bool {
        self.meet(other) == other
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => f.write_str("UNDEF"),
            Value::Constant(c) => write!(f, "{c}"),
            Value::Nac => f.write_str("NAC"),
        }
    }
}

/// Constants serialize as JSON numbers, the other levels as `"UNDEF"` / `"NAC"`
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Constant(c) => serializer.serialize_i64(*c),
            Value::Undef => serializer.serialize_str("UNDEF"),
            Value::Nac => serializer.serialize_str("NAC"),
        }
    }
}
