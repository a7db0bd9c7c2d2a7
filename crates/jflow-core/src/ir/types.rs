//! Declared types of IR variables

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Byte,
    Short,
    Int,
    Char,
    Boolean,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Char => "char",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "byte" => PrimitiveType::Byte,
            "short" => PrimitiveType::Short,
            "int" => PrimitiveType::Int,
            "char" => PrimitiveType::Char,
            "boolean" => PrimitiveType::Boolean,
            "long" => PrimitiveType::Long,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            _ => return None,
        };
        Some(ty)
    }
}

/// A declared type, written the way Java source spells it (`int`, `A`, `int[]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Type {
    Void,
    Primitive(PrimitiveType),
    Class(String),
    Array(Box<Type>),
}

impl Type {
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Primitive(p) => f.write_str(p.name()),
            Type::Class(name) => f.write_str(name),
            Type::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

impl FromStr for Type {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(elem) = s.strip_suffix("[]") {
            return Ok(Type::Array(Box::new(elem.parse()?)));
        }
        if s == "void" {
            return Ok(Type::Void);
        }
        if let Some(p) = PrimitiveType::from_name(s) {
            return Ok(Type::Primitive(p));
        }
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && s.chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'));
        if valid {
            Ok(Type::Class(s.to_string()))
        } else {
            Err(Error::InvalidType(s.to_string()))
        }
    }
}

impl TryFrom<String> for Type {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Type> for String {
    fn from(ty: Type) -> Self {
        ty.to_string()
    }
}
