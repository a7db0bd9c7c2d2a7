//! Three-address intermediate representation
//!
//! A method body is a flat list of [`Stmt`]s addressed by their position.
//! Branches name the index of their target statement. Operands of calls,
//! casts and heap accesses are always variables; binary expressions may
//! nest, which keeps hand-written test programs short.

mod types;

pub use types::{PrimitiveType, Type};

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A local variable of one method, identified by name and declared type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Var {
    pub name: String,
    pub ty: Type,
}

impl Var {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, Type::Primitive(PrimitiveType::Int))
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, Type::Primitive(PrimitiveType::Boolean))
    }

    pub fn object(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self::new(name, Type::Class(class.into()))
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Var {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, ty) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidVar(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidVar(s.to_string()));
        }
        Ok(Self::new(name, ty.trim().parse()?))
    }
}

impl TryFrom<String> for Var {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Var> for String {
    fn from(var: Var) -> Self {
        format!("{}:{}", var.name, var.ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftOp {
    Shl,
    Shr,
    Ushr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitwiseOp {
    Or,
    And,
    Xor,
}

/// Operator of a binary expression, grouped by operator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BinaryOp {
    Arithmetic(ArithmeticOp),
    Condition(ConditionOp),
    Shift(ShiftOp),
    Bitwise(BitwiseOp),
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Arithmetic(op) => match op {
                ArithmeticOp::Add => "+",
                ArithmeticOp::Sub => "-",
                ArithmeticOp::Mul => "*",
                ArithmeticOp::Div => "/",
                ArithmeticOp::Rem => "%",
            },
            BinaryOp::Condition(op) => match op {
                ConditionOp::Eq => "==",
                ConditionOp::Ne => "!=",
                ConditionOp::Lt => "<",
                ConditionOp::Gt => ">",
                ConditionOp::Le => "<=",
                ConditionOp::Ge => ">=",
            },
            BinaryOp::Shift(op) => match op {
                ShiftOp::Shl => "<<",
                ShiftOp::Shr => ">>",
                ShiftOp::Ushr => ">>>",
            },
            BinaryOp::Bitwise(op) => match op {
                BitwiseOp::Or => "|",
                BitwiseOp::And => "&",
                BitwiseOp::Xor => "^",
            },
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for BinaryOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "+" => BinaryOp::Arithmetic(ArithmeticOp::Add),
            "-" => BinaryOp::Arithmetic(ArithmeticOp::Sub),
            "*" => BinaryOp::Arithmetic(ArithmeticOp::Mul),
            "/" => BinaryOp::Arithmetic(ArithmeticOp::Div),
            "%" => BinaryOp::Arithmetic(ArithmeticOp::Rem),
            "==" => BinaryOp::Condition(ConditionOp::Eq),
            "!=" => BinaryOp::Condition(ConditionOp::Ne),
            "<" => BinaryOp::Condition(ConditionOp::Lt),
            ">" => BinaryOp::Condition(ConditionOp::Gt),
            "<=" => BinaryOp::Condition(ConditionOp::Le),
            ">=" => BinaryOp::Condition(ConditionOp::Ge),
            "<<" => BinaryOp::Shift(ShiftOp::Shl),
            ">>" => BinaryOp::Shift(ShiftOp::Shr),
            ">>>" => BinaryOp::Shift(ShiftOp::Ushr),
            "|" => BinaryOp::Bitwise(BitwiseOp::Or),
            "&" => BinaryOp::Bitwise(BitwiseOp::And),
            "^" => BinaryOp::Bitwise(BitwiseOp::Xor),
            _ => return Err(Error::InvalidOperator(s.to_string())),
        };
        Ok(op)
    }
}

impl TryFrom<String> for BinaryOp {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BinaryOp> for String {
    fn from(op: BinaryOp) -> Self {
        op.symbol().to_string()
    }
}

/// Right-hand side expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exp {
    IntLiteral(i64),
    StringLiteral(String),
    NullLiteral,
    Var(Var),
    Binary {
        op: BinaryOp,
        lhs: Box<Exp>,
        rhs: Box<Exp>,
    },
    Neg(Var),
    /// Object or array allocation
    New(Type),
    Cast {
        ty: Type,
        value: Var,
    },
    InstanceField {
        base: Var,
        field: String,
    },
    StaticField {
        class: String,
        field: String,
    },
    ArrayAccess {
        base: Var,
        index: Var,
    },
}

impl Exp {
    pub fn var(var: &Var) -> Self {
        Exp::Var(var.clone())
    }

    pub fn binary(op: BinaryOp, lhs: Exp, rhs: Exp) -> Self {
        Exp::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Variables read when evaluating this expression
    pub fn uses(&self) -> Vec<&Var> {
        let mut uses = Vec::new();
        self.collect_uses(&mut uses);
        uses
    }

    fn collect_uses<'a>(&'a self, uses: &mut Vec<&'a Var>) {
        match self {
            Exp::IntLiteral(_) | Exp::StringLiteral(_) | Exp::NullLiteral => {}
            Exp::New(_) | Exp::StaticField { .. } => {}
            Exp::Var(var) | Exp::Neg(var) => uses.push(var),
            Exp::Binary { lhs, rhs, .. } => {
                lhs.collect_uses(uses);
                rhs.collect_uses(uses);
            }
            Exp::Cast { value, .. } => uses.push(value),
            Exp::InstanceField { base, .. } => uses.push(base),
            Exp::ArrayAccess { base, index } => {
                uses.push(base);
                uses.push(index);
            }
        }
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::IntLiteral(value) => write!(f, "{value}"),
            Exp::StringLiteral(value) => write!(f, "{value:?}"),
            Exp::NullLiteral => f.write_str("null"),
            Exp::Var(var) => write!(f, "{var}"),
            Exp::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Exp::Neg(var) => write!(f, "-{var}"),
            Exp::New(ty) => write!(f, "new {ty}"),
            Exp::Cast { ty, value } => write!(f, "({ty}) {value}"),
            Exp::InstanceField { base, field } => write!(f, "{base}.{field}"),
            Exp::StaticField { class, field } => write!(f, "{class}.{field}"),
            Exp::ArrayAccess { base, index } => write!(f, "{base}[{index}]"),
        }
    }
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LValue {
    Var(Var),
    InstanceField { base: Var, field: String },
    StaticField { class: String, field: String },
    Array { base: Var, index: Var },
}

impl fmt::Display for LValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LValue::Var(var) => write!(f, "{var}"),
            LValue::InstanceField { base, field } => write!(f, "{base}.{field}"),
            LValue::StaticField { class, field } => write!(f, "{class}.{field}"),
            LValue::Array { base, index } => write!(f, "{base}[{index}]"),
        }
    }
}

/// Dispatch kind of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Static,
    Special,
    Virtual,
    Interface,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallKind::Static => "invokestatic",
            CallKind::Special => "invokespecial",
            CallKind::Virtual => "invokevirtual",
            CallKind::Interface => "invokeinterface",
        })
    }
}

/// Method subsignature: return type, name and parameter types, e.g. `int add(int,int)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subsignature(pub String);

impl Subsignature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subsignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Symbolic reference to a method as written at a call site
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodRef {
    pub class: String,
    pub subsignature: Subsignature,
}

impl MethodRef {
    pub fn new(class: impl Into<String>, subsignature: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            subsignature: Subsignature::new(subsignature),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", self.class, self.subsignature)
    }
}

impl FromStr for MethodRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| Error::InvalidSignature(s.to_string()))?;
        let (class, subsignature) = inner
            .split_once(": ")
            .ok_or_else(|| Error::InvalidSignature(s.to_string()))?;
        if class.is_empty() || subsignature.is_empty() {
            return Err(Error::InvalidSignature(s.to_string()));
        }
        Ok(Self::new(class, subsignature))
    }
}

impl TryFrom<String> for MethodRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MethodRef> for String {
    fn from(method_ref: MethodRef) -> Self {
        method_ref.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvokeExp {
    pub kind: CallKind,
    pub method_ref: MethodRef,
    #[serde(default)]
    pub receiver: Option<Var>,
    #[serde(default)]
    pub args: Vec<Var>,
}

impl fmt::Display for InvokeExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.kind)?;
        if let Some(receiver) = &self.receiver {
            write!(f, "{receiver}.")?;
        }
        write!(f, "{}(", self.method_ref)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// A statement; branch targets are statement indices in the same body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stmt {
    Nop,
    Assign {
        lvalue: LValue,
        rvalue: Exp,
    },
    If {
        condition: Exp,
        target: usize,
    },
    Goto {
        target: usize,
    },
    Switch {
        var: Var,
        cases: Vec<(i64, usize)>,
        default: usize,
    },
    Invoke {
        #[serde(default)]
        result: Option<Var>,
        call: InvokeExp,
    },
    Return {
        #[serde(default)]
        value: Option<Var>,
    },
}

impl Stmt {
    pub fn assign(var: &Var, rvalue: Exp) -> Self {
        Stmt::Assign {
            lvalue: LValue::Var(var.clone()),
            rvalue,
        }
    }

    /// The variable this statement defines, if any
    pub fn def(&self) -> Option<&Var> {
        match self {
            Stmt::Assign {
                lvalue: LValue::Var(var),
                ..
            } => Some(var),
            Stmt::Invoke { result, .. } => result.as_ref(),
            _ => None,
        }
    }

    /// Variables this statement reads
    pub fn uses(&self) -> Vec<&Var> {
        match self {
            Stmt::Nop | Stmt::Goto { .. } => Vec::new(),
            Stmt::Assign { lvalue, rvalue } => {
                let mut uses = rvalue.uses();
                match lvalue {
                    LValue::Var(_) | LValue::StaticField { .. } => {}
                    LValue::InstanceField { base, .. } => uses.push(base),
                    LValue::Array { base, index } => {
                        uses.push(base);
                        uses.push(index);
                    }
                }
                uses
            }
            Stmt::If { condition, .. } => condition.uses(),
            Stmt::Switch { var, .. } => vec![var],
            Stmt::Invoke { call, .. } => call.receiver.iter().chain(call.args.iter()).collect(),
            Stmt::Return { value } => value.iter().collect(),
        }
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self, Stmt::Invoke { .. })
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Nop => f.write_str("nop"),
            Stmt::Assign { lvalue, rvalue } => write!(f, "{lvalue} = {rvalue}"),
            Stmt::If { condition, target } => write!(f, "if ({condition}) goto {target}"),
            Stmt::Goto { target } => write!(f, "goto {target}"),
            Stmt::Switch {
                var,
                cases,
                default,
            } => {
                write!(f, "switch ({var}) {{")?;
                for (value, target) in cases {
                    write!(f, "case {value}: goto {target}; ")?;
                }
                write!(f, "default: goto {default};}}")
            }
            Stmt::Invoke { result, call } => match result {
                Some(result) => write!(f, "{result} = {call}"),
                None => write!(f, "{call}"),
            },
            Stmt::Return { value } => match value {
                Some(value) => write!(f, "return {value}"),
                None => f.write_str("return"),
            },
        }
    }
}

/// Body of a concrete method
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ir {
    pub this: Option<Var>,
    pub params: Vec<Var>,
    pub stmts: Vec<Stmt>,
}

impl Ir {
    pub fn new(params: Vec<Var>, stmts: Vec<Stmt>) -> Self {
        Self {
            this: None,
            params,
            stmts,
        }
    }

    pub fn with_this(mut self, this: Var) -> Self {
        self.this = Some(this);
        self
    }

    pub fn stmt(&self, index: usize) -> Option<&Stmt> {
        self.stmts.get(index)
    }

    /// Distinct variables returned by the body's `return` statements
    pub fn return_vars(&self) -> Vec<&Var> {
        let mut vars: Vec<&Var> = Vec::new();
        for stmt in &self.stmts {
            if let Stmt::Return { value: Some(var) } = stmt {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
        }
        vars
    }

    /// Call sites of the body as `(statement index, invocation)`
    pub fn call_sites(&self) -> impl Iterator<Item = (usize, &InvokeExp)> + '_ {
        self.stmts.iter().enumerate().filter_map(|(index, stmt)| match stmt {
            Stmt::Invoke { call, .. } => Some((index, call)),
            _ => None,
        })
    }
}

/// Index of a method in its [`Program`](crate::Program)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub usize);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub id: MethodId,
    pub class: String,
    pub subsignature: Subsignature,
    pub is_abstract: bool,
    pub is_static: bool,
    pub ir: Option<Ir>,
}

impl Method {
    pub fn method_ref(&self) -> MethodRef {
        MethodRef {
            class: self.class.clone(),
            subsignature: self.subsignature.clone(),
        }
    }

    pub fn signature(&self) -> String {
        self.method_ref().to_string()
    }

    pub fn params(&self) -> &[Var] {
        self.ir.as_ref().map_or(&[], |ir| ir.params.as_slice())
    }
}
