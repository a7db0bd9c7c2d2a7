//! Intraprocedural constant propagation over integer-like variables

mod lattice;

pub use lattice::Value;

use crate::error::AnalysisError;
use crate::fact::CpFact;
use crate::solver::{DataflowAnalysis, DataflowResult, Solver};
use jflow_core::{
    ArithmeticOp, BinaryOp, BitwiseOp, Cfg, ConditionOp, Exp, LValue, NodeId, PrimitiveType,
    ShiftOp, Stmt, Type, Var,
};
use tracing::trace;

/// Forward must-constant analysis; facts are [`CpFact`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantPropagation;

impl ConstantPropagation {
    pub const ID: &'static str = "constprop";

    /// Solves constant propagation for one method CFG
    pub fn analyze(cfg: &Cfg<'_>) -> Result<DataflowResult<NodeId, CpFact>, AnalysisError> {
        Solver::solve(&ConstantPropagation, cfg)
    }

    /// Only variables of 32-bit-or-narrower integral types are tracked
    pub fn can_hold_int(var: &Var) -> bool {
        matches!(
            var.ty,
            Type::Primitive(
                PrimitiveType::Byte
                    | PrimitiveType::Short
                    | PrimitiveType::Int
                    | PrimitiveType::Char
                    | PrimitiveType::Boolean
            )
        )
    }

    /// Every trackable parameter is unknown on method entry
    pub fn boundary_fact<'a>(params: impl IntoIterator<Item = &'a Var>) -> CpFact {
        params
            .into_iter()
            .filter(|param| Self::can_hold_int(param))
            .map(|param| (param.clone(), Value::Nac))
            .collect()
    }

    pub fn meet_value(v1: Value, v2: Value) -> Value {
        v1.meet(v2)
    }

    /// Meets every binding of `fact` into `target`
    pub fn meet_facts(fact: &CpFact, target: &mut CpFact) {
        for (var, value) in fact.iter() {
            let met = Self::meet_value(value, target.get(var));
            target.update(var.clone(), met);
        }
    }

    /// Abstract value of `exp` under the facts in `input`
    ///
    /// Integer literals are constants, narrowed to `int` the way a Java
    /// cast would, and variables read their binding.
    /// Binary expressions fold when both operands are constant; division or
    /// remainder by a known zero is `Undef`, checked before the `Nac`
    /// shortcut. Anything else is `Nac`.
    pub fn evaluate(exp: &Exp, input: &CpFact) -> Value {
        match exp {
            Exp::IntLiteral(value) => Value::Constant(i64::from(*value as i32)),
            Exp::Var(var) => input.get(var),
            Exp::Binary { op, lhs, rhs } => {
                let v1 = Self::evaluate(lhs, input);
                let v2 = Self::evaluate(rhs, input);
                let divides = matches!(
                    op,
                    BinaryOp::Arithmetic(ArithmeticOp::Div | ArithmeticOp::Rem)
                );
                if divides && matches!(v2, Value::Constant(c) if c as i32 == 0) {
                    return Value::Undef;
                }
                match (v1, v2) {
                    (Value::Nac, _) | (_, Value::Nac) => Value::Nac,
                    (Value::Constant(a), Value::Constant(b)) => Value::Constant(fold(*op, a, b)),
                    _ => Value::Undef,
                }
            }
            _ => Value::Nac,
        }
    }

    /// Statement-level transfer shared with the interprocedural analysis
    pub fn transfer_stmt(stmt: Option<&Stmt>, input: &CpFact, output: &mut CpFact) -> bool {
        let old = output.clone();
        output.copy_from(input);
        match stmt {
            Some(Stmt::Assign {
                lvalue: LValue::Var(var),
                rvalue,
            }) if Self::can_hold_int(var) => {
                let value = Self::evaluate(rvalue, input);
                trace!(%var, %value, "assign");
                output.update(var.clone(), value);
            }
            Some(Stmt::Invoke {
                result: Some(var), ..
            }) if Self::can_hold_int(var) => {
                output.update(var.clone(), Value::Nac);
            }
            _ => {}
        }
        *output != old
    }
}

/// Folds a binary operation on two constants with Java `int` semantics:
/// operands and results are 32-bit, overflow wraps and shift distances
/// use the low five bits. Division by zero never reaches here.
fn fold(op: BinaryOp, a: i64, b: i64) -> i64 {
    let (a, b) = (a as i32, b as i32);
    let folded = match op {
        BinaryOp::Arithmetic(op) => match op {
            ArithmeticOp::Add => a.wrapping_add(b),
            ArithmeticOp::Sub => a.wrapping_sub(b),
            ArithmeticOp::Mul => a.wrapping_mul(b),
            ArithmeticOp::Div => a.wrapping_div(b),
            ArithmeticOp::Rem => a.wrapping_rem(b),
        },
        BinaryOp::Condition(op) => {
            let holds = match op {
                ConditionOp::Eq => a == b,
                ConditionOp::Ne => a != b,
                ConditionOp::Lt => a < b,
                ConditionOp::Gt => a > b,
                ConditionOp::Le => a <= b,
                ConditionOp::Ge => a >= b,
            };
            i32::from(holds)
        }
        BinaryOp::Shift(op) => {
            let distance = (b & 0x1f) as u32;
            match op {
                ShiftOp::Shl => a.wrapping_shl(distance),
                ShiftOp::Shr => a.wrapping_shr(distance),
                ShiftOp::Ushr => ((a as u32) >> distance) as i32,
            }
        }
        BinaryOp::Bitwise(op) => match op {
            BitwiseOp::Or => a | b,
            BitwiseOp::And => a & b,
            BitwiseOp::Xor => a ^ b,
        },
    };
    i64::from(folded)
}

impl<'p> DataflowAnalysis<Cfg<'p>> for ConstantPropagation {
    type Fact = CpFact;

    fn new_boundary_fact(&self, cfg: &Cfg<'p>) -> CpFact {
        Self::boundary_fact(&cfg.ir().params)
    }

    fn new_initial_fact(&self) -> CpFact {
        CpFact::new()
    }

    fn meet_into(&self, fact: &CpFact, target: &mut CpFact) {
        Self::meet_facts(fact, target);
    }

    fn transfer_node(
        &self,
        cfg: &Cfg<'p>,
        node: NodeId,
        input: &CpFact,
        output: &mut CpFact,
    ) -> bool {
        Self::transfer_stmt(cfg.stmt_of(node), input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jflow_core::{CfgBuilder, FlowGraph, Ir, MethodId};
    use quickcheck_macros::quickcheck;

    fn op(symbol: &str) -> BinaryOp {
        symbol.parse().unwrap()
    }

    fn bin(symbol: &str, lhs: Exp, rhs: Exp) -> Exp {
        Exp::binary(op(symbol), lhs, rhs)
    }

    #[test]
    fn test_can_hold_int() {
        assert!(ConstantPropagation::can_hold_int(&Var::int("i")));
        assert!(ConstantPropagation::can_hold_int(&Var::boolean("b")));
        assert!(ConstantPropagation::can_hold_int(&Var::new("c", "char".parse().unwrap())));
        assert!(!ConstantPropagation::can_hold_int(&Var::new("l", "long".parse().unwrap())));
        assert!(!ConstantPropagation::can_hold_int(&Var::new("d", "double".parse().unwrap())));
        assert!(!ConstantPropagation::can_hold_int(&Var::object("o", "A")));
    }

    #[test]
    fn test_evaluate_folds_constants() {
        let fact = CpFact::new();
        let exp = bin("+", Exp::IntLiteral(1), Exp::IntLiteral(2));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(3));
        let exp = bin("<", Exp::IntLiteral(1), Exp::IntLiteral(2));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(1));
        let exp = bin(">>>", Exp::IntLiteral(-1), Exp::IntLiteral(28));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(15));
        let exp = bin(">>>", Exp::IntLiteral(-8), Exp::IntLiteral(1));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(0x7fff_fffc));
        let exp = bin(">>", Exp::IntLiteral(-8), Exp::IntLiteral(1));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(-4));
    }

    #[test]
    fn test_evaluate_division_by_zero_is_undef() {
        let x = Var::int("x");
        let fact: CpFact = [(x.clone(), Value::Nac)].into_iter().collect();
        for symbol in ["/", "%"] {
            let exp = bin(symbol, Exp::var(&x), Exp::IntLiteral(0));
            assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Undef);
        }
        let exp = bin("*", Exp::var(&x), Exp::IntLiteral(0));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Nac);
    }

    #[test]
    fn test_evaluate_undef_and_nac_operands() {
        let (x, y) = (Var::int("x"), Var::int("y"));
        let fact: CpFact = [(y.clone(), Value::Nac)].into_iter().collect();
        let exp = bin("+", Exp::var(&x), Exp::IntLiteral(1));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Undef);
        let exp = bin("+", Exp::var(&x), Exp::var(&y));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Nac);
    }

    #[test]
    fn test_evaluate_other_expressions_are_nac() {
        let fact = CpFact::new();
        let o = Var::object("o", "A");
        for exp in [
            Exp::New(Type::Class("A".into())),
            Exp::InstanceField {
                base: o.clone(),
                field: "f".into(),
            },
            Exp::NullLiteral,
            Exp::Neg(Var::int("x")),
        ] {
            assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Nac);
        }
    }

    #[test]
    fn test_overflow_wraps_at_int_width() {
        let fact = CpFact::new();
        let max = i64::from(i32::MAX);
        let min = i64::from(i32::MIN);
        let exp = bin("+", Exp::IntLiteral(max), Exp::IntLiteral(1));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(min));
        let exp = bin("*", Exp::IntLiteral(65536), Exp::IntLiteral(65536));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(0));
        let exp = bin("/", Exp::IntLiteral(min), Exp::IntLiteral(-1));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(min));
    }

    #[test]
    fn test_shift_distance_uses_low_five_bits() {
        let fact = CpFact::new();
        let exp = bin("<<", Exp::IntLiteral(1), Exp::IntLiteral(32));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(1));
        let exp = bin("<<", Exp::IntLiteral(1), Exp::IntLiteral(31));
        assert_eq!(
            ConstantPropagation::evaluate(&exp, &fact),
            Value::Constant(i64::from(i32::MIN))
        );
        let exp = bin(">>", Exp::IntLiteral(-16), Exp::IntLiteral(34));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(-4));
    }

    #[test]
    fn test_wide_literal_is_narrowed_to_int() {
        let fact = CpFact::new();
        let wide = i64::from(u32::MAX) + 6;
        assert_eq!(
            ConstantPropagation::evaluate(&Exp::IntLiteral(wide), &fact),
            Value::Constant(5)
        );
        let exp = bin("+", Exp::IntLiteral(1 << 32), Exp::IntLiteral(1));
        assert_eq!(ConstantPropagation::evaluate(&exp, &fact), Value::Constant(1));
    }

    #[quickcheck]
    fn folded_constants_fit_in_int(a: i64, b: i64) -> bool {
        let fact = CpFact::new();
        ["+", "-", "*", "<<", ">>", ">>>", "&", "|", "^"].iter().all(|symbol| {
            let exp = bin(symbol, Exp::IntLiteral(a), Exp::IntLiteral(b));
            match ConstantPropagation::evaluate(&exp, &fact) {
                Value::Constant(c) => i32::try_from(c).is_ok(),
                _ => false,
            }
        })
    }

    #[quickcheck]
    fn evaluate_is_deterministic(a: i64, b: i64) -> bool {
        let fact = CpFact::new();
        ["+", "-", "*", "/", "%", "<<", ">>", ">>>", "&", "|", "^", "==", "<"]
            .iter()
            .all(|symbol| {
                let exp = bin(symbol, Exp::IntLiteral(a), Exp::IntLiteral(b));
                ConstantPropagation::evaluate(&exp, &fact)
                    == ConstantPropagation::evaluate(&exp, &fact)
            })
    }

    #[quickcheck]
    fn addition_commutes(a: i64, b: i64) -> bool {
        let fact = CpFact::new();
        ConstantPropagation::evaluate(&bin("+", Exp::IntLiteral(a), Exp::IntLiteral(b)), &fact)
            == ConstantPropagation::evaluate(&bin("+", Exp::IntLiteral(b), Exp::IntLiteral(a)), &fact)
    }

    #[test]
    fn test_transfer_assign_and_call() {
        let (x, r) = (Var::int("x"), Var::int("r"));
        let input: CpFact = [(x.clone(), Value::Constant(2))].into_iter().collect();
        let mut output = CpFact::new();

        let stmt = Stmt::assign(&r, bin("*", Exp::var(&x), Exp::IntLiteral(3)));
        assert!(ConstantPropagation::transfer_stmt(Some(&stmt), &input, &mut output));
        assert_eq!(output.get(&r), Value::Constant(6));
        assert!(!ConstantPropagation::transfer_stmt(Some(&stmt), &input, &mut output));

        let call: Stmt = serde_json::from_str(
            r#"{ "Invoke": { "result": "r:int", "call": { "kind": "static", "method_ref": "<A: int f()>" } } }"#,
        )
        .unwrap();
        assert!(ConstantPropagation::transfer_stmt(Some(&call), &input, &mut output));
        assert_eq!(output.get(&r), Value::Nac);
    }

    #[test]
    fn test_transfer_ignores_untracked_defs() {
        let l = Var::new("l", "long".parse().unwrap());
        let stmt = Stmt::assign(&l, Exp::IntLiteral(1));
        let mut output = CpFact::new();
        assert!(!ConstantPropagation::transfer_stmt(Some(&stmt), &CpFact::new(), &mut output));
        assert!(output.is_empty());
    }

    #[test]
    fn test_parameters_start_nac() {
        let (a, s) = (Var::int("a"), Var::object("s", "java.lang.String"));
        let x = Var::int("x");
        let ir = Ir::new(
            vec![a.clone(), s],
            vec![
                Stmt::assign(&x, bin("+", Exp::var(&a), Exp::IntLiteral(1))),
                Stmt::Return { value: Some(x.clone()) },
            ],
        );
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        let result = ConstantPropagation::analyze(&cfg).unwrap();

        let boundary = result.out_fact(&cfg.entry()).unwrap();
        assert_eq!(boundary.len(), 1);
        assert_eq!(boundary.get(&a), Value::Nac);
        assert_eq!(result.out_fact(&NodeId::of_stmt(0)).unwrap().get(&x), Value::Nac);
    }

    #[test]
    fn test_meet_into_merges_branches() {
        let (x, y) = (Var::int("x"), Var::int("y"));
        let a: CpFact = [(x.clone(), Value::Constant(1)), (y.clone(), Value::Constant(2))]
            .into_iter()
            .collect();
        let b: CpFact = [(x.clone(), Value::Constant(1)), (y.clone(), Value::Constant(3))]
            .into_iter()
            .collect();
        let mut target = CpFact::new();
        ConstantPropagation::meet_facts(&a, &mut target);
        ConstantPropagation::meet_facts(&b, &mut target);
        assert_eq!(target.get(&x), Value::Constant(1));
        assert_eq!(target.get(&y), Value::Nac);
    }
}
