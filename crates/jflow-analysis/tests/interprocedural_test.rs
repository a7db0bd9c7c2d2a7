//! Tests for interprocedural constant propagation
//!
//! Each program is built from class definitions, run through CHA, laid out
//! as an ICFG and solved; assertions read facts at statements of `main`.

use jflow_analysis::{
    ChaBuilder, CpFact, DataflowResult, Icfg, IcfgEdgeKind, IcfgNode, InterConstantPropagation,
    Value,
};
use jflow_core::{
    CallKind, ClassDef, Exp, InvokeExp, MethodDef, NodeId, Program, ProgramDef, Stmt, Var,
};

fn call(result: Option<&Var>, method_ref: &str, args: &[&Var]) -> Stmt {
    Stmt::Invoke {
        result: result.cloned(),
        call: InvokeExp {
            kind: CallKind::Static,
            method_ref: method_ref.parse().unwrap(),
            receiver: None,
            args: args.iter().map(|&arg| arg.clone()).collect(),
        },
    }
}

fn ret(var: &Var) -> Stmt {
    Stmt::Return {
        value: Some(var.clone()),
    }
}

fn add_method() -> MethodDef {
    let (x, y, r) = (Var::int("x"), Var::int("y"), Var::int("r"));
    MethodDef::concrete(
        "int add(int,int)",
        vec![x.clone(), y.clone()],
        vec![
            Stmt::assign(&r, Exp::binary("+".parse().unwrap(), Exp::var(&x), Exp::var(&y))),
            ret(&r),
        ],
    )
    .static_method()
}

fn program(methods: Vec<MethodDef>) -> Program {
    let class = methods
        .into_iter()
        .fold(ClassDef::class("Main"), |class, method| class.method(method));
    Program::new(ProgramDef {
        classes: vec![class],
        main: Some("<Main: int main()>".parse().unwrap()),
    })
    .unwrap()
}

/// Solves the whole program and hands back the result with its ICFG
fn solve(program: &Program, check: impl FnOnce(&Icfg<'_>, &DataflowResult<IcfgNode, CpFact>)) {
    let main = program.main().unwrap();
    let call_graph = ChaBuilder::new(program).build(main);
    let icfg = Icfg::build(program, &call_graph).unwrap();
    let result = InterConstantPropagation::analyze(&icfg).unwrap();
    check(&icfg, &result);
}

fn in_fact<'r>(
    program: &Program,
    result: &'r DataflowResult<IcfgNode, CpFact>,
    signature: &str,
    stmt: usize,
) -> &'r CpFact {
    let method = program.lookup(signature).unwrap();
    result
        .in_fact(&IcfgNode::new(method, NodeId::of_stmt(stmt)))
        .unwrap()
}

// ============================================================================
// Argument and return value flow
// ============================================================================

#[test]
fn test_constant_arguments_fold_through_callee() {
    let (a, b, c) = (Var::int("a"), Var::int("b"), Var::int("c"));
    let main = MethodDef::concrete(
        "int main()",
        vec![],
        vec![
            Stmt::assign(&a, Exp::IntLiteral(1)),
            Stmt::assign(&b, Exp::IntLiteral(2)),
            call(Some(&c), "<Main: int add(int,int)>", &[&a, &b]),
            ret(&c),
        ],
    )
    .static_method();
    let program = program(vec![main, add_method()]);

    solve(&program, |_, result| {
        let at_return = in_fact(&program, result, "<Main: int main()>", 3);
        assert_eq!(at_return.get(&Var::int("c")), Value::Constant(3));
        assert_eq!(at_return.get(&a), Value::Constant(1));

        let in_add = in_fact(&program, result, "<Main: int add(int,int)>", 0);
        assert_eq!(in_add.get(&Var::int("x")), Value::Constant(1));
        assert_eq!(in_add.get(&Var::int("y")), Value::Constant(2));
        // caller locals do not leak into the callee
        assert_eq!(in_add.get(&a), Value::Undef);
    });
}

#[test]
fn test_conflicting_call_sites_make_parameters_nac() {
    let (a, b, c, d) = (Var::int("a"), Var::int("b"), Var::int("c"), Var::int("d"));
    let main = MethodDef::concrete(
        "int main()",
        vec![],
        vec![
            Stmt::assign(&a, Exp::IntLiteral(1)),
            Stmt::assign(&b, Exp::IntLiteral(2)),
            call(Some(&c), "<Main: int add(int,int)>", &[&a, &b]),
            call(Some(&d), "<Main: int add(int,int)>", &[&b, &b]),
            ret(&d),
        ],
    )
    .static_method();
    let program = program(vec![main, add_method()]);

    solve(&program, |_, result| {
        let in_add = in_fact(&program, result, "<Main: int add(int,int)>", 0);
        assert_eq!(in_add.get(&Var::int("x")), Value::Nac);
        assert_eq!(in_add.get(&Var::int("y")), Value::Constant(2));

        let at_return = in_fact(&program, result, "<Main: int main()>", 4);
        assert_eq!(at_return.get(&c), Value::Nac);
        assert_eq!(at_return.get(&d), Value::Nac);
    });
}

#[test]
fn test_call_overwrites_previous_result_value() {
    let (a, c) = (Var::int("a"), Var::int("c"));
    let p = Var::int("p");
    let identity = MethodDef::concrete("int id(int)", vec![p.clone()], vec![ret(&p)]).static_method();
    let main = MethodDef::concrete(
        "int main()",
        vec![],
        vec![
            Stmt::assign(&c, Exp::IntLiteral(5)),
            Stmt::assign(&a, Exp::IntLiteral(7)),
            call(Some(&c), "<Main: int id(int)>", &[&a]),
            ret(&c),
        ],
    )
    .static_method();
    let program = program(vec![main, identity]);

    solve(&program, |_, result| {
        let at_return = in_fact(&program, result, "<Main: int main()>", 3);
        assert_eq!(at_return.get(&c), Value::Constant(7));
    });
}

#[test]
fn test_multiple_returns_are_met() {
    let (p, r, c) = (Var::int("p"), Var::int("r"), Var::int("c"));
    let a = Var::int("a");
    // 0: if (p == 0) goto 3; 1: r = 1; 2: return r; 3: q = 2; 4: return q
    let q = Var::int("q");
    let pick = MethodDef::concrete(
        "int pick(int)",
        vec![p.clone()],
        vec![
            Stmt::If {
                condition: Exp::binary("==".parse().unwrap(), Exp::var(&p), Exp::IntLiteral(0)),
                target: 3,
            },
            Stmt::assign(&r, Exp::IntLiteral(1)),
            ret(&r),
            Stmt::assign(&q, Exp::IntLiteral(2)),
            ret(&q),
        ],
    )
    .static_method();
    let main = MethodDef::concrete(
        "int main()",
        vec![],
        vec![
            Stmt::assign(&a, Exp::IntLiteral(0)),
            call(Some(&c), "<Main: int pick(int)>", &[&a]),
            ret(&c),
        ],
    )
    .static_method();
    let program = program(vec![main, pick]);

    solve(&program, |_, result| {
        // both returns are reachable in the ICFG, so the result is NAC
        let at_return = in_fact(&program, result, "<Main: int main()>", 2);
        assert_eq!(at_return.get(&c), Value::Nac);
    });
}

// ============================================================================
// Boundaries, recursion and missing bodies
// ============================================================================

#[test]
fn test_entry_parameters_are_nac() {
    let (n, m) = (Var::int("n"), Var::int("m"));
    let main = MethodDef::concrete(
        "int main()",
        vec![n.clone()],
        vec![
            Stmt::assign(&m, Exp::binary("*".parse().unwrap(), Exp::var(&n), Exp::IntLiteral(2))),
            ret(&m),
        ],
    )
    .static_method();
    let program = program(vec![main]);

    solve(&program, |_, result| {
        let at_return = in_fact(&program, result, "<Main: int main()>", 1);
        assert_eq!(at_return.get(&n), Value::Nac);
        assert_eq!(at_return.get(&m), Value::Nac);
    });
}

#[test]
fn test_recursion_reaches_fixed_point() {
    let (n, r, one) = (Var::int("n"), Var::int("r"), Var::int("one"));
    let rec = MethodDef::concrete(
        "int rec(int)",
        vec![n.clone()],
        vec![call(Some(&r), "<Main: int rec(int)>", &[&n]), ret(&r)],
    )
    .static_method();
    let main = MethodDef::concrete(
        "int main()",
        vec![],
        vec![
            Stmt::assign(&one, Exp::IntLiteral(1)),
            call(Some(&r), "<Main: int rec(int)>", &[&one]),
            ret(&r),
        ],
    )
    .static_method();
    let program = program(vec![main, rec]);

    solve(&program, |_, result| {
        let in_rec = in_fact(&program, result, "<Main: int rec(int)>", 0);
        assert_eq!(in_rec.get(&n), Value::Constant(1));
        // no path returns a defined value
        let at_return = in_fact(&program, result, "<Main: int main()>", 2);
        assert_eq!(at_return.get(&r), Value::Undef);
    });
}

#[test]
fn test_call_to_bodyless_method_leaves_result_undefined() {
    let (a, c) = (Var::int("a"), Var::int("c"));
    let native = MethodDef {
        body: None,
        ..MethodDef::concrete("int hash(int)", vec![], vec![])
    }
    .static_method();
    let main = MethodDef::concrete(
        "int main()",
        vec![],
        vec![
            Stmt::assign(&c, Exp::IntLiteral(4)),
            Stmt::assign(&a, Exp::IntLiteral(9)),
            call(Some(&c), "<Main: int hash(int)>", &[&a]),
            ret(&c),
        ],
    )
    .static_method();
    let program = program(vec![main, native]);

    solve(&program, |icfg, result| {
        let main = program.main().unwrap();
        let call_site = IcfgNode::new(main, NodeId::of_stmt(2));
        assert_eq!(icfg.callees_of(call_site).count(), 0);

        let at_return = in_fact(&program, result, "<Main: int main()>", 3);
        assert_eq!(at_return.get(&c), Value::Undef);
        assert_eq!(at_return.get(&a), Value::Constant(9));
    });
}

// ============================================================================
// ICFG shape
// ============================================================================

#[test]
fn test_icfg_edges_around_call() {
    let (a, b, c) = (Var::int("a"), Var::int("b"), Var::int("c"));
    let main = MethodDef::concrete(
        "int main()",
        vec![],
        vec![
            Stmt::assign(&a, Exp::IntLiteral(1)),
            Stmt::assign(&b, Exp::IntLiteral(2)),
            call(Some(&c), "<Main: int add(int,int)>", &[&a, &b]),
            ret(&c),
        ],
    )
    .static_method();
    let program = program(vec![main, add_method()]);

    solve(&program, |icfg, _| {
        let main = program.main().unwrap();
        let add = program.lookup("<Main: int add(int,int)>").unwrap();
        let call_site = IcfgNode::new(main, NodeId::of_stmt(2));
        let return_site = IcfgNode::new(main, NodeId::of_stmt(3));

        assert!(icfg.is_call_site(call_site));
        assert_eq!(icfg.callees_of(call_site).collect::<Vec<_>>(), vec![add]);

        let kinds: Vec<IcfgEdgeKind> = icfg.out_edges_of(call_site).iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&IcfgEdgeKind::CallToReturn));
        assert!(kinds.contains(&IcfgEdgeKind::Call));

        let into_return_site: Vec<IcfgEdgeKind> =
            icfg.in_edges_of(return_site).iter().map(|e| e.kind).collect();
        assert_eq!(into_return_site.len(), 2);
        assert!(into_return_site.contains(&IcfgEdgeKind::Return { call_site }));

        assert_eq!(icfg.entry_methods(), &[main]);
        assert_eq!(icfg.methods().count(), 2);
        assert_eq!(icfg.exit_of(add), Some(IcfgNode::new(add, NodeId(3))));
    });
}
