//! Integration coverage for `verify_component` over components built by
//! running the real pass, rather than hand-crafted violations (those live
//! as unit tests inside `verify.rs` itself).

use auto_memo::*;

fn ids() -> IdGen {
    let _ = env_logger::builder().is_test(true).try_init();
    IdGen::new()
}

fn local(ids: &mut IdGen, name: &str) -> Ident {
    Ident {
        id: ids.node_id(),
        span: Span::synthetic(),
        name: name.to_string(),
        binding: Some(ids.binding_id()),
    }
}

/// A component with an `if`/`else` branch, each arm memoizing a different
/// expression: both branch scopes allocate their own header off the root,
/// and every slot they allocate must show up as either a read or a write.
#[test]
fn branching_memoization_satisfies_every_invariant() {
    let mut ids = ids();
    let flag = local(&mut ids, "flag");
    let a = local(&mut ids, "a");
    let b = local(&mut ids, "b");

    let memo_of = |ids: &mut IdGen, target: &Ident| {
        let factory = Expr::FunctionExpr {
            id: ids.node_id(),
            span: Span::synthetic(),
            function: Function {
                params: vec![],
                body: FunctionBody::Expression(Box::new(Expr::Ident(target.clone()))),
                is_arrow: true,
            },
        };
        let deps = Expr::Array {
            id: ids.node_id(),
            span: Span::synthetic(),
            elements: vec![ArrayElement::Item(Expr::Ident(target.clone()))],
        };
        Expr::Call {
            id: ids.node_id(),
            span: Span::synthetic(),
            callee: Box::new(Expr::Ident(Ident {
                id: ids.node_id(),
                span: Span::synthetic(),
                name: "useMemo".to_string(),
                binding: None,
            })),
            args: vec![factory, deps],
            optional: false,
        }
    };

    let consequent = Stmt::Block {
        id: ids.node_id(),
        span: Span::synthetic(),
        body: vec![Stmt::Return {
            id: ids.node_id(),
            span: Span::synthetic(),
            argument: Some(memo_of(&mut ids, &a)),
        }],
    };
    let alternate = Stmt::Block {
        id: ids.node_id(),
        span: Span::synthetic(),
        body: vec![Stmt::Return {
            id: ids.node_id(),
            span: Span::synthetic(),
            argument: Some(memo_of(&mut ids, &b)),
        }],
    };
    let if_stmt = Stmt::If {
        id: ids.node_id(),
        span: Span::synthetic(),
        test: Expr::Ident(flag.clone()),
        consequent: Box::new(consequent),
        alternate: Some(Box::new(alternate)),
    };

    let component = Component {
        name: "Branchy".to_string(),
        params: vec![Pattern::Ident(flag), Pattern::Ident(a), Pattern::Ident(b)],
        body: vec![if_stmt],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("all invariants hold across both branches");
}

/// Expressions built entirely out of literals and foreign globals never
/// allocate a cache slot at all: `verify_component` trivially accepts a
/// component with zero headers.
#[test]
fn purely_constant_component_allocates_no_headers() {
    let mut ids = ids();
    let math_max = Expr::Call {
        id: ids.node_id(),
        span: Span::synthetic(),
        callee: Box::new(Expr::Member {
            id: ids.node_id(),
            span: Span::synthetic(),
            object: Box::new(Expr::Ident(Ident {
                id: ids.node_id(),
                span: Span::synthetic(),
                name: "Math".to_string(),
                binding: None,
            })),
            property: PropKey::Static("max".to_string()),
            optional: false,
        }),
        args: vec![
            Expr::Number {
                id: ids.node_id(),
                span: Span::synthetic(),
                value: 1.0,
            },
            Expr::Number {
                id: ids.node_id(),
                span: Span::synthetic(),
                value: 2.0,
            },
        ],
        optional: false,
    };
    let component = Component {
        name: "Constant".to_string(),
        params: vec![],
        body: vec![Stmt::Return {
            id: ids.node_id(),
            span: Span::synthetic(),
            argument: Some(math_max),
        }],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("no headers, no violations");
    assert!(!print_component(&optimized).contains("cache("));
}
