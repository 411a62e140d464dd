//! End-to-end scenarios built by hand against the `Component` tree, the way
//! a parser driver would hand one to the pass. No parser exists in this
//! crate, so every fixture is constructed directly with `ast.rs` types.

use auto_memo::*;

fn ids() -> IdGen {
    let _ = env_logger::builder().is_test(true).try_init();
    IdGen::new()
}

fn num(ids: &mut IdGen, v: f64) -> Expr {
    Expr::Number {
        id: ids.node_id(),
        span: Span::synthetic(),
        value: v,
    }
}

fn local(ids: &mut IdGen, name: &str) -> Ident {
    Ident {
        id: ids.node_id(),
        span: Span::synthetic(),
        name: name.to_string(),
        binding: Some(ids.binding_id()),
    }
}

fn foreign(ids: &mut IdGen, name: &str) -> Ident {
    Ident {
        id: ids.node_id(),
        span: Span::synthetic(),
        name: name.to_string(),
        binding: None,
    }
}

fn call(ids: &mut IdGen, callee: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        id: ids.node_id(),
        span: Span::synthetic(),
        callee: Box::new(Expr::Ident(foreign(ids, callee))),
        args,
        optional: false,
    }
}

fn binary(ids: &mut IdGen, op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        id: ids.node_id(),
        span: Span::synthetic(),
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn ret(ids: &mut IdGen, e: Expr) -> Stmt {
    Stmt::Return {
        id: ids.node_id(),
        span: Span::synthetic(),
        argument: Some(e),
    }
}

/// `useMemo(() => a + b, [a, b])` at the top of a component: the arrow
/// body is unwrapped and memoized directly, with one dep guard per array
/// entry AND-folded together.
#[test]
fn memoizes_a_simple_binary_expression() {
    let mut ids = ids();
    let a = local(&mut ids, "a");
    let b = local(&mut ids, "b");
    let factory = Expr::FunctionExpr {
        id: ids.node_id(),
        span: Span::synthetic(),
        function: Function {
            params: vec![],
            body: FunctionBody::Expression(Box::new(binary(
                &mut ids,
                BinaryOp::Add,
                Expr::Ident(a.clone()),
                Expr::Ident(b.clone()),
            ))),
            is_arrow: true,
        },
    };
    let deps = Expr::Array {
        id: ids.node_id(),
        span: Span::synthetic(),
        elements: vec![
            ArrayElement::Item(Expr::Ident(a.clone())),
            ArrayElement::Item(Expr::Ident(b.clone())),
        ],
    };
    let memo_call = call(&mut ids, "useMemo", vec![factory, deps]);
    let component = Component {
        name: "Sum".to_string(),
        params: vec![Pattern::Ident(a), Pattern::Ident(b)],
        body: vec![ret(&mut ids, memo_call)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
    let text = print_component(&optimized);
    assert!(text.contains("cache("));
    assert!(text.contains("?"));
}

/// `useMemo(fn)` with no dependency array: guarded by a single `equals`
/// comparison against the factory's own return value rather than an
/// AND-fold over a list.
#[test]
fn memoizes_with_an_omitted_dependency_array() {
    let mut ids = ids();
    let x = local(&mut ids, "x");
    let factory = Expr::FunctionExpr {
        id: ids.node_id(),
        span: Span::synthetic(),
        function: Function {
            params: vec![],
            body: FunctionBody::Expression(Box::new(Expr::Ident(x.clone()))),
            is_arrow: true,
        },
    };
    let memo_call = call(&mut ids, "useMemo", vec![factory]);
    let component = Component {
        name: "Omitted".to_string(),
        params: vec![Pattern::Ident(x)],
        body: vec![ret(&mut ids, memo_call)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
}

/// `useRef(0)` memoizes the call itself under the ref cache, never
/// re-invoked on subsequent renders (a constant dependency shape).
#[test]
fn use_ref_is_memoized_as_constant() {
    let mut ids = ids();
    let ref_call = call(&mut ids, "useRef", vec![num(&mut ids, 0.0)]);
    let component = Component {
        name: "Counter".to_string(),
        params: vec![],
        body: vec![ret(&mut ids, ref_call)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
    let text = print_component(&optimized);
    assert!(text.contains("ref("));
    assert!(text.contains("??"));
}

/// `useCallback(fn, deps)` memoizes the closure reference, and the
/// closure's own body is optimized under its own independent scope.
#[test]
fn use_callback_memoizes_the_closure_reference() {
    let mut ids = ids();
    let count = local(&mut ids, "count");
    let factory = Expr::FunctionExpr {
        id: ids.node_id(),
        span: Span::synthetic(),
        function: Function {
            params: vec![],
            body: FunctionBody::Block(vec![ret(
                &mut ids,
                binary(&mut ids, BinaryOp::Add, Expr::Ident(count.clone()), num(&mut ids, 1.0)),
            )]),
            is_arrow: true,
        },
    };
    let deps = Expr::Array {
        id: ids.node_id(),
        span: Span::synthetic(),
        elements: vec![ArrayElement::Item(Expr::Ident(count.clone()))],
    };
    let callback_call = call(&mut ids, "useCallback", vec![factory, deps]);
    let component = Component {
        name: "Incrementer".to_string(),
        params: vec![Pattern::Ident(count)],
        body: vec![ret(&mut ids, callback_call)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
}

/// A JSX element under `memoize_jsx` is wrapped the same way any other
/// memoized expression is, falling back to plain pass-through when
/// disabled.
#[test]
fn jsx_is_memoized_when_enabled_and_passthrough_when_not() {
    let mut ids = ids();
    let make_jsx = |ids: &mut IdGen| {
        Expr::Jsx(JsxNode {
            id: ids.node_id(),
            span: Span::synthetic(),
            name: JsxName::Element("div".to_string()),
            attributes: vec![],
            children: vec![JsxChild::Text("hello".to_string())],
        })
    };

    let enabled_component = Component {
        name: "Enabled".to_string(),
        params: vec![],
        body: vec![ret(&mut ids, make_jsx(&mut ids))],
    };
    let mut enabled_state = StateContext::with_default_react_preset();
    let enabled = optimize_component(enabled_component, &mut enabled_state).unwrap();
    assert!(print_component(&enabled).contains("cache("));

    let mut ids2 = ids();
    let disabled_component = Component {
        name: "Disabled".to_string(),
        params: vec![],
        body: vec![ret(&mut ids2, make_jsx(&mut ids2))],
    };
    let mut disabled_state = StateContext::new(Preset::empty(), RuntimeNames::default(), IdentityImportResolver);
    let disabled = optimize_component(disabled_component, &mut disabled_state).unwrap();
    assert!(!print_component(&disabled).contains("cache("));
}

/// A memoized expression inside a loop body branches its header off the
/// enclosing scope through a runtime counter rather than a single static
/// slot, since each iteration needs its own guard state.
#[test]
fn loop_body_memoization_introduces_a_counter() {
    let mut ids = ids();
    let item = local(&mut ids, "item");
    let items = local(&mut ids, "items");
    let factory = Expr::FunctionExpr {
        id: ids.node_id(),
        span: Span::synthetic(),
        function: Function {
            params: vec![],
            body: FunctionBody::Expression(Box::new(Expr::Ident(item.clone()))),
            is_arrow: true,
        },
    };
    let deps = Expr::Array {
        id: ids.node_id(),
        span: Span::synthetic(),
        elements: vec![ArrayElement::Item(Expr::Ident(item.clone()))],
    };
    let memo_call = call(&mut ids, "useMemo", vec![factory, deps]);
    let loop_body = Stmt::Expr {
        id: ids.node_id(),
        span: Span::synthetic(),
        expr: memo_call,
    };
    let for_each = Stmt::ForEach {
        id: ids.node_id(),
        span: Span::synthetic(),
        kind: ForEachKind::ForOf,
        decl_kind: VarKind::Const,
        left: Pattern::Ident(item),
        right: Expr::Ident(items.clone()),
        body: Box::new(loop_body),
    };
    let component = Component {
        name: "List".to_string(),
        params: vec![Pattern::Ident(items)],
        body: vec![for_each, ret(&mut ids, num(&mut ids, 0.0))],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
    let text = print_component(&optimized);
    assert!(text.contains("branch("));
    assert!(text.contains("+= 1"));
}

/// A plain binary expression returned with no surrounding hook call still
/// gets its own `createMemo` slot — memoization is not gated on being a
/// `useMemo` argument (§4.2's dispatch table applies to every expression
/// the walk visits, not just hook payloads).
#[test]
fn bare_binary_expression_is_memoized_without_a_hook_wrapper() {
    let mut ids = ids();
    let a = local(&mut ids, "a");
    let b = local(&mut ids, "b");
    let sum = binary(&mut ids, BinaryOp::Add, Expr::Ident(a.clone()), Expr::Ident(b.clone()));
    let component = Component {
        name: "BareSum".to_string(),
        params: vec![Pattern::Ident(a), Pattern::Ident(b)],
        body: vec![ret(&mut ids, sum)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
    let text = print_component(&optimized);
    assert!(text.contains("cache("));
}

/// A bare (non-hook) call is treated the same as any other compound
/// expression: it gets guarded by its callee and argument values, not left
/// unmemoized the way an effect or custom hook call is.
#[test]
fn bare_call_is_memoized_like_any_other_expression() {
    let mut ids = ids();
    let x = local(&mut ids, "x");
    let plain_call = call(&mut ids, "computeTotal", vec![Expr::Ident(x.clone())]);
    let component = Component {
        name: "BareCall".to_string(),
        params: vec![Pattern::Ident(x)],
        body: vec![ret(&mut ids, plain_call)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
    let text = print_component(&optimized);
    assert!(text.contains("cache("));
}

/// A ternary is lowered into an `if`/`else` that assigns into a freshly
/// synthesized local, each arm optimized under its own child scope so the
/// unreached branch's guards never allocate in the taken branch's slots.
#[test]
fn ternary_lowers_to_an_if_else_assigning_a_synthesized_local() {
    let mut ids = ids();
    let flag = local(&mut ids, "flag");
    let a = local(&mut ids, "a");
    let b = local(&mut ids, "b");
    let conditional = Expr::Conditional {
        id: ids.node_id(),
        span: Span::synthetic(),
        test: Box::new(Expr::Ident(flag.clone())),
        consequent: Box::new(Expr::Ident(a.clone())),
        alternate: Box::new(Expr::Ident(b.clone())),
    };
    let component = Component {
        name: "Ternary".to_string(),
        params: vec![Pattern::Ident(flag), Pattern::Ident(a), Pattern::Ident(b)],
        body: vec![ret(&mut ids, conditional)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
    let text = print_component(&optimized);
    assert!(text.contains("if ("));
    assert!(text.contains("else"));
}

/// `a ?? b` short-circuits: `b` is only optimized and evaluated under a
/// child scope guarded by an `if`, never unconditionally.
#[test]
fn nullish_logical_short_circuits_the_right_operand() {
    let mut ids = ids();
    let a = local(&mut ids, "a");
    let b = local(&mut ids, "b");
    let logical = Expr::Logical {
        id: ids.node_id(),
        span: Span::synthetic(),
        op: LogicalOp::Nullish,
        left: Box::new(Expr::Ident(a.clone())),
        right: Box::new(Expr::Ident(b.clone())),
    };
    let component = Component {
        name: "Fallback".to_string(),
        params: vec![Pattern::Ident(a), Pattern::Ident(b)],
        body: vec![ret(&mut ids, logical)],
    };
    let mut state = StateContext::with_default_react_preset();
    let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
    verify_component(&optimized, &state.runtime_names).expect("invariants hold");
    let text = print_component(&optimized);
    assert!(text.contains("if ("));
    assert!(text.contains("== null") || text.contains("===null") || text.contains("null"));
}
