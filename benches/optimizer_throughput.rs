//! Throughput of `optimize_component` over a synthetically generated
//! component with many independent `useMemo` call sites, the kind of
//! input size a bundler plugin would see for a large component file.

use auto_memo::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_component(memo_count: usize) -> Component {
    let mut ids = IdGen::new();
    let mut body = Vec::new();
    let mut params = Vec::new();
    for i in 0..memo_count {
        let prop = Ident {
            id: ids.node_id(),
            span: Span::synthetic(),
            name: format!("p{i}"),
            binding: Some(ids.binding_id()),
        };
        params.push(Pattern::Ident(prop.clone()));

        let factory = Expr::FunctionExpr {
            id: ids.node_id(),
            span: Span::synthetic(),
            function: Function {
                params: vec![],
                body: FunctionBody::Expression(Box::new(Expr::Binary {
                    id: ids.node_id(),
                    span: Span::synthetic(),
                    op: BinaryOp::Mul,
                    left: Box::new(Expr::Ident(prop.clone())),
                    right: Box::new(Expr::Number {
                        id: ids.node_id(),
                        span: Span::synthetic(),
                        value: 2.0,
                    }),
                })),
                is_arrow: true,
            },
        };
        let deps = Expr::Array {
            id: ids.node_id(),
            span: Span::synthetic(),
            elements: vec![ArrayElement::Item(Expr::Ident(prop))],
        };
        let memo_call = Expr::Call {
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
        };
        body.push(Stmt::Expr {
            id: ids.node_id(),
            span: Span::synthetic(),
            expr: memo_call,
        });
    }
    body.push(Stmt::Return {
        id: ids.node_id(),
        span: Span::synthetic(),
        argument: Some(Expr::Number {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: 0.0,
        }),
    });
    Component {
        name: "Bench".to_string(),
        params,
        body,
    }
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_component");
    for size in [16usize, 128, 1024] {
        group.bench_function(format!("memo_calls_{size}"), |b| {
            b.iter_batched(
                || build_component(size),
                |component| {
                    let mut state = StateContext::with_default_react_preset();
                    black_box(optimize_component(component, &mut state).expect("optimizes cleanly"));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
