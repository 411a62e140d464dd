//! Pre-pass that folds obvious boolean/conditional forms (§4.6), run once
//! over the component body before the Optimizer.
//!
//! A best-effort constant-folding walk over `Expr`/`Stmt`, generalized
//! from literal arithmetic folding to a truthy/falsy/nullish determinacy
//! lattice (see `DESIGN.md` for the grounding notes).

use crate::ast::{Expr, LogicalOp, Stmt, UnaryOp};

/// The three-valued determinacy of an expression, per §4.6. Anything that
/// is not a literal boolean/null/number/string/bigint is `Indeterminate`
/// "to avoid truthiness traps from reference-to-primitive coercion" —
/// notably arrays, objects and functions are always truthy at runtime, but
/// we deliberately do not encode that here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Determinacy {
    Truthy,
    Falsy,
    Nullish,
    Indeterminate,
}

fn determinacy(expr: &Expr) -> Determinacy {
    match expr {
        Expr::Bool { value, .. } => {
            if *value {
                Determinacy::Truthy
            } else {
                Determinacy::Falsy
            }
        }
        Expr::Null { .. } | Expr::Undefined { .. } => Determinacy::Nullish,
        Expr::Number { value, .. } => {
            if *value == 0.0 || value.is_nan() {
                Determinacy::Falsy
            } else {
                Determinacy::Truthy
            }
        }
        Expr::Str { value, .. } => {
            if value.is_empty() {
                Determinacy::Falsy
            } else {
                Determinacy::Truthy
            }
        }
        Expr::BigInt { value, .. } => {
            if value.trim_start_matches('0').is_empty() {
                Determinacy::Falsy
            } else {
                Determinacy::Truthy
            }
        }
        Expr::Paren { inner, .. } => determinacy(inner),
        _ => Determinacy::Indeterminate,
    }
}

/// Runs the simplifier over a whole component body.
pub fn simplify_block(body: Vec<Stmt>) -> Vec<Stmt> {
    body.into_iter().filter_map(simplify_stmt).collect()
}

fn simplify_stmt(stmt: Stmt) -> Option<Stmt> {
    match stmt {
        Stmt::Expr { id, span, expr } => Some(Stmt::Expr {
            id,
            span,
            expr: simplify_expr(expr),
        }),
        Stmt::VarDecl {
            id,
            span,
            kind,
            declarations,
        } => Some(Stmt::VarDecl {
            id,
            span,
            kind,
            declarations: declarations
                .into_iter()
                .map(|mut d| {
                    d.init = d.init.map(simplify_expr);
                    d
                })
                .collect(),
        }),
        Stmt::Return { id, span, argument } => Some(Stmt::Return {
            id,
            span,
            argument: argument.map(simplify_expr),
        }),
        Stmt::Throw { id, span, argument } => Some(Stmt::Throw {
            id,
            span,
            argument: simplify_expr(argument),
        }),
        Stmt::Block { id, span, body } => Some(Stmt::Block {
            id,
            span,
            body: simplify_block(body),
        }),
        Stmt::If {
            id,
            span,
            test,
            consequent,
            alternate,
        } => {
            let test = simplify_expr(test);
            match determinacy(&test) {
                Determinacy::Truthy => Some(*simplify_stmt_boxed(consequent)?),
                Determinacy::Falsy | Determinacy::Nullish => {
                    alternate.and_then(|a| simplify_stmt_boxed(a)).map(|b| *b)
                }
                Determinacy::Indeterminate => Some(Stmt::If {
                    id,
                    span,
                    test,
                    consequent: simplify_stmt_boxed(consequent)
                        .unwrap_or_else(|| Box::new(empty_block(id, span))),
                    alternate: alternate.and_then(simplify_stmt_boxed),
                }),
            }
        }
        Stmt::While {
            id,
            span,
            test,
            body,
        } => {
            let test = simplify_expr(test);
            if determinacy(&test) == Determinacy::Falsy {
                None
            } else {
                Some(Stmt::While {
                    id,
                    span,
                    test,
                    body: simplify_stmt_boxed(body).unwrap_or_else(|| Box::new(empty_block(id, span))),
                })
            }
        }
        Stmt::DoWhile {
            id,
            span,
            test,
            body,
        } => Some(Stmt::DoWhile {
            id,
            span,
            test: simplify_expr(test),
            body: simplify_stmt_boxed(body).unwrap_or_else(|| Box::new(empty_block(id, span))),
        }),
        Stmt::For {
            id,
            span,
            init,
            test,
            update,
            body,
        } => Some(Stmt::For {
            id,
            span,
            init: init.and_then(simplify_stmt_boxed),
            test: test.map(simplify_expr),
            update: update.map(simplify_expr),
            body: simplify_stmt_boxed(body).unwrap_or_else(|| Box::new(empty_block(id, span))),
        }),
        Stmt::ForEach {
            id,
            span,
            kind,
            decl_kind,
            left,
            right,
            body,
        } => Some(Stmt::ForEach {
            id,
            span,
            kind,
            decl_kind,
            left,
            right: simplify_expr(right),
            body: simplify_stmt_boxed(body).unwrap_or_else(|| Box::new(empty_block(id, span))),
        }),
        Stmt::Loop { id, span, body } => Some(Stmt::Loop {
            id,
            span,
            body: simplify_stmt_boxed(body).unwrap_or_else(|| Box::new(empty_block(id, span))),
        }),
        Stmt::Switch {
            id,
            span,
            discriminant,
            cases,
        } => Some(Stmt::Switch {
            id,
            span,
            discriminant: simplify_expr(discriminant),
            cases: cases
                .into_iter()
                .map(|mut c| {
                    c.test = c.test.map(simplify_expr);
                    c.consequent = simplify_block(c.consequent);
                    c
                })
                .collect(),
        }),
        Stmt::Try {
            id,
            span,
            block,
            handler,
            finalizer,
        } => Some(Stmt::Try {
            id,
            span,
            block: simplify_block(block),
            handler: handler.map(|mut h| {
                h.body = simplify_block(h.body);
                h
            }),
            finalizer: finalizer.map(simplify_block),
        }),
        Stmt::Labeled {
            id,
            span,
            label,
            body,
        } => Some(Stmt::Labeled {
            id,
            span,
            label,
            body: simplify_stmt_boxed(body).unwrap_or_else(|| Box::new(empty_block(id, span))),
        }),
        skip @ Stmt::Skip { .. } => Some(skip),
        other @ (Stmt::Break { .. } | Stmt::Continue { .. }) => Some(other),
    }
}

fn simplify_stmt_boxed(stmt: Box<Stmt>) -> Option<Box<Stmt>> {
    simplify_stmt(*stmt).map(Box::new)
}

fn empty_block(id: crate::span::NodeId, span: crate::span::Span) -> Stmt {
    Stmt::Block {
        id,
        span,
        body: Vec::new(),
    }
}

fn simplify_expr(expr: Expr) -> Expr {
    match expr {
        Expr::Conditional {
            id,
            span,
            test,
            consequent,
            alternate,
        } => {
            let test = simplify_expr(*test);
            match determinacy(&test) {
                Determinacy::Truthy => simplify_expr(*consequent),
                Determinacy::Falsy | Determinacy::Nullish => simplify_expr(*alternate),
                Determinacy::Indeterminate => Expr::Conditional {
                    id,
                    span,
                    test: Box::new(test),
                    consequent: Box::new(simplify_expr(*consequent)),
                    alternate: Box::new(simplify_expr(*alternate)),
                },
            }
        }
        Expr::Logical {
            id,
            span,
            op,
            left,
            right,
        } => {
            let left = simplify_expr(*left);
            let left_determinacy = determinacy(&left);
            let collapses = match op {
                LogicalOp::Nullish => left_determinacy == Determinacy::Nullish,
                LogicalOp::Or => left_determinacy == Determinacy::Falsy,
                LogicalOp::And => left_determinacy == Determinacy::Truthy,
            };
            if collapses {
                return simplify_expr(*right);
            }
            let left_wins = match op {
                LogicalOp::Nullish => {
                    left_determinacy == Determinacy::Truthy || left_determinacy == Determinacy::Falsy
                }
                LogicalOp::Or => left_determinacy == Determinacy::Truthy,
                LogicalOp::And => left_determinacy == Determinacy::Falsy,
            };
            if left_wins {
                return left;
            }
            Expr::Logical {
                id,
                span,
                op,
                left: Box::new(left),
                right: Box::new(simplify_expr(*right)),
            }
        }
        Expr::Unary {
            id,
            span,
            op: UnaryOp::Void,
            argument,
        } => {
            let argument = simplify_expr(*argument);
            if determinacy(&argument) != Determinacy::Indeterminate {
                Expr::Undefined { id, span }
            } else {
                Expr::Unary {
                    id,
                    span,
                    op: UnaryOp::Void,
                    argument: Box::new(argument),
                }
            }
        }
        Expr::Unary {
            id,
            span,
            op: UnaryOp::Not,
            argument,
        } => {
            let argument = simplify_expr(*argument);
            match determinacy(&argument) {
                Determinacy::Truthy => Expr::Bool {
                    id,
                    span,
                    value: false,
                },
                Determinacy::Falsy | Determinacy::Nullish => Expr::Bool {
                    id,
                    span,
                    value: true,
                },
                Determinacy::Indeterminate => Expr::Unary {
                    id,
                    span,
                    op: UnaryOp::Not,
                    argument: Box::new(argument),
                },
            }
        }
        Expr::Unary {
            id,
            span,
            op,
            argument,
        } => Expr::Unary {
            id,
            span,
            op,
            argument: Box::new(simplify_expr(*argument)),
        },
        Expr::Binary {
            id,
            span,
            op,
            left,
            right,
        } => Expr::Binary {
            id,
            span,
            op,
            left: Box::new(simplify_expr(*left)),
            right: Box::new(simplify_expr(*right)),
        },
        Expr::Paren { id, span, inner } => Expr::Paren {
            id,
            span,
            inner: Box::new(simplify_expr(*inner)),
        },
        Expr::TypeAssertion { id, span, inner, ty } => Expr::TypeAssertion {
            id,
            span,
            inner: Box::new(simplify_expr(*inner)),
            ty,
        },
        Expr::Sequence { id, span, exprs } => Expr::Sequence {
            id,
            span,
            exprs: exprs.into_iter().map(simplify_expr).collect(),
        },
        // All other kinds are left for the Optimizer to recurse into; the
        // simplifier's job is limited to the boolean/conditional forms
        // named in §4.6.
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{IdGen, Span};

    fn truthy_num(ids: &mut IdGen) -> Expr {
        Expr::Number {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: 1.0,
        }
    }

    fn falsy_num(ids: &mut IdGen) -> Expr {
        Expr::Number {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: 0.0,
        }
    }

    #[test]
    fn truthy_conditional_collapses_to_consequent() {
        let mut ids = IdGen::new();
        let consequent = Expr::Str {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: "yes".into(),
        };
        let alternate = Expr::Str {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: "no".into(),
        };
        let cond = Expr::Conditional {
            id: ids.node_id(),
            span: Span::synthetic(),
            test: Box::new(truthy_num(&mut ids)),
            consequent: Box::new(consequent.clone()),
            alternate: Box::new(alternate),
        };
        assert_eq!(simplify_expr(cond), consequent);
    }

    #[test]
    fn falsy_or_falls_through_to_right() {
        let mut ids = IdGen::new();
        let right = Expr::Str {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: "right".into(),
        };
        let expr = Expr::Logical {
            id: ids.node_id(),
            span: Span::synthetic(),
            op: LogicalOp::Or,
            left: Box::new(falsy_num(&mut ids)),
            right: Box::new(right.clone()),
        };
        assert_eq!(simplify_expr(expr), right);
    }

    #[test]
    fn falsy_while_is_removed() {
        let mut ids = IdGen::new();
        let stmt = Stmt::While {
            id: ids.node_id(),
            span: Span::synthetic(),
            test: falsy_num(&mut ids),
            body: Box::new(empty_block(ids.node_id(), Span::synthetic())),
        };
        assert!(simplify_stmt(stmt).is_none());
    }

    #[test]
    fn indeterminate_conditional_is_left_alone() {
        let mut ids = IdGen::new();
        let ident = Expr::Ident(crate::ast::Ident {
            id: ids.node_id(),
            span: Span::synthetic(),
            name: "flag".into(),
            binding: Some(ids.binding_id()),
        });
        let cond = Expr::Conditional {
            id: ids.node_id(),
            span: Span::synthetic(),
            test: Box::new(ident),
            consequent: Box::new(truthy_num(&mut ids)),
            alternate: Box::new(falsy_num(&mut ids)),
        };
        match simplify_expr(cond) {
            Expr::Conditional { .. } => {}
            other => panic!("expected conditional to survive, got {other:?}"),
        }
    }
}
