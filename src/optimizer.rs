//! The core optimization pass: `OptimizedExpression`, `createMemo`, and the
//! statement/expression walk (§4.2-§4.5).
//!
//! A struct holding mutable pass state, dispatching over an expression
//! enum: a recursive expression/statement walk that threads a `Scope`
//! rather than a flat instruction rewrite, built around the owned-tree
//! style `ast.rs` uses (every `optimize_*` function consumes its input and
//! returns a fresh node rather than mutating in place; see `DESIGN.md`).

use std::collections::HashSet;

use crate::ast::*;
use crate::errors::{OptResult, OptimizerError};
use crate::expr_analyzer::ExprAnalyzer;
use crate::preset::{HookKind, ImportResolver, StateContext};
use crate::scope::{CacheKind, Scope};
use crate::simplifier;
use crate::span::{BindingId, IdGen, NodeId, Span};
use smallvec::SmallVec;

/// Dependency lists are almost always tiny (a handful of identifiers in a
/// `useMemo` array, or none at all), so they live inline rather than behind
/// a heap allocation until they grow past four entries.
pub type DepList = SmallVec<[BindingId; 4]>;

/// The result of optimizing one expression: its rewritten form, the
/// bindings it reads (for folding into an enclosing guard), and whether
/// it is constant (§3 `OptimizedExpression`).
#[derive(Debug, Clone)]
pub struct OptimizedExpression {
    pub expr: Expr,
    pub deps: DepList,
    pub constant: bool,
}

impl OptimizedExpression {
    pub fn constant(expr: Expr) -> Self {
        OptimizedExpression {
            expr,
            deps: DepList::new(),
            constant: true,
        }
    }

    fn tracked(expr: Expr, deps: DepList) -> Self {
        OptimizedExpression {
            expr,
            deps,
            constant: false,
        }
    }

}

/// Shape of the `dependencies` argument to `createMemo` (§4.2): how the
/// guard protecting a memo slot is built.
enum Dependencies {
    /// A value computed once and never invalidated (an empty `[]`).
    Constant,
    /// No dependency list was supplied: guard on the expression's own
    /// previous value via `equals`.
    Omitted(Expr),
    /// A single guard expression (e.g. a hook's array collapsed to one
    /// entry).
    Single(Expr),
    /// A dependency array: one `equals` guard per entry, AND-folded, with
    /// duplicate identifier dependencies elided by `BindingId` (§9).
    List(Vec<Expr>),
}

/// Runs the pass end to end: simplifies dead branches, then walks the
/// component body under a fresh root scope, finally splicing the root's
/// `cache`/`ref` header declarations in (§5 `optimize_component`).
pub fn optimize_component<R: ImportResolver>(
    component: Component,
    state: &mut StateContext<R>,
) -> OptResult<Component> {
    log::debug!("optimizing component {:?}", component.name);
    let mut opt = Optimizer {
        state,
        analyzer: ExprAnalyzer::new(),
        ids: IdGen::new(),
    };
    let body = simplifier::simplify_block(component.body);
    let root = Scope::root();
    let new_body = opt.optimize_root_block(&root, body)?;
    log::debug!(
        "component {:?} optimized, {} memo slots, {} ref slots allocated at root",
        component.name,
        root.slot_count(CacheKind::Memo),
        root.slot_count(CacheKind::Ref),
    );

    if !component_has_return(&new_body) {
        return Err(OptimizerError::missing_component_return(Span::synthetic()));
    }

    Ok(Component {
        name: component.name,
        params: component.params,
        body: new_body,
    })
}

struct Optimizer<'a, R: ImportResolver> {
    state: &'a mut StateContext<R>,
    analyzer: ExprAnalyzer,
    ids: IdGen,
}

impl<'a, R: ImportResolver> Optimizer<'a, R> {
    // ---- small AST-building helpers -------------------------------------

    fn num_lit(&mut self, v: f64, span: Span) -> Expr {
        Expr::Number {
            id: self.ids.node_id(),
            span,
            value: v,
        }
    }

    fn bool_lit(&mut self, v: bool, span: Span) -> Expr {
        Expr::Bool {
            id: self.ids.node_id(),
            span,
            value: v,
        }
    }

    fn ident_expr(&mut self, source: &Ident) -> Expr {
        Expr::Ident(Ident {
            id: self.ids.node_id(),
            span: source.span,
            name: source.name.clone(),
            binding: source.binding,
        })
    }

    fn runtime_call(&mut self, logical: &str, args: Vec<Expr>, span: Span) -> Expr {
        let name = self.state.import_resolver.resolve(logical);
        Expr::Call {
            id: self.ids.node_id(),
            span,
            callee: Box::new(Expr::Ident(Ident {
                id: self.ids.node_id(),
                span,
                name,
                binding: None,
            })),
            args,
            optional: false,
        }
    }

    fn slot_member(&mut self, header: &Ident, slot: u32, span: Span) -> Expr {
        let object = self.ident_expr(header);
        let key = self.num_lit(slot as f64, span);
        Expr::Member {
            id: self.ids.node_id(),
            span,
            object: Box::new(object),
            property: PropKey::Computed(Box::new(key)),
            optional: false,
        }
    }

    fn slot_assign(&mut self, header: &Ident, slot: u32, value: Expr, span: Span) -> Expr {
        let object = self.ident_expr(header);
        let key = self.num_lit(slot as f64, span);
        Expr::Assignment {
            id: self.ids.node_id(),
            span,
            op: AssignOp::Assign,
            target: Box::new(Pattern::Member {
                id: self.ids.node_id(),
                span,
                object: Box::new(object),
                property: PropKey::Computed(Box::new(key)),
            }),
            value: Box::new(value),
        }
    }

    fn equals_call(&mut self, header: &Ident, slot: u32, value: Expr, span: Span) -> Expr {
        let logical = self.state.runtime_names.equals.clone();
        let header_expr = self.ident_expr(header);
        let slot_lit = self.num_lit(slot as f64, span);
        self.runtime_call(&logical, vec![header_expr, slot_lit, value], span)
    }

    /// The root scope's header initializer: `cache(useMemoHook, size)` or
    /// `ref(useRefHook, size)` (§6).
    fn root_init(&mut self, kind: CacheKind, size: u32, span: Span) -> Expr {
        let (logical, hook_name) = match kind {
            CacheKind::Memo => (
                self.state.runtime_names.cache.clone(),
                self.state.runtime_names.use_memo_hook.clone(),
            ),
            CacheKind::Ref => (
                self.state.runtime_names.ref_.clone(),
                self.state.runtime_names.use_ref_hook.clone(),
            ),
        };
        let hook_ident = Expr::Ident(Ident {
            id: self.ids.node_id(),
            span,
            name: hook_name,
            binding: None,
        });
        let size_lit = self.num_lit(size as f64, span);
        self.runtime_call(&logical, vec![hook_ident, size_lit], span)
    }

    /// A nested scope's header initializer: `branch(parentHeader, idx,
    /// size)`, where `idx` is a static slot literal for an ordinary nested
    /// block, or a runtime loop counter read for a loop body (§6, §9).
    fn branch_init(&mut self, parent_header: &Ident, idx: Expr, size: u32, span: Span) -> Expr {
        let logical = self.state.runtime_names.branch.clone();
        let parent_expr = self.ident_expr(parent_header);
        let size_lit = self.num_lit(size as f64, span);
        self.runtime_call(&logical, vec![parent_expr, idx, size_lit], span)
    }

    fn root_header_inits(&mut self, scope: &Scope, span: Span) -> (Option<Expr>, Option<Expr>) {
        let memo = scope.has_header(CacheKind::Memo).then(|| {
            let size = scope.slot_count(CacheKind::Memo);
            self.root_init(CacheKind::Memo, size, span)
        });
        let ref_ = scope.has_header(CacheKind::Ref).then(|| {
            let size = scope.slot_count(CacheKind::Ref);
            self.root_init(CacheKind::Ref, size, span)
        });
        (memo, ref_)
    }

    fn branch_header_inits(&mut self, scope: &Scope, span: Span) -> (Option<Expr>, Option<Expr>) {
        let memo = self.finish_branch_scope(scope, CacheKind::Memo, span);
        let ref_ = self.finish_branch_scope(scope, CacheKind::Ref, span);
        (memo, ref_)
    }

    fn finish_branch_scope(&mut self, scope: &Scope, kind: CacheKind, span: Span) -> Option<Expr> {
        if !scope.has_header(kind) {
            return None;
        }
        let size = scope.slot_count(kind);
        let origin = scope
            .origin(kind)
            .expect("a scope with a header always has an origin or is root");
        let idx = self.num_lit(origin.parent_slot as f64, span);
        Some(self.branch_init(&origin.parent_header, idx, size, span))
    }

    fn loop_header_inits(&mut self, scope: &Scope, idx_ident: &Ident, span: Span) -> (Option<Expr>, Option<Expr>) {
        let memo = self.finish_loop_scope(scope, CacheKind::Memo, idx_ident, span);
        let ref_ = self.finish_loop_scope(scope, CacheKind::Ref, idx_ident, span);
        (memo, ref_)
    }

    fn finish_loop_scope(
        &mut self,
        scope: &Scope,
        kind: CacheKind,
        idx_ident: &Ident,
        span: Span,
    ) -> Option<Expr> {
        if !scope.has_header(kind) {
            return None;
        }
        let size = scope.slot_count(kind);
        let origin = scope.origin(kind).expect("loop body scope is never root");
        let idx = self.ident_expr(idx_ident);
        let _ = origin.parent_slot;
        Some(self.branch_init(&origin.parent_header, idx, size, span))
    }

    /// The `createMemo` primitive (§4.2): allocates a slot in `scope`'s
    /// cache, builds the guard described by `dependencies`, and returns
    /// `guard ? slot : (slot = expr)` (or the unguarded/constant forms).
    fn create_memo(
        &mut self,
        scope: &Scope,
        expr: Expr,
        dependencies: Dependencies,
        kind: CacheKind,
        span: Span,
    ) -> Expr {
        let header = scope.header(kind, &mut self.ids);
        let slot = scope.alloc_slot(kind);
        log::trace!("allocated {:?} slot {} under header {}", kind, slot, header.name);
        let slot_read = self.slot_member(&header, slot, span);
        let assign = self.slot_assign(&header, slot, expr, span);

        match dependencies {
            Dependencies::Constant => Expr::Logical {
                id: self.ids.node_id(),
                span,
                op: LogicalOp::Nullish,
                left: Box::new(slot_read),
                right: Box::new(assign),
            },
            Dependencies::Omitted(guard_value) | Dependencies::Single(guard_value) => {
                let dep_slot = scope.alloc_slot(kind);
                let guard = self.equals_call(&header, dep_slot, guard_value, span);
                self.guarded(guard, slot_read, assign, span)
            }
            Dependencies::List(deps) => {
                let guard = deps.into_iter().fold(None, |acc, dep| {
                    let dep_slot = scope.alloc_slot(kind);
                    let g = self.equals_call(&header, dep_slot, dep, span);
                    Some(match acc {
                        None => g,
                        Some(prev) => Expr::Logical {
                            id: self.ids.node_id(),
                            span,
                            op: LogicalOp::And,
                            left: Box::new(prev),
                            right: Box::new(g),
                        },
                    })
                });
                let guard = guard.unwrap_or_else(|| self.bool_lit(true, span));
                self.guarded(guard, slot_read, assign, span)
            }
        }
    }

    fn guarded(&mut self, guard: Expr, slot_read: Expr, assign: Expr, span: Span) -> Expr {
        Expr::Conditional {
            id: self.ids.node_id(),
            span,
            test: Box::new(guard),
            consequent: Box::new(slot_read),
            alternate: Box::new(assign),
        }
    }

    /// Collapses a list of guard-value expressions into the right
    /// `Dependencies` shape for `createMemo` (§4.2): no guards means the
    /// value never changes, one collapses to a single `equals`, and more
    /// AND-fold across an `equals` per entry.
    fn guard_dependencies(&mut self, mut guards: Vec<Expr>) -> Dependencies {
        if guards.is_empty() {
            Dependencies::Constant
        } else if guards.len() == 1 {
            Dependencies::Single(guards.remove(0))
        } else {
            Dependencies::List(guards)
        }
    }

    /// Declares a fresh `let name;` (or `let name = init;`) in `scope` and
    /// returns the identifier bound to it, used by the ternary/logical
    /// statement-lowering to synthesize their result/short-circuit
    /// variables (§4.2 conditional and logical rows).
    fn fresh_let_decl(&mut self, scope: &Scope, prefix: &str, init: Option<Expr>, span: Span) -> Ident {
        let ident = Ident {
            id: self.ids.node_id(),
            span,
            name: self.ids.synthetic_name(prefix),
            binding: Some(self.ids.binding_id()),
        };
        let decl = Stmt::VarDecl {
            id: self.ids.node_id(),
            span,
            kind: VarKind::Let,
            declarations: vec![Declarator {
                name: Pattern::Ident(ident.clone()),
                type_annotation: None,
                init,
            }],
        };
        scope.push_stmt(decl);
        ident
    }

    fn assign_stmt(&mut self, target: &Ident, value: Expr, span: Span) -> Stmt {
        let expr = Expr::Assignment {
            id: self.ids.node_id(),
            span,
            op: AssignOp::Assign,
            target: Box::new(Pattern::Ident(target.clone())),
            value: Box::new(value),
        };
        Stmt::Expr {
            id: self.ids.node_id(),
            span,
            expr,
        }
    }

    // ---- expression dispatch (§4.2) -------------------------------------

    fn optimize_expr(&mut self, scope: &Scope, expr: Expr) -> OptResult<OptimizedExpression> {
        if self.analyzer.is_constant(&expr, scope, &self.state.preset) {
            let rebuilt = self.optimize_children_only(scope, expr)?;
            return Ok(OptimizedExpression::constant(rebuilt));
        }

        match expr {
            Expr::Ident(ident) => {
                if let Some(binding) = ident.binding {
                    if let Some(cached) = scope.lookup_optimized_for_binding(binding) {
                        return Ok(cached);
                    }
                }
                let binding = ident.binding;
                let node_id = ident.id;
                let span = ident.span;
                let guard_value = self.ident_expr(&ident);
                let deps: DepList = binding.into_iter().collect();
                let memoized = self.create_memo(
                    scope,
                    Expr::Ident(ident),
                    Dependencies::Omitted(guard_value),
                    CacheKind::Memo,
                    span,
                );
                let result = OptimizedExpression::tracked(memoized, deps);
                if let Some(binding) = binding {
                    scope.record_optimized_for_binding(binding, node_id, result.clone());
                }
                Ok(result)
            }
            Expr::Member {
                id,
                span,
                object,
                property,
                optional,
            } => {
                let object = self.optimize_expr(scope, *object)?;
                let mut deps = object.deps.clone();
                let mut guards = vec![object.expr.clone()];
                let property = match property {
                    PropKey::Static(name) => PropKey::Static(name),
                    PropKey::Computed(key) => {
                        let key = self.optimize_expr(scope, *key)?;
                        push_deps(&mut deps, &key.deps);
                        guards.push(key.expr.clone());
                        PropKey::Computed(Box::new(key.expr))
                    }
                };
                let rebuilt = Expr::Member {
                    id,
                    span,
                    object: Box::new(object.expr),
                    property,
                    optional,
                };
                let dependencies = self.guard_dependencies(guards);
                let memoized = self.create_memo(scope, rebuilt, dependencies, CacheKind::Memo, span);
                Ok(OptimizedExpression::tracked(memoized, deps))
            }
            Expr::Conditional {
                span,
                test,
                consequent,
                alternate,
                ..
            } => {
                let test = self.optimize_expr(scope, *test)?;

                let result_ident = self.fresh_let_decl(scope, "t", None, span);

                let cons_child = scope.child(false);
                let cons = self.optimize_expr(&cons_child, *consequent)?;
                let cons_assign = self.assign_stmt(&result_ident, cons.expr, span);
                cons_child.push_stmt(cons_assign);
                let (cons_memo_init, cons_ref_init) = self.branch_header_inits(&cons_child, span);
                let cons_stmts = cons_child.finish(cons_memo_init, cons_ref_init);

                let alt_child = scope.child(false);
                let alt = self.optimize_expr(&alt_child, *alternate)?;
                let alt_assign = self.assign_stmt(&result_ident, alt.expr, span);
                alt_child.push_stmt(alt_assign);
                let (alt_memo_init, alt_ref_init) = self.branch_header_inits(&alt_child, span);
                let alt_stmts = alt_child.finish(alt_memo_init, alt_ref_init);

                let if_stmt = Stmt::If {
                    id: self.ids.node_id(),
                    span,
                    test: test.expr,
                    consequent: Box::new(Stmt::Block {
                        id: self.ids.node_id(),
                        span,
                        body: cons_stmts,
                    }),
                    alternate: Some(Box::new(Stmt::Block {
                        id: self.ids.node_id(),
                        span,
                        body: alt_stmts,
                    })),
                };
                scope.push_stmt(if_stmt);

                Ok(OptimizedExpression::tracked(Expr::Ident(result_ident), DepList::new()))
            }
            Expr::Binary {
                id,
                span,
                op,
                left,
                right,
            } => {
                let left = self.optimize_expr(scope, *left)?;
                let right = self.optimize_expr(scope, *right)?;
                let mut deps = left.deps.clone();
                push_deps(&mut deps, &right.deps);
                let guards = vec![left.expr.clone(), right.expr.clone()];
                let rebuilt = Expr::Binary {
                    id,
                    span,
                    op,
                    left: Box::new(left.expr),
                    right: Box::new(right.expr),
                };
                if op == BinaryOp::Pipeline {
                    return Ok(OptimizedExpression::tracked(rebuilt, deps));
                }
                let dependencies = self.guard_dependencies(guards);
                let memoized = self.create_memo(scope, rebuilt, dependencies, CacheKind::Memo, span);
                Ok(OptimizedExpression::tracked(memoized, deps))
            }
            Expr::Logical { span, op, left, right, .. } => {
                let left = self.optimize_expr(scope, *left)?;

                let short_circuit = self.fresh_let_decl(scope, "sc", Some(left.expr), span);

                let right_child = scope.child(false);
                let right = self.optimize_expr(&right_child, *right)?;
                let right_assign = self.assign_stmt(&short_circuit, right.expr, span);
                right_child.push_stmt(right_assign);
                let (right_memo_init, right_ref_init) = self.branch_header_inits(&right_child, span);
                let right_stmts = right_child.finish(right_memo_init, right_ref_init);

                let test = match op {
                    LogicalOp::Or => Expr::Unary {
                        id: self.ids.node_id(),
                        span,
                        op: UnaryOp::Not,
                        argument: Box::new(self.ident_expr(&short_circuit)),
                    },
                    LogicalOp::Nullish => Expr::Binary {
                        id: self.ids.node_id(),
                        span,
                        op: BinaryOp::Eq,
                        left: Box::new(self.ident_expr(&short_circuit)),
                        right: Box::new(Expr::Null {
                            id: self.ids.node_id(),
                            span,
                        }),
                    },
                    LogicalOp::And => self.ident_expr(&short_circuit),
                };

                let if_stmt = Stmt::If {
                    id: self.ids.node_id(),
                    span,
                    test,
                    consequent: Box::new(Stmt::Block {
                        id: self.ids.node_id(),
                        span,
                        body: right_stmts,
                    }),
                    alternate: None,
                };
                scope.push_stmt(if_stmt);

                Ok(OptimizedExpression::tracked(
                    Expr::Ident(short_circuit),
                    DepList::new(),
                ))
            }
            Expr::Unary {
                id,
                span,
                op,
                argument,
            } => {
                let argument = self.optimize_expr(scope, *argument)?;
                let deps = argument.deps.clone();
                let is_constant = argument.constant;
                let guard_value = argument.expr.clone();
                let rebuilt = Expr::Unary {
                    id,
                    span,
                    op,
                    argument: Box::new(argument.expr),
                };
                if is_constant {
                    Ok(OptimizedExpression::tracked(rebuilt, deps))
                } else {
                    let memoized =
                        self.create_memo(scope, rebuilt, Dependencies::Single(guard_value), CacheKind::Memo, span);
                    Ok(OptimizedExpression::tracked(memoized, deps))
                }
            }
            Expr::Assignment {
                id,
                span,
                op,
                target,
                value,
            } => {
                let value = self.optimize_expr(scope, *value)?;
                let target = self.optimize_lval(scope, *target, true)?;
                Ok(OptimizedExpression::tracked(
                    Expr::Assignment {
                        id,
                        span,
                        op,
                        target: Box::new(target),
                        value: Box::new(value.expr),
                    },
                    DepList::new(),
                ))
            }
            Expr::Call {
                id,
                span,
                callee,
                args,
                optional,
            } => self.optimize_call(scope, id, span, *callee, args, optional),
            Expr::New {
                id,
                span,
                callee,
                args,
            } => {
                let callee = self.optimize_expr(scope, *callee)?;
                let mut deps = callee.deps.clone();
                let mut guards = vec![callee.expr.clone()];
                let mut new_args = Vec::with_capacity(args.len());
                for a in args {
                    let a = self.optimize_expr(scope, a)?;
                    push_deps(&mut deps, &a.deps);
                    guards.push(a.expr.clone());
                    new_args.push(a.expr);
                }
                let rebuilt = Expr::New {
                    id,
                    span,
                    callee: Box::new(callee.expr),
                    args: new_args,
                };
                let dependencies = self.guard_dependencies(guards);
                let memoized = self.create_memo(scope, rebuilt, dependencies, CacheKind::Memo, span);
                Ok(OptimizedExpression::tracked(memoized, deps))
            }
            Expr::Array { id, span, elements } => {
                let mut deps = DepList::new();
                let mut guards = Vec::new();
                let mut new_elements = Vec::with_capacity(elements.len());
                for el in elements {
                    new_elements.push(match el {
                        ArrayElement::Item(e) => {
                            let r = self.optimize_expr(scope, e)?;
                            push_deps(&mut deps, &r.deps);
                            guards.push(r.expr.clone());
                            ArrayElement::Item(r.expr)
                        }
                        ArrayElement::Spread(e) => {
                            let r = self.optimize_expr(scope, e)?;
                            push_deps(&mut deps, &r.deps);
                            guards.push(r.expr.clone());
                            ArrayElement::Spread(r.expr)
                        }
                        ArrayElement::Hole => ArrayElement::Hole,
                    });
                }
                let rebuilt = Expr::Array {
                    id,
                    span,
                    elements: new_elements,
                };
                let dependencies = self.guard_dependencies(guards);
                let memoized = self.create_memo(scope, rebuilt, dependencies, CacheKind::Memo, span);
                Ok(OptimizedExpression::tracked(memoized, deps))
            }
            Expr::Object { id, span, properties } => {
                let mut deps = DepList::new();
                let mut guards = Vec::new();
                let mut new_props = Vec::with_capacity(properties.len());
                for p in properties {
                    let (p, pdeps, pguards) = self.optimize_object_property_tracked(scope, p)?;
                    push_deps(&mut deps, &pdeps);
                    guards.extend(pguards);
                    new_props.push(p);
                }
                let rebuilt = Expr::Object {
                    id,
                    span,
                    properties: new_props,
                };
                let dependencies = self.guard_dependencies(guards);
                let memoized = self.create_memo(scope, rebuilt, dependencies, CacheKind::Memo, span);
                Ok(OptimizedExpression::tracked(memoized, deps))
            }
            Expr::FunctionExpr { id, span, function } => {
                let free_vars = free_variable_idents(&function);
                let mut deps = DepList::new();
                let mut guards = Vec::with_capacity(free_vars.len());
                for ident in &free_vars {
                    if let Some(b) = ident.binding {
                        if !deps.contains(&b) {
                            deps.push(b);
                        }
                    }
                    guards.push(self.ident_expr(ident));
                }
                let function = self.optimize_function(function)?;
                let rebuilt = Expr::FunctionExpr { id, span, function };
                let dependencies = self.guard_dependencies(guards);
                let memoized = self.create_memo(scope, rebuilt, dependencies, CacheKind::Memo, span);
                Ok(OptimizedExpression::tracked(memoized, deps))
            }
            Expr::Sequence { id, span, exprs } => {
                let mut deps = DepList::new();
                let mut new_exprs = Vec::with_capacity(exprs.len());
                for e in exprs {
                    let r = self.optimize_expr(scope, e)?;
                    push_deps(&mut deps, &r.deps);
                    new_exprs.push(r.expr);
                }
                Ok(OptimizedExpression::tracked(
                    Expr::Sequence {
                        id,
                        span,
                        exprs: new_exprs,
                    },
                    deps,
                ))
            }
            Expr::Paren { id, span, inner } => {
                let inner = self.optimize_expr(scope, *inner)?;
                let deps = inner.deps.clone();
                Ok(OptimizedExpression::tracked(
                    Expr::Paren {
                        id,
                        span,
                        inner: Box::new(inner.expr),
                    },
                    deps,
                ))
            }
            Expr::TypeAssertion { id, span, inner, ty } => {
                let inner = self.optimize_expr(scope, *inner)?;
                let deps = inner.deps.clone();
                Ok(OptimizedExpression::tracked(
                    Expr::TypeAssertion {
                        id,
                        span,
                        inner: Box::new(inner.expr),
                        ty,
                    },
                    deps,
                ))
            }
            Expr::Jsx(node) => {
                let span = node.span;
                let node = self.optimize_jsx(scope, node)?;
                if self.state.preset.memoize_jsx {
                    let guard = self.bool_lit(true, span);
                    let memoized =
                        self.create_memo(scope, Expr::Jsx(node), Dependencies::Omitted(guard), CacheKind::Memo, span);
                    Ok(OptimizedExpression::tracked(memoized, DepList::new()))
                } else {
                    Ok(OptimizedExpression::tracked(Expr::Jsx(node), DepList::new()))
                }
            }
            other @ (Expr::Number { .. }
            | Expr::Str { .. }
            | Expr::Bool { .. }
            | Expr::Null { .. }
            | Expr::Undefined { .. }
            | Expr::BigInt { .. }
            | Expr::TemplateLiteral { .. }
            | Expr::TaggedTemplate { .. }
            | Expr::Other { .. }) => {
                // Reached only when `is_constant` returned false for one of
                // these (e.g. a template literal embedding a non-constant
                // expression): rebuild children and propagate their deps.
                self.optimize_children_tracked(scope, other)
            }
        }
    }

    fn optimize_children_tracked(&mut self, scope: &Scope, expr: Expr) -> OptResult<OptimizedExpression> {
        match expr {
            Expr::TemplateLiteral { id, span, quasis, exprs } => {
                let mut deps = DepList::new();
                let mut new_exprs = Vec::with_capacity(exprs.len());
                for e in exprs {
                    let r = self.optimize_expr(scope, e)?;
                    push_deps(&mut deps, &r.deps);
                    new_exprs.push(r.expr);
                }
                Ok(OptimizedExpression::tracked(
                    Expr::TemplateLiteral {
                        id,
                        span,
                        quasis,
                        exprs: new_exprs,
                    },
                    deps,
                ))
            }
            Expr::TaggedTemplate {
                id,
                span,
                tag,
                quasis,
                exprs,
            } => {
                let tag = self.optimize_expr(scope, *tag)?;
                let mut deps = tag.deps.clone();
                let mut new_exprs = Vec::with_capacity(exprs.len());
                for e in exprs {
                    let r = self.optimize_expr(scope, e)?;
                    push_deps(&mut deps, &r.deps);
                    new_exprs.push(r.expr);
                }
                Ok(OptimizedExpression::tracked(
                    Expr::TaggedTemplate {
                        id,
                        span,
                        tag: Box::new(tag.expr),
                        quasis,
                        exprs: new_exprs,
                    },
                    deps,
                ))
            }
            other => Ok(OptimizedExpression::tracked(other, DepList::new())),
        }
    }

    /// Rebuilds an expression's immediate children without altering the
    /// expression's own classification (the constant fast path).
    fn optimize_children_only(&mut self, scope: &Scope, expr: Expr) -> OptResult<Expr> {
        match expr {
            Expr::Number { .. }
            | Expr::Str { .. }
            | Expr::Bool { .. }
            | Expr::Null { .. }
            | Expr::Undefined { .. }
            | Expr::BigInt { .. }
            | Expr::Ident(_)
            | Expr::Other { .. } => Ok(expr),
            Expr::TemplateLiteral {
                id,
                span,
                quasis,
                exprs,
            } => {
                let exprs = exprs
                    .into_iter()
                    .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
                    .collect::<OptResult<Vec<_>>>()?;
                Ok(Expr::TemplateLiteral {
                    id,
                    span,
                    quasis,
                    exprs,
                })
            }
            Expr::TaggedTemplate {
                id,
                span,
                tag,
                quasis,
                exprs,
            } => {
                let tag = self.optimize_expr(scope, *tag)?.expr;
                let exprs = exprs
                    .into_iter()
                    .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
                    .collect::<OptResult<Vec<_>>>()?;
                Ok(Expr::TaggedTemplate {
                    id,
                    span,
                    tag: Box::new(tag),
                    quasis,
                    exprs,
                })
            }
            Expr::Member {
                id,
                span,
                object,
                property,
                optional,
            } => {
                let object = self.optimize_expr(scope, *object)?.expr;
                let property = match property {
                    PropKey::Static(s) => PropKey::Static(s),
                    PropKey::Computed(k) => {
                        PropKey::Computed(Box::new(self.optimize_expr(scope, *k)?.expr))
                    }
                };
                Ok(Expr::Member {
                    id,
                    span,
                    object: Box::new(object),
                    property,
                    optional,
                })
            }
            Expr::Conditional {
                id,
                span,
                test,
                consequent,
                alternate,
            } => Ok(Expr::Conditional {
                id,
                span,
                test: Box::new(self.optimize_expr(scope, *test)?.expr),
                consequent: Box::new(self.optimize_expr(scope, *consequent)?.expr),
                alternate: Box::new(self.optimize_expr(scope, *alternate)?.expr),
            }),
            Expr::Binary {
                id,
                span,
                op,
                left,
                right,
            } => Ok(Expr::Binary {
                id,
                span,
                op,
                left: Box::new(self.optimize_expr(scope, *left)?.expr),
                right: Box::new(self.optimize_expr(scope, *right)?.expr),
            }),
            Expr::Logical {
                id,
                span,
                op,
                left,
                right,
            } => Ok(Expr::Logical {
                id,
                span,
                op,
                left: Box::new(self.optimize_expr(scope, *left)?.expr),
                right: Box::new(self.optimize_expr(scope, *right)?.expr),
            }),
            Expr::Unary {
                id,
                span,
                op,
                argument,
            } => Ok(Expr::Unary {
                id,
                span,
                op,
                argument: Box::new(self.optimize_expr(scope, *argument)?.expr),
            }),
            Expr::Assignment { .. } => unreachable!("assignments are never constant"),
            Expr::Call {
                id,
                span,
                callee,
                args,
                optional,
            } => {
                let callee = self.optimize_expr(scope, *callee)?.expr;
                let args = args
                    .into_iter()
                    .map(|a| self.optimize_expr(scope, a).map(|r| r.expr))
                    .collect::<OptResult<Vec<_>>>()?;
                Ok(Expr::Call {
                    id,
                    span,
                    callee: Box::new(callee),
                    args,
                    optional,
                })
            }
            Expr::New {
                id,
                span,
                callee,
                args,
            } => {
                let callee = self.optimize_expr(scope, *callee)?.expr;
                let args = args
                    .into_iter()
                    .map(|a| self.optimize_expr(scope, a).map(|r| r.expr))
                    .collect::<OptResult<Vec<_>>>()?;
                Ok(Expr::New {
                    id,
                    span,
                    callee: Box::new(callee),
                    args,
                })
            }
            Expr::Array { id, span, elements } => {
                let elements = elements
                    .into_iter()
                    .map(|el| {
                        Ok(match el {
                            ArrayElement::Item(e) => {
                                ArrayElement::Item(self.optimize_expr(scope, e)?.expr)
                            }
                            ArrayElement::Spread(e) => {
                                ArrayElement::Spread(self.optimize_expr(scope, e)?.expr)
                            }
                            ArrayElement::Hole => ArrayElement::Hole,
                        })
                    })
                    .collect::<OptResult<Vec<_>>>()?;
                Ok(Expr::Array { id, span, elements })
            }
            Expr::Object { id, span, properties } => {
                let properties = properties
                    .into_iter()
                    .map(|p| self.optimize_object_property(scope, p))
                    .collect::<OptResult<Vec<_>>>()?;
                Ok(Expr::Object {
                    id,
                    span,
                    properties,
                })
            }
            Expr::FunctionExpr { id, span, function } => {
                let function = self.optimize_function(function)?;
                Ok(Expr::FunctionExpr { id, span, function })
            }
            Expr::Sequence { id, span, exprs } => {
                let exprs = exprs
                    .into_iter()
                    .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
                    .collect::<OptResult<Vec<_>>>()?;
                Ok(Expr::Sequence { id, span, exprs })
            }
            Expr::Paren { id, span, inner } => Ok(Expr::Paren {
                id,
                span,
                inner: Box::new(self.optimize_expr(scope, *inner)?.expr),
            }),
            Expr::TypeAssertion { id, span, inner, ty } => Ok(Expr::TypeAssertion {
                id,
                span,
                inner: Box::new(self.optimize_expr(scope, *inner)?.expr),
                ty,
            }),
            Expr::Jsx(node) => Ok(Expr::Jsx(self.optimize_jsx(scope, node)?)),
        }
    }

    fn optimize_object_property(&mut self, scope: &Scope, prop: ObjectProperty) -> OptResult<ObjectProperty> {
        Ok(match prop {
            ObjectProperty::KeyValue { key, value } => ObjectProperty::KeyValue {
                key: self.optimize_prop_key(scope, key)?,
                value: self.optimize_expr(scope, value)?.expr,
            },
            ObjectProperty::Shorthand(ident) => ObjectProperty::Shorthand(ident),
            ObjectProperty::Spread(e) => ObjectProperty::Spread(self.optimize_expr(scope, e)?.expr),
            ObjectProperty::Method { key, function } => ObjectProperty::Method {
                key: self.optimize_prop_key(scope, key)?,
                function: self.optimize_expr(scope, function)?.expr,
            },
        })
    }

    /// Like `optimize_object_property`, but also returns the dependency
    /// bindings and the guard-value expressions to fold into the owning
    /// object literal's own `createMemo` (§4.2 object row). A method's own
    /// free-variable deps are merged in but don't contribute a guard of
    /// their own — the function literal is already re-created (and thus
    /// re-memoized) whenever those deps change.
    fn optimize_object_property_tracked(
        &mut self,
        scope: &Scope,
        prop: ObjectProperty,
    ) -> OptResult<(ObjectProperty, DepList, Vec<Expr>)> {
        match prop {
            ObjectProperty::KeyValue { key, value } => {
                let (key, mut deps, mut guards) = self.optimize_prop_key_tracked(scope, key)?;
                let value = self.optimize_expr(scope, value)?;
                push_deps(&mut deps, &value.deps);
                guards.push(value.expr.clone());
                Ok((ObjectProperty::KeyValue { key, value: value.expr }, deps, guards))
            }
            ObjectProperty::Shorthand(ident) => {
                let deps = ident.binding.into_iter().collect();
                let guards = vec![self.ident_expr(&ident)];
                Ok((ObjectProperty::Shorthand(ident), deps, guards))
            }
            ObjectProperty::Spread(e) => {
                let e = self.optimize_expr(scope, e)?;
                let deps = e.deps.clone();
                let guards = vec![e.expr.clone()];
                Ok((ObjectProperty::Spread(e.expr), deps, guards))
            }
            ObjectProperty::Method { key, function } => {
                let (key, mut deps, guards) = self.optimize_prop_key_tracked(scope, key)?;
                let function = self.optimize_expr(scope, function)?;
                push_deps(&mut deps, &function.deps);
                Ok((ObjectProperty::Method { key, function: function.expr }, deps, guards))
            }
        }
    }

    fn optimize_prop_key_tracked(&mut self, scope: &Scope, key: PropKey) -> OptResult<(PropKey, DepList, Vec<Expr>)> {
        match key {
            PropKey::Static(s) => Ok((PropKey::Static(s), DepList::new(), Vec::new())),
            PropKey::Computed(e) => {
                let e = self.optimize_expr(scope, *e)?;
                let guards = vec![e.expr.clone()];
                Ok((PropKey::Computed(Box::new(e.expr)), e.deps, guards))
            }
        }
    }

    fn optimize_prop_key(&mut self, scope: &Scope, key: PropKey) -> OptResult<PropKey> {
        Ok(match key {
            PropKey::Static(s) => PropKey::Static(s),
            PropKey::Computed(e) => PropKey::Computed(Box::new(self.optimize_expr(scope, *e)?.expr)),
        })
    }

    /// Nested functions get their own root-style cache rather than a
    /// branch of the enclosing scope: a callback or effect body is not
    /// guaranteed to run synchronously within the component's own render
    /// pass, so it cannot share the parent's per-render slot numbering
    /// (documented decision, see DESIGN.md).
    fn optimize_function(&mut self, function: Function) -> OptResult<Function> {
        let inner = Scope::root();
        let body = match function.body {
            FunctionBody::Expression(e) => {
                let optimized = self.optimize_expr(&inner, *e)?;
                FunctionBody::Expression(Box::new(optimized.expr))
            }
            FunctionBody::Block(stmts) => FunctionBody::Block(self.optimize_root_block(&inner, stmts)?),
        };
        Ok(Function {
            params: function.params,
            body,
            is_arrow: function.is_arrow,
        })
    }

    fn optimize_jsx(&mut self, scope: &Scope, node: JsxNode) -> OptResult<JsxNode> {
        let attributes = node
            .attributes
            .into_iter()
            .map(|attr| {
                Ok(match attr {
                    JsxAttribute::Named { name, value } => JsxAttribute::Named {
                        name,
                        value: match value {
                            Some(JsxAttrValue::Str(s)) => Some(JsxAttrValue::Str(s)),
                            Some(JsxAttrValue::Expr(e)) => {
                                Some(JsxAttrValue::Expr(self.optimize_expr(scope, e)?.expr))
                            }
                            None => None,
                        },
                    },
                    JsxAttribute::Spread(e) => JsxAttribute::Spread(self.optimize_expr(scope, e)?.expr),
                })
            })
            .collect::<OptResult<Vec<_>>>()?;
        let children = node
            .children
            .into_iter()
            .map(|child| {
                Ok(match child {
                    JsxChild::Text(t) => JsxChild::Text(t),
                    JsxChild::Expr(e) => JsxChild::Expr(self.optimize_expr(scope, e)?.expr),
                    JsxChild::Element(el) => JsxChild::Element(self.optimize_jsx(scope, el)?),
                })
            })
            .collect::<OptResult<Vec<_>>>()?;
        Ok(JsxNode {
            id: node.id,
            span: node.span,
            name: node.name,
            attributes,
            children,
        })
    }

    // ---- call / hook specialization (§4.3) ------------------------------

    fn optimize_call(
        &mut self,
        scope: &Scope,
        id: NodeId,
        span: Span,
        callee: Expr,
        args: Vec<Expr>,
        optional: bool,
    ) -> OptResult<OptimizedExpression> {
        let kind = self.analyzer.classify_hook_call(&callee, &self.state.preset);
        log::trace!("call classified as {:?}", kind);
        match kind {
            HookKind::Memo => self.optimize_memo_hook(scope, id, span, args, optional),
            HookKind::Callback => self.optimize_callback_hook(scope, span, args),
            HookKind::Ref => {
                let callee = self.optimize_expr(scope, callee)?.expr;
                let args = args
                    .into_iter()
                    .map(|a| self.optimize_expr(scope, a).map(|r| r.expr))
                    .collect::<OptResult<Vec<_>>>()?;
                let call = Expr::Call {
                    id,
                    span,
                    callee: Box::new(callee),
                    args,
                    optional,
                };
                let memoized = self.create_memo(scope, call, Dependencies::Constant, CacheKind::Ref, span);
                Ok(OptimizedExpression::tracked(memoized, DepList::new()))
            }
            HookKind::None => {
                let callee = self.optimize_expr(scope, callee)?;
                let mut deps = callee.deps.clone();
                let mut guards = vec![callee.expr.clone()];
                let mut new_args = Vec::with_capacity(args.len());
                for a in args {
                    let a = self.optimize_expr(scope, a)?;
                    push_deps(&mut deps, &a.deps);
                    guards.push(a.expr.clone());
                    new_args.push(a.expr);
                }
                let rebuilt = Expr::Call {
                    id,
                    span,
                    callee: Box::new(callee.expr),
                    args: new_args,
                    optional,
                };
                let dependencies = self.guard_dependencies(guards);
                let memoized = self.create_memo(scope, rebuilt, dependencies, CacheKind::Memo, span);
                Ok(OptimizedExpression::tracked(memoized, deps))
            }
            HookKind::Effect | HookKind::Custom | HookKind::Skip => {
                let callee = self.optimize_expr(scope, callee)?;
                let mut deps = callee.deps.clone();
                let mut new_args = Vec::with_capacity(args.len());
                for a in args {
                    let a = self.optimize_expr(scope, a)?;
                    push_deps(&mut deps, &a.deps);
                    new_args.push(a.expr);
                }
                Ok(OptimizedExpression::tracked(
                    Expr::Call {
                        id,
                        span,
                        callee: Box::new(callee.expr),
                        args: new_args,
                        optional,
                    },
                    deps,
                ))
            }
        }
    }

    /// `useMemo(fn, deps?)`: unwraps the callback's returned expression
    /// (when it is a trivial `() => expr` arrow) and memoizes it directly;
    /// otherwise memoizes the call itself (§4.3 `memo`).
    fn optimize_memo_hook(
        &mut self,
        scope: &Scope,
        id: NodeId,
        span: Span,
        mut args: Vec<Expr>,
        optional: bool,
    ) -> OptResult<OptimizedExpression> {
        if args.is_empty() {
            return Err(OptimizerError::hook_callee_not_a_function("memo", span));
        }
        let factory = args.remove(0);
        let dep_list = if args.is_empty() { None } else { Some(args.remove(0)) };

        let body_expr = match &factory {
            Expr::FunctionExpr { function, .. } if function.is_arrow => match &function.body {
                FunctionBody::Expression(e) => Some((**e).clone()),
                FunctionBody::Block(stmts) if stmts.len() == 1 => match &stmts[0] {
                    Stmt::Return { argument: Some(e), .. } => Some(e.clone()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        };

        let value_expr = match body_expr {
            Some(e) => self.optimize_expr(scope, e)?.expr,
            None if matches!(&factory, Expr::FunctionExpr { .. }) => {
                let factory = self.optimize_expr(scope, factory)?.expr;
                Expr::Call {
                    id,
                    span,
                    callee: Box::new(factory),
                    args: Vec::new(),
                    optional,
                }
            }
            None => return Err(OptimizerError::hook_callee_not_a_function("memo", span)),
        };

        let dependencies = self.dependencies_from_array(scope, dep_list, span)?;
        let memoized = self.create_memo(scope, value_expr, dependencies, CacheKind::Memo, span);
        Ok(OptimizedExpression::tracked(memoized, DepList::new()))
    }

    /// `useCallback(fn, deps?)`: memoizes the closure reference itself
    /// rather than a return value (§4.3 `callback`).
    fn optimize_callback_hook(
        &mut self,
        scope: &Scope,
        span: Span,
        mut args: Vec<Expr>,
    ) -> OptResult<OptimizedExpression> {
        if args.is_empty() {
            return Err(OptimizerError::hook_callee_not_a_function("callback", span));
        }
        let factory = args.remove(0);
        let dep_list = if args.is_empty() { None } else { Some(args.remove(0)) };
        let factory = match factory {
            Expr::FunctionExpr { id, span, function } => {
                let function = self.optimize_function(function)?;
                Expr::FunctionExpr { id, span, function }
            }
            other => return Err(OptimizerError::non_expression_hook_argument("callback", other.span())),
        };
        let dependencies = self.dependencies_from_array(scope, dep_list, span)?;
        let memoized = self.create_memo(scope, factory, dependencies, CacheKind::Memo, span);
        Ok(OptimizedExpression::tracked(memoized, DepList::new()))
    }

    fn dependencies_from_array(
        &mut self,
        scope: &Scope,
        dep_list: Option<Expr>,
        span: Span,
    ) -> OptResult<Dependencies> {
        match dep_list {
            None => Ok(Dependencies::Omitted(self.bool_lit(true, span))),
            Some(Expr::Array { elements, .. }) => {
                if elements.is_empty() {
                    return Ok(Dependencies::Constant);
                }
                let mut seen_bindings = Vec::new();
                let mut guards = Vec::new();
                for el in elements {
                    let e = match el {
                        ArrayElement::Item(e) => e,
                        ArrayElement::Spread(e) => e,
                        ArrayElement::Hole => continue,
                    };
                    if let Expr::Ident(ident) = &e {
                        if let Some(b) = ident.binding {
                            if seen_bindings.contains(&b) {
                                continue;
                            }
                            seen_bindings.push(b);
                        }
                    }
                    guards.push(self.optimize_expr(scope, e)?.expr);
                }
                if guards.is_empty() {
                    Ok(Dependencies::Constant)
                } else if guards.len() == 1 {
                    Ok(Dependencies::Single(guards.remove(0)))
                } else {
                    Ok(Dependencies::List(guards))
                }
            }
            Some(other) => Err(OptimizerError::dependency_list_not_array(other.span())),
        }
    }

    // ---- lvalues (§4.5) --------------------------------------------------

    /// Only identifiers invalidate tracking, and only when `dirty` (an
    /// assignment target, not a binding declaration). Destructuring targets
    /// pass through unchanged — their bound identifiers are not
    /// individually invalidated (§9 Open Questions, a documented
    /// limitation, not an oversight).
    fn optimize_lval(&mut self, scope: &Scope, pattern: Pattern, dirty: bool) -> OptResult<Pattern> {
        match pattern {
            Pattern::Ident(ident) => {
                if dirty {
                    if let Some(binding) = ident.binding {
                        scope.dirty_binding_value(binding);
                    }
                }
                Ok(Pattern::Ident(ident))
            }
            Pattern::Member {
                id,
                span,
                object,
                property,
            } => {
                let object = self.optimize_expr(scope, *object)?.expr;
                let property = match property {
                    PropKey::Static(s) => PropKey::Static(s),
                    PropKey::Computed(k) => PropKey::Computed(Box::new(self.optimize_expr(scope, *k)?.expr)),
                };
                Ok(Pattern::Member {
                    id,
                    span,
                    object: Box::new(object),
                    property,
                })
            }
            Pattern::Destructure { id, span, shape } => Ok(Pattern::Destructure { id, span, shape }),
        }
    }

    // ---- statements (§4.4) -----------------------------------------------

    /// Optimizes a single statement, returning its rewritten form. Used
    /// both for top-level statement lists (each result pushed onto the
    /// current scope in sequence) and for statements embedded directly as
    /// a struct field (an `if`'s branches, a `switch` case body, a
    /// labeled statement).
    fn optimize_stmt(&mut self, scope: &Scope, stmt: Stmt) -> OptResult<Stmt> {
        Ok(match stmt {
            Stmt::Expr { id, span, expr } => Stmt::Expr {
                id,
                span,
                expr: self.optimize_expr(scope, expr)?.expr,
            },
            Stmt::VarDecl {
                id,
                span,
                kind,
                declarations,
            } => Stmt::VarDecl {
                id,
                span,
                kind,
                declarations: declarations
                    .into_iter()
                    .map(|d| self.optimize_declarator(scope, d))
                    .collect::<OptResult<Vec<_>>>()?,
            },
            Stmt::Return { id, span, argument } => Stmt::Return {
                id,
                span,
                argument: argument
                    .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
                    .transpose()?,
            },
            Stmt::Throw { id, span, argument } => Stmt::Throw {
                id,
                span,
                argument: self.optimize_expr(scope, argument)?.expr,
            },
            Stmt::Block { id, span, body } => Stmt::Block {
                id,
                span,
                body: self.optimize_nested_block(scope, body, span)?,
            },
            Stmt::If {
                id,
                span,
                test,
                consequent,
                alternate,
            } => {
                let test = self.optimize_expr(scope, test)?.expr;
                let consequent = Box::new(self.optimize_stmt_as_block(scope, *consequent, span)?);
                let alternate = alternate
                    .map(|a| self.optimize_stmt_as_block(scope, *a, span).map(Box::new))
                    .transpose()?;
                Stmt::If {
                    id,
                    span,
                    test,
                    consequent,
                    alternate,
                }
            }
            Stmt::While { id, span, test, body } => {
                let test = self.optimize_expr(scope, test)?.expr;
                let (idx_decl, body) = self.optimize_loop_body(scope, *body, span)?;
                let stmt = Stmt::While {
                    id,
                    span,
                    test,
                    body: Box::new(body),
                };
                self.wrap_with_idx_decl(idx_decl, stmt, span)
            }
            Stmt::DoWhile { id, span, test, body } => {
                let (idx_decl, body) = self.optimize_loop_body(scope, *body, span)?;
                let test = self.optimize_expr(scope, test)?.expr;
                let stmt = Stmt::DoWhile {
                    id,
                    span,
                    test,
                    body: Box::new(body),
                };
                self.wrap_with_idx_decl(idx_decl, stmt, span)
            }
            Stmt::For {
                id,
                span,
                init,
                test,
                update,
                body,
            } => {
                let init = init
                    .map(|i| self.optimize_stmt(scope, *i).map(Box::new))
                    .transpose()?;
                let test = test
                    .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
                    .transpose()?;
                let update = update
                    .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
                    .transpose()?;
                let (idx_decl, body) = self.optimize_loop_body(scope, *body, span)?;
                let stmt = Stmt::For {
                    id,
                    span,
                    init,
                    test,
                    update,
                    body: Box::new(body),
                };
                self.wrap_with_idx_decl(idx_decl, stmt, span)
            }
            Stmt::ForEach {
                id,
                span,
                kind,
                decl_kind,
                left,
                right,
                body,
            } => {
                let right = self.optimize_expr(scope, right)?.expr;
                let (idx_decl, body) = self.optimize_loop_body(scope, *body, span)?;
                let stmt = Stmt::ForEach {
                    id,
                    span,
                    kind,
                    decl_kind,
                    left,
                    right,
                    body: Box::new(body),
                };
                self.wrap_with_idx_decl(idx_decl, stmt, span)
            }
            Stmt::Loop { id, span, body } => {
                let (idx_decl, body) = self.optimize_loop_body(scope, *body, span)?;
                let stmt = Stmt::Loop {
                    id,
                    span,
                    body: Box::new(body),
                };
                self.wrap_with_idx_decl(idx_decl, stmt, span)
            }
            Stmt::Switch {
                id,
                span,
                discriminant,
                cases,
            } => {
                let discriminant = self.optimize_expr(scope, discriminant)?.expr;
                let cases = cases
                    .into_iter()
                    .map(|c| self.optimize_switch_case(scope, c, span))
                    .collect::<OptResult<Vec<_>>>()?;
                Stmt::Switch {
                    id,
                    span,
                    discriminant,
                    cases,
                }
            }
            Stmt::Try {
                id,
                span,
                block,
                handler,
                finalizer,
            } => {
                let block = self.optimize_nested_block(scope, block, span)?;
                let handler = handler
                    .map(|h| -> OptResult<CatchClause> {
                        Ok(CatchClause {
                            param: h.param,
                            body: self.optimize_nested_block(scope, h.body, span)?,
                        })
                    })
                    .transpose()?;
                let finalizer = finalizer
                    .map(|f| self.optimize_nested_block(scope, f, span))
                    .transpose()?;
                Stmt::Try {
                    id,
                    span,
                    block,
                    handler,
                    finalizer,
                }
            }
            Stmt::Labeled { id, span, label, body } => {
                let body = Box::new(self.optimize_stmt_as_block(scope, *body, span)?);
                Stmt::Labeled { id, span, label, body }
            }
            Stmt::Break { id, span, label } => Stmt::Break { id, span, label },
            Stmt::Continue { id, span, label } => Stmt::Continue { id, span, label },
            // Skip-marked statements pass through untouched (§4.4).
            Stmt::Skip { id, span, inner } => Stmt::Skip { id, span, inner },
        })
    }

    /// Optimizes the component's (or a nested function's) own top-level
    /// statement list under `scope`, then finalizes `scope` with a
    /// root-style `cache`/`ref` initializer.
    fn optimize_root_block(&mut self, scope: &Scope, body: Vec<Stmt>) -> OptResult<Vec<Stmt>> {
        for stmt in body {
            let stmt = self.optimize_stmt(scope, stmt)?;
            scope.push_stmt(stmt);
        }
        let span = Span::synthetic();
        let (memo_init, ref_init) = self.root_header_inits(scope, span);
        Ok(scope.finish(memo_init, ref_init))
    }

    /// Optimizes an ordinary nested block (an `if` arm, a `try` block, a
    /// bare `{}` statement) under a fresh child scope, finalized with a
    /// statically-branched header (§9 "upward allocation").
    fn optimize_nested_block(&mut self, outer: &Scope, body: Vec<Stmt>, span: Span) -> OptResult<Vec<Stmt>> {
        let child = outer.child(false);
        for stmt in body {
            let stmt = self.optimize_stmt(&child, stmt)?;
            child.push_stmt(stmt);
        }
        let (memo_init, ref_init) = self.branch_header_inits(&child, span);
        Ok(child.finish(memo_init, ref_init))
    }

    /// Wraps a single embedded statement (an `if`'s arm, a labeled
    /// statement's body) in its own branch scope, flattening an existing
    /// `Stmt::Block` the same way `optimize_loop_body` does, so every
    /// branch of control flow gets its own header rather than sharing the
    /// enclosing scope's slots (§4.4, §9 "every branch is its own scope").
    fn optimize_stmt_as_block(&mut self, outer: &Scope, stmt: Stmt, span: Span) -> OptResult<Stmt> {
        let stmts = match stmt {
            Stmt::Block { body, .. } => body,
            other => vec![other],
        };
        let body = self.optimize_nested_block(outer, stmts, span)?;
        Ok(Stmt::Block {
            id: self.ids.node_id(),
            span,
            body,
        })
    }

    /// A loop body gets its own scope whose header, if used, is branched
    /// dynamically off the enclosing scope via a per-iteration counter
    /// rather than a single static slot (§3 `loopIdx`, §6 "loop bodies
    /// declare a per-iteration branch header as their first statement").
    /// Returns the declaration that seeds the counter before the loop (only
    /// when the body actually touched a cache) alongside the rewritten
    /// body, which increments that counter as its last statement.
    fn optimize_loop_body(&mut self, outer: &Scope, body: Stmt, span: Span) -> OptResult<(Option<Stmt>, Stmt)> {
        let stmts = match body {
            Stmt::Block { body, .. } => body,
            other => vec![other],
        };
        let child = outer.child(true);
        let idx_ident = child.loop_idx(&mut self.ids);
        for stmt in stmts {
            let stmt = self.optimize_stmt(&child, stmt)?;
            child.push_stmt(stmt);
        }
        let uses_header = child.has_header(CacheKind::Memo) || child.has_header(CacheKind::Ref);
        let (memo_init, ref_init) = self.loop_header_inits(&child, &idx_ident, span);
        let mut body_stmts = child.finish(memo_init, ref_init);

        let idx_decl = if uses_header {
            body_stmts.push(self.increment_stmt(&idx_ident, span));
            Some(self.idx_init_decl(&idx_ident, span))
        } else {
            None
        };
        let body_block = Stmt::Block {
            id: self.ids.node_id(),
            span,
            body: body_stmts,
        };
        Ok((idx_decl, body_block))
    }

    fn idx_init_decl(&mut self, idx: &Ident, span: Span) -> Stmt {
        let zero = self.num_lit(0.0, span);
        Stmt::VarDecl {
            id: self.ids.node_id(),
            span,
            kind: VarKind::Let,
            declarations: vec![Declarator {
                name: Pattern::Ident(idx.clone()),
                type_annotation: None,
                init: Some(zero),
            }],
        }
    }

    fn increment_stmt(&mut self, idx: &Ident, span: Span) -> Stmt {
        let one = self.num_lit(1.0, span);
        let expr = Expr::Assignment {
            id: self.ids.node_id(),
            span,
            op: AssignOp::AddAssign,
            target: Box::new(Pattern::Ident(idx.clone())),
            value: Box::new(one),
        };
        Stmt::Expr {
            id: self.ids.node_id(),
            span,
            expr,
        }
    }

    /// When a loop body needed a per-iteration counter, splices its `let
    /// idx = 0` declaration in just before the loop statement (§6).
    fn wrap_with_idx_decl(&mut self, idx_decl: Option<Stmt>, loop_stmt: Stmt, span: Span) -> Stmt {
        match idx_decl {
            Some(decl) => Stmt::Block {
                id: self.ids.node_id(),
                span,
                body: vec![decl, loop_stmt],
            },
            None => loop_stmt,
        }
    }

    fn optimize_declarator(&mut self, scope: &Scope, decl: Declarator) -> OptResult<Declarator> {
        let init = decl
            .init
            .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
            .transpose()?;
        Ok(Declarator {
            name: decl.name,
            type_annotation: decl.type_annotation,
            init,
        })
    }

    fn optimize_switch_case(&mut self, scope: &Scope, case: SwitchCase, span: Span) -> OptResult<SwitchCase> {
        let test = case
            .test
            .map(|e| self.optimize_expr(scope, e).map(|r| r.expr))
            .transpose()?;
        let consequent = self.optimize_nested_block(scope, case.consequent, span)?;
        Ok(SwitchCase { test, consequent })
    }
}

fn push_deps(deps: &mut DepList, new: &[BindingId]) {
    for d in new {
        if !deps.contains(d) {
            deps.push(*d);
        }
    }
}

/// A component body is only useful if some path through it returns a
/// value; `MissingComponentReturn` catches an input that would otherwise
/// silently produce `undefined` (§7).
fn component_has_return(body: &[Stmt]) -> bool {
    body.iter().any(stmt_has_return)
}

fn stmt_has_return(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => true,
        Stmt::Block { body, .. } => body.iter().any(stmt_has_return),
        Stmt::If { consequent, alternate, .. } => {
            stmt_has_return(consequent) || alternate.as_deref().is_some_and(stmt_has_return)
        }
        Stmt::While { body, .. }
        | Stmt::DoWhile { body, .. }
        | Stmt::For { body, .. }
        | Stmt::ForEach { body, .. }
        | Stmt::Loop { body, .. } => stmt_has_return(body),
        Stmt::Switch { cases, .. } => cases.iter().any(|c| c.consequent.iter().any(stmt_has_return)),
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            block.iter().any(stmt_has_return)
                || handler.as_ref().is_some_and(|h| h.body.iter().any(stmt_has_return))
                || finalizer.as_ref().is_some_and(|f| f.iter().any(stmt_has_return))
        }
        Stmt::Labeled { body, .. } | Stmt::Skip { inner: body, .. } => stmt_has_return(body),
        Stmt::Expr { .. }
        | Stmt::VarDecl { .. }
        | Stmt::Throw { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. } => false,
    }
}

/// Collects the identifiers a function expression reads that are bound
/// outside of it, relative to the enclosing component (§4.2's function
/// expression row). Runs on the pre-optimization AST, before
/// `optimize_function` hands the body a disconnected scope of its own.
/// An identifier declared anywhere inside the body (by a `let`/`const`, a
/// loop variable, a catch parameter, or a nested function's own params)
/// is excluded even if a sibling statement reads it before the
/// declaration is reached — a conservative, whole-body approximation
/// rather than true block-scoped shadowing.
fn free_variable_idents(function: &Function) -> Vec<Ident> {
    let mut bound = HashSet::new();
    for p in &function.params {
        collect_bound_bindings_pattern(p, &mut bound);
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    match &function.body {
        FunctionBody::Expression(e) => collect_free_idents_expr(e, &bound, &mut seen, &mut out),
        FunctionBody::Block(stmts) => {
            for s in stmts {
                collect_bound_bindings_stmt(s, &mut bound);
            }
            for s in stmts {
                collect_free_idents_stmt(s, &bound, &mut seen, &mut out);
            }
        }
    }
    out
}

fn collect_bound_bindings_pattern(pattern: &Pattern, bound: &mut HashSet<BindingId>) {
    match pattern {
        Pattern::Ident(ident) => {
            if let Some(b) = ident.binding {
                bound.insert(b);
            }
        }
        Pattern::Member { .. } => {}
        Pattern::Destructure { shape, .. } => collect_bound_bindings_destructure(shape, bound),
    }
}

fn collect_bound_bindings_destructure(shape: &DestructurePattern, bound: &mut HashSet<BindingId>) {
    match shape {
        DestructurePattern::Array(elements) => {
            for el in elements.iter().flatten() {
                collect_bound_bindings_pattern(el, bound);
            }
        }
        DestructurePattern::Object(props) => {
            for (_, p) in props {
                collect_bound_bindings_pattern(p, bound);
            }
        }
    }
}

fn collect_bound_bindings_stmt(stmt: &Stmt, bound: &mut HashSet<BindingId>) {
    match stmt {
        Stmt::VarDecl { declarations, .. } => {
            for d in declarations {
                collect_bound_bindings_pattern(&d.name, bound);
            }
        }
        Stmt::Block { body, .. } => body.iter().for_each(|s| collect_bound_bindings_stmt(s, bound)),
        Stmt::If { consequent, alternate, .. } => {
            collect_bound_bindings_stmt(consequent, bound);
            if let Some(a) = alternate {
                collect_bound_bindings_stmt(a, bound);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Loop { body, .. } => {
            collect_bound_bindings_stmt(body, bound);
        }
        Stmt::For { init, body, .. } => {
            if let Some(i) = init {
                collect_bound_bindings_stmt(i, bound);
            }
            collect_bound_bindings_stmt(body, bound);
        }
        Stmt::ForEach { left, body, .. } => {
            collect_bound_bindings_pattern(left, bound);
            collect_bound_bindings_stmt(body, bound);
        }
        Stmt::Switch { cases, .. } => {
            for c in cases {
                c.consequent.iter().for_each(|s| collect_bound_bindings_stmt(s, bound));
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            block.iter().for_each(|s| collect_bound_bindings_stmt(s, bound));
            if let Some(h) = handler {
                if let Some(p) = &h.param {
                    collect_bound_bindings_pattern(p, bound);
                }
                h.body.iter().for_each(|s| collect_bound_bindings_stmt(s, bound));
            }
            if let Some(f) = finalizer {
                f.iter().for_each(|s| collect_bound_bindings_stmt(s, bound));
            }
        }
        Stmt::Labeled { body, .. } | Stmt::Skip { inner: body, .. } => collect_bound_bindings_stmt(body, bound),
        Stmt::Expr { .. } | Stmt::Return { .. } | Stmt::Throw { .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

fn collect_free_idents_expr(expr: &Expr, bound: &HashSet<BindingId>, seen: &mut HashSet<BindingId>, out: &mut Vec<Ident>) {
    match expr {
        Expr::Ident(ident) => record_free_ident(ident, bound, seen, out),
        Expr::Number { .. }
        | Expr::Str { .. }
        | Expr::Bool { .. }
        | Expr::Null { .. }
        | Expr::Undefined { .. }
        | Expr::BigInt { .. }
        | Expr::Other { .. } => {}
        Expr::TemplateLiteral { exprs, .. } => exprs.iter().for_each(|e| collect_free_idents_expr(e, bound, seen, out)),
        Expr::TaggedTemplate { tag, exprs, .. } => {
            collect_free_idents_expr(tag, bound, seen, out);
            exprs.iter().for_each(|e| collect_free_idents_expr(e, bound, seen, out));
        }
        Expr::Member { object, property, .. } => {
            collect_free_idents_expr(object, bound, seen, out);
            if let PropKey::Computed(k) = property {
                collect_free_idents_expr(k, bound, seen, out);
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
            ..
        } => {
            collect_free_idents_expr(test, bound, seen, out);
            collect_free_idents_expr(consequent, bound, seen, out);
            collect_free_idents_expr(alternate, bound, seen, out);
        }
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            collect_free_idents_expr(left, bound, seen, out);
            collect_free_idents_expr(right, bound, seen, out);
        }
        Expr::Unary { argument, .. } => collect_free_idents_expr(argument, bound, seen, out),
        Expr::Assignment { target, value, .. } => {
            if let Pattern::Member { object, property, .. } = &**target {
                collect_free_idents_expr(object, bound, seen, out);
                if let PropKey::Computed(k) = property {
                    collect_free_idents_expr(k, bound, seen, out);
                }
            }
            collect_free_idents_expr(value, bound, seen, out);
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
            collect_free_idents_expr(callee, bound, seen, out);
            args.iter().for_each(|a| collect_free_idents_expr(a, bound, seen, out));
        }
        Expr::Array { elements, .. } => elements.iter().for_each(|el| match el {
            ArrayElement::Item(e) | ArrayElement::Spread(e) => collect_free_idents_expr(e, bound, seen, out),
            ArrayElement::Hole => {}
        }),
        Expr::Object { properties, .. } => properties.iter().for_each(|p| match p {
            ObjectProperty::KeyValue { key, value } => {
                if let PropKey::Computed(k) = key {
                    collect_free_idents_expr(k, bound, seen, out);
                }
                collect_free_idents_expr(value, bound, seen, out);
            }
            ObjectProperty::Shorthand(ident) => record_free_ident(ident, bound, seen, out),
            ObjectProperty::Spread(e) => collect_free_idents_expr(e, bound, seen, out),
            ObjectProperty::Method { key, function } => {
                if let PropKey::Computed(k) = key {
                    collect_free_idents_expr(k, bound, seen, out);
                }
                collect_free_idents_expr(function, bound, seen, out);
            }
        }),
        Expr::FunctionExpr { function, .. } => {
            let mut inner_bound = bound.clone();
            for p in &function.params {
                collect_bound_bindings_pattern(p, &mut inner_bound);
            }
            match &function.body {
                FunctionBody::Expression(e) => collect_free_idents_expr(e, &inner_bound, seen, out),
                FunctionBody::Block(stmts) => {
                    for s in stmts {
                        collect_bound_bindings_stmt(s, &mut inner_bound);
                    }
                    for s in stmts {
                        collect_free_idents_stmt(s, &inner_bound, seen, out);
                    }
                }
            }
        }
        Expr::Sequence { exprs, .. } => exprs.iter().for_each(|e| collect_free_idents_expr(e, bound, seen, out)),
        Expr::Paren { inner, .. } | Expr::TypeAssertion { inner, .. } => {
            collect_free_idents_expr(inner, bound, seen, out)
        }
        Expr::Jsx(node) => collect_free_idents_jsx(node, bound, seen, out),
    }
}

fn collect_free_idents_jsx(node: &JsxNode, bound: &HashSet<BindingId>, seen: &mut HashSet<BindingId>, out: &mut Vec<Ident>) {
    for attr in &node.attributes {
        match attr {
            JsxAttribute::Named {
                value: Some(JsxAttrValue::Expr(e)),
                ..
            } => collect_free_idents_expr(e, bound, seen, out),
            JsxAttribute::Named { .. } => {}
            JsxAttribute::Spread(e) => collect_free_idents_expr(e, bound, seen, out),
        }
    }
    for child in &node.children {
        match child {
            JsxChild::Text(_) => {}
            JsxChild::Expr(e) => collect_free_idents_expr(e, bound, seen, out),
            JsxChild::Element(el) => collect_free_idents_jsx(el, bound, seen, out),
        }
    }
}

fn collect_free_idents_stmt(stmt: &Stmt, bound: &HashSet<BindingId>, seen: &mut HashSet<BindingId>, out: &mut Vec<Ident>) {
    match stmt {
        Stmt::Expr { expr, .. } => collect_free_idents_expr(expr, bound, seen, out),
        Stmt::VarDecl { declarations, .. } => {
            for d in declarations {
                if let Some(init) = &d.init {
                    collect_free_idents_expr(init, bound, seen, out);
                }
            }
        }
        Stmt::Return { argument: Some(e), .. } => collect_free_idents_expr(e, bound, seen, out),
        Stmt::Return { argument: None, .. } => {}
        Stmt::Throw { argument, .. } => collect_free_idents_expr(argument, bound, seen, out),
        Stmt::Block { body, .. } => body.iter().for_each(|s| collect_free_idents_stmt(s, bound, seen, out)),
        Stmt::If {
            test,
            consequent,
            alternate,
            ..
        } => {
            collect_free_idents_expr(test, bound, seen, out);
            collect_free_idents_stmt(consequent, bound, seen, out);
            if let Some(a) = alternate {
                collect_free_idents_stmt(a, bound, seen, out);
            }
        }
        Stmt::While { test, body, .. } | Stmt::DoWhile { test, body, .. } => {
            collect_free_idents_expr(test, bound, seen, out);
            collect_free_idents_stmt(body, bound, seen, out);
        }
        Stmt::For {
            init,
            test,
            update,
            body,
            ..
        } => {
            if let Some(i) = init {
                collect_free_idents_stmt(i, bound, seen, out);
            }
            if let Some(t) = test {
                collect_free_idents_expr(t, bound, seen, out);
            }
            if let Some(u) = update {
                collect_free_idents_expr(u, bound, seen, out);
            }
            collect_free_idents_stmt(body, bound, seen, out);
        }
        Stmt::ForEach { right, body, .. } => {
            collect_free_idents_expr(right, bound, seen, out);
            collect_free_idents_stmt(body, bound, seen, out);
        }
        Stmt::Loop { body, .. } => collect_free_idents_stmt(body, bound, seen, out),
        Stmt::Switch {
            discriminant, cases, ..
        } => {
            collect_free_idents_expr(discriminant, bound, seen, out);
            for c in cases {
                if let Some(t) = &c.test {
                    collect_free_idents_expr(t, bound, seen, out);
                }
                c.consequent
                    .iter()
                    .for_each(|s| collect_free_idents_stmt(s, bound, seen, out));
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            block.iter().for_each(|s| collect_free_idents_stmt(s, bound, seen, out));
            if let Some(h) = handler {
                h.body.iter().for_each(|s| collect_free_idents_stmt(s, bound, seen, out));
            }
            if let Some(f) = finalizer {
                f.iter().for_each(|s| collect_free_idents_stmt(s, bound, seen, out));
            }
        }
        Stmt::Labeled { body, .. } | Stmt::Skip { inner: body, .. } => {
            collect_free_idents_stmt(body, bound, seen, out)
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

fn record_free_ident(ident: &Ident, bound: &HashSet<BindingId>, seen: &mut HashSet<BindingId>, out: &mut Vec<Ident>) {
    if let Some(b) = ident.binding {
        if !bound.contains(&b) && seen.insert(b) {
            out.push(ident.clone());
        }
    }
}
