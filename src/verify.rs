//! Post-hoc invariant checker for a rewritten component (§3 Invariants 1-3,
//! §8's testable properties). Walks the emitted AST rather than consulting
//! `Scope` directly, so it can be run against anything `optimize_component`
//! produced (or against hand-built fixtures in tests) without re-running
//! the pass.
//!
//! A recursive tree-walk over the rewritten AST, using `bitvec::BitVec`
//! for compact per-header visited-slot bookkeeping rather than a
//! `HashSet<u32>` (see `DESIGN.md` for the grounding notes).

use std::collections::HashMap;

use bitvec::vec::BitVec;

use crate::ast::*;
use crate::preset::RuntimeNames;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// Invariant 1: a cache's allocated slots are a contiguous `0..size`
    /// range, with every one of them referenced somewhere in the tree.
    SlotContiguity,
    /// Invariant 2: no slot is assigned from more than one call site.
    SingleWritePerSlot,
    /// Invariant 3: no synthetic header identifier is declared twice.
    HeaderIsolation,
}

#[derive(Debug, Clone)]
pub struct VerifyError {
    pub invariant: Invariant,
    pub message: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum HeaderKind {
    Memo,
    Ref,
    /// A `branch`-initialized header: its cache kind isn't recoverable from
    /// the call alone (both memo and ref branches use the same runtime
    /// symbol), only that it belongs to exactly one header.
    Branch,
}

struct HeaderInfo {
    kind: HeaderKind,
    size: u32,
    seen: BitVec,
    write_counts: HashMap<u32, u32>,
    declared_at: u32,
}

pub fn verify_component(component: &Component, names: &RuntimeNames) -> Result<(), Vec<VerifyError>> {
    let mut v = Verifier {
        names,
        headers: HashMap::new(),
        declarations_seen: 0,
        errors: Vec::new(),
    };
    v.walk_block(&component.body);
    v.finish()
}

struct Verifier<'a> {
    names: &'a RuntimeNames,
    headers: HashMap<String, HeaderInfo>,
    declarations_seen: u32,
    errors: Vec<VerifyError>,
}

impl<'a> Verifier<'a> {
    fn finish(mut self) -> Result<(), Vec<VerifyError>> {
        for (name, info) in &self.headers {
            for slot in 0..info.size {
                let covered = info.seen.get(slot as usize).map(|b| *b).unwrap_or(false);
                if !covered {
                    self.errors.push(VerifyError {
                        invariant: Invariant::SlotContiguity,
                        message: format!(
                            "header `{}` declares size {} but slot {} is never referenced",
                            name, info.size, slot
                        ),
                    });
                }
            }
            for (slot, count) in &info.write_counts {
                if *count > 1 {
                    self.errors.push(VerifyError {
                        invariant: Invariant::SingleWritePerSlot,
                        message: format!("header `{}` slot {} is written from {} call sites", name, slot, count),
                    });
                }
            }
        }
        if self.errors.is_empty() {
            log::debug!("verified {} header(s), no invariant violations", self.headers.len());
            Ok(())
        } else {
            log::warn!("{} invariant violation(s) found across {} header(s)", self.errors.len(), self.headers.len());
            Err(self.errors)
        }
    }

    fn classify_header_init(&self, init: &Expr) -> Option<(HeaderKind, u32)> {
        let Expr::Call { callee, args, .. } = init else {
            return None;
        };
        let Expr::Ident(ident) = &**callee else {
            return None;
        };
        let size_of = |idx: usize| match args.get(idx) {
            Some(Expr::Number { value, .. }) => Some(*value as u32),
            _ => None,
        };
        if ident.name == self.names.cache {
            size_of(1).map(|size| (HeaderKind::Memo, size))
        } else if ident.name == self.names.ref_ {
            size_of(1).map(|size| (HeaderKind::Ref, size))
        } else if ident.name == self.names.branch {
            size_of(2).map(|size| (HeaderKind::Branch, size))
        } else {
            None
        }
    }

    fn record_header(&mut self, name: &str, kind: HeaderKind, size: u32) {
        self.declarations_seen += 1;
        if self.headers.contains_key(name) {
            self.errors.push(VerifyError {
                invariant: Invariant::HeaderIsolation,
                message: format!("header identifier `{}` is declared more than once", name),
            });
            return;
        }
        self.headers.insert(
            name.to_string(),
            HeaderInfo {
                kind,
                size,
                seen: BitVec::repeat(false, size as usize),
                write_counts: HashMap::new(),
                declared_at: self.declarations_seen,
            },
        );
    }

    fn mark_slot_seen(&mut self, header: &str, slot: u32) {
        if let Some(info) = self.headers.get_mut(header) {
            if (slot as usize) < info.seen.len() {
                info.seen.set(slot as usize, true);
            }
        }
    }

    fn mark_slot_written(&mut self, header: &str, slot: u32) {
        self.mark_slot_seen(header, slot);
        if let Some(info) = self.headers.get_mut(header) {
            *info.write_counts.entry(slot).or_insert(0) += 1;
        }
    }

    fn walk_block(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            self.walk_stmt(s);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr { expr, .. } => self.walk_expr(expr),
            Stmt::VarDecl { declarations, .. } => {
                for d in declarations {
                    let Some(init) = &d.init else { continue };
                    let header_name = match &d.name {
                        Pattern::Ident(ident) => Some(ident.name.clone()),
                        _ => None,
                    };
                    match header_name.and_then(|name| self.classify_header_init(init).map(|(k, s)| (name, k, s))) {
                        Some((name, kind, size)) => self.record_header(&name, kind, size),
                        None => self.walk_expr(init),
                    }
                }
            }
            Stmt::Return { argument, .. } => {
                if let Some(e) = argument {
                    self.walk_expr(e);
                }
            }
            Stmt::Throw { argument, .. } => self.walk_expr(argument),
            Stmt::Block { body, .. } => self.walk_block(body),
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.walk_expr(test);
                self.walk_stmt(consequent);
                if let Some(a) = alternate {
                    self.walk_stmt(a);
                }
            }
            Stmt::While { test, body, .. } | Stmt::DoWhile { test, body, .. } => {
                self.walk_expr(test);
                self.walk_stmt(body);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                if let Some(i) = init {
                    self.walk_stmt(i);
                }
                if let Some(t) = test {
                    self.walk_expr(t);
                }
                if let Some(u) = update {
                    self.walk_expr(u);
                }
                self.walk_stmt(body);
            }
            Stmt::ForEach { right, body, .. } => {
                self.walk_expr(right);
                self.walk_stmt(body);
            }
            Stmt::Loop { body, .. } => self.walk_stmt(body),
            Stmt::Switch {
                discriminant, cases, ..
            } => {
                self.walk_expr(discriminant);
                for c in cases {
                    if let Some(t) = &c.test {
                        self.walk_expr(t);
                    }
                    self.walk_block(&c.consequent);
                }
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.walk_block(block);
                if let Some(h) = handler {
                    self.walk_block(&h.body);
                }
                if let Some(f) = finalizer {
                    self.walk_block(f);
                }
            }
            Stmt::Labeled { body, .. } => self.walk_stmt(body),
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
            Stmt::Skip { inner, .. } => self.walk_stmt(inner),
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number { .. }
            | Expr::Str { .. }
            | Expr::Bool { .. }
            | Expr::Null { .. }
            | Expr::Undefined { .. }
            | Expr::BigInt { .. }
            | Expr::Other { .. } => {}
            Expr::TemplateLiteral { exprs, .. } => exprs.iter().for_each(|e| self.walk_expr(e)),
            Expr::TaggedTemplate { tag, exprs, .. } => {
                self.walk_expr(tag);
                exprs.iter().for_each(|e| self.walk_expr(e));
            }
            Expr::Ident(_) => {}
            Expr::Member { object, property, .. } => {
                self.record_slot_read(expr);
                self.walk_expr(object);
                if let PropKey::Computed(k) = property {
                    self.walk_expr(k);
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.walk_expr(test);
                self.walk_expr(consequent);
                self.walk_expr(alternate);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Expr::Unary { argument, .. } => self.walk_expr(argument),
            Expr::Assignment { target, value, .. } => {
                self.walk_assign_target(target);
                self.walk_expr(value);
            }
            Expr::Call { callee, args, .. } => {
                if let Expr::Ident(ident) = &**callee {
                    if ident.name == self.names.equals {
                        if let (Some(Expr::Ident(header)), Some(Expr::Number { value, .. })) =
                            (args.first(), args.get(1))
                        {
                            self.mark_slot_seen(&header.name, *value as u32);
                        }
                    }
                }
                self.walk_expr(callee);
                args.iter().for_each(|a| self.walk_expr(a));
            }
            Expr::New { callee, args, .. } => {
                self.walk_expr(callee);
                args.iter().for_each(|a| self.walk_expr(a));
            }
            Expr::Array { elements, .. } => elements.iter().for_each(|el| match el {
                ArrayElement::Item(e) | ArrayElement::Spread(e) => self.walk_expr(e),
                ArrayElement::Hole => {}
            }),
            Expr::Object { properties, .. } => properties.iter().for_each(|p| self.walk_object_property(p)),
            Expr::FunctionExpr { function, .. } => self.walk_function(function),
            Expr::Sequence { exprs, .. } => exprs.iter().for_each(|e| self.walk_expr(e)),
            Expr::Paren { inner, .. } | Expr::TypeAssertion { inner, .. } => self.walk_expr(inner),
            Expr::Jsx(node) => self.walk_jsx(node),
        }
    }

    fn record_slot_read(&mut self, expr: &Expr) {
        if let Expr::Member {
            object,
            property: PropKey::Computed(key),
            ..
        } = expr
        {
            if let (Expr::Ident(header), Expr::Number { value, .. }) = (&**object, &**key) {
                self.mark_slot_seen(&header.name, *value as u32);
            }
        }
    }

    fn walk_assign_target(&mut self, target: &Pattern) {
        match target {
            Pattern::Ident(_) => {}
            Pattern::Member { object, property, .. } => {
                if let (Expr::Ident(header), PropKey::Computed(key)) = (&**object, property) {
                    if let Expr::Number { value, .. } = &**key {
                        self.mark_slot_written(&header.name, *value as u32);
                    }
                }
                self.walk_expr(object);
                if let PropKey::Computed(k) = property {
                    self.walk_expr(k);
                }
            }
            Pattern::Destructure { .. } => {}
        }
    }

    fn walk_object_property(&mut self, prop: &ObjectProperty) {
        match prop {
            ObjectProperty::KeyValue { key, value } => {
                self.walk_key(key);
                self.walk_expr(value);
            }
            ObjectProperty::Shorthand(_) => {}
            ObjectProperty::Spread(e) => self.walk_expr(e),
            ObjectProperty::Method { key, function } => {
                self.walk_key(key);
                self.walk_expr(function);
            }
        }
    }

    fn walk_key(&mut self, key: &PropKey) {
        if let PropKey::Computed(e) = key {
            self.walk_expr(e);
        }
    }

    fn walk_function(&mut self, function: &Function) {
        match &function.body {
            FunctionBody::Expression(e) => self.walk_expr(e),
            FunctionBody::Block(stmts) => self.walk_block(stmts),
        }
    }

    fn walk_jsx(&mut self, node: &JsxNode) {
        for attr in &node.attributes {
            match attr {
                JsxAttribute::Named { value: Some(JsxAttrValue::Expr(e)), .. } => self.walk_expr(e),
                JsxAttribute::Named { .. } => {}
                JsxAttribute::Spread(e) => self.walk_expr(e),
            }
        }
        for child in &node.children {
            match child {
                JsxChild::Text(_) => {}
                JsxChild::Expr(e) => self.walk_expr(e),
                JsxChild::Element(el) => self.walk_jsx(el),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::optimize_component;
    use crate::preset::StateContext;
    use crate::span::{IdGen, Span};

    fn num(ids: &mut IdGen, v: f64) -> Expr {
        Expr::Number {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: v,
        }
    }

    fn local_ident(ids: &mut IdGen, name: &str) -> Ident {
        Ident {
            id: ids.node_id(),
            span: Span::synthetic(),
            name: name.to_string(),
            binding: Some(ids.binding_id()),
        }
    }

    #[test]
    fn a_single_memoized_call_has_contiguous_verified_slots() {
        let mut ids = IdGen::new();
        let x = local_ident(&mut ids, "x");
        let memo_call = Expr::Call {
            id: ids.node_id(),
            span: Span::synthetic(),
            callee: Box::new(Expr::Ident(Ident {
                id: ids.node_id(),
                span: Span::synthetic(),
                name: "useMemo".to_string(),
                binding: None,
            })),
            args: vec![
                Expr::FunctionExpr {
                    id: ids.node_id(),
                    span: Span::synthetic(),
                    function: Function {
                        params: vec![],
                        body: FunctionBody::Expression(Box::new(Expr::Ident(x.clone()))),
                        is_arrow: true,
                    },
                },
                Expr::Array {
                    id: ids.node_id(),
                    span: Span::synthetic(),
                    elements: vec![ArrayElement::Item(Expr::Ident(x.clone()))],
                },
            ],
            optional: false,
        };
        let component = Component {
            name: "Widget".to_string(),
            params: vec![Pattern::Ident(x)],
            body: vec![Stmt::Return {
                id: ids.node_id(),
                span: Span::synthetic(),
                argument: Some(memo_call),
            }],
        };
        let mut state = StateContext::with_default_react_preset();
        let optimized = optimize_component(component, &mut state).expect("optimizes cleanly");
        verify_component(&optimized, &state.runtime_names).expect("all invariants hold");
    }

    #[test]
    fn a_directly_crafted_double_write_is_rejected() {
        let mut ids = IdGen::new();
        let header = local_ident(&mut ids, "_c0");
        let write = |ids: &mut IdGen, header: &Ident, slot: f64, value: f64| Stmt::Expr {
            id: ids.node_id(),
            span: Span::synthetic(),
            expr: Expr::Assignment {
                id: ids.node_id(),
                span: Span::synthetic(),
                op: AssignOp::Assign,
                target: Box::new(Pattern::Member {
                    id: ids.node_id(),
                    span: Span::synthetic(),
                    object: Box::new(Expr::Ident(header.clone())),
                    property: PropKey::Computed(Box::new(num(ids, slot))),
                }),
                value: Box::new(num(ids, value)),
            },
        };
        let decl = Stmt::VarDecl {
            id: ids.node_id(),
            span: Span::synthetic(),
            kind: VarKind::Let,
            declarations: vec![Declarator {
                name: Pattern::Ident(header.clone()),
                type_annotation: None,
                init: Some(Expr::Call {
                    id: ids.node_id(),
                    span: Span::synthetic(),
                    callee: Box::new(Expr::Ident(Ident {
                        id: ids.node_id(),
                        span: Span::synthetic(),
                        name: "cache".to_string(),
                        binding: None,
                    })),
                    args: vec![
                        Expr::Ident(Ident {
                            id: ids.node_id(),
                            span: Span::synthetic(),
                            name: "useMemo".to_string(),
                            binding: None,
                        }),
                        num(&mut ids, 1.0),
                    ],
                    optional: false,
                }),
            }],
        };
        let component = Component {
            name: "Bad".to_string(),
            params: vec![],
            body: vec![decl, write(&mut ids, &header, 0.0, 1.0), write(&mut ids, &header, 0.0, 2.0)],
        };
        let names = RuntimeNames::default();
        let result = verify_component(&component, &names);
        let errors = result.expect_err("double write must be rejected");
        assert!(errors.iter().any(|e| e.invariant == Invariant::SingleWritePerSlot));
    }
}
