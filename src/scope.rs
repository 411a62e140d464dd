//! Per-block cache-slot bookkeeping (§3 "Scope").
//!
//! Scopes form a true parent-linked tree mirroring lexical block
//! structure, rather than a flat push/pop stack: a child scope outlives
//! the stack frame that created it (its finalized statements are spliced
//! into the parent after the child's own substructure is fully
//! optimized), so `Rc<RefCell<_>>` is needed in place of a plain `Vec`
//! (see `DESIGN.md` for the grounding notes).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Ident, Stmt, VarKind};
use crate::optimizer::OptimizedExpression;
use crate::span::{BindingId, IdGen, NodeId, Span};

/// Selects which of a scope's two caches (memo or ref) a slot belongs to
/// (§3 Invariant 3: "Memo and ref caches are never mixed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Memo,
    Ref,
}

/// Where a scope's header for one cache kind comes from: the root scope's
/// header is seeded by a top-level `cache`/`ref` runtime call; any other
/// scope's is seeded by a `branch` call rooted at a slot reserved in the
/// parent (§3 Invariant 3, §9 "Scope tree with upward allocation").
#[derive(Debug, Clone)]
pub struct BranchOrigin {
    pub parent_header: Ident,
    pub parent_slot: u32,
}

struct ScopeData {
    memo_header: Option<Ident>,
    ref_header: Option<Ident>,
    memo_origin: Option<BranchOrigin>,
    ref_origin: Option<BranchOrigin>,
    memo_index: u32,
    ref_index: u32,
    loop_memo: Option<Ident>,
    loop_ref: Option<Ident>,
    loop_idx: Option<Ident>,
    parent: Option<Scope>,
    is_in_loop: bool,
    statements: Vec<Stmt>,
    optimized: IndexMap<NodeId, OptimizedExpression>,
    /// Tracks which `NodeId` last recorded a binding's memoized read, so a
    /// later assignment can find and invalidate it by `BindingId` even
    /// though every read occurrence allocates its own `NodeId` (§4.5).
    by_binding: HashMap<BindingId, NodeId>,
    constants: HashSet<BindingId>,
    finalized: bool,
}

/// A node in the scope tree. Cheaply cloneable (an `Rc` handle) so the
/// Optimizer can hold a reference to the "current scope" while also
/// recording it as a child's parent.
#[derive(Clone)]
pub struct Scope(Rc<RefCell<ScopeData>>);

impl Scope {
    pub fn root() -> Self {
        Scope(Rc::new(RefCell::new(ScopeData {
            memo_header: None,
            ref_header: None,
            memo_origin: None,
            ref_origin: None,
            memo_index: 0,
            ref_index: 0,
            loop_memo: None,
            loop_ref: None,
            loop_idx: None,
            parent: None,
            is_in_loop: false,
            statements: Vec::new(),
            optimized: IndexMap::new(),
            by_binding: HashMap::new(),
            constants: HashSet::new(),
            finalized: false,
        })))
    }

    pub fn child(&self, is_in_loop: bool) -> Self {
        Scope(Rc::new(RefCell::new(ScopeData {
            memo_header: None,
            ref_header: None,
            memo_origin: None,
            ref_origin: None,
            memo_index: 0,
            ref_index: 0,
            loop_memo: None,
            loop_ref: None,
            loop_idx: None,
            parent: Some(self.clone()),
            is_in_loop,
            statements: Vec::new(),
            optimized: IndexMap::new(),
            by_binding: HashMap::new(),
            constants: HashSet::new(),
            finalized: false,
        })))
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0.borrow().parent.clone()
    }

    pub fn is_root(&self) -> bool {
        self.0.borrow().parent.is_none()
    }

    pub fn is_in_loop(&self) -> bool {
        self.0.borrow().is_in_loop
    }

    /// Allocates the next contiguous slot index for `kind` in this scope
    /// (§3 Invariant 1). Indices are never reused.
    pub fn alloc_slot(&self, kind: CacheKind) -> u32 {
        let mut data = self.0.borrow_mut();
        match kind {
            CacheKind::Memo => {
                let i = data.memo_index;
                data.memo_index += 1;
                i
            }
            CacheKind::Ref => {
                let i = data.ref_index;
                data.ref_index += 1;
                i
            }
        }
    }

    pub fn slot_count(&self, kind: CacheKind) -> u32 {
        let data = self.0.borrow();
        match kind {
            CacheKind::Memo => data.memo_index,
            CacheKind::Ref => data.ref_index,
        }
    }

    /// Returns this scope's header for `kind`, creating a fresh identifier
    /// on first use (§3 Invariant 2: every read/write against a slot of a
    /// scope uses the same header, created once). For a non-root scope,
    /// creating the header also reserves this scope's branch slot in the
    /// parent's matching cache, recursively ensuring the parent's own
    /// header exists first (§9: upward allocation).
    pub fn header(&self, kind: CacheKind, ids: &mut IdGen) -> Ident {
        let existing = {
            let data = self.0.borrow();
            match kind {
                CacheKind::Memo => data.memo_header.clone(),
                CacheKind::Ref => data.ref_header.clone(),
            }
        };
        if let Some(ident) = existing {
            return ident;
        }

        let origin = self.parent().map(|parent| {
            let parent_header = parent.header(kind, ids);
            let parent_slot = parent.alloc_slot(kind);
            BranchOrigin {
                parent_header,
                parent_slot,
            }
        });

        let name = ids.synthetic_name(match kind {
            CacheKind::Memo => "c",
            CacheKind::Ref => "r",
        });
        let ident = Ident {
            id: ids.node_id(),
            span: Span::synthetic(),
            name,
            binding: Some(ids.binding_id()),
        };

        let mut data = self.0.borrow_mut();
        match kind {
            CacheKind::Memo => {
                data.memo_header = Some(ident.clone());
                data.memo_origin = origin;
            }
            CacheKind::Ref => {
                data.ref_header = Some(ident.clone());
                data.ref_origin = origin;
            }
        }
        ident
    }

    pub fn has_header(&self, kind: CacheKind) -> bool {
        let data = self.0.borrow();
        match kind {
            CacheKind::Memo => data.memo_header.is_some(),
            CacheKind::Ref => data.ref_header.is_some(),
        }
    }

    pub fn origin(&self, kind: CacheKind) -> Option<BranchOrigin> {
        let data = self.0.borrow();
        match kind {
            CacheKind::Memo => data.memo_origin.clone(),
            CacheKind::Ref => data.ref_origin.clone(),
        }
    }

    /// Returns (and lazily creates) the per-iteration loop identifiers used
    /// only when `is_in_loop` (§3's `loopMemo, loopRef, loopIdx`).
    pub fn loop_idx(&self, ids: &mut IdGen) -> Ident {
        let mut data = self.0.borrow_mut();
        if let Some(existing) = &data.loop_idx {
            return existing.clone();
        }
        let ident = Ident {
            id: ids.node_id(),
            span: Span::synthetic(),
            name: ids.synthetic_name("loopIdx"),
            binding: Some(ids.binding_id()),
        };
        data.loop_idx = Some(ident.clone());
        ident
    }

    pub fn set_loop_header(&self, kind: CacheKind, ident: Ident) {
        let mut data = self.0.borrow_mut();
        match kind {
            CacheKind::Memo => data.loop_memo = Some(ident),
            CacheKind::Ref => data.loop_ref = Some(ident),
        }
    }

    pub fn loop_header(&self, kind: CacheKind) -> Option<Ident> {
        let data = self.0.borrow();
        match kind {
            CacheKind::Memo => data.loop_memo.clone(),
            CacheKind::Ref => data.loop_ref.clone(),
        }
    }

    pub fn push_stmt(&self, stmt: Stmt) {
        self.0.borrow_mut().statements.push(stmt);
    }

    pub fn lookup_optimized(&self, id: NodeId) -> Option<OptimizedExpression> {
        self.0.borrow().optimized.get(&id).cloned()
    }

    pub fn record_optimized(&self, id: NodeId, result: OptimizedExpression) {
        self.0.borrow_mut().optimized.insert(id, result);
    }

    /// Invalidates a tracked binding's cached read anywhere in the scope
    /// chain (§4.5: assignment "dirties" the binding so subsequent reads
    /// re-memoize).
    pub fn dirty_binding(&self, id: NodeId) {
        let mut cur = Some(self.clone());
        while let Some(scope) = cur {
            scope.0.borrow_mut().optimized.shift_remove(&id);
            cur = scope.parent();
        }
    }

    /// Records that `binding`'s most recent memoized read lives under
    /// `id` in the `optimized` table, so a later assignment can find it by
    /// `BindingId` alone.
    pub fn record_optimized_for_binding(&self, binding: BindingId, id: NodeId, result: OptimizedExpression) {
        self.record_optimized(id, result);
        self.0.borrow_mut().by_binding.insert(binding, id);
    }

    /// Looks up `binding`'s most recently recorded memoized read, walking
    /// up the scope chain (mirrors `is_constant_binding`'s walk).
    pub fn lookup_optimized_for_binding(&self, binding: BindingId) -> Option<OptimizedExpression> {
        let mut cur = Some(self.clone());
        while let Some(scope) = cur {
            let id = scope.0.borrow().by_binding.get(&binding).copied();
            if let Some(id) = id {
                if let Some(result) = scope.lookup_optimized(id) {
                    return Some(result);
                }
            }
            cur = scope.parent();
        }
        None
    }

    /// Invalidates `binding`'s cached read anywhere in the scope chain
    /// (§4.5: assignment dirties the binding so subsequent reads
    /// re-memoize instead of reusing a stale guard).
    pub fn dirty_binding_value(&self, binding: BindingId) {
        let mut cur = Some(self.clone());
        while let Some(scope) = cur {
            let id = scope.0.borrow_mut().by_binding.remove(&binding);
            if let Some(id) = id {
                scope.0.borrow_mut().optimized.shift_remove(&id);
            }
            cur = scope.parent();
        }
    }

    pub fn mark_constant(&self, binding: BindingId) {
        self.0.borrow_mut().constants.insert(binding);
    }

    pub fn is_constant_binding(&self, binding: BindingId) -> bool {
        let mut cur = Some(self.clone());
        while let Some(scope) = cur {
            if scope.0.borrow().constants.contains(&binding) {
                return true;
            }
            cur = scope.parent();
        }
        false
    }

    /// Finalizes this scope's statement list exactly once (§3 Lifecycle):
    /// prepends the header declaration(s) this scope actually used — each
    /// initialized with the `cache`/`ref`/`branch` runtime call the caller
    /// supplies, since only the Optimizer knows the runtime symbol names
    /// and the final slot counts — then coalesces adjacent single-
    /// declarator `let`s of the same kind, mirroring how real
    /// pretty-printers group consecutive declarations.
    pub fn finish(&self, memo_init: Option<crate::ast::Expr>, ref_init: Option<crate::ast::Expr>) -> Vec<Stmt> {
        let mut data = self.0.borrow_mut();
        assert!(!data.finalized, "scope finalized more than once");
        data.finalized = true;

        let mut out = Vec::new();
        if let Some(header) = data.memo_header.clone() {
            out.push(Stmt::VarDecl {
                id: header.id,
                span: Span::synthetic(),
                kind: VarKind::Let,
                declarations: vec![crate::ast::Declarator {
                    name: crate::ast::Pattern::Ident(header.clone()),
                    type_annotation: None,
                    init: memo_init,
                }],
            });
        }
        if let Some(header) = data.ref_header.clone() {
            out.push(Stmt::VarDecl {
                id: header.id,
                span: Span::synthetic(),
                kind: VarKind::Let,
                declarations: vec![crate::ast::Declarator {
                    name: crate::ast::Pattern::Ident(header.clone()),
                    type_annotation: None,
                    init: ref_init,
                }],
            });
        }
        out.append(&mut data.statements);
        coalesce_declarations(out)
    }
}

/// Merges consecutive single-declarator `VarDecl`s of the same `kind` into
/// one multi-declarator statement (§3 Lifecycle: "let declarations are
/// coalesced").
fn coalesce_declarations(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut out: Vec<Stmt> = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        if let Stmt::VarDecl {
            kind, declarations, ..
        } = &stmt
        {
            if let Some(Stmt::VarDecl {
                kind: prev_kind,
                declarations: prev_decls,
                ..
            }) = out.last_mut()
            {
                if *prev_kind == *kind {
                    prev_decls.extend(declarations.clone());
                    continue;
                }
            }
        }
        out.push(stmt);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_contiguous_and_monotonic() {
        let scope = Scope::root();
        assert_eq!(scope.alloc_slot(CacheKind::Memo), 0);
        assert_eq!(scope.alloc_slot(CacheKind::Memo), 1);
        assert_eq!(scope.alloc_slot(CacheKind::Memo), 2);
        assert_eq!(scope.slot_count(CacheKind::Memo), 3);
        assert_eq!(scope.slot_count(CacheKind::Ref), 0);
    }

    #[test]
    fn header_is_stable_across_calls() {
        let scope = Scope::root();
        let mut ids = IdGen::new();
        let h1 = scope.header(CacheKind::Memo, &mut ids);
        let h2 = scope.header(CacheKind::Memo, &mut ids);
        assert_eq!(h1.id, h2.id);
        assert_eq!(h1.name, h2.name);
    }

    #[test]
    fn child_header_reserves_a_parent_slot() {
        let root = Scope::root();
        let child = root.child(false);
        let mut ids = IdGen::new();
        let _ = child.header(CacheKind::Memo, &mut ids);
        assert_eq!(root.slot_count(CacheKind::Memo), 1);
        let origin = child.origin(CacheKind::Memo).expect("child has an origin");
        assert_eq!(origin.parent_slot, 0);
    }

    #[test]
    fn dirtying_removes_from_every_ancestor() {
        let root = Scope::root();
        let child = root.child(false);
        let mut ids = IdGen::new();
        let target = ids.node_id();
        root.record_optimized(
            target,
            OptimizedExpression::constant(crate::ast::Expr::Null {
                id: target,
                span: Span::synthetic(),
            }),
        );
        assert!(root.lookup_optimized(target).is_some());
        child.dirty_binding(target);
        assert!(root.lookup_optimized(target).is_none());
    }

    #[test]
    fn coalesces_same_kind_declarations() {
        let mut ids = IdGen::new();
        let make = |ids: &mut IdGen, kind: VarKind| Stmt::VarDecl {
            id: ids.node_id(),
            span: Span::synthetic(),
            kind,
            declarations: vec![],
        };
        let stmts = vec![
            make(&mut ids, VarKind::Let),
            make(&mut ids, VarKind::Let),
            make(&mut ids, VarKind::Const),
        ];
        let merged = coalesce_declarations(stmts);
        assert_eq!(merged.len(), 2);
    }
}
