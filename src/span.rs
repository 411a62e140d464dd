//! Node identity and source spans.
//!
//! The pass targets an owned, `Box`-linked AST rather than an arena of
//! indices, so "node identity" for the purposes of the Scope's `optimized`
//! table (see `scope.rs`) is realized as a small `Copy` tag stamped on every
//! node at construction time, not a pointer or `Weak` reference.

use std::fmt;

/// Identity tag for an AST node, unique within a single pass invocation.
///
/// Keys the Scope's optimized-identifier map and the ExprAnalyzer's
/// per-node constant cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// Identity tag for a resolved binding, distinct from an identifier's
/// textual name. Two `Ident`s that share a `BindingId` refer to the same
/// binding; two with the same name but different `BindingId`s are shadowed
/// or otherwise distinct (see the "Duplicate dependency elision" design
/// note: the AND-fold dedup is by identity, not by name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Byte range into the component's source text. Used only for diagnostics;
/// never consulted for transform semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    pub const fn synthetic() -> Self {
        Span { start: 0, end: 0 }
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start as usize, (span.end - span.start) as usize).into()
    }
}

/// Monotonic generator for `NodeId`s, `BindingId`s and fresh synthetic
/// identifier names introduced by the pass (cache headers, guard bindings,
/// value bindings).
#[derive(Debug, Default)]
pub struct IdGen {
    next_node: u32,
    next_binding: u32,
    next_synthetic: u32,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_id(&mut self) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        NodeId(id)
    }

    pub fn binding_id(&mut self) -> BindingId {
        let id = self.next_binding;
        self.next_binding += 1;
        BindingId(id)
    }

    /// A fresh identifier name such as `_memo3`, unique within the pass.
    pub fn synthetic_name(&mut self, prefix: &str) -> String {
        let n = self.next_synthetic;
        self.next_synthetic += 1;
        format!("_{}{}", prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_distinct() {
        let mut gen = IdGen::new();
        let a = gen.node_id();
        let b = gen.node_id();
        assert_ne!(a, b);
        let ba = gen.binding_id();
        let bb = gen.binding_id();
        assert_ne!(ba, bb);
    }

    #[test]
    fn synthetic_names_are_unique() {
        let mut gen = IdGen::new();
        let a = gen.synthetic_name("v");
        let b = gen.synthetic_name("v");
        assert_ne!(a, b);
    }
}
