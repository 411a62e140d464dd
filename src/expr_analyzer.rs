//! `isConstant` and `classifyHookCall` (§4.1).

use std::collections::HashMap;

use crate::ast::{ArrayElement, Expr, ObjectProperty, PropKey};
use crate::preset::{HookKind, Preset};
use crate::scope::Scope;
use crate::span::NodeId;

/// Classifies expressions as constant or as hook calls. Results of
/// `is_constant` are cached per node (§4.1: "Results are cached per node to
/// avoid re-computation").
pub struct ExprAnalyzer {
    constant_cache: HashMap<NodeId, bool>,
}

impl ExprAnalyzer {
    pub fn new() -> Self {
        ExprAnalyzer {
            constant_cache: HashMap::new(),
        }
    }

    /// True iff every identifier `expr` references is foreign, global, or
    /// already registered as constant in `scope`'s chain, and `expr`
    /// contains no hook call, assignment, or JSX needing memoization.
    pub fn is_constant(&mut self, expr: &Expr, scope: &Scope, preset: &Preset) -> bool {
        let id = expr.id();
        if let Some(cached) = self.constant_cache.get(&id) {
            return *cached;
        }
        // Insert a provisional `true` to break cycles defensively; the AST
        // here is acyclic so this only guards against accidental re-entry.
        let result = self.compute_is_constant(expr, scope, preset);
        self.constant_cache.insert(id, result);
        result
    }

    fn compute_is_constant(&mut self, expr: &Expr, scope: &Scope, preset: &Preset) -> bool {
        match expr {
            Expr::Number { .. }
            | Expr::Str { .. }
            | Expr::Bool { .. }
            | Expr::Null { .. }
            | Expr::Undefined { .. }
            | Expr::BigInt { .. } => true,
            // Template literals are explicitly excluded from the literal
            // fast path (§4.1: "Literals other than template literals are
            // constant"); fall through to inspect embedded expressions.
            Expr::TemplateLiteral { exprs, .. } => {
                exprs.iter().all(|e| self.is_constant(e, scope, preset))
            }
            Expr::TaggedTemplate { tag, exprs, .. } => {
                self.is_constant(tag, scope, preset)
                    && exprs.iter().all(|e| self.is_constant(e, scope, preset))
            }
            Expr::Ident(ident) => {
                ident.is_foreign()
                    || ident
                        .binding
                        .is_some_and(|b| scope.is_constant_binding(b))
            }
            Expr::Member {
                object, property, ..
            } => {
                self.is_constant(object, scope, preset)
                    && match property {
                        PropKey::Static(_) => true,
                        PropKey::Computed(key) => self.is_constant(key, scope, preset),
                    }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.is_constant(test, scope, preset)
                    && self.is_constant(consequent, scope, preset)
                    && self.is_constant(alternate, scope, preset)
            }
            Expr::Binary { left, right, .. } => {
                self.is_constant(left, scope, preset) && self.is_constant(right, scope, preset)
            }
            Expr::Logical { left, right, .. } => {
                self.is_constant(left, scope, preset) && self.is_constant(right, scope, preset)
            }
            Expr::Unary { argument, .. } => self.is_constant(argument, scope, preset),
            // Assignments mutate state; never constant (§4.1).
            Expr::Assignment { .. } => false,
            Expr::Call { callee, args, .. } => {
                if self.classify_hook_call(callee, preset) != HookKind::None {
                    return false;
                }
                self.is_constant(callee, scope, preset)
                    && args.iter().all(|a| self.is_constant(a, scope, preset))
            }
            Expr::New { callee, args, .. } => {
                self.is_constant(callee, scope, preset)
                    && args.iter().all(|a| self.is_constant(a, scope, preset))
            }
            Expr::Array { elements, .. } => elements.iter().all(|el| match el {
                ArrayElement::Item(e) | ArrayElement::Spread(e) => {
                    self.is_constant(e, scope, preset)
                }
                ArrayElement::Hole => true,
            }),
            Expr::Object { properties, .. } => properties.iter().all(|p| match p {
                ObjectProperty::KeyValue { key, value } => {
                    self.key_is_constant(key, scope, preset) && self.is_constant(value, scope, preset)
                }
                ObjectProperty::Shorthand(ident) => {
                    ident.is_foreign()
                        || ident
                            .binding
                            .is_some_and(|b| scope.is_constant_binding(b))
                }
                ObjectProperty::Spread(e) => self.is_constant(e, scope, preset),
                ObjectProperty::Method { key, function } => {
                    self.key_is_constant(key, scope, preset) && self.is_constant(function, scope, preset)
                }
            }),
            // Function expressions are never trivially constant: they may
            // close over component-local bindings, which the Optimizer
            // handles via free-variable dependency analysis instead.
            Expr::FunctionExpr { .. } => false,
            Expr::Sequence { exprs, .. } => {
                exprs.iter().all(|e| self.is_constant(e, scope, preset))
            }
            Expr::Paren { inner, .. } => self.is_constant(inner, scope, preset),
            Expr::TypeAssertion { inner, .. } => self.is_constant(inner, scope, preset),
            // JSX always requires the runtime's memoization host when the
            // preset enables it; conservatively never constant.
            Expr::Jsx(_) => !preset.memoize_jsx,
            Expr::Other { .. } => true,
        }
    }

    fn key_is_constant(&mut self, key: &PropKey, scope: &Scope, preset: &Preset) -> bool {
        match key {
            PropKey::Static(_) => true,
            PropKey::Computed(e) => self.is_constant(e, scope, preset),
        }
    }

    /// Classifies a call expression's callee against `preset` (§4.1).
    /// Supports plain identifiers (`useMemo(...)`) and simple member
    /// access (`React.useMemo(...)`).
    pub fn classify_hook_call(&self, callee: &Expr, preset: &Preset) -> HookKind {
        match callee {
            Expr::Ident(ident) => preset.classify(&ident.name),
            Expr::Member {
                property: PropKey::Static(name),
                ..
            } => preset.classify(name),
            Expr::Paren { inner, .. } => self.classify_hook_call(inner, preset),
            _ => HookKind::None,
        }
    }
}

impl Default for ExprAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{IdGen, Span};

    fn num(ids: &mut IdGen, v: f64) -> Expr {
        Expr::Number {
            id: ids.node_id(),
            span: Span::synthetic(),
            value: v,
        }
    }

    fn foreign_ident(ids: &mut IdGen, name: &str) -> Expr {
        Expr::Ident(crate::ast::Ident {
            id: ids.node_id(),
            span: Span::synthetic(),
            name: name.to_string(),
            binding: None,
        })
    }

    #[test]
    fn literals_are_constant() {
        let mut ids = IdGen::new();
        let mut analyzer = ExprAnalyzer::new();
        let scope = Scope::root();
        let preset = Preset::default_react_like();
        assert!(analyzer.is_constant(&num(&mut ids, 1.0), &scope, &preset));
    }

    #[test]
    fn foreign_identifiers_are_constant() {
        let mut ids = IdGen::new();
        let mut analyzer = ExprAnalyzer::new();
        let scope = Scope::root();
        let preset = Preset::default_react_like();
        assert!(analyzer.is_constant(&foreign_ident(&mut ids, "Math"), &scope, &preset));
    }

    #[test]
    fn local_binding_identifier_is_not_constant() {
        let mut ids = IdGen::new();
        let mut analyzer = ExprAnalyzer::new();
        let scope = Scope::root();
        let preset = Preset::default_react_like();
        let local = Expr::Ident(crate::ast::Ident {
            id: ids.node_id(),
            span: Span::synthetic(),
            name: "x".to_string(),
            binding: Some(ids.binding_id()),
        });
        assert!(!analyzer.is_constant(&local, &scope, &preset));
    }

    #[test]
    fn classifies_known_hook_calls() {
        let analyzer = ExprAnalyzer::new();
        let preset = Preset::default_react_like();
        let mut ids = IdGen::new();
        let callee = foreign_ident(&mut ids, "useMemo");
        assert_eq!(analyzer.classify_hook_call(&callee, &preset), HookKind::Memo);
    }
}
