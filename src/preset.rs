//! Configuration surface for the Optimizer: the preset, runtime symbol
//! names, and the import-resolution helper (§6 "Inputs to the pass").
//!
//! `Preset` keeps callee-to-hook-kind mappings in an `IndexMap` so that
//! debug output and diagnostics stay deterministic across runs (see
//! `DESIGN.md` for the grounding notes).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How `ExprAnalyzer::classify_hook_call` categorizes a call's callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Memo,
    Callback,
    Ref,
    Effect,
    /// Recognized user hook: stateful, memoized only at the call-argument
    /// level (§4.3 `custom`).
    Custom,
    /// An ordinary call with no special scheduling semantics.
    None,
    /// Explicitly disabled by the preset. Per §9's Open Questions, treated
    /// as `None`-equivalent unless a caller distinguishes it.
    Skip,
}

/// Maps callee identifiers to `HookKind`s, and records whether JSX
/// memoization is enabled (§4.2's JSX row, §9's Open Questions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    hooks: IndexMap<String, HookKind>,
    pub memoize_jsx: bool,
}

impl Preset {
    pub fn empty() -> Self {
        Preset {
            hooks: IndexMap::new(),
            memoize_jsx: false,
        }
    }

    /// A preset resembling the common React-like hook names, with JSX
    /// memoization enabled — the default most example components are
    /// written against.
    pub fn default_react_like() -> Self {
        let mut hooks = IndexMap::new();
        hooks.insert("useMemo".to_string(), HookKind::Memo);
        hooks.insert("useCallback".to_string(), HookKind::Callback);
        hooks.insert("useRef".to_string(), HookKind::Ref);
        hooks.insert("useEffect".to_string(), HookKind::Effect);
        hooks.insert("useLayoutEffect".to_string(), HookKind::Effect);
        Preset {
            hooks,
            memoize_jsx: true,
        }
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn register(&mut self, callee: impl Into<String>, kind: HookKind) {
        self.hooks.insert(callee.into(), kind);
    }

    pub fn mark_custom(&mut self, callee: impl Into<String>) {
        self.hooks.insert(callee.into(), HookKind::Custom);
    }

    /// Looks up a callee name. Unregistered names that look like hooks
    /// (conventionally `useXxx`) are treated as `Custom`; anything else is
    /// `None` (an ordinary call).
    pub fn classify(&self, callee: &str) -> HookKind {
        match self.hooks.get(callee) {
            Some(HookKind::Skip) => HookKind::None,
            Some(kind) => *kind,
            None if looks_like_hook_name(callee) => HookKind::Custom,
            None => HookKind::None,
        }
    }
}

fn looks_like_hook_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('u')) && matches!(chars.next(), Some('s')) && {
        let rest: String = chars.collect();
        rest.starts_with('e') && rest.chars().nth(1).is_some_and(|c| c.is_uppercase())
    }
}

/// Names of the four runtime symbols the rewritten component imports
/// (§6). Overridable so a host driver can alias them at import time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeNames {
    pub cache: String,
    pub ref_: String,
    pub branch: String,
    pub equals: String,
    /// The hook identifier passed through to `cache`/`ref` as their first
    /// argument (e.g. `useMemo`), per §6's `(useMemoHook, size) -> slots`.
    pub use_memo_hook: String,
    pub use_ref_hook: String,
}

impl Default for RuntimeNames {
    fn default() -> Self {
        RuntimeNames {
            cache: "cache".to_string(),
            ref_: "ref".to_string(),
            branch: "branch".to_string(),
            equals: "equals".to_string(),
            use_memo_hook: "useMemo".to_string(),
            use_ref_hook: "useRef".to_string(),
        }
    }
}

/// Resolves a logical runtime import name to a canonical local identifier,
/// deduplicating imports at file scope (§6c). This crate does not perform
/// module I/O; a host driver supplies the mapping.
pub trait ImportResolver {
    fn resolve(&mut self, logical_name: &str) -> String;
}

/// An `ImportResolver` that leaves every runtime symbol under its logical
/// name, suitable for tests and for hosts that don't rename imports.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityImportResolver;

impl ImportResolver for IdentityImportResolver {
    fn resolve(&mut self, logical_name: &str) -> String {
        logical_name.to_string()
    }
}

/// Everything the Optimizer needs that isn't the component itself (§6).
pub struct StateContext<R: ImportResolver> {
    pub preset: Preset,
    pub runtime_names: RuntimeNames,
    pub import_resolver: R,
}

impl StateContext<IdentityImportResolver> {
    pub fn with_default_react_preset() -> Self {
        StateContext {
            preset: Preset::default_react_like(),
            runtime_names: RuntimeNames::default(),
            import_resolver: IdentityImportResolver,
        }
    }
}

impl<R: ImportResolver> StateContext<R> {
    pub fn new(preset: Preset, runtime_names: RuntimeNames, import_resolver: R) -> Self {
        StateContext {
            preset,
            runtime_names,
            import_resolver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_classifies_known_hooks() {
        let preset = Preset::default_react_like();
        assert_eq!(preset.classify("useMemo"), HookKind::Memo);
        assert_eq!(preset.classify("useCallback"), HookKind::Callback);
        assert_eq!(preset.classify("useRef"), HookKind::Ref);
        assert_eq!(preset.classify("useEffect"), HookKind::Effect);
    }

    #[test]
    fn unrecognized_use_prefixed_call_is_custom() {
        let preset = Preset::default_react_like();
        assert_eq!(preset.classify("useSomethingCustom"), HookKind::Custom);
    }

    #[test]
    fn ordinary_call_is_none() {
        let preset = Preset::default_react_like();
        assert_eq!(preset.classify("computeTotal"), HookKind::None);
    }

    #[test]
    fn skip_marked_hook_is_none_equivalent() {
        let mut preset = Preset::empty();
        preset.register("useDisabled", HookKind::Skip);
        assert_eq!(preset.classify("useDisabled"), HookKind::None);
    }

    #[test]
    fn round_trips_through_json() {
        let preset = Preset::default_react_like();
        let json = serde_json::to_string(&preset).unwrap();
        let restored = Preset::from_json_str(&json).unwrap();
        assert_eq!(restored.classify("useMemo"), HookKind::Memo);
        assert_eq!(restored.memoize_jsx, true);
    }
}
