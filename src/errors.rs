//! Static, fatal diagnostics for the Optimizer (§7).
//!
//! A flat error enum with a `Result` type alias and helper constructors,
//! backed by `thiserror` and `miette` rather than a hand-rolled `Display`
//! impl (see `DESIGN.md` for the grounding notes).

use miette::Diagnostic;
use thiserror::Error;

use crate::span::Span;

/// A malformed input that cannot be classified. Per §7, encountering one of
/// these aborts the pass for the whole component: no partial rewrite is
/// ever returned.
#[derive(Debug, Error, Diagnostic)]
pub enum OptimizerError {
    #[error("hook call to `{callee}` received a non-expression argument")]
    #[diagnostic(help("hooks only accept plain expression arguments"))]
    NonExpressionHookArgument {
        callee: String,
        #[label("argument here is not a supported expression shape")]
        span: Span,
    },

    #[error("`{label}` hook requires a callback as its first argument")]
    #[diagnostic(help("pass a function expression or arrow function"))]
    HookCalleeNotAFunction {
        label: String,
        #[label("expected a function here")]
        span: Span,
    },

    #[error("dependency list must be an array literal")]
    #[diagnostic(help("write `[]` or `[a, b]`, not a computed expression"))]
    DependencyListNotArray {
        #[label("this must be an array literal")]
        span: Span,
    },

    #[error("component body must end in a reachable return")]
    MissingComponentReturn {
        #[label("no return found in this component")]
        span: Span,
    },
}

/// Result alias for Optimizer operations.
pub type OptResult<T> = Result<T, OptimizerError>;

impl OptimizerError {
    pub fn non_expression_hook_argument(callee: &str, span: Span) -> Self {
        OptimizerError::NonExpressionHookArgument {
            callee: callee.to_string(),
            span,
        }
    }

    pub fn hook_callee_not_a_function(label: &str, span: Span) -> Self {
        OptimizerError::HookCalleeNotAFunction {
            label: label.to_string(),
            span,
        }
    }

    pub fn dependency_list_not_array(span: Span) -> Self {
        OptimizerError::DependencyListNotArray { span }
    }

    pub fn missing_component_return(span: Span) -> Self {
        OptimizerError::MissingComponentReturn { span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_mention_the_offending_shape() {
        let err = OptimizerError::non_expression_hook_argument("memo", Span::new(3, 9));
        assert!(err.to_string().contains("memo"));
    }
}
