//! AST node definitions for the dialect this pass rewrites.
//!
//! The tree is owned (`Box`-linked enums), not an arena of indices: the
//! Optimizer consumes an owned `Expr`/`Stmt` and returns a fresh owned one,
//! per the "Ownership of AST nodes" design note. Every `Expr` and `Stmt`
//! carries a `NodeId` (identity for memoization tables) and a `Span`
//! (diagnostics only).
#![allow(dead_code)]

use crate::span::{BindingId, NodeId, Span};

/// An identifier reference or binding occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    /// Resolved-binding identity. `None` for identifiers that could not be
    /// resolved to a binding in scope (treated as foreign/global by
    /// `ExprAnalyzer::is_constant`).
    pub binding: Option<BindingId>,
}

impl Ident {
    pub fn is_foreign(&self) -> bool {
        self.binding.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    Instanceof,
    /// `|>` — passed through unmodified by the Optimizer (§4.2).
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    AndAssign,
    OrAssign,
    NullishAssign,
}

/// A type annotation, carried through unchanged. No type inference is
/// performed on its contents (§1 Non-goals); it is opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation(pub String);

/// A static or computed property key (`o.p` vs `o[k]`).
#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    Item(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    KeyValue { key: PropKey, value: Expr },
    Shorthand(Ident),
    Spread(Expr),
    Method { key: PropKey, function: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Concise arrow body, e.g. `i => i * 2`.
    Expression(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
}

/// A destructuring shape on the left of a binding or assignment.
/// Deliberately opaque: the Optimizer does not look inside it (§4.5,
/// §9 Open Questions — "Destructuring LVals are not invalidated").
#[derive(Debug, Clone, PartialEq)]
pub enum DestructurePattern {
    Array(Vec<Option<Pattern>>),
    Object(Vec<(PropKey, Pattern)>),
}

/// An assignable / bindable left-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(Ident),
    Member {
        id: NodeId,
        span: Span,
        object: Box<Expr>,
        property: PropKey,
    },
    Destructure {
        id: NodeId,
        span: Span,
        shape: DestructurePattern,
    },
}

impl Pattern {
    pub fn id(&self) -> NodeId {
        match self {
            Pattern::Ident(i) => i.id,
            Pattern::Member { id, .. } => *id,
            Pattern::Destructure { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxName {
    Element(String),
    Fragment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxAttrValue {
    Str(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxAttribute {
    Named {
        name: String,
        value: Option<JsxAttrValue>,
    },
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxChild {
    Text(String),
    /// An embedded expression container, e.g. `{expr}`.
    Expr(Expr),
    Element(JsxNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsxNode {
    pub id: NodeId,
    pub span: Span,
    pub name: JsxName,
    pub attributes: Vec<JsxAttribute>,
    pub children: Vec<JsxChild>,
}

/// Expression nodes. Every variant that participates in the Optimizer's
/// `optimize_expression` dispatch table (§4.2) corresponds one-to-one with
/// a row of that table.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number {
        id: NodeId,
        span: Span,
        value: f64,
    },
    Str {
        id: NodeId,
        span: Span,
        value: String,
    },
    Bool {
        id: NodeId,
        span: Span,
        value: bool,
    },
    Null {
        id: NodeId,
        span: Span,
    },
    Undefined {
        id: NodeId,
        span: Span,
    },
    BigInt {
        id: NodeId,
        span: Span,
        value: String,
    },
    TemplateLiteral {
        id: NodeId,
        span: Span,
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    TaggedTemplate {
        id: NodeId,
        span: Span,
        tag: Box<Expr>,
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Ident(Ident),
    Member {
        id: NodeId,
        span: Span,
        object: Box<Expr>,
        property: PropKey,
        optional: bool,
    },
    Conditional {
        id: NodeId,
        span: Span,
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Binary {
        id: NodeId,
        span: Span,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        id: NodeId,
        span: Span,
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        id: NodeId,
        span: Span,
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Assignment {
        id: NodeId,
        span: Span,
        op: AssignOp,
        target: Box<Pattern>,
        value: Box<Expr>,
    },
    Call {
        id: NodeId,
        span: Span,
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New {
        id: NodeId,
        span: Span,
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Array {
        id: NodeId,
        span: Span,
        elements: Vec<ArrayElement>,
    },
    Object {
        id: NodeId,
        span: Span,
        properties: Vec<ObjectProperty>,
    },
    FunctionExpr {
        id: NodeId,
        span: Span,
        function: Function,
    },
    Sequence {
        id: NodeId,
        span: Span,
        exprs: Vec<Expr>,
    },
    /// Parenthesization, a `nested wrapper` per §4.2: the Optimizer recurses
    /// into `inner` and passes the result straight through.
    Paren {
        id: NodeId,
        span: Span,
        inner: Box<Expr>,
    },
    /// `expr as T` / `<T>expr` — another nested wrapper; `ty` is erased.
    TypeAssertion {
        id: NodeId,
        span: Span,
        inner: Box<Expr>,
        ty: TypeAnnotation,
    },
    Jsx(JsxNode),
    /// Any node kind the pass does not recognize. Returned unchanged with
    /// `constant: true` per the dispatch table's final row and §7's
    /// "Recoverable situations" passive fallback.
    Other {
        id: NodeId,
        span: Span,
        raw: String,
    },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Number { id, .. }
            | Expr::Str { id, .. }
            | Expr::Bool { id, .. }
            | Expr::Null { id, .. }
            | Expr::Undefined { id, .. }
            | Expr::BigInt { id, .. }
            | Expr::TemplateLiteral { id, .. }
            | Expr::TaggedTemplate { id, .. }
            | Expr::Member { id, .. }
            | Expr::Conditional { id, .. }
            | Expr::Binary { id, .. }
            | Expr::Logical { id, .. }
            | Expr::Unary { id, .. }
            | Expr::Assignment { id, .. }
            | Expr::Call { id, .. }
            | Expr::New { id, .. }
            | Expr::Array { id, .. }
            | Expr::Object { id, .. }
            | Expr::FunctionExpr { id, .. }
            | Expr::Sequence { id, .. }
            | Expr::Paren { id, .. }
            | Expr::TypeAssertion { id, .. }
            | Expr::Other { id, .. } => *id,
            Expr::Ident(i) => i.id,
            Expr::Jsx(j) => j.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Number { span, .. }
            | Expr::Str { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Null { span, .. }
            | Expr::Undefined { span, .. }
            | Expr::BigInt { span, .. }
            | Expr::TemplateLiteral { span, .. }
            | Expr::TaggedTemplate { span, .. }
            | Expr::Member { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Assignment { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::FunctionExpr { span, .. }
            | Expr::Sequence { span, .. }
            | Expr::Paren { span, .. }
            | Expr::TypeAssertion { span, .. }
            | Expr::Other { span, .. } => *span,
            Expr::Ident(i) => i.span,
            Expr::Jsx(j) => j.span,
        }
    }

    pub fn ident(&self) -> Option<&Ident> {
        match self {
            Expr::Ident(i) => Some(i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: Pattern,
    pub type_annotation: Option<TypeAnnotation>,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub consequent: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForEachKind {
    ForIn,
    ForOf,
}

/// Statement nodes. One-to-one with the §4.4 statement-walk table.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr {
        id: NodeId,
        span: Span,
        expr: Expr,
    },
    VarDecl {
        id: NodeId,
        span: Span,
        kind: VarKind,
        declarations: Vec<Declarator>,
    },
    Return {
        id: NodeId,
        span: Span,
        argument: Option<Expr>,
    },
    Throw {
        id: NodeId,
        span: Span,
        argument: Expr,
    },
    Block {
        id: NodeId,
        span: Span,
        body: Vec<Stmt>,
    },
    If {
        id: NodeId,
        span: Span,
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        id: NodeId,
        span: Span,
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        id: NodeId,
        span: Span,
        test: Expr,
        body: Box<Stmt>,
    },
    For {
        id: NodeId,
        span: Span,
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        id: NodeId,
        span: Span,
        kind: ForEachKind,
        decl_kind: VarKind,
        left: Pattern,
        right: Expr,
        body: Box<Stmt>,
    },
    Loop {
        id: NodeId,
        span: Span,
        body: Box<Stmt>,
    },
    Switch {
        id: NodeId,
        span: Span,
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        id: NodeId,
        span: Span,
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Labeled {
        id: NodeId,
        span: Span,
        label: String,
        body: Box<Stmt>,
    },
    Break {
        id: NodeId,
        span: Span,
        label: Option<String>,
    },
    Continue {
        id: NodeId,
        span: Span,
        label: Option<String>,
    },
    /// Preserved from the input with an explicit skip marker (§4.4): the
    /// pass emits `inner` unchanged, recursing into nothing.
    Skip {
        id: NodeId,
        span: Span,
        inner: Box<Stmt>,
    },
}

impl Stmt {
    pub fn id(&self) -> NodeId {
        match self {
            Stmt::Expr { id, .. }
            | Stmt::VarDecl { id, .. }
            | Stmt::Return { id, .. }
            | Stmt::Throw { id, .. }
            | Stmt::Block { id, .. }
            | Stmt::If { id, .. }
            | Stmt::While { id, .. }
            | Stmt::DoWhile { id, .. }
            | Stmt::For { id, .. }
            | Stmt::ForEach { id, .. }
            | Stmt::Loop { id, .. }
            | Stmt::Switch { id, .. }
            | Stmt::Try { id, .. }
            | Stmt::Labeled { id, .. }
            | Stmt::Break { id, .. }
            | Stmt::Continue { id, .. }
            | Stmt::Skip { id, .. } => *id,
        }
    }
}

/// A component: an ordinary function whose body returns a view tree. The
/// unit the Optimizer rewrites (§1).
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub params: Vec<Pattern>,
    pub body: Vec<Stmt>,
}
