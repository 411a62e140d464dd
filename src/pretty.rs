//! Deterministic AST-to-text rendering, used by integration tests to
//! assert on the shape of a rewritten component without hand-building
//! the expected tree (§10.5 test tooling).
//!
//! A struct holding mutable state, pushing rendered text into one `String`
//! rather than building an intermediate tree of fragments (see
//! `DESIGN.md` for the grounding notes).

use crate::ast::*;

pub fn print_component(component: &Component) -> String {
    let mut p = Printer {
        out: String::new(),
        indent: 0,
    };
    p.out.push_str(&format!("function {}(", component.name));
    for (i, param) in component.params.iter().enumerate() {
        if i > 0 {
            p.out.push_str(", ");
        }
        p.print_pattern(param);
    }
    p.out.push_str(") {\n");
    p.indent += 1;
    p.print_block(&component.body);
    p.indent -= 1;
    p.out.push_str("}\n");
    p.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn print_block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.print_stmt(stmt);
        }
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr { expr, .. } => {
                let text = self.expr_str(expr);
                self.line(&format!("{};", text));
            }
            Stmt::VarDecl { kind, declarations, .. } => {
                let kind = match kind {
                    VarKind::Let => "let",
                    VarKind::Const => "const",
                    VarKind::Var => "var",
                };
                let mut parts = Vec::new();
                for d in declarations {
                    let name = self.pattern_str(&d.name);
                    match &d.init {
                        Some(init) => parts.push(format!("{} = {}", name, self.expr_str(init))),
                        None => parts.push(name),
                    }
                }
                self.line(&format!("{} {};", kind, parts.join(", ")));
            }
            Stmt::Return { argument, .. } => match argument {
                Some(e) => {
                    let text = self.expr_str(e);
                    self.line(&format!("return {};", text));
                }
                None => self.line("return;"),
            },
            Stmt::Throw { argument, .. } => {
                let text = self.expr_str(argument);
                self.line(&format!("throw {};", text));
            }
            Stmt::Block { body, .. } => {
                self.line("{");
                self.indent += 1;
                self.print_block(body);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                let test = self.expr_str(test);
                self.line(&format!("if ({}) {{", test));
                self.indent += 1;
                self.print_stmt(consequent);
                self.indent -= 1;
                if let Some(alt) = alternate {
                    self.line("} else {");
                    self.indent += 1;
                    self.print_stmt(alt);
                    self.indent -= 1;
                }
                self.line("}");
            }
            Stmt::While { test, body, .. } => {
                let test = self.expr_str(test);
                self.line(&format!("while ({}) {{", test));
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::DoWhile { test, body, .. } => {
                self.line("do {");
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
                let test = self.expr_str(test);
                self.line(&format!("}} while ({});", test));
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                let init = init
                    .as_ref()
                    .map(|s| self.stmt_inline_str(s))
                    .unwrap_or_default();
                let test = test.as_ref().map(|e| self.expr_str(e)).unwrap_or_default();
                let update = update.as_ref().map(|e| self.expr_str(e)).unwrap_or_default();
                self.line(&format!("for ({}; {}; {}) {{", init, test, update));
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::ForEach {
                kind, left, right, body, ..
            } => {
                let op = match kind {
                    ForEachKind::ForIn => "in",
                    ForEachKind::ForOf => "of",
                };
                let left = self.pattern_str(left);
                let right = self.expr_str(right);
                self.line(&format!("for ({} {} {}) {{", left, op, right));
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Loop { body, .. } => {
                self.line("loop {");
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Switch {
                discriminant, cases, ..
            } => {
                let d = self.expr_str(discriminant);
                self.line(&format!("switch ({}) {{", d));
                self.indent += 1;
                for case in cases {
                    match &case.test {
                        Some(t) => {
                            let t = self.expr_str(t);
                            self.line(&format!("case {}:", t));
                        }
                        None => self.line("default:"),
                    }
                    self.indent += 1;
                    self.print_block(&case.consequent);
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.line("try {");
                self.indent += 1;
                self.print_block(block);
                self.indent -= 1;
                if let Some(h) = handler {
                    let param = h.param.as_ref().map(|p| self.pattern_str(p)).unwrap_or_default();
                    self.line(&format!("}} catch ({}) {{", param));
                    self.indent += 1;
                    self.print_block(&h.body);
                    self.indent -= 1;
                }
                if let Some(f) = finalizer {
                    self.line("} finally {");
                    self.indent += 1;
                    self.print_block(f);
                    self.indent -= 1;
                }
                self.line("}");
            }
            Stmt::Labeled { label, body, .. } => {
                self.line(&format!("{}:", label));
                self.print_stmt(body);
            }
            Stmt::Break { label, .. } => match label {
                Some(l) => self.line(&format!("break {};", l)),
                None => self.line("break;"),
            },
            Stmt::Continue { label, .. } => match label {
                Some(l) => self.line(&format!("continue {};", l)),
                None => self.line("continue;"),
            },
            Stmt::Skip { inner, .. } => self.print_stmt(inner),
        }
    }

    /// Single-line rendering of a statement, for a `for`-loop's init clause.
    fn stmt_inline_str(&mut self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::VarDecl { kind, declarations, .. } => {
                let kind = match kind {
                    VarKind::Let => "let",
                    VarKind::Const => "const",
                    VarKind::Var => "var",
                };
                let mut parts = Vec::new();
                for d in declarations {
                    let name = self.pattern_str(&d.name);
                    match &d.init {
                        Some(init) => parts.push(format!("{} = {}", name, self.expr_str(init))),
                        None => parts.push(name),
                    }
                }
                format!("{} {}", kind, parts.join(", "))
            }
            Stmt::Expr { expr, .. } => self.expr_str(expr),
            _ => String::new(),
        }
    }

    fn pattern_str(&mut self, pattern: &Pattern) -> String {
        match pattern {
            Pattern::Ident(ident) => ident.name.clone(),
            Pattern::Member { object, property, .. } => {
                let object = self.expr_str(object);
                format!("{}{}", object, self.prop_key_str(property))
            }
            Pattern::Destructure { shape, .. } => match shape {
                DestructurePattern::Array(_) => "[...]".to_string(),
                DestructurePattern::Object(_) => "{...}".to_string(),
            },
        }
    }

    fn prop_key_str(&mut self, key: &PropKey) -> String {
        match key {
            PropKey::Static(name) => format!(".{}", name),
            PropKey::Computed(e) => format!("[{}]", self.expr_str(e)),
        }
    }

    fn expr_str(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Number { value, .. } => format!("{}", value),
            Expr::Str { value, .. } => format!("{:?}", value),
            Expr::Bool { value, .. } => value.to_string(),
            Expr::Null { .. } => "null".to_string(),
            Expr::Undefined { .. } => "undefined".to_string(),
            Expr::BigInt { value, .. } => format!("{}n", value),
            Expr::TemplateLiteral { quasis, exprs, .. } => {
                let mut s = String::from("`");
                for (i, q) in quasis.iter().enumerate() {
                    s.push_str(q);
                    if let Some(e) = exprs.get(i) {
                        s.push_str("${");
                        s.push_str(&self.expr_str(e));
                        s.push('}');
                    }
                }
                s.push('`');
                s
            }
            Expr::TaggedTemplate { tag, quasis, exprs, .. } => {
                let tag = self.expr_str(tag);
                let lit = self.expr_str(&Expr::TemplateLiteral {
                    id: crate::span::IdGen::new().node_id(),
                    span: crate::span::Span::synthetic(),
                    quasis: quasis.clone(),
                    exprs: exprs.clone(),
                });
                format!("{}{}", tag, lit)
            }
            Expr::Ident(ident) => ident.name.clone(),
            Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                let object = self.expr_str(object);
                let op = if *optional { "?." } else { "" };
                format!("{}{}{}", object, op, self.prop_key_str(property))
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                let test = self.expr_str(test);
                let consequent = self.expr_str(consequent);
                let alternate = self.expr_str(alternate);
                format!("({} ? {} : {})", test, consequent, alternate)
            }
            Expr::Binary { op, left, right, .. } => {
                let left = self.expr_str(left);
                let right = self.expr_str(right);
                format!("({} {} {})", left, binary_op_str(*op), right)
            }
            Expr::Logical { op, left, right, .. } => {
                let left = self.expr_str(left);
                let right = self.expr_str(right);
                format!("({} {} {})", left, logical_op_str(*op), right)
            }
            Expr::Unary { op, argument, .. } => {
                let argument = self.expr_str(argument);
                format!("{}{}", unary_op_str(*op), argument)
            }
            Expr::Assignment { op, target, value, .. } => {
                let target = self.pattern_str(target);
                let value = self.expr_str(value);
                format!("{} {} {}", target, assign_op_str(*op), value)
            }
            Expr::Call {
                callee, args, optional, ..
            } => {
                let callee = self.expr_str(callee);
                let args: Vec<_> = args.iter().map(|a| self.expr_str(a)).collect();
                let op = if *optional { "?." } else { "" };
                format!("{}{}({})", callee, op, args.join(", "))
            }
            Expr::New { callee, args, .. } => {
                let callee = self.expr_str(callee);
                let args: Vec<_> = args.iter().map(|a| self.expr_str(a)).collect();
                format!("new {}({})", callee, args.join(", "))
            }
            Expr::Array { elements, .. } => {
                let parts: Vec<_> = elements
                    .iter()
                    .map(|el| match el {
                        ArrayElement::Item(e) => self.expr_str(e),
                        ArrayElement::Spread(e) => format!("...{}", self.expr_str(e)),
                        ArrayElement::Hole => String::new(),
                    })
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Expr::Object { properties, .. } => {
                let parts: Vec<_> = properties
                    .iter()
                    .map(|p| self.object_property_str(p))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Expr::FunctionExpr { function, .. } => self.function_str(function),
            Expr::Sequence { exprs, .. } => {
                let parts: Vec<_> = exprs.iter().map(|e| self.expr_str(e)).collect();
                format!("({})", parts.join(", "))
            }
            Expr::Paren { inner, .. } => format!("({})", self.expr_str(inner)),
            Expr::TypeAssertion { inner, .. } => self.expr_str(inner),
            Expr::Jsx(node) => self.jsx_str(node),
            Expr::Other { raw, .. } => raw.clone(),
        }
    }

    fn object_property_str(&mut self, prop: &ObjectProperty) -> String {
        match prop {
            ObjectProperty::KeyValue { key, value } => {
                format!("{}: {}", self.key_str(key), self.expr_str(value))
            }
            ObjectProperty::Shorthand(ident) => ident.name.clone(),
            ObjectProperty::Spread(e) => format!("...{}", self.expr_str(e)),
            ObjectProperty::Method { key, function } => {
                format!("{}{}", self.key_str(key), self.expr_str(function))
            }
        }
    }

    fn key_str(&mut self, key: &PropKey) -> String {
        match key {
            PropKey::Static(name) => name.clone(),
            PropKey::Computed(e) => format!("[{}]", self.expr_str(e)),
        }
    }

    fn function_str(&mut self, function: &Function) -> String {
        let params: Vec<_> = function.params.iter().map(|p| self.pattern_str(p)).collect();
        let header = if function.is_arrow {
            format!("({}) =>", params.join(", "))
        } else {
            format!("function ({})", params.join(", "))
        };
        match &function.body {
            FunctionBody::Expression(e) => format!("{} {}", header, self.expr_str(e)),
            FunctionBody::Block(stmts) => {
                let mut inner = Printer {
                    out: String::new(),
                    indent: 0,
                };
                inner.print_block(stmts);
                format!("{} {{ {} }}", header, inner.out.replace('\n', " ").trim())
            }
        }
    }

    fn jsx_str(&mut self, node: &JsxNode) -> String {
        let name = match &node.name {
            JsxName::Element(n) => n.clone(),
            JsxName::Fragment => String::new(),
        };
        let attrs: Vec<_> = node
            .attributes
            .iter()
            .map(|a| match a {
                JsxAttribute::Named { name, value } => match value {
                    Some(JsxAttrValue::Str(s)) => format!("{}={:?}", name, s),
                    Some(JsxAttrValue::Expr(e)) => format!("{}={{{}}}", name, self.expr_str(e)),
                    None => name.clone(),
                },
                JsxAttribute::Spread(e) => format!("{{...{}}}", self.expr_str(e)),
            })
            .collect();
        let children: Vec<_> = node
            .children
            .iter()
            .map(|c| match c {
                JsxChild::Text(t) => t.clone(),
                JsxChild::Expr(e) => format!("{{{}}}", self.expr_str(e)),
                JsxChild::Element(el) => self.jsx_str(el),
            })
            .collect();
        if children.is_empty() {
            format!("<{} {}/>", name, attrs.join(" "))
        } else {
            format!("<{} {}>{}</{}>", name, attrs.join(" "), children.join(""), name)
        }
    }
}

fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::StrictEq => "===",
        BinaryOp::StrictNotEq => "!==",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::LtEq => "<=",
        BinaryOp::GtEq => ">=",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::UShr => ">>>",
        BinaryOp::In => "in",
        BinaryOp::Instanceof => "instanceof",
        BinaryOp::Pipeline => "|>",
    }
}

fn logical_op_str(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "&&",
        LogicalOp::Or => "||",
        LogicalOp::Nullish => "??",
    }
}

fn unary_op_str(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
        UnaryOp::Typeof => "typeof ",
        UnaryOp::Void => "void ",
        UnaryOp::Delete => "delete ",
    }
}

fn assign_op_str(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "=",
        AssignOp::AddAssign => "+=",
        AssignOp::SubAssign => "-=",
        AssignOp::MulAssign => "*=",
        AssignOp::DivAssign => "/=",
        AssignOp::AndAssign => "&&=",
        AssignOp::OrAssign => "||=",
        AssignOp::NullishAssign => "??=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{IdGen, Span};

    #[test]
    fn renders_a_trivial_component() {
        let mut ids = IdGen::new();
        let component = Component {
            name: "Trivial".to_string(),
            params: vec![],
            body: vec![Stmt::Return {
                id: ids.node_id(),
                span: Span::synthetic(),
                argument: Some(Expr::Number {
                    id: ids.node_id(),
                    span: Span::synthetic(),
                    value: 1.0,
                }),
            }],
        };
        let text = print_component(&component);
        assert!(text.contains("return 1;"));
    }
}
