//! Read-only traversal of the syntax tree.
//!
//! Each trait method defaults to the free function of the same name, which
//! visits the node's children. Implementors override the nodes they care
//! about and call the free function to keep descending.

use super::ast::*;

pub trait Visit {
    fn visit_suite(&mut self, body: &Suite) {
        visit_suite(self, body);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        visit_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        visit_expr(self, expr);
    }

    /// A `def` or a lambda, including its decorators and defaults.
    fn visit_function_def(&mut self, def: &FunctionDef) {
        visit_function_def(self, def);
    }

    fn visit_handler(&mut self, handler: &Handler) {
        visit_handler(self, handler);
    }
}

pub fn visit_suite<V: Visit + ?Sized>(v: &mut V, body: &Suite) {
    for stmt in body {
        v.visit_stmt(stmt);
    }
}

pub fn visit_stmt<V: Visit + ?Sized>(v: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Expr(expr) => v.visit_expr(expr),
        StmtKind::Assign { targets, value } => {
            v.visit_expr(value);
            for target in targets {
                v.visit_expr(target);
            }
        }
        StmtKind::AnnAssign { target, value, .. } => {
            if let Some(value) = value {
                v.visit_expr(value);
            }
            v.visit_expr(target);
        }
        StmtKind::AugAssign { target, value, .. } => {
            v.visit_expr(value);
            v.visit_expr(target);
        }
        StmtKind::Delete(targets) => {
            for target in targets {
                v.visit_expr(target);
            }
        }
        StmtKind::Return(value) | StmtKind::Raise(value) => {
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            v.visit_expr(test);
            v.visit_suite(body);
            v.visit_suite(orelse);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            v.visit_expr(iter);
            v.visit_expr(target);
            v.visit_suite(body);
            v.visit_suite(orelse);
        }
        StmtKind::FunctionDef(def) => v.visit_function_def(def),
        StmtKind::ClassDef(class) => {
            for expr in class.decorators.iter().chain(&class.bases) {
                v.visit_expr(expr);
            }
            v.visit_suite(&class.body);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            v.visit_suite(body);
            for handler in handlers {
                v.visit_handler(handler);
            }
            v.visit_suite(orelse);
            v.visit_suite(finalbody);
        }
        StmtKind::Assert { test, msg } => {
            v.visit_expr(test);
            if let Some(msg) = msg {
                v.visit_expr(msg);
            }
        }
        StmtKind::Import(_)
        | StmtKind::ImportFrom { .. }
        | StmtKind::Global(_)
        | StmtKind::Nonlocal(_)
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

pub fn visit_function_def<V: Visit + ?Sized>(v: &mut V, def: &FunctionDef) {
    for expr in def.decorators.iter().chain(def.params.defaults()) {
        v.visit_expr(expr);
    }
    v.visit_suite(&def.body);
}

pub fn visit_handler<V: Visit + ?Sized>(v: &mut V, handler: &Handler) {
    if let Some(kind) = &handler.kind {
        v.visit_expr(kind);
    }
    v.visit_suite(&handler.body);
}

pub fn visit_expr<V: Visit + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Constant(_) => {}
        ExprKind::FString(parts) => {
            for part in parts {
                if let FStringPart::Field { expr, .. } = part {
                    v.visit_expr(expr);
                }
            }
        }
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        ExprKind::Dict(pairs) => {
            for (key, value) in pairs {
                v.visit_expr(key);
                v.visit_expr(value);
            }
        }
        ExprKind::Starred(inner) => v.visit_expr(inner),
        ExprKind::BinOp { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        ExprKind::UnaryOp { operand, .. } => v.visit_expr(operand),
        ExprKind::BoolOp { values, .. } => {
            for value in values {
                v.visit_expr(value);
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            v.visit_expr(left);
            for comparator in comparators {
                v.visit_expr(comparator);
            }
        }
        ExprKind::IfExp { test, body, orelse } => {
            v.visit_expr(test);
            v.visit_expr(body);
            v.visit_expr(orelse);
        }
        ExprKind::Lambda(def) => v.visit_function_def(def),
        ExprKind::Call { func, args } => {
            v.visit_expr(func);
            for arg in args {
                v.visit_expr(arg.expr());
            }
        }
        ExprKind::Attribute { value, .. } => v.visit_expr(value),
        ExprKind::Subscript { value, index } => {
            v.visit_expr(value);
            v.visit_expr(index);
        }
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                v.visit_expr(part);
            }
        }
        ExprKind::Comprehension {
            element,
            value,
            generators,
            ..
        } => {
            for generator in generators {
                v.visit_expr(&generator.iter);
                v.visit_expr(&generator.target);
                for condition in &generator.conditions {
                    v.visit_expr(condition);
                }
            }
            v.visit_expr(element);
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    #[derive(Default)]
    struct Names(Vec<String>);

    impl Visit for Names {
        fn visit_expr(&mut self, expr: &Expr) {
            if let ExprKind::Name(name) = &expr.kind {
                self.0.push(name.clone());
            }
            visit_expr(self, expr);
        }
    }

    #[test]
    fn test_default_walk_reaches_nested_names() {
        let module = parse("@deco\ndef f(a=default):\n    return [g(x) for x in xs if x]\n").unwrap();
        let mut names = Names::default();
        names.visit_suite(&module.body);
        assert_eq!(names.0, vec!["deco", "default", "xs", "x", "x", "g", "x"]);
    }
}
