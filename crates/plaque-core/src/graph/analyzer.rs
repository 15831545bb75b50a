//! Static analysis of the names a cell defines and uses.
//!
//! Only top-level bindings are definitions. Loads inside function and lambda
//! bodies are free variables. They are settled against the names bound so
//! far whenever a later top-level statement may call the function, and
//! against everything the cell defines when nothing calls it in the cell.
//! Class bodies and comprehensions run immediately and are treated as such.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use super::types::AnalysisNote;
use crate::error::ParseError;
use crate::syntax::ast::*;
use crate::syntax::parse;
use crate::syntax::visit::{self, Visit};

/// Calls that read or bind names in ways static analysis cannot follow.
const DYNAMIC_NAME_FUNCTIONS: &[&str] = &["exec", "eval", "globals", "setattr"];

/// Names a cell binds and reads at top level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub defines: BTreeSet<String>,
    pub uses: BTreeSet<String>,
    pub notes: Vec<AnalysisNote>,
}

/// Analyze the source of a code cell.
pub fn analyze(source: &str) -> Result<Analysis, ParseError> {
    let module = parse(source)?;
    Ok(analyze_suite(&module.body))
}

/// Analyze an already parsed cell body.
pub fn analyze_suite(body: &Suite) -> Analysis {
    let mut analyzer = DependencyAnalyzer::default();
    for stmt in body {
        if may_call(stmt) {
            analyzer.settle_pending();
        }
        analyzer.visit_stmt(stmt);
    }
    analyzer.finish()
}

/// Whether running a top-level statement can call a function defined earlier.
fn may_call(stmt: &Stmt) -> bool {
    let mut finder = CallFinder::default();
    finder.visit_stmt(stmt);
    finder.found
}

#[derive(Default)]
struct CallFinder {
    found: bool,
}

impl Visit for CallFinder {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let StmtKind::ClassDef(class) = &stmt.kind
            && !class.decorators.is_empty()
        {
            self.found = true;
        }
        if !self.found {
            visit::visit_stmt(self, stmt);
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Call { .. } = expr.kind {
            self.found = true;
        }
        if !self.found {
            visit::visit_expr(self, expr);
        }
    }

    // Bodies do not run at definition time.
    fn visit_function_def(&mut self, def: &FunctionDef) {
        if !def.decorators.is_empty() {
            self.found = true;
        }
        for default in def.params.defaults() {
            self.visit_expr(default);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Class,
    Comprehension,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    names: FxHashSet<String>,
    globals: FxHashSet<String>,
    nonlocals: FxHashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            names: FxHashSet::default(),
            globals: FxHashSet::default(),
            nonlocals: FxHashSet::default(),
        }
    }
}

#[derive(Debug, Default)]
struct DependencyAnalyzer {
    /// Nested scopes; empty means module level.
    scopes: Vec<Scope>,
    /// Module-level names bound so far.
    bound: FxHashSet<String>,
    defines: BTreeSet<String>,
    uses: BTreeSet<String>,
    /// Free names of function bodies not yet settled.
    pending: BTreeSet<String>,
    notes: Vec<AnalysisNote>,
}

impl DependencyAnalyzer {
    /// A function defined so far may run now: its free names read whatever
    /// is bound at this point.
    fn settle_pending(&mut self) {
        for name in std::mem::take(&mut self.pending) {
            if !self.bound.contains(&name) {
                self.uses.insert(name);
            }
        }
    }

    fn finish(mut self) -> Analysis {
        for name in std::mem::take(&mut self.pending) {
            if !self.defines.contains(&name) {
                self.uses.insert(name);
            }
        }
        Analysis {
            defines: self.defines,
            uses: self.uses,
            notes: self.notes,
        }
    }

    fn note(&mut self, note: AnalysisNote) {
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    // =========================================================================
    // Name resolution
    // =========================================================================

    fn load(&mut self, name: &str) {
        let mut deferred = false;
        let mut skip_class = false;
        for scope in self.scopes.iter().rev() {
            match scope.kind {
                ScopeKind::Function => {
                    deferred = true;
                    skip_class = true;
                    if scope.globals.contains(name) {
                        break;
                    }
                    if !scope.nonlocals.contains(name) && scope.names.contains(name) {
                        return;
                    }
                }
                ScopeKind::Class => {
                    if !skip_class && scope.names.contains(name) {
                        return;
                    }
                }
                ScopeKind::Comprehension => {
                    if scope.names.contains(name) {
                        return;
                    }
                }
            }
        }

        if deferred {
            self.pending.insert(name.to_string());
        } else if !self.bound.contains(name) {
            self.uses.insert(name.to_string());
        }
    }

    fn store(&mut self, name: &str) {
        match self.scopes.last_mut() {
            None => {
                self.bound.insert(name.to_string());
                self.defines.insert(name.to_string());
            }
            Some(scope) => match scope.kind {
                ScopeKind::Function => {
                    if scope.globals.contains(name) {
                        self.defines.insert(name.to_string());
                    }
                }
                ScopeKind::Class | ScopeKind::Comprehension => {
                    scope.names.insert(name.to_string());
                }
            },
        }
    }

    /// Whether `name` is bound in the innermost scope that can see it.
    fn is_bound_here(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.names.contains(name) && !scope.nonlocals.contains(name) {
                return true;
            }
            if scope.kind == ScopeKind::Function && scope.globals.contains(name) {
                break;
            }
        }
        self.bound.contains(name)
    }

    fn visit_target(&mut self, target: &Expr) {
        match &target.kind {
            ExprKind::Name(name) => self.store(name),
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    self.visit_target(item);
                }
            }
            ExprKind::Starred(inner) => self.visit_target(inner),
            ExprKind::Attribute { value, .. } => {
                self.note_mutation(value);
                self.visit_expr(value);
            }
            ExprKind::Subscript { value, index } => {
                self.note_mutation(value);
                self.visit_expr(value);
                self.visit_expr(index);
            }
            _ => self.visit_expr(target),
        }
    }

    fn note_mutation(&mut self, base: &Expr) {
        let mut root = base;
        loop {
            match &root.kind {
                ExprKind::Attribute { value, .. } | ExprKind::Subscript { value, .. } => {
                    root = value;
                }
                _ => break,
            }
        }
        if let ExprKind::Name(name) = &root.kind
            && !self.is_bound_here(name)
        {
            self.note(AnalysisNote::ExternalMutation { name: name.clone() });
        }
    }

    fn visit_generator_body(&mut self, generator: &Generator) {
        self.visit_target(&generator.target);
        for condition in &generator.conditions {
            self.visit_expr(condition);
        }
    }
}

impl Visit for DependencyAnalyzer {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                self.visit_expr(value);
                for target in targets {
                    self.visit_target(target);
                }
            }
            StmtKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    self.visit_expr(value);
                }
                self.visit_target(target);
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.visit_expr(value);
                if let ExprKind::Name(name) = &target.kind {
                    self.load(name);
                }
                self.visit_target(target);
            }
            StmtKind::Delete(targets) => {
                for target in targets {
                    match &target.kind {
                        ExprKind::Name(name) => self.load(name),
                        _ => self.visit_target(target),
                    }
                }
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.visit_expr(iter);
                self.visit_target(target);
                self.visit_suite(body);
                self.visit_suite(orelse);
            }
            StmtKind::FunctionDef(def) => {
                self.visit_function_def(def);
                self.store(&def.name);
            }
            StmtKind::ClassDef(class) => {
                for expr in class.decorators.iter().chain(&class.bases) {
                    self.visit_expr(expr);
                }
                self.scopes.push(Scope::new(ScopeKind::Class));
                self.visit_suite(&class.body);
                self.scopes.pop();
                self.store(&class.name);
            }
            StmtKind::Import(names) => {
                for alias in names {
                    let bound = alias
                        .asname
                        .as_deref()
                        .unwrap_or_else(|| alias.name.split('.').next().unwrap_or(&alias.name));
                    self.store(bound);
                }
            }
            StmtKind::ImportFrom { module, names } => {
                for alias in names {
                    if alias.name == "*" {
                        self.note(AnalysisNote::WildcardImport {
                            module: module.clone(),
                        });
                    } else {
                        self.store(alias.asname.as_deref().unwrap_or(&alias.name));
                    }
                }
            }
            // collected up front by `collect_bindings`
            StmtKind::Global(_) | StmtKind::Nonlocal(_) => {}
            _ => visit::visit_stmt(self, stmt),
        }
    }

    /// `except E as e` binds `e` for the handler body only.
    fn visit_handler(&mut self, handler: &Handler) {
        if let Some(kind) = &handler.kind {
            self.visit_expr(kind);
        }
        let Some(name) = &handler.name else {
            self.visit_suite(&handler.body);
            return;
        };
        match self.scopes.last_mut() {
            None => {
                let added = self.bound.insert(name.clone());
                self.visit_suite(&handler.body);
                if added {
                    self.bound.remove(name);
                }
            }
            Some(scope) => {
                let added = scope.names.insert(name.clone());
                self.visit_suite(&handler.body);
                if added
                    && let Some(scope) = self.scopes.last_mut()
                    && scope.kind != ScopeKind::Function
                {
                    scope.names.remove(name);
                }
            }
        }
    }

    /// Decorators and defaults run in the defining scope; the body runs later
    /// in its own.
    fn visit_function_def(&mut self, def: &FunctionDef) {
        for expr in def.decorators.iter().chain(def.params.defaults()) {
            self.visit_expr(expr);
        }

        let bindings = collect_bindings(&def.body);
        let mut scope = Scope::new(ScopeKind::Function);
        scope.names.extend(def.params.names().map(str::to_string));
        scope.names.extend(bindings.names);
        for name in bindings.globals.iter().chain(&bindings.nonlocals) {
            scope.names.remove(name);
        }
        scope.globals = bindings.globals;
        scope.nonlocals = bindings.nonlocals;

        self.scopes.push(scope);
        self.visit_suite(&def.body);
        self.scopes.pop();
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(name) => self.load(name),
            ExprKind::Call { func, .. } => {
                if let ExprKind::Name(name) = &func.kind
                    && DYNAMIC_NAME_FUNCTIONS.contains(&name.as_str())
                {
                    self.note(AnalysisNote::DynamicNames {
                        function: name.clone(),
                    });
                }
                visit::visit_expr(self, expr);
            }
            ExprKind::Comprehension {
                element,
                value,
                generators,
                ..
            } => {
                let Some((first, rest)) = generators.split_first() else {
                    return;
                };
                self.visit_expr(&first.iter);
                self.scopes.push(Scope::new(ScopeKind::Comprehension));
                self.visit_generator_body(first);
                for generator in rest {
                    self.visit_expr(&generator.iter);
                    self.visit_generator_body(generator);
                }
                self.visit_expr(element);
                if let Some(value) = value {
                    self.visit_expr(value);
                }
                self.scopes.pop();
            }
            _ => visit::visit_expr(self, expr),
        }
    }
}

#[derive(Debug, Default)]
struct Bindings {
    names: FxHashSet<String>,
    globals: FxHashSet<String>,
    nonlocals: FxHashSet<String>,
}

/// Names bound anywhere in a function body (not descending into nested
/// function or class bodies), plus its `global`/`nonlocal` declarations.
fn collect_bindings(body: &Suite) -> Bindings {
    fn targets(expr: &Expr, out: &mut FxHashSet<String>) {
        match &expr.kind {
            ExprKind::Name(name) => {
                out.insert(name.clone());
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    targets(item, out);
                }
            }
            ExprKind::Starred(inner) => targets(inner, out),
            _ => {}
        }
    }

    fn walk(body: &Suite, out: &mut Bindings) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Assign { targets: ts, .. } => {
                    for t in ts {
                        targets(t, &mut out.names);
                    }
                }
                StmtKind::AnnAssign { target, .. } | StmtKind::AugAssign { target, .. } => {
                    targets(target, &mut out.names)
                }
                StmtKind::Delete(ts) => {
                    for t in ts {
                        targets(t, &mut out.names);
                    }
                }
                StmtKind::For {
                    target,
                    body,
                    orelse,
                    ..
                } => {
                    targets(target, &mut out.names);
                    walk(body, out);
                    walk(orelse, out);
                }
                StmtKind::If { body, orelse, .. } | StmtKind::While { body, orelse, .. } => {
                    walk(body, out);
                    walk(orelse, out);
                }
                StmtKind::FunctionDef(def) => {
                    out.names.insert(def.name.clone());
                }
                StmtKind::ClassDef(class) => {
                    out.names.insert(class.name.clone());
                }
                StmtKind::Import(names) => {
                    for alias in names {
                        let bound = alias.asname.clone().unwrap_or_else(|| {
                            alias.name.split('.').next().unwrap_or(&alias.name).to_string()
                        });
                        out.names.insert(bound);
                    }
                }
                StmtKind::ImportFrom { names, .. } => {
                    for alias in names.iter().filter(|a| a.name != "*") {
                        out.names
                            .insert(alias.asname.clone().unwrap_or_else(|| alias.name.clone()));
                    }
                }
                StmtKind::Global(names) => out.globals.extend(names.iter().cloned()),
                StmtKind::Nonlocal(names) => out.nonlocals.extend(names.iter().cloned()),
                StmtKind::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                } => {
                    walk(body, out);
                    for handler in handlers {
                        if let Some(name) = &handler.name {
                            out.names.insert(name.clone());
                        }
                        walk(&handler.body, out);
                    }
                    walk(orelse, out);
                    walk(finalbody, out);
                }
                _ => {}
            }
        }
    }

    let mut bindings = Bindings::default();
    walk(body, &mut bindings);
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn check(source: &str, defines: &[&str], uses: &[&str]) -> Analysis {
        let analysis = analyze(source).unwrap();
        assert_eq!(analysis.defines, set(defines), "defines of {source:?}");
        assert_eq!(analysis.uses, set(uses), "uses of {source:?}");
        analysis
    }

    #[test]
    fn test_simple_assignment() {
        check("y = x + 1", &["y"], &["x"]);
    }

    #[test]
    fn test_use_before_binding_in_same_cell() {
        check("print(x)\nx = 1", &["x"], &["print", "x"]);
        check("x = 1\nprint(x)", &["x"], &["print"]);
    }

    #[test]
    fn test_function_called_before_rebinding_uses_previous_value() {
        check(
            "def f():\n    return k\nprint(f())\nk = 2",
            &["f", "k"],
            &["k", "print"],
        );
        check(
            "k = 1\ndef f():\n    return k\nprint(f())\nk = 2",
            &["f", "k"],
            &["print"],
        );
    }

    #[test]
    fn test_decorated_definition_may_call_earlier_functions() {
        check(
            "def helper():\n    return limit\n@register\nclass A:\n    pass\nlimit = 3",
            &["A", "helper", "limit"],
            &["limit", "register"],
        );
    }

    #[test]
    fn test_function_free_variables_resolve_at_end_of_cell() {
        check(
            "def f():\n    return g() + k\ndef g():\n    return 1",
            &["f", "g"],
            &["k"],
        );
    }

    #[test]
    fn test_function_locals_do_not_leak() {
        check(
            "def f(a, *rest, **kw):\n    b = a\n    for i in rest:\n        b += i\n    return b",
            &["f"],
            &[],
        );
    }

    #[test]
    fn test_defaults_and_decorators_are_immediate() {
        check("@register\ndef f(a=default):\n    pass", &["f"], &["default", "register"]);
    }

    #[test]
    fn test_class_body_loads_are_immediate() {
        check("class A(Base):\n    y = x\n    z = y", &["A"], &["Base", "x"]);
    }

    #[test]
    fn test_methods_skip_class_scope() {
        check(
            "class A:\n    factor = 2\n    def m(self):\n        return helper(self) * factor\nhelper = len",
            &["A", "helper"],
            &["factor", "len"],
        );
    }

    #[test]
    fn test_global_declaration_defines() {
        check(
            "def setup():\n    global config\n    config = load()",
            &["config", "setup"],
            &["load"],
        );
    }

    #[test]
    fn test_nonlocal_binds_to_enclosing_function() {
        check(
            "def outer():\n    n = 0\n    def inner():\n        nonlocal n\n        n += 1\n        return n\n    return inner",
            &["outer"],
            &[],
        );
    }

    #[test]
    fn test_augmented_assignment() {
        check("total += 1", &["total"], &["total"]);
        check("total = 0\ntotal += 1", &["total"], &[]);
    }

    #[test]
    fn test_except_name_is_handler_only() {
        check(
            "try:\n    pass\nexcept ValueError as e:\n    print(e)\nprint(e)",
            &[],
            &["ValueError", "e", "print"],
        );
    }

    #[test]
    fn test_del_is_a_use() {
        check("del x", &[], &["x"]);
    }

    #[test]
    fn test_comprehension_targets_do_not_leak() {
        check("ys = [x * k for x in xs if x]", &["ys"], &["k", "xs"]);
        check(
            "pairs = {a: b for a in range(3) for b in range(a)}",
            &["pairs"],
            &["range"],
        );
    }

    #[test]
    fn test_lambda_free_variables() {
        check("f = lambda a: a + b", &["f"], &["b"]);
        check("f = lambda a: a + b\nb = 1", &["b", "f"], &[]);
    }

    #[test]
    fn test_imports() {
        check(
            "import os.path\nimport numpy as np\nfrom m import a, b as c",
            &["a", "c", "np", "os"],
            &[],
        );
    }

    #[test]
    fn test_loop_targets_define() {
        check("for i, (a, b) in items:\n    pass", &["a", "b", "i"], &["items"]);
    }

    #[test]
    fn test_notes() {
        let analysis = analyze("from m import *\nexec('x = 1')\nexec('y')").unwrap();
        assert_eq!(
            analysis.notes,
            vec![
                AnalysisNote::WildcardImport { module: "m".into() },
                AnalysisNote::DynamicNames {
                    function: "exec".into()
                },
            ]
        );
    }

    #[test]
    fn test_external_mutation() {
        let analysis = check(
            "data[0] = 2\nobj.attr.inner = 3\nd = {}\nd['k'] = 1",
            &["d"],
            &["data", "obj"],
        );
        assert_eq!(
            analysis.notes,
            vec![
                AnalysisNote::ExternalMutation {
                    name: "data".into()
                },
                AnalysisNote::ExternalMutation { name: "obj".into() },
            ]
        );
    }

    #[test]
    fn test_self_attribute_in_method_is_not_external() {
        let analysis = analyze("class A:\n    def __init__(self):\n        self.x = 1").unwrap();
        assert!(analysis.notes.is_empty());
    }
}
