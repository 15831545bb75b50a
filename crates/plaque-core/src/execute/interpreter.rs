//! Tree-walking interpreter for cell code.
//!
//! This module provides:
//! - Statement execution and expression evaluation over the syntax tree
//! - Name resolution through function, class and module scopes
//! - Function calls with argument binding and a bounded call depth
//! - A native stack budget so deep user recursion raises `RecursionError`
//! - Exception propagation with `try`/`except`/`finally`

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::builtins;
use super::format;
use super::methods;
use super::modules;
use super::value::{
    Args, BoundMethod, Class, Exception, ExceptionKind, ExceptionValue, Flow, Function, HashKey,
    Instance, Namespace, NativeMethod, Scope, Slice, Value,
};
use crate::stack::StackMark;
use crate::syntax::ast::{
    Alias, Arg, BinOp, BoolOp, ClassDef, ComprehensionKind, Constant, Expr, ExprKind, FStringPart,
    FunctionDef, Generator, Handler, Stmt, StmtKind, Suite,
};

/// Interpreter limits and terminal behaviour.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Maximum nesting of user function calls before `RecursionError`.
    pub max_depth: usize,
    /// Also write `print` output to the process stdout as it happens.
    pub echo_stdout: bool,
    /// Longest result repr kept in a cell's output.
    pub repr_limit: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_depth: 200,
            echo_stdout: false,
            repr_limit: 2000,
        }
    }
}

/// Where names are read and written while executing a block.
#[derive(Clone)]
pub(crate) struct Frame {
    globals: Namespace,
    scope: Option<Rc<Scope>>,
}

impl Frame {
    fn module(globals: Namespace) -> Self {
        Self {
            globals,
            scope: None,
        }
    }

    fn is_module(&self) -> bool {
        self.scope.is_none()
    }
}

/// Executes cell code against a shared global namespace.
pub struct Interpreter {
    config: InterpreterConfig,
    stdout: String,
    depth: usize,
    /// Taken when a suite starts running.
    stack: StackMark,
    /// Containers whose repr is being built, outermost first.
    rendering: Vec<usize>,
    /// Exceptions being handled by enclosing `except` blocks, innermost last.
    handling: Vec<Exception>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            config,
            stdout: String::new(),
            depth: 0,
            stack: StackMark::here(),
            rendering: Vec::new(),
            handling: Vec::new(),
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Append text to the captured output of the running cell.
    pub fn write_stdout(&mut self, text: &str) {
        if self.config.echo_stdout {
            print!("{text}");
        }
        self.stdout.push_str(text);
    }

    /// Take the output captured since the last call.
    pub fn take_stdout(&mut self) -> String {
        std::mem::take(&mut self.stdout)
    }

    /// Run a module-level suite against `globals`.
    ///
    /// Returns the value of the final statement when it is an expression.
    pub fn run_suite(&mut self, suite: &Suite, globals: &Namespace) -> Result<Option<Value>, Exception> {
        self.depth = 0;
        self.stack = StackMark::here();
        self.rendering.clear();
        self.handling.clear();
        let frame = Frame::module(globals.clone());
        let Some((last, init)) = suite.split_last() else {
            return Ok(None);
        };
        for stmt in init {
            self.exec_top(stmt, &frame)?;
        }
        if let StmtKind::Expr(expr) = &last.kind {
            return self
                .eval(expr, &frame)
                .map(Some)
                .map_err(|e| e.at_line(last.line));
        }
        self.exec_top(last, &frame)?;
        Ok(None)
    }

    fn exec_top(&mut self, stmt: &Stmt, frame: &Frame) -> Result<(), Exception> {
        let flow = self.exec_stmt(stmt, frame).map_err(|e| e.at_line(stmt.line))?;
        let misplaced = match flow {
            Flow::Normal => return Ok(()),
            Flow::Return(_) => "'return' outside function",
            Flow::Break => "'break' outside loop",
            Flow::Continue => "'continue' not properly in loop",
        };
        Err(Exception::new(ExceptionKind::SyntaxError, misplaced).at_line(stmt.line))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn exec_block(&mut self, suite: &[Stmt], frame: &Frame) -> Result<Flow, Exception> {
        for stmt in suite {
            let flow = self.exec_stmt(stmt, frame).map_err(|e| {
                // lines are only meaningful inside the code being run
                if frame.is_module() { e.at_line(stmt.line) } else { e }
            })?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &Frame) -> Result<Flow, Exception> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, frame)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value, frame)?;
                for target in targets {
                    self.assign(target, value.clone(), frame)?;
                }
            }
            StmtKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.eval(value, frame)?;
                    self.assign(target, value, frame)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.exec_aug_assign(target, *op, value, frame)?;
            }
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.exec_delete(target, frame)?;
                }
            }
            StmtKind::Pass | StmtKind::Global(_) | StmtKind::Nonlocal(_) => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { test, body, orelse } => {
                return if self.eval(test, frame)?.truthy() {
                    self.exec_block(body, frame)
                } else {
                    self.exec_block(orelse, frame)
                };
            }
            StmtKind::While { test, body, orelse } => {
                return self.exec_while(test, body, orelse, frame);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                return self.exec_for(target, iter, body, orelse, frame);
            }
            StmtKind::FunctionDef(def) => {
                let function = self.make_function(def, frame)?;
                let function = self.decorate(function, &def.decorators, frame)?;
                self.store(&def.name, function, frame)?;
            }
            StmtKind::ClassDef(def) => {
                let class = self.make_class(def, frame)?;
                let class = self.decorate(class, &def.decorators, frame)?;
                self.store(&def.name, class, frame)?;
            }
            StmtKind::Import(aliases) => self.exec_import(aliases, frame)?,
            StmtKind::ImportFrom { module, names } => self.exec_import_from(module, names, frame)?,
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                return self.exec_try(body, handlers, orelse, finalbody, frame);
            }
            StmtKind::Raise(value) => return Err(self.exec_raise(value.as_ref(), frame)?),
            StmtKind::Assert { test, msg } => {
                if !self.eval(test, frame)?.truthy() {
                    let message = match msg {
                        Some(msg) => {
                            let value = self.eval(msg, frame)?;
                            self.to_str(&value)?
                        }
                        None => String::new(),
                    };
                    return Err(Exception::new(ExceptionKind::AssertionError, message));
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_aug_assign(
        &mut self,
        target: &Expr,
        op: BinOp,
        value: &Expr,
        frame: &Frame,
    ) -> Result<(), Exception> {
        match &target.kind {
            ExprKind::Name(name) => {
                let current = self.load(name, frame)?;
                let rhs = self.eval(value, frame)?;
                let result = self.inplace_op(op, current, rhs)?;
                self.store(name, result, frame)
            }
            ExprKind::Attribute { value: object, attr } => {
                let object = self.eval(object, frame)?;
                let current = self.get_attr(&object, attr)?;
                let rhs = self.eval(value, frame)?;
                let result = self.inplace_op(op, current, rhs)?;
                self.set_attr(&object, attr, result)
            }
            ExprKind::Subscript { value: object, index } => {
                let object = self.eval(object, frame)?;
                let index = self.eval(index, frame)?;
                let current = self.get_item(&object, &index)?;
                let rhs = self.eval(value, frame)?;
                let result = self.inplace_op(op, current, rhs)?;
                self.set_item(&object, index, result)
            }
            _ => Err(Exception::new(
                ExceptionKind::SyntaxError,
                "illegal expression for augmented assignment",
            )),
        }
    }

    fn exec_delete(&mut self, target: &Expr, frame: &Frame) -> Result<(), Exception> {
        match &target.kind {
            ExprKind::Name(name) => self.delete(name, frame),
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    self.exec_delete(item, frame)?;
                }
                Ok(())
            }
            ExprKind::Attribute { value, attr } => {
                let object = self.eval(value, frame)?;
                match &object {
                    Value::Instance(instance) => instance
                        .attrs
                        .borrow_mut()
                        .shift_remove(attr)
                        .map(|_| ())
                        .ok_or_else(|| Exception::attribute_error(&object, attr)),
                    other => Err(Exception::attribute_error(other, attr)),
                }
            }
            ExprKind::Subscript { value, index } => {
                let object = self.eval(value, frame)?;
                let index = self.eval_index(index, frame)?;
                self.del_item(&object, &index)
            }
            _ => Err(Exception::new(ExceptionKind::SyntaxError, "cannot delete expression")),
        }
    }

    fn exec_while(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt], frame: &Frame) -> Result<Flow, Exception> {
        while self.eval(test, frame)?.truthy() {
            match self.exec_block(body, frame)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        self.exec_block(orelse, frame)
    }

    fn exec_for(
        &mut self,
        target: &Expr,
        iter: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
        frame: &Frame,
    ) -> Result<Flow, Exception> {
        let iterable = self.eval(iter, frame)?;
        for item in self.iterate(&iterable)? {
            self.assign(target, item, frame)?;
            match self.exec_block(body, frame)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        self.exec_block(orelse, frame)
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[Handler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
        frame: &Frame,
    ) -> Result<Flow, Exception> {
        let outcome = match self.exec_block(body, frame) {
            Ok(Flow::Normal) => self.exec_block(orelse, frame),
            Ok(flow) => Ok(flow),
            Err(exception) => self.handle(exception, handlers, frame),
        };
        if finalbody.is_empty() {
            return outcome;
        }
        match self.exec_block(finalbody, frame)? {
            Flow::Normal => outcome,
            flow => Ok(flow),
        }
    }

    fn handle(&mut self, exception: Exception, handlers: &[Handler], frame: &Frame) -> Result<Flow, Exception> {
        for handler in handlers {
            let matched = match &handler.kind {
                None => true,
                Some(kind) => {
                    let kind = self.eval(kind, frame)?;
                    exception_matches(&exception, &kind)?
                }
            };
            if !matched {
                continue;
            }
            if let Some(name) = &handler.name {
                self.store(name, exception.value.clone(), frame)?;
            }
            self.handling.push(exception);
            let result = self.exec_block(&handler.body, frame);
            self.handling.pop();
            if let Some(name) = &handler.name {
                let _ = self.delete(name, frame);
            }
            return result;
        }
        Err(exception)
    }

    fn exec_raise(&mut self, value: Option<&Expr>, frame: &Frame) -> Result<Exception, Exception> {
        let Some(expr) = value else {
            return Ok(self.handling.last().cloned().unwrap_or_else(|| {
                Exception::new(ExceptionKind::RuntimeError, "No active exception to reraise")
            }));
        };
        let value = self.eval(expr, frame)?;
        match &value {
            Value::ExceptionType(kind) => Ok(Exception::new(*kind, "")),
            Value::Class(class) if class.exception_base().is_some() => {
                let instance = self.instantiate(class, Args::default())?;
                Ok(Exception::from_value(instance))
            }
            Value::Exception(_) => Ok(Exception::from_value(value)),
            Value::Instance(instance) if instance.class.exception_base().is_some() => {
                Ok(Exception::from_value(value))
            }
            _ => Err(Exception::type_error("exceptions must derive from BaseException")),
        }
    }

    fn exec_import(&mut self, aliases: &[Alias], frame: &Frame) -> Result<(), Exception> {
        for alias in aliases {
            let module = import(&alias.name)?;
            let binding = alias
                .asname
                .as_deref()
                .unwrap_or_else(|| alias.name.split('.').next().unwrap_or(&alias.name));
            self.store(binding, module, frame)?;
        }
        Ok(())
    }

    fn exec_import_from(&mut self, module_name: &str, names: &[Alias], frame: &Frame) -> Result<(), Exception> {
        let Value::Module(module) = import(module_name)? else {
            return Ok(());
        };
        for alias in names {
            if alias.name == "*" {
                for (name, value) in &module.attrs {
                    self.store(name, value.clone(), frame)?;
                }
                continue;
            }
            let value = module.attrs.get(&alias.name).cloned().ok_or_else(|| {
                Exception::new(
                    ExceptionKind::ImportError,
                    format!("cannot import name '{}' from '{module_name}'", alias.name),
                )
            })?;
            self.store(alias.asname.as_deref().unwrap_or(&alias.name), value, frame)?;
        }
        Ok(())
    }

    fn decorate(&mut self, value: Value, decorators: &[Expr], frame: &Frame) -> Result<Value, Exception> {
        let decorators = decorators
            .iter()
            .map(|d| self.eval(d, frame))
            .collect::<Result<Vec<_>, _>>()?;
        decorators
            .iter()
            .rev()
            .try_fold(value, |value, decorator| self.call_value(decorator, Args::new(vec![value])))
    }

    fn make_function(&mut self, def: &Rc<FunctionDef>, frame: &Frame) -> Result<Value, Exception> {
        let mut defaults = Vec::with_capacity(def.params.positional.len());
        for param in &def.params.positional {
            defaults.push(param.default.as_ref().map(|e| self.eval(e, frame)).transpose()?);
        }
        let mut kw_defaults = Vec::with_capacity(def.params.kwonly.len());
        for param in &def.params.kwonly {
            kw_defaults.push(param.default.as_ref().map(|e| self.eval(e, frame)).transpose()?);
        }
        Ok(Value::Function(Rc::new(Function {
            def: def.clone(),
            defaults,
            kw_defaults,
            closure: Scope::closure_scope(&frame.scope),
            globals: frame.globals.clone(),
        })))
    }

    fn make_class(&mut self, def: &ClassDef, frame: &Frame) -> Result<Value, Exception> {
        let mut bases = Vec::with_capacity(def.bases.len());
        for base in &def.bases {
            let base = self.eval(base, frame)?;
            if !matches!(base, Value::Class(_) | Value::ExceptionType(_)) {
                return Err(Exception::type_error(format!(
                    "cannot inherit from '{}'",
                    base.type_name()
                )));
            }
            bases.push(base);
        }

        let scope = Rc::new(Scope::new(frame.scope.clone(), true));
        let body_frame = Frame {
            globals: frame.globals.clone(),
            scope: Some(scope.clone()),
        };
        self.exec_block(&def.body, &body_frame)?;

        let mut attrs: Vec<(String, Value)> = scope.vars.borrow_mut().drain().collect();
        attrs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Value::Class(Rc::new(Class {
            name: def.name.clone(),
            bases,
            attrs: RefCell::new(attrs.into_iter().collect()),
        })))
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn load(&self, name: &str, frame: &Frame) -> Result<Value, Exception> {
        if let Some(scope) = &frame.scope
            && !scope.globals.borrow().contains(name)
        {
            let mut current = Some(scope.clone());
            let mut innermost = true;
            while let Some(s) = current {
                // class bodies are invisible to the functions nested in them
                if (innermost || !s.is_class)
                    && let Some(value) = s.vars.borrow().get(name)
                {
                    return Ok(value.clone());
                }
                innermost = false;
                current = s.parent.clone();
            }
        }
        if let Some(value) = frame.globals.borrow().get(name) {
            return Ok(value.clone());
        }
        builtins::lookup(name).ok_or_else(|| {
            Exception::new(ExceptionKind::NameError, format!("name '{name}' is not defined"))
        })
    }

    fn store(&mut self, name: &str, value: Value, frame: &Frame) -> Result<(), Exception> {
        let Some(scope) = &frame.scope else {
            frame.globals.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        };
        if scope.globals.borrow().contains(name) {
            frame.globals.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        if scope.nonlocals.borrow().contains(name) {
            let mut current = scope.parent.clone();
            while let Some(s) = current {
                if !s.is_class && s.vars.borrow().contains_key(name) {
                    s.vars.borrow_mut().insert(name.to_string(), value);
                    return Ok(());
                }
                current = s.parent.clone();
            }
            return Err(Exception::new(
                ExceptionKind::SyntaxError,
                format!("no binding for nonlocal '{name}' found"),
            ));
        }
        scope.vars.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, name: &str, frame: &Frame) -> Result<(), Exception> {
        let removed = match &frame.scope {
            Some(scope) if !scope.globals.borrow().contains(name) => {
                scope.vars.borrow_mut().remove(name).is_some()
            }
            _ => frame.globals.borrow_mut().shift_remove(name).is_some(),
        };
        if removed {
            Ok(())
        } else {
            Err(Exception::new(
                ExceptionKind::NameError,
                format!("name '{name}' is not defined"),
            ))
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, frame: &Frame) -> Result<(), Exception> {
        match &target.kind {
            ExprKind::Name(name) => self.store(name, value, frame),
            ExprKind::Tuple(targets) | ExprKind::List(targets) => self.unpack(targets, value, frame),
            ExprKind::Attribute { value: object, attr } => {
                let object = self.eval(object, frame)?;
                self.set_attr(&object, attr, value)
            }
            ExprKind::Subscript { value: object, index } => {
                let object = self.eval(object, frame)?;
                let index = self.eval_index(index, frame)?;
                self.set_item(&object, index, value)
            }
            _ => Err(Exception::new(ExceptionKind::SyntaxError, "cannot assign to expression")),
        }
    }

    fn unpack(&mut self, targets: &[Expr], value: Value, frame: &Frame) -> Result<(), Exception> {
        let mut items = value.to_vec().map_err(|_| {
            Exception::type_error(format!(
                "cannot unpack non-iterable {} object",
                value.type_name()
            ))
        })?;
        let star = targets.iter().position(|t| matches!(t.kind, ExprKind::Starred(_)));

        let Some(star) = star else {
            if items.len() != targets.len() {
                let message = if items.len() > targets.len() {
                    format!("too many values to unpack (expected {})", targets.len())
                } else {
                    format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )
                };
                return Err(Exception::value_error(message));
            }
            for (target, item) in targets.iter().zip(items) {
                self.assign(target, item, frame)?;
            }
            return Ok(());
        };

        let fixed = targets.len() - 1;
        if items.len() < fixed {
            return Err(Exception::value_error(format!(
                "not enough values to unpack (expected at least {fixed}, got {})",
                items.len()
            )));
        }
        let after = targets.len() - star - 1;
        let tail = items.split_off(items.len() - after);
        let middle = items.split_off(star);
        for (target, item) in targets[..star].iter().zip(items) {
            self.assign(target, item, frame)?;
        }
        if let ExprKind::Starred(inner) = &targets[star].kind {
            self.assign(inner, Value::list(middle), frame)?;
        }
        for (target, item) in targets[star + 1..].iter().zip(tail) {
            self.assign(target, item, frame)?;
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub(crate) fn eval(&mut self, expr: &Expr, frame: &Frame) -> Result<Value, Exception> {
        self.check_stack()?;
        match &expr.kind {
            ExprKind::Name(name) => self.load(name, frame),
            ExprKind::Constant(constant) => Ok(constant_value(constant)),
            ExprKind::FString(parts) => self.eval_fstring(parts, frame),
            ExprKind::List(items) => Ok(Value::list(self.eval_items(items, frame)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_items(items, frame)?)),
            ExprKind::Set(items) => {
                let items = self.eval_items(items, frame)?;
                Ok(Value::set(
                    items.into_iter().map(HashKey::new).collect::<Result<_, _>>()?,
                ))
            }
            ExprKind::Dict(pairs) => {
                let mut entries = IndexMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = HashKey::new(self.eval(key, frame)?)?;
                    let value = self.eval(value, frame)?;
                    entries.insert(key, value);
                }
                Ok(Value::dict(entries))
            }
            ExprKind::Starred(_) => Err(Exception::new(
                ExceptionKind::SyntaxError,
                "can't use starred expression here",
            )),
            ExprKind::BinOp { left, op, right } => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                self.binary_op(*op, left, right)
            }
            ExprKind::UnaryOp { op, operand } => {
                let operand = self.eval(operand, frame)?;
                self.unary_op(*op, operand)
            }
            ExprKind::BoolOp { op, values } => self.eval_bool_op(*op, values, frame),
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut left = self.eval(left, frame)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    let right = self.eval(comparator, frame)?;
                    if !self.compare_op(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfExp { test, body, orelse } => {
                if self.eval(test, frame)?.truthy() {
                    self.eval(body, frame)
                } else {
                    self.eval(orelse, frame)
                }
            }
            ExprKind::Lambda(def) => self.make_function(def, frame),
            ExprKind::Call { func, args } => {
                let callee = self.eval(func, frame)?;
                let args = self.eval_args(args, frame)?;
                self.call_value(&callee, args)
            }
            ExprKind::Attribute { value, attr } => {
                let value = self.eval(value, frame)?;
                self.get_attr(&value, attr)
            }
            ExprKind::Subscript { value, index } => {
                let value = self.eval(value, frame)?;
                let index = self.eval_index(index, frame)?;
                self.get_item(&value, &index)
            }
            ExprKind::Slice { .. } => Err(Exception::new(
                ExceptionKind::SyntaxError,
                "slice outside of a subscript",
            )),
            ExprKind::Comprehension {
                kind,
                element,
                value,
                generators,
            } => self.eval_comprehension(*kind, element, value.as_deref(), generators, frame),
        }
    }

    /// Evaluate a subscript index, building a slice value for `a[i:j:k]`.
    fn eval_index(&mut self, index: &Expr, frame: &Frame) -> Result<Value, Exception> {
        let ExprKind::Slice { lower, upper, step } = &index.kind else {
            return self.eval(index, frame);
        };
        let mut bound = |e: &Option<Box<Expr>>| -> Result<Value, Exception> {
            match e {
                Some(e) => self.eval(e, frame),
                None => Ok(Value::None),
            }
        };
        let lower = bound(lower)?;
        let upper = bound(upper)?;
        let step = bound(step)?;
        Ok(Value::Slice(Rc::new(Slice { lower, upper, step })))
    }

    fn eval_items(&mut self, items: &[Expr], frame: &Frame) -> Result<Vec<Value>, Exception> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let ExprKind::Starred(inner) = &item.kind {
                let value = self.eval(inner, frame)?;
                out.extend(self.iterate(&value)?);
            } else {
                out.push(self.eval(item, frame)?);
            }
        }
        Ok(out)
    }

    fn eval_args(&mut self, args: &[Arg], frame: &Frame) -> Result<Args, Exception> {
        let mut out = Args::default();
        for arg in args {
            match arg {
                Arg::Positional(expr) => out.positional.push(self.eval(expr, frame)?),
                Arg::Starred(expr) => {
                    let value = self.eval(expr, frame)?;
                    out.positional.extend(self.iterate(&value)?);
                }
                Arg::Keyword(name, expr) => {
                    let value = self.eval(expr, frame)?;
                    out.keywords.push((name.clone(), value));
                }
                Arg::DoubleStarred(expr) => {
                    let value = self.eval(expr, frame)?;
                    let Value::Dict(entries) = &value else {
                        return Err(Exception::type_error(format!(
                            "argument after ** must be a mapping, not {}",
                            value.type_name()
                        )));
                    };
                    for (key, value) in entries.borrow().iter() {
                        let Value::Str(name) = key.value() else {
                            return Err(Exception::type_error("keywords must be strings"));
                        };
                        out.keywords.push((name.to_string(), value.clone()));
                    }
                }
            }
        }
        Ok(out)
    }

    fn eval_bool_op(&mut self, op: BoolOp, values: &[Expr], frame: &Frame) -> Result<Value, Exception> {
        let mut result = Value::None;
        for expr in values {
            result = self.eval(expr, frame)?;
            let truthy = result.truthy();
            match op {
                BoolOp::And if !truthy => return Ok(result),
                BoolOp::Or if truthy => return Ok(result),
                _ => {}
            }
        }
        Ok(result)
    }

    fn eval_fstring(&mut self, parts: &[FStringPart], frame: &Frame) -> Result<Value, Exception> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Field {
                    expr,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(expr, frame)?;
                    let text = match conversion {
                        Some('r' | 'a') => self.repr(&value)?,
                        _ => self.to_str(&value)?,
                    };
                    if spec.is_empty() {
                        out.push_str(&text);
                    } else {
                        let subject = if conversion.is_some() { Value::str(&text) } else { value };
                        out.push_str(&format::format_value(&subject, &text, spec)?);
                    }
                }
            }
        }
        Ok(Value::str(out))
    }

    fn eval_comprehension(
        &mut self,
        kind: ComprehensionKind,
        element: &Expr,
        value: Option<&Expr>,
        generators: &[Generator],
        frame: &Frame,
    ) -> Result<Value, Exception> {
        let inner = Frame {
            globals: frame.globals.clone(),
            scope: Some(Rc::new(Scope::new(frame.scope.clone(), false))),
        };
        let mut items = Vec::new();
        self.comprehend(generators, element, value, &inner, &mut items)?;

        Ok(match kind {
            ComprehensionKind::List => Value::list(items),
            ComprehensionKind::Generator => Value::iterator(items),
            ComprehensionKind::Set => Value::set(items.into_iter().map(HashKey::new).collect::<Result<_, _>>()?),
            ComprehensionKind::Dict => {
                let mut entries = IndexMap::new();
                for pair in items {
                    if let Value::Tuple(pair) = pair
                        && let [key, value] = pair.as_slice()
                    {
                        entries.insert(HashKey::new(key.clone())?, value.clone());
                    }
                }
                Value::dict(entries)
            }
        })
    }

    fn comprehend(
        &mut self,
        generators: &[Generator],
        element: &Expr,
        value: Option<&Expr>,
        frame: &Frame,
        out: &mut Vec<Value>,
    ) -> Result<(), Exception> {
        let Some((generator, rest)) = generators.split_first() else {
            let item = self.eval(element, frame)?;
            out.push(match value {
                Some(value) => Value::tuple(vec![item, self.eval(value, frame)?]),
                None => item,
            });
            return Ok(());
        };
        let iterable = self.eval(&generator.iter, frame)?;
        'items: for item in self.iterate(&iterable)? {
            self.assign(&generator.target, item, frame)?;
            for condition in &generator.conditions {
                if !self.eval(condition, frame)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehend(rest, element, value, frame, out)?;
        }
        Ok(())
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call any callable value.
    pub fn call_value(&mut self, callee: &Value, mut args: Args) -> Result<Value, Exception> {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            Value::BoundMethod(method) => {
                args.positional.insert(0, method.receiver.clone());
                self.call_value(&method.function, args)
            }
            Value::Builtin(builtin) => (builtin.func)(self, args),
            Value::NativeMethod(method) => methods::call_method(self, &method.receiver, &method.name, args),
            Value::Class(class) => self.instantiate(class, args),
            Value::ExceptionType(kind) => Ok(Value::Exception(Rc::new(ExceptionValue {
                kind: *kind,
                args: args.positional,
            }))),
            Value::Instance(instance) => match instance.class.lookup("__call__") {
                Some(method) => {
                    args.positional.insert(0, callee.clone());
                    self.call_value(&method, args)
                }
                None => Err(not_callable(callee)),
            },
            other => Err(not_callable(other)),
        }
    }

    fn call_function(&mut self, function: &Rc<Function>, args: Args) -> Result<Value, Exception> {
        if self.depth >= self.config.max_depth {
            return Err(recursion_error());
        }
        self.check_stack()?;
        let scope = bind_arguments(function, args)?;
        declare(&function.def.body, &scope);
        let frame = Frame {
            globals: function.globals.clone(),
            scope: Some(Rc::new(scope)),
        };

        self.depth += 1;
        let result = self.exec_block(&function.def.body, &frame);
        self.depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    pub(crate) fn instantiate(&mut self, class: &Rc<Class>, mut args: Args) -> Result<Value, Exception> {
        let instance = Rc::new(Instance {
            class: class.clone(),
            attrs: RefCell::new(IndexMap::new()),
        });
        if class.exception_base().is_some() {
            instance
                .attrs
                .borrow_mut()
                .insert("args".into(), Value::tuple(args.positional.clone()));
        }
        let value = Value::Instance(instance);

        match class.lookup("__init__") {
            Some(init) => {
                args.positional.insert(0, value.clone());
                let result = self.call_value(&init, args)?;
                if !result.is_none() {
                    return Err(Exception::type_error(format!(
                        "__init__() should return None, not '{}'",
                        result.type_name()
                    )));
                }
            }
            None if class.exception_base().is_none() && (!args.is_empty() || !args.keywords.is_empty()) => {
                return Err(Exception::type_error(format!("{}() takes no arguments", class.name)));
            }
            None => {}
        }
        Ok(value)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn get_attr(&mut self, value: &Value, name: &str) -> Result<Value, Exception> {
        match value {
            Value::Instance(instance) => {
                if name == "__class__" {
                    return Ok(Value::Class(instance.class.clone()));
                }
                if let Some(attr) = instance.attrs.borrow().get(name) {
                    return Ok(attr.clone());
                }
                if let Some(attr) = instance.class.lookup(name) {
                    return Ok(match attr {
                        Value::Function(_) => Value::BoundMethod(Rc::new(BoundMethod {
                            receiver: value.clone(),
                            function: attr,
                        })),
                        other => other,
                    });
                }
                if let Some(fallback) = instance.class.lookup("__getattr__") {
                    return self.call_value(&fallback, Args::new(vec![value.clone(), Value::str(name)]));
                }
                Err(Exception::attribute_error(value, name))
            }
            Value::Class(class) => match name {
                "__name__" => Ok(Value::str(&class.name)),
                _ => class.lookup(name).ok_or_else(|| {
                    Exception::new(
                        ExceptionKind::AttributeError,
                        format!("type object '{}' has no attribute '{name}'", class.name),
                    )
                }),
            },
            Value::Module(module) => module.attrs.get(name).cloned().ok_or_else(|| {
                Exception::new(
                    ExceptionKind::AttributeError,
                    format!("module '{}' has no attribute '{name}'", module.name),
                )
            }),
            Value::Exception(exception) if name == "args" => Ok(Value::tuple(exception.args.clone())),
            Value::Function(function) if name == "__name__" => Ok(Value::str(function.name())),
            Value::Builtin(builtin) if name == "__name__" => Ok(Value::str(builtin.name)),
            Value::ExceptionType(kind) if name == "__name__" => Ok(Value::str(kind.name())),
            other if methods::has_method(other, name) => Ok(Value::NativeMethod(Rc::new(NativeMethod {
                receiver: other.clone(),
                name: name.to_string(),
            }))),
            other => Err(Exception::attribute_error(other, name)),
        }
    }

    pub fn set_attr(&mut self, object: &Value, name: &str, value: Value) -> Result<(), Exception> {
        match object {
            Value::Instance(instance) => {
                instance.attrs.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) => {
                class.attrs.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            other => Err(Exception::attribute_error(other, name)),
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Start iterating, honouring a user `__iter__` that returns an iterable.
    pub fn iterate(&mut self, value: &Value) -> Result<super::value::ValueIter, Exception> {
        if let Value::Instance(instance) = value
            && let Some(method) = instance.class.lookup("__iter__")
        {
            let iterable = self.call_value(&method, Args::new(vec![value.clone()]))?;
            return iterable.iter();
        }
        value.iter()
    }

    /// `repr()`, calling user `__repr__` where defined.
    pub fn repr(&mut self, value: &Value) -> Result<String, Exception> {
        if let Value::Instance(instance) = value
            && let Some(method) = instance.class.lookup("__repr__")
        {
            return match self.call_value(&method, Args::new(vec![value.clone()]))? {
                Value::Str(text) => Ok(text.to_string()),
                other => Err(Exception::type_error(format!(
                    "__repr__ returned non-string (type {})",
                    other.type_name()
                ))),
            };
        }
        self.check_stack()?;
        let container = format::cycle_marker(value);
        if let Some((id, marker)) = container {
            if self.rendering.contains(&id) {
                return Ok(marker.into());
            }
            self.rendering.push(id);
        }
        let text = format::repr_with(value, &mut |item| self.repr(item));
        if container.is_some() {
            self.rendering.pop();
        }
        text
    }

    /// Fail before native recursion outgrows the thread's stack.
    pub(crate) fn check_stack(&self) -> Result<(), Exception> {
        if self.stack.exhausted() {
            tracing::debug!("Stack budget exhausted at call depth {}", self.depth);
            return Err(recursion_error());
        }
        Ok(())
    }

    /// `str()`, calling user `__str__` where defined.
    pub fn to_str(&mut self, value: &Value) -> Result<String, Exception> {
        match value {
            Value::Str(text) => Ok(text.to_string()),
            Value::Instance(instance) => {
                if let Some(method) = instance.class.lookup("__str__") {
                    return match self.call_value(&method, Args::new(vec![value.clone()]))? {
                        Value::Str(text) => Ok(text.to_string()),
                        other => Err(Exception::type_error(format!(
                            "__str__ returned non-string (type {})",
                            other.type_name()
                        ))),
                    };
                }
                if instance.class.exception_base().is_some() {
                    return Ok(Exception::from_value(value.clone()).message());
                }
                self.repr(value)
            }
            Value::Exception(exception) => Ok(exception.message()),
            other => self.repr(other),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn constant_value(constant: &Constant) -> Value {
    match constant {
        Constant::None | Constant::Ellipsis => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Str { value, .. } => Value::str(value),
    }
}

fn recursion_error() -> Exception {
    Exception::new(ExceptionKind::RecursionError, "maximum recursion depth exceeded")
}

fn not_callable(value: &Value) -> Exception {
    Exception::type_error(format!("'{}' object is not callable", value.type_name()))
}

fn import(name: &str) -> Result<Value, Exception> {
    modules::import(name).ok_or_else(|| {
        Exception::new(
            ExceptionKind::ImportError,
            format!("No module named '{name}'"),
        )
    })
}

/// Whether a raised exception is caught by an `except` clause value.
pub(crate) fn exception_matches(exception: &Exception, handler: &Value) -> Result<bool, Exception> {
    match handler {
        Value::ExceptionType(kind) => Ok(exception.kind().is_some_and(|k| k.is_subtype_of(*kind))),
        Value::Class(class) => Ok(match &exception.value {
            Value::Instance(instance) => instance.class.is_subclass_of(class),
            _ => false,
        }),
        Value::Tuple(kinds) => {
            for kind in kinds.iter() {
                if exception_matches(exception, kind)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

/// Bind call arguments to a function's parameters in a fresh local scope.
fn bind_arguments(function: &Function, args: Args) -> Result<Scope, Exception> {
    let params = &function.def.params;
    let name = function.name();
    let Args { positional, keywords } = args;
    let given = positional.len();

    let mut slots: Vec<Option<Value>> = vec![None; params.positional.len()];
    let mut extra = Vec::new();
    for (i, value) in positional.into_iter().enumerate() {
        match slots.get_mut(i) {
            Some(slot) => *slot = Some(value),
            None => extra.push(value),
        }
    }
    if !extra.is_empty() && params.vararg.is_none() {
        let expected = params.positional.len();
        return Err(Exception::type_error(format!(
            "{name}() takes {expected} positional argument{} but {given} {} given",
            if expected == 1 { "" } else { "s" },
            if given == 1 { "was" } else { "were" },
        )));
    }

    let mut kwonly: Vec<Option<Value>> = vec![None; params.kwonly.len()];
    let mut kwargs = IndexMap::new();
    for (key, value) in keywords {
        if let Some(i) = params.positional.iter().position(|p| p.name == key) {
            if slots[i].is_some() {
                return Err(Exception::type_error(format!(
                    "{name}() got multiple values for argument '{key}'"
                )));
            }
            slots[i] = Some(value);
        } else if let Some(i) = params.kwonly.iter().position(|p| p.name == key) {
            kwonly[i] = Some(value);
        } else if params.kwarg.is_some() {
            kwargs.insert(HashKey::new(Value::str(&key))?, value);
        } else {
            return Err(Exception::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
    }

    let mut vars = FxHashMap::default();
    for (i, param) in params.positional.iter().enumerate() {
        let value = slots[i]
            .take()
            .or_else(|| function.defaults.get(i).cloned().flatten())
            .ok_or_else(|| {
                Exception::type_error(format!(
                    "{name}() missing 1 required positional argument: '{}'",
                    param.name
                ))
            })?;
        vars.insert(param.name.clone(), value);
    }
    for (i, param) in params.kwonly.iter().enumerate() {
        let value = kwonly[i]
            .take()
            .or_else(|| function.kw_defaults.get(i).cloned().flatten())
            .ok_or_else(|| {
                Exception::type_error(format!(
                    "{name}() missing 1 required keyword-only argument: '{}'",
                    param.name
                ))
            })?;
        vars.insert(param.name.clone(), value);
    }
    if let Some(vararg) = &params.vararg {
        vars.insert(vararg.clone(), Value::tuple(extra));
    }
    if let Some(kwarg) = &params.kwarg {
        vars.insert(kwarg.clone(), Value::dict(kwargs));
    }

    Ok(Scope {
        vars: RefCell::new(vars),
        parent: function.closure.clone(),
        ..Scope::default()
    })
}

/// Record `global` and `nonlocal` declarations of a function body.
fn declare(body: &[Stmt], scope: &Scope) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Global(names) => scope.globals.borrow_mut().extend(names.iter().cloned()),
            StmtKind::Nonlocal(names) => scope.nonlocals.borrow_mut().extend(names.iter().cloned()),
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => {
                declare(body, scope);
                declare(orelse, scope);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                declare(body, scope);
                for handler in handlers {
                    declare(&handler.body, scope);
                }
                declare(orelse, scope);
                declare(finalbody, scope);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::value::new_namespace;
    use crate::syntax::parse;

    fn run(source: &str) -> (Result<Option<Value>, Exception>, String, Namespace) {
        let globals = new_namespace();
        let mut interpreter = Interpreter::default();
        let module = parse(source).unwrap();
        let result = interpreter.run_suite(&module.body, &globals);
        (result, interpreter.take_stdout(), globals)
    }

    fn eval(source: &str) -> String {
        let (result, _, _) = run(source);
        format::repr(&result.unwrap().unwrap())
    }

    fn error(source: &str) -> Exception {
        run(source).0.unwrap_err()
    }

    #[test]
    fn test_assignment_and_print() {
        let (result, stdout, globals) = run("x = 1\ny = x + 1\nprint(y)\n");
        assert!(result.unwrap().unwrap().is_none());
        assert_eq!(stdout, "2\n");
        assert_eq!(globals.borrow().get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_trailing_expression_value() {
        assert_eq!(eval("a = [1, 2]\na + [3]"), "[1, 2, 3]");
        let (result, _, _) = run("x = 5\n");
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_functions_closures_and_defaults() {
        let source = "\
def make_adder(n, scale=1):
    def add(x):
        return (x + n) * scale
    return add

add2 = make_adder(2)
add2(3), make_adder(1, scale=10)(1)
";
        assert_eq!(eval(source), "(5, 20)");
    }

    #[test]
    fn test_varargs_and_kwargs() {
        let source = "\
def f(a, *rest, sep='-', **extra):
    return (a, rest, sep, extra)

f(1, 2, 3, sep='+', flag=True)
";
        assert_eq!(eval(source), "(1, (2, 3), '+', {'flag': True})");
    }

    #[test]
    fn test_global_and_nonlocal() {
        let source = "\
counter = 0
def bump():
    global counter
    counter += 1

def outer():
    total = 0
    def inner():
        nonlocal total
        total += 5
    inner()
    inner()
    return total

bump()
bump()
(counter, outer())
";
        assert_eq!(eval(source), "(2, 10)");
    }

    #[test]
    fn test_classes_and_inheritance() {
        let source = "\
class Animal:
    sound = '...'
    def __init__(self, name):
        self.name = name
    def speak(self):
        return f'{self.name} says {self.sound}'

class Dog(Animal):
    sound = 'woof'

Dog('rex').speak()
";
        assert_eq!(eval(source), "'rex says woof'");
    }

    #[test]
    fn test_user_repr_and_str() {
        let source = "\
class P:
    def __init__(self, x):
        self.x = x
    def __repr__(self):
        return f'P({self.x})'

print(P(1))
[P(2)]
";
        let (result, stdout, _) = run(source);
        assert_eq!(stdout, "P(1)\n");
        assert_eq!(format::repr(&result.unwrap().unwrap()), "[<P object>]");
        let mut interpreter = Interpreter::default();
        let globals = new_namespace();
        let module = parse(source).unwrap();
        let value = interpreter.run_suite(&module.body, &globals).unwrap().unwrap();
        assert_eq!(interpreter.repr(&value).unwrap(), "[P(2)]");
    }

    #[test]
    fn test_loops_with_break_continue_else() {
        let source = "\
found = None
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 5:
        found = i
        break
else:
    found = -1
n = 0
while n < 3:
    n += 1
else:
    n = n * 10
(found, n)
";
        assert_eq!(eval(source), "(7, 30)");
    }

    #[test]
    fn test_comprehensions_do_not_leak() {
        let (result, _, globals) = run("squares = [i * i for i in range(4) if i]\n{k: v for k, v in zip('ab', squares)}");
        assert_eq!(format::repr(&result.unwrap().unwrap()), "{'a': 1, 'b': 4}");
        assert!(!globals.borrow().contains_key("i"));
        assert!(!globals.borrow().contains_key("k"));
    }

    #[test]
    fn test_unpacking() {
        assert_eq!(eval("a, *b, c = [1, 2, 3, 4]\n(a, b, c)"), "(1, [2, 3], 4)");
        let err = error("a, b = [1, 2, 3]\n");
        assert_eq!(err.to_string(), "ValueError: too many values to unpack (expected 2)");
    }

    #[test]
    fn test_try_except_finally() {
        let source = "\
log = []
try:
    1 / 0
except ZeroDivisionError as e:
    log.append(str(e))
else:
    log.append('else')
finally:
    log.append('finally')
try:
    {}['k']
except LookupError:
    log.append('lookup')
log
";
        assert_eq!(eval(source), "['division by zero', 'finally', 'lookup']");
        let (_, _, globals) = run(source);
        assert!(!globals.borrow().contains_key("e"));
    }

    #[test]
    fn test_user_exception_classes() {
        let source = "\
class AppError(ValueError):
    pass
try:
    raise AppError('bad input')
except ValueError as e:
    caught = (type(e).__name__, str(e))
caught
";
        assert_eq!(eval(source), "('AppError', 'bad input')");
        let err = error("class E(Exception):\n    pass\nraise E('boom')\n");
        assert_eq!(err.to_string(), "E: boom");
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn test_reraise() {
        let err = error("try:\n    int('x')\nexcept ValueError:\n    raise\n");
        assert_eq!(err.kind_name(), "ValueError");
    }

    #[test]
    fn test_error_lines_are_cell_relative() {
        let err = error("x = 1\n\ndef f():\n    return undefined_name\n\ny = f()\n");
        assert_eq!(err.to_string(), "NameError: name 'undefined_name' is not defined");
        assert_eq!(err.line, Some(6));

        let err = error("if True:\n    a = 1\n    b = a + 'x'\n");
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn test_recursion_limit() {
        let globals = new_namespace();
        let mut interpreter = Interpreter::new(InterpreterConfig {
            max_depth: 30,
            ..InterpreterConfig::default()
        });
        let module = parse("def f(n):\n    return f(n + 1)\nf(0)\n").unwrap();
        let err = interpreter.run_suite(&module.body, &globals).unwrap_err();
        assert_eq!(err.kind_name(), "RecursionError");

        let module = parse("def fact(n):\n    return 1 if n <= 1 else n * fact(n - 1)\nfact(10)\n").unwrap();
        let value = interpreter.run_suite(&module.body, &globals).unwrap().unwrap();
        assert_eq!(value, Value::Int(3628800));
    }

    #[test]
    fn test_unbounded_recursion_with_default_limits() {
        let err = error("def f(n):\n    return f(n + 1)\nf(0)\n");
        assert_eq!(err.to_string(), "RecursionError: maximum recursion depth exceeded");
    }

    #[test]
    fn test_deep_recursion_on_small_thread() {
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let err = error("def f(n):\n    return [f(n + 1)]\nf(0)\n");
                err.kind_name().to_string()
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), "RecursionError");
    }

    #[test]
    fn test_self_containing_list_repr() {
        assert_eq!(eval("a = [1]\na.append(a)\na"), "[1, [...]]");
        assert_eq!(eval("d = {}\nd['self'] = d\nd"), "{'self': {...}}");
        assert_eq!(eval("a = []\nb = [a]\na.append(b)\nstr(a)"), "'[[[...]]]'");
    }

    #[test]
    fn test_argument_errors() {
        let err = error("def f(a, b):\n    pass\nf(1)\n");
        assert_eq!(err.to_string(), "TypeError: f() missing 1 required positional argument: 'b'");
        let err = error("def f(a):\n    pass\nf(1, 2)\n");
        assert_eq!(err.to_string(), "TypeError: f() takes 1 positional argument but 2 were given");
        let err = error("def f(a):\n    pass\nf(1, a=2)\n");
        assert_eq!(err.to_string(), "TypeError: f() got multiple values for argument 'a'");
    }

    #[test]
    fn test_decorators() {
        let source = "\
def twice(f):
    return lambda x: f(f(x))

@twice
def inc(x):
    return x + 1

inc(0)
";
        assert_eq!(eval(source), "2");
    }

    #[test]
    fn test_imports() {
        assert_eq!(eval("import math\nmath.floor(2.7)"), "2");
        assert_eq!(eval("from math import sqrt as root\nroot(16)"), "4.0");
        let err = error("import numpy\n");
        assert_eq!(err.to_string(), "ImportError: No module named 'numpy'");
        let err = error("from math import nothing\n");
        assert_eq!(err.kind_name(), "ImportError");
    }

    #[test]
    fn test_assert() {
        let err = error("assert 1 == 2, 'mismatch'\n");
        assert_eq!(err.to_string(), "AssertionError: mismatch");
    }

    #[test]
    fn test_return_outside_function() {
        let err = error("return 1\n");
        assert_eq!(err.kind_name(), "SyntaxError");
    }
}
