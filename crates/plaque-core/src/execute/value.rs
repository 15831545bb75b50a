//! Runtime values of the interpreter.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};

use super::format::cycle_marker;
use super::interpreter::Interpreter;
use crate::syntax::ast::FunctionDef;

/// A shared, insertion-ordered name to value mapping.
pub type Namespace = Rc<RefCell<IndexMap<String, Value>>>;

pub fn new_namespace() -> Namespace {
    Rc::new(RefCell::new(IndexMap::new()))
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<IndexMap<HashKey, Value>>>),
    Set(Rc<RefCell<IndexSet<HashKey>>>),
    Range(Range),
    Slice(Rc<Slice>),
    Iterator(Rc<RefCell<IterState>>),
    Function(Rc<Function>),
    Builtin(Builtin),
    BoundMethod(Rc<BoundMethod>),
    NativeMethod(Rc<NativeMethod>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Module(Rc<Module>),
    ExceptionType(ExceptionKind),
    Exception(Rc<ExceptionValue>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(entries: IndexMap<HashKey, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn set(items: IndexSet<HashKey>) -> Self {
        Value::Set(Rc::new(RefCell::new(items)))
    }

    pub fn iterator(items: Vec<Value>) -> Self {
        Value::Iterator(Rc::new(RefCell::new(IterState::Items(items.into_iter()))))
    }

    /// Name of the value's type as shown in error messages and `type()`.
    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "str".into(),
            Value::List(_) => "list".into(),
            Value::Tuple(_) => "tuple".into(),
            Value::Dict(_) => "dict".into(),
            Value::Set(_) => "set".into(),
            Value::Range(_) => "range".into(),
            Value::Slice(_) => "slice".into(),
            Value::Iterator(_) => "iterator".into(),
            Value::Function(_) => "function".into(),
            Value::Builtin(_) => "builtin_function_or_method".into(),
            Value::BoundMethod(_) | Value::NativeMethod(_) => "method".into(),
            Value::Class(_) | Value::ExceptionType(_) => "type".into(),
            Value::Instance(instance) => instance.class.name.clone(),
            Value::Module(_) => "module".into(),
            Value::Exception(exc) => exc.kind.name().into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Set(items) => !items.borrow().is_empty(),
            Value::Range(range) => range.len() > 0,
            _ => true,
        }
    }

    /// Integer view of ints and bools.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Float view of any number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Identity comparison (`is`).
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::format::repr(self))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

/// Containers nested deeper than this make comparisons raise `RecursionError`.
pub const MAX_COMPARE_DEPTH: usize = 500;

/// Structural equality (`==`). Nesting too deep to compare counts as unequal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    try_values_equal(a, b).unwrap_or(false)
}

/// Structural equality, failing on nesting deeper than [`MAX_COMPARE_DEPTH`].
///
/// Two containers reached again while they are still being compared are
/// taken as equal, so self-containing lists and dicts compare without
/// looping.
pub fn try_values_equal(a: &Value, b: &Value) -> Result<bool, Exception> {
    Comparison::default().equal(a, b)
}

/// Ordering for `<`, `sorted`, `min` and `max`.
pub fn compare_values(a: &Value, b: &Value) -> Result<Ordering, Exception> {
    Comparison::default().order(a, b)
}

/// Container pairs being compared, outermost first.
#[derive(Default)]
struct Comparison {
    active: Vec<(usize, usize)>,
}

enum Entry {
    Scalar,
    Entered,
    Repeated,
}

impl Comparison {
    fn enter(&mut self, a: &Value, b: &Value) -> Result<Entry, Exception> {
        let (Some((x, _)), Some((y, _))) = (cycle_marker(a), cycle_marker(b)) else {
            return Ok(Entry::Scalar);
        };
        if self.active.contains(&(x, y)) {
            return Ok(Entry::Repeated);
        }
        if self.active.len() >= MAX_COMPARE_DEPTH {
            return Err(Exception::recursion_error("maximum recursion depth exceeded in comparison"));
        }
        self.active.push((x, y));
        Ok(Entry::Entered)
    }

    fn equal(&mut self, a: &Value, b: &Value) -> Result<bool, Exception> {
        match self.enter(a, b)? {
            Entry::Scalar => self.equal_entered(a, b),
            Entry::Repeated => Ok(true),
            Entry::Entered => {
                let result = self.equal_entered(a, b);
                self.active.pop();
                result
            }
        }
    }

    fn equal_entered(&mut self, a: &Value, b: &Value) -> Result<bool, Exception> {
        Ok(match (a, b) {
            (Value::None, Value::None) => true,
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::List(x), Value::List(y)) => {
                Rc::ptr_eq(x, y) || self.sequences_equal(&x.borrow(), &y.borrow())?
            }
            (Value::Tuple(x), Value::Tuple(y)) => self.sequences_equal(x, y)?,
            (Value::Dict(x), Value::Dict(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (key, value) in x.iter() {
                    match y.get(key) {
                        Some(other) if self.equal(value, other)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            (Value::Set(x), Value::Set(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                x.len() == y.len() && x.iter().all(|k| y.contains(k))
            }
            (Value::Range(x), Value::Range(y)) => x == y,
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => match (a.as_int(), b.as_int()) {
                    (Some(i), Some(j)) => i == j,
                    _ => x == y,
                },
                _ => a.is(b),
            },
        })
    }

    fn sequences_equal(&mut self, a: &[Value], b: &[Value]) -> Result<bool, Exception> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(b) {
            if !self.equal(x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Ordering agrees with [`equal`](Self::equal) on pairs met again.
    fn order(&mut self, a: &Value, b: &Value) -> Result<Ordering, Exception> {
        match self.enter(a, b)? {
            Entry::Scalar => self.order_entered(a, b),
            Entry::Repeated => Ok(Ordering::Equal),
            Entry::Entered => {
                let result = self.order_entered(a, b);
                self.active.pop();
                result
            }
        }
    }

    fn order_entered(&mut self, a: &Value, b: &Value) -> Result<Ordering, Exception> {
        match (a, b) {
            (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
            (Value::List(x), Value::List(y)) => self.order_sequences(&x.borrow(), &y.borrow()),
            (Value::Tuple(x), Value::Tuple(y)) => self.order_sequences(x, y),
            _ => match (a.as_int(), b.as_int()) {
                (Some(i), Some(j)) => Ok(i.cmp(&j)),
                _ => match (a.as_float(), b.as_float()) {
                    (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
                    _ => Err(Exception::type_error(format!(
                        "'<' not supported between instances of '{}' and '{}'",
                        a.type_name(),
                        b.type_name()
                    ))),
                },
            },
        }
    }

    fn order_sequences(&mut self, a: &[Value], b: &[Value]) -> Result<Ordering, Exception> {
        for (x, y) in a.iter().zip(b) {
            if !self.equal(x, y)? {
                return self.order(x, y);
            }
        }
        Ok(a.len().cmp(&b.len()))
    }
}

// =============================================================================
// Hashable keys
// =============================================================================

/// A value usable as a dict key or set element.
#[derive(Clone, Debug)]
pub struct HashKey(Value);

impl HashKey {
    pub fn new(value: Value) -> Result<Self, Exception> {
        match hashable_depth(&value) {
            Some(depth) if depth > MAX_COMPARE_DEPTH => Err(Exception::recursion_error(
                "maximum recursion depth exceeded while hashing",
            )),
            Some(_) => Ok(Self(value)),
            None => Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                value.type_name()
            ))),
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Tuple nesting of a hashable value, `None` when it cannot be hashed.
///
/// Only tuples nest, and a tuple can only reach itself through a list or
/// dict, which are unhashable. Hashing therefore never meets a cycle.
fn hashable_depth(value: &Value) -> Option<usize> {
    let mut depth = 0;
    let mut level = vec![value];
    while !level.is_empty() {
        depth += 1;
        if depth > MAX_COMPARE_DEPTH + 1 {
            return Some(depth);
        }
        let mut next = Vec::new();
        for value in level {
            match value {
                Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Slice(_) | Value::Iterator(_) => {
                    return None;
                }
                Value::Tuple(items) => next.extend(items.iter()),
                _ => {}
            }
        }
        level = next;
    }
    Some(depth)
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        values_equal(&self.0, &other.0)
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::None => 0u8.hash(state),
        // equal numbers hash equally: True == 1 == 1.0
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => {
            let f = value.as_float().unwrap_or(0.0);
            match value.as_int() {
                Some(i) => i.hash(state),
                None if f.fract() == 0.0 && f.abs() < 9.2e18 => (f as i64).hash(state),
                None => f.to_bits().hash(state),
            }
        }
        Value::Str(s) => s.hash(state),
        Value::Tuple(items) => {
            items.len().hash(state);
            for item in items.iter() {
                hash_value(item, state);
            }
        }
        Value::Range(range) => range.hash(state),
        Value::ExceptionType(kind) => kind.hash(state),
        Value::Builtin(builtin) => builtin.name.hash(state),
        Value::Function(f) => (Rc::as_ptr(f) as usize).hash(state),
        Value::Class(c) => (Rc::as_ptr(c) as usize).hash(state),
        Value::Instance(i) => (Rc::as_ptr(i) as usize).hash(state),
        Value::Module(m) => (Rc::as_ptr(m) as usize).hash(state),
        Value::Exception(e) => (Rc::as_ptr(e) as usize).hash(state),
        _ => 1u8.hash(state),
    }
}

// =============================================================================
// Ranges and iteration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            0
        } else {
            let step = self.step.unsigned_abs();
            ((span as u64).div_ceil(step)) as usize
        }
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        (index < self.len()).then(|| self.start + self.step * index as i64)
    }
}

/// Bounds of a slice subscript; absent bounds are `None`.
#[derive(Debug)]
pub struct Slice {
    pub lower: Value,
    pub upper: Value,
    pub step: Value,
}

/// State of an iterator value.
#[derive(Debug)]
pub enum IterState {
    Range { next: i64, stop: i64, step: i64 },
    Items(std::vec::IntoIter<Value>),
}

impl Iterator for IterState {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            IterState::Range { next, stop, step } => {
                let done = if *step > 0 { *next >= *stop } else { *next <= *stop };
                if done {
                    return None;
                }
                let current = *next;
                *next = next.saturating_add(*step);
                Some(Value::Int(current))
            }
            IterState::Items(items) => items.next(),
        }
    }
}

/// An iteration in progress over some value.
pub enum ValueIter {
    Owned(IterState),
    Shared(Rc<RefCell<IterState>>),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Owned(state) => state.next(),
            ValueIter::Shared(state) => state.borrow_mut().next(),
        }
    }
}

impl Value {
    /// Start iterating over an iterable value.
    pub fn iter(&self) -> Result<ValueIter, Exception> {
        let items = |v: Vec<Value>| Ok(ValueIter::Owned(IterState::Items(v.into_iter())));
        match self {
            Value::List(list) => items(list.borrow().clone()),
            Value::Tuple(tuple) => items(tuple.to_vec()),
            Value::Str(s) => items(s.chars().map(|c| Value::str(c.to_string())).collect()),
            Value::Dict(dict) => items(dict.borrow().keys().map(|k| k.value().clone()).collect()),
            Value::Set(set) => items(set.borrow().iter().map(|k| k.value().clone()).collect()),
            Value::Range(range) => Ok(ValueIter::Owned(IterState::Range {
                next: range.start,
                stop: range.stop,
                step: range.step,
            })),
            Value::Iterator(state) => Ok(ValueIter::Shared(state.clone())),
            other => Err(Exception::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Collect an iterable into a vector.
    pub fn to_vec(&self) -> Result<Vec<Value>, Exception> {
        Ok(self.iter()?.collect())
    }
}

// =============================================================================
// Functions, classes and modules
// =============================================================================

/// A variable scope of a function call or class body.
#[derive(Debug, Default)]
pub struct Scope {
    pub vars: RefCell<FxHashMap<String, Value>>,
    pub parent: Option<Rc<Scope>>,
    pub globals: RefCell<FxHashSet<String>>,
    pub nonlocals: RefCell<FxHashSet<String>>,
    pub is_class: bool,
}

impl Scope {
    pub fn new(parent: Option<Rc<Scope>>, is_class: bool) -> Self {
        Self {
            parent,
            is_class,
            ..Self::default()
        }
    }

    /// Innermost enclosing scope that is not a class body; functions
    /// defined in a class body close over this scope.
    pub fn closure_scope(scope: &Option<Rc<Scope>>) -> Option<Rc<Scope>> {
        let mut current = scope.clone();
        while let Some(s) = current.clone() {
            if !s.is_class {
                return Some(s);
            }
            current = s.parent.clone();
        }
        None
    }
}

/// A user-defined function with its evaluated defaults and closure.
#[derive(Debug)]
pub struct Function {
    pub def: Rc<FunctionDef>,
    /// Defaults of positional parameters, aligned with `def.params.positional`.
    pub defaults: Vec<Option<Value>>,
    /// Defaults of keyword-only parameters, aligned with `def.params.kwonly`.
    pub kw_defaults: Vec<Option<Value>>,
    pub closure: Option<Rc<Scope>>,
    pub globals: Namespace,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.def.name
    }
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub function: Value,
}

/// A method of a builtin type, dispatched by name on call.
#[derive(Debug)]
pub struct NativeMethod {
    pub receiver: Value,
    pub name: String,
}

/// Positional and keyword arguments of a call.
#[derive(Debug, Default, Clone)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Check the positional argument count and reject unexpected keywords.
    pub fn check(&self, function: &str, min: usize, max: usize, keywords: &[&str]) -> Result<(), Exception> {
        if let Some((name, _)) = self.keywords.iter().find(|(k, _)| !keywords.contains(&k.as_str())) {
            return Err(Exception::type_error(format!(
                "{function}() got an unexpected keyword argument '{name}'"
            )));
        }
        let n = self.positional.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("{min}")
            } else if max == usize::MAX {
                format!("at least {min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(Exception::type_error(format!(
                "{function}() takes {expected} argument{} ({n} given)",
                if max == 1 && min == 1 { "" } else { "s" }
            )));
        }
        Ok(())
    }
}

pub type BuiltinFn = fn(&mut Interpreter, Args) -> Result<Value, Exception>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    /// Base classes: user classes or builtin exception types.
    pub bases: Vec<Value>,
    pub attrs: RefCell<IndexMap<String, Value>>,
}

impl Class {
    /// Look up an attribute on the class or its bases (depth-first, left to right).
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attrs.borrow().get(name) {
            return Some(value.clone());
        }
        self.bases.iter().find_map(|base| match base {
            Value::Class(class) => class.lookup(name),
            _ => None,
        })
    }

    /// The builtin exception type this class derives from, if any.
    pub fn exception_base(&self) -> Option<ExceptionKind> {
        self.bases.iter().find_map(|base| match base {
            Value::ExceptionType(kind) => Some(*kind),
            Value::Class(class) => class.exception_base(),
            _ => None,
        })
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<Class>) -> bool {
        Rc::ptr_eq(self, other)
            || self.bases.iter().any(|base| match base {
                Value::Class(class) => class.is_subclass_of(other),
                _ => false,
            })
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub attrs: RefCell<IndexMap<String, Value>>,
}

#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub attrs: IndexMap<String, Value>,
}

// =============================================================================
// Exceptions
// =============================================================================

/// Builtin exception types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Exception,
    ArithmeticError,
    LookupError,
    ValueError,
    TypeError,
    KeyError,
    IndexError,
    NameError,
    ZeroDivisionError,
    OverflowError,
    AttributeError,
    RuntimeError,
    NotImplementedError,
    RecursionError,
    MemoryError,
    AssertionError,
    ImportError,
    StopIteration,
    SyntaxError,
}

impl ExceptionKind {
    pub const ALL: &'static [ExceptionKind] = &[
        ExceptionKind::Exception,
        ExceptionKind::ArithmeticError,
        ExceptionKind::LookupError,
        ExceptionKind::ValueError,
        ExceptionKind::TypeError,
        ExceptionKind::KeyError,
        ExceptionKind::IndexError,
        ExceptionKind::NameError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::OverflowError,
        ExceptionKind::AttributeError,
        ExceptionKind::RuntimeError,
        ExceptionKind::NotImplementedError,
        ExceptionKind::RecursionError,
        ExceptionKind::MemoryError,
        ExceptionKind::AssertionError,
        ExceptionKind::ImportError,
        ExceptionKind::StopIteration,
        ExceptionKind::SyntaxError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::Exception => "Exception",
            ExceptionKind::ArithmeticError => "ArithmeticError",
            ExceptionKind::LookupError => "LookupError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::NotImplementedError => "NotImplementedError",
            ExceptionKind::RecursionError => "RecursionError",
            ExceptionKind::MemoryError => "MemoryError",
            ExceptionKind::AssertionError => "AssertionError",
            ExceptionKind::ImportError => "ImportError",
            ExceptionKind::StopIteration => "StopIteration",
            ExceptionKind::SyntaxError => "SyntaxError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn parent(self) -> Option<Self> {
        match self {
            ExceptionKind::Exception => None,
            ExceptionKind::KeyError | ExceptionKind::IndexError => Some(ExceptionKind::LookupError),
            ExceptionKind::ZeroDivisionError | ExceptionKind::OverflowError => {
                Some(ExceptionKind::ArithmeticError)
            }
            ExceptionKind::NotImplementedError | ExceptionKind::RecursionError => {
                Some(ExceptionKind::RuntimeError)
            }
            _ => Some(ExceptionKind::Exception),
        }
    }

    pub fn is_subtype_of(self, other: ExceptionKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

/// An instance of a builtin exception type.
#[derive(Debug)]
pub struct ExceptionValue {
    pub kind: ExceptionKind,
    pub args: Vec<Value>,
}

impl ExceptionValue {
    pub fn message(&self) -> String {
        exception_message(&self.args)
    }
}

pub(crate) fn exception_message(args: &[Value]) -> String {
    match args {
        [] => String::new(),
        [single] => super::format::display(single),
        many => super::format::repr(&Value::tuple(many.to_vec())),
    }
}

/// A raised exception propagating through the interpreter.
#[derive(Debug, Clone)]
pub struct Exception {
    pub value: Value,
    /// Line (relative to the executing source) where it was raised.
    pub line: Option<usize>,
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let args = if message.is_empty() {
            Vec::new()
        } else {
            vec![Value::str(message)]
        };
        Self::from_value(Value::Exception(Rc::new(ExceptionValue { kind, args })))
    }

    pub fn from_value(value: Value) -> Self {
        Self { value, line: None }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ValueError, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::IndexError, message)
    }

    pub fn attribute_error(value: &Value, attr: &str) -> Self {
        Self::new(
            ExceptionKind::AttributeError,
            format!("'{}' object has no attribute '{attr}'", value.type_name()),
        )
    }

    pub fn key_error(key: &Value) -> Self {
        Self::from_value(Value::Exception(Rc::new(ExceptionValue {
            kind: ExceptionKind::KeyError,
            args: vec![key.clone()],
        })))
    }

    pub fn recursion_error(message: &str) -> Self {
        Self::new(ExceptionKind::RecursionError, message)
    }

    pub fn zero_division(message: &str) -> Self {
        Self::new(ExceptionKind::ZeroDivisionError, message)
    }

    /// Attach a line number unless one is already recorded.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    /// The exception's type name.
    pub fn kind_name(&self) -> String {
        match &self.value {
            Value::Exception(exc) => exc.kind.name().to_string(),
            other => other.type_name(),
        }
    }

    /// Builtin exception type of the raised value, following user subclasses.
    pub fn kind(&self) -> Option<ExceptionKind> {
        match &self.value {
            Value::Exception(exc) => Some(exc.kind),
            Value::Instance(instance) => instance.class.exception_base(),
            _ => None,
        }
    }

    /// Message without the type name.
    pub fn message(&self) -> String {
        match &self.value {
            Value::Exception(exc) => match exc.kind {
                // KeyError shows the repr of the missing key
                ExceptionKind::KeyError if exc.args.len() == 1 => {
                    super::format::repr(&exc.args[0])
                }
                _ => exc.message(),
            },
            Value::Instance(instance) => match instance.attrs.borrow().get("args") {
                Some(Value::Tuple(args)) => exception_message(args),
                _ => String::new(),
            },
            other => super::format::display(other),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            write!(f, "{}", self.kind_name())
        } else {
            write!(f, "{}: {message}", self.kind_name())
        }
    }
}

/// Non-exceptional control flow out of a statement.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_equality_and_hashing() {
        let mut set = IndexSet::new();
        set.insert(HashKey::new(Value::Int(1)).unwrap());
        assert!(set.contains(&HashKey::new(Value::Float(1.0)).unwrap()));
        assert!(set.contains(&HashKey::new(Value::Bool(true)).unwrap()));
        assert!(!set.contains(&HashKey::new(Value::Int(2)).unwrap()));
    }

    #[test]
    fn test_unhashable() {
        let err = HashKey::new(Value::list(vec![])).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn test_range_len() {
        assert_eq!(Range { start: 0, stop: 10, step: 3 }.len(), 4);
        assert_eq!(Range { start: 10, stop: 0, step: -2 }.len(), 5);
        assert_eq!(Range { start: 5, stop: 0, step: 1 }.len(), 0);
    }

    #[test]
    fn test_compare_sequences() {
        let a = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::tuple(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(compare_values(&a, &b).unwrap(), Ordering::Less);
        assert!(compare_values(&Value::Int(1), &Value::str("a")).is_err());
    }

    fn self_containing(head: i64) -> Value {
        let list = Value::list(vec![Value::Int(head)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        list
    }

    #[test]
    fn test_self_containing_lists_compare() {
        let (a, b) = (self_containing(1), self_containing(1));
        assert!(try_values_equal(&a, &b).unwrap());
        assert!(!try_values_equal(&a, &self_containing(2)).unwrap());

        assert_eq!(compare_values(&a, &b).unwrap(), Ordering::Equal);
        assert_eq!(compare_values(&a, &self_containing(2)).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_deeply_nested_values() {
        let mut a = Value::Int(0);
        let mut b = Value::Int(0);
        for _ in 0..(MAX_COMPARE_DEPTH + 5) {
            a = Value::tuple(vec![a]);
            b = Value::tuple(vec![b]);
        }
        let err = try_values_equal(&a, &b).unwrap_err();
        assert_eq!(err.kind(), Some(ExceptionKind::RecursionError));
        assert!(!values_equal(&a, &b));

        let err = HashKey::new(a).unwrap_err();
        assert_eq!(err.kind(), Some(ExceptionKind::RecursionError));
    }

    #[test]
    fn test_exception_hierarchy() {
        assert!(ExceptionKind::KeyError.is_subtype_of(ExceptionKind::LookupError));
        assert!(ExceptionKind::ZeroDivisionError.is_subtype_of(ExceptionKind::Exception));
        assert!(!ExceptionKind::ValueError.is_subtype_of(ExceptionKind::TypeError));
    }

    #[test]
    fn test_key_error_message_uses_repr() {
        let err = Exception::key_error(&Value::str("missing"));
        assert_eq!(err.to_string(), "KeyError: 'missing'");
    }
}
