//! Operators, comparisons and subscripting.

use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};

use super::format;
use super::interpreter::Interpreter;
use super::value::{Args, Exception, ExceptionKind, HashKey, Slice, Value, compare_values, try_values_equal, values_equal};
use crate::syntax::ast::{BinOp, CmpOp, UnaryOp};

fn dunder(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "__add__",
        BinOp::Sub => "__sub__",
        BinOp::Mul => "__mul__",
        BinOp::Div => "__truediv__",
        BinOp::FloorDiv => "__floordiv__",
        BinOp::Mod => "__mod__",
        BinOp::Pow => "__pow__",
        BinOp::MatMul => "__matmul__",
        BinOp::BitAnd => "__and__",
        BinOp::BitOr => "__or__",
        BinOp::BitXor => "__xor__",
        BinOp::LShift => "__lshift__",
        BinOp::RShift => "__rshift__",
    }
}

impl Interpreter {
    pub(crate) fn binary_op(&mut self, op: BinOp, left: Value, right: Value) -> Result<Value, Exception> {
        if let Value::Instance(instance) = &left
            && let Some(method) = instance.class.lookup(dunder(op))
        {
            return self.call_value(&method, Args::new(vec![left.clone(), right]));
        }
        if let Value::Instance(instance) = &right {
            let reflected = dunder(op).replacen("__", "__r", 1);
            if let Some(method) = instance.class.lookup(&reflected) {
                return self.call_value(&method, Args::new(vec![right.clone(), left]));
            }
        }
        if op == BinOp::Mod
            && let Value::Str(template) = &left
        {
            return self.percent_format(template, &right).map(Value::str);
        }
        arithmetic(op, &left, &right)?.ok_or_else(|| unsupported(op, &left, &right))
    }

    /// Augmented assignment: lists, sets and dicts are updated in place.
    pub(crate) fn inplace_op(&mut self, op: BinOp, left: Value, right: Value) -> Result<Value, Exception> {
        match (op, &left, &right) {
            (BinOp::Add, Value::List(list), _) if !matches!(right, Value::Instance(_)) => {
                let items = self.iterate(&right)?.collect::<Vec<_>>();
                list.borrow_mut().extend(items);
                Ok(left)
            }
            (BinOp::BitOr, Value::Set(set), Value::Set(other)) => {
                let items: Vec<HashKey> = other.borrow().iter().cloned().collect();
                set.borrow_mut().extend(items);
                Ok(left)
            }
            (BinOp::BitOr, Value::Dict(dict), Value::Dict(other)) => {
                let entries: Vec<(HashKey, Value)> =
                    other.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                dict.borrow_mut().extend(entries);
                Ok(left)
            }
            _ => self.binary_op(op, left, right),
        }
    }

    pub(crate) fn unary_op(&mut self, op: UnaryOp, operand: Value) -> Result<Value, Exception> {
        if op == UnaryOp::Not {
            return Ok(Value::Bool(!operand.truthy()));
        }
        if let Value::Instance(instance) = &operand {
            let name = match op {
                UnaryOp::Neg => "__neg__",
                UnaryOp::Pos => "__pos__",
                _ => "__invert__",
            };
            if let Some(method) = instance.class.lookup(name) {
                return self.call_value(&method, Args::new(vec![operand.clone()]));
            }
        }
        let result = match (op, &operand) {
            (UnaryOp::Neg, Value::Float(f)) => Some(Value::Float(-f)),
            (UnaryOp::Pos, Value::Float(f)) => Some(Value::Float(*f)),
            (UnaryOp::Neg, _) => operand.as_int().map(|i| i.checked_neg().map(Value::Int).ok_or_else(overflow)).transpose()?,
            (UnaryOp::Pos, _) => operand.as_int().map(Value::Int),
            (UnaryOp::Invert, _) => operand.as_int().map(|i| Value::Int(!i)),
            (UnaryOp::Not, _) => None,
        };
        result.ok_or_else(|| {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                _ => "~",
            };
            Exception::type_error(format!(
                "bad operand type for unary {symbol}: '{}'",
                operand.type_name()
            ))
        })
    }

    pub(crate) fn compare_op(&mut self, op: CmpOp, left: &Value, right: &Value) -> Result<bool, Exception> {
        match op {
            CmpOp::Eq => self.equals(left, right),
            CmpOp::NotEq => Ok(!self.equals(left, right)?),
            CmpOp::Is => Ok(left.is(right)),
            CmpOp::IsNot => Ok(!left.is(right)),
            CmpOp::In => self.contains(right, left),
            CmpOp::NotIn => Ok(!self.contains(right, left)?),
            CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
                if let Value::Instance(instance) = left {
                    let name = match op {
                        CmpOp::Lt => "__lt__",
                        CmpOp::LtE => "__le__",
                        CmpOp::Gt => "__gt__",
                        _ => "__ge__",
                    };
                    if let Some(method) = instance.class.lookup(name) {
                        let result = self.call_value(&method, Args::new(vec![left.clone(), right.clone()]))?;
                        return Ok(result.truthy());
                    }
                }
                let is_nan = |v: &Value| matches!(v, Value::Float(f) if f.is_nan());
                if is_nan(left) || is_nan(right) {
                    return Ok(false);
                }
                let ordering = compare_values(left, right).map_err(|err| {
                    if err.kind() != Some(ExceptionKind::TypeError) {
                        return err;
                    }
                    let symbol = match op {
                        CmpOp::Lt => "<",
                        CmpOp::LtE => "<=",
                        CmpOp::Gt => ">",
                        _ => ">=",
                    };
                    Exception::type_error(format!(
                        "'{symbol}' not supported between instances of '{}' and '{}'",
                        left.type_name(),
                        right.type_name()
                    ))
                })?;
                Ok(match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::LtE => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                })
            }
        }
    }

    /// `==`, honouring a user `__eq__`.
    pub fn equals(&mut self, left: &Value, right: &Value) -> Result<bool, Exception> {
        if let Value::Instance(instance) = left
            && let Some(method) = instance.class.lookup("__eq__")
        {
            let result = self.call_value(&method, Args::new(vec![left.clone(), right.clone()]))?;
            return Ok(result.truthy());
        }
        try_values_equal(left, right)
    }

    /// Membership test `item in container`.
    pub fn contains(&mut self, container: &Value, item: &Value) -> Result<bool, Exception> {
        match container {
            Value::Str(text) => match item {
                Value::Str(needle) => Ok(text.contains(needle.as_ref())),
                other => Err(Exception::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            Value::List(items) => Ok(items.borrow().iter().any(|v| values_equal(v, item))),
            Value::Tuple(items) => Ok(items.iter().any(|v| values_equal(v, item))),
            Value::Dict(entries) => Ok(entries.borrow().contains_key(&HashKey::new(item.clone())?)),
            Value::Set(items) => Ok(items.borrow().contains(&HashKey::new(item.clone())?)),
            Value::Range(range) => Ok(match item {
                Value::Int(i) => {
                    let offset = i - range.start;
                    let inside = if range.step > 0 {
                        *i >= range.start && *i < range.stop
                    } else {
                        *i <= range.start && *i > range.stop
                    };
                    inside && offset % range.step == 0
                }
                _ => false,
            }),
            Value::Iterator(_) => Ok(container.iter()?.any(|v| values_equal(&v, item))),
            Value::Instance(instance) => {
                if let Some(method) = instance.class.lookup("__contains__") {
                    let result = self.call_value(&method, Args::new(vec![container.clone(), item.clone()]))?;
                    return Ok(result.truthy());
                }
                Ok(self.iterate(container)?.any(|v| values_equal(&v, item)))
            }
            other => Err(Exception::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    // =========================================================================
    // Subscripts
    // =========================================================================

    pub fn get_item(&mut self, object: &Value, index: &Value) -> Result<Value, Exception> {
        if let Value::Slice(slice) = index {
            return get_slice(object, slice);
        }
        match object {
            Value::List(items) => {
                let items = items.borrow();
                let i = sequence_index(index, items.len(), "list")?;
                Ok(items[i].clone())
            }
            Value::Tuple(items) => {
                let i = sequence_index(index, items.len(), "tuple")?;
                Ok(items[i].clone())
            }
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                let i = sequence_index(index, chars.len(), "string")?;
                Ok(Value::str(chars[i].to_string()))
            }
            Value::Range(range) => {
                let i = sequence_index(index, range.len(), "range object")?;
                Ok(range.get(i).map(Value::Int).unwrap_or(Value::None))
            }
            Value::Dict(entries) => entries
                .borrow()
                .get(&HashKey::new(index.clone())?)
                .cloned()
                .ok_or_else(|| Exception::key_error(index)),
            Value::Instance(instance) => match instance.class.lookup("__getitem__") {
                Some(method) => self.call_value(&method, Args::new(vec![object.clone(), index.clone()])),
                None => Err(not_subscriptable(object)),
            },
            other => Err(not_subscriptable(other)),
        }
    }

    pub fn set_item(&mut self, object: &Value, index: Value, value: Value) -> Result<(), Exception> {
        match object {
            Value::List(items) => {
                if let Value::Slice(slice) = &index {
                    let replacement = self.iterate(&value)?.collect::<Vec<_>>();
                    return assign_slice(&mut items.borrow_mut(), slice, replacement);
                }
                let mut items = items.borrow_mut();
                let i = sequence_index(&index, items.len(), "list assignment")?;
                items[i] = value;
                Ok(())
            }
            Value::Dict(entries) => {
                entries.borrow_mut().insert(HashKey::new(index)?, value);
                Ok(())
            }
            Value::Instance(instance) => match instance.class.lookup("__setitem__") {
                Some(method) => {
                    self.call_value(&method, Args::new(vec![object.clone(), index, value]))?;
                    Ok(())
                }
                None => Err(no_item_assignment(object)),
            },
            other => Err(no_item_assignment(other)),
        }
    }

    pub fn del_item(&mut self, object: &Value, index: &Value) -> Result<(), Exception> {
        match object {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                if let Value::Slice(slice) = index {
                    let mut positions = slice_positions(items.len(), slice)?;
                    positions.sort_unstable_by(|a, b| b.cmp(a));
                    for position in positions {
                        items.remove(position);
                    }
                    return Ok(());
                }
                let i = sequence_index(index, items.len(), "list assignment")?;
                items.remove(i);
                Ok(())
            }
            Value::Dict(entries) => entries
                .borrow_mut()
                .shift_remove(&HashKey::new(index.clone())?)
                .map(|_| ())
                .ok_or_else(|| Exception::key_error(index)),
            Value::Instance(instance) => match instance.class.lookup("__delitem__") {
                Some(method) => {
                    self.call_value(&method, Args::new(vec![object.clone(), index.clone()]))?;
                    Ok(())
                }
                None => Err(Exception::type_error(format!(
                    "'{}' object doesn't support item deletion",
                    object.type_name()
                ))),
            },
            other => Err(Exception::type_error(format!(
                "'{}' object doesn't support item deletion",
                other.type_name()
            ))),
        }
    }

    // =========================================================================
    // printf-style formatting
    // =========================================================================

    fn percent_format(&mut self, template: &str, args: &Value) -> Result<String, Exception> {
        let args: Vec<Value> = match args {
            Value::Tuple(items) => items.to_vec(),
            other => vec![other.clone()],
        };
        let mut args = args.into_iter();
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let mut flags = String::new();
            while let Some(&f) = chars.peek()
                && matches!(f, '-' | '+' | ' ' | '0' | '#')
            {
                flags.push(f);
                chars.next();
            }
            let mut width = String::new();
            while let Some(&d) = chars.peek()
                && d.is_ascii_digit()
            {
                width.push(d);
                chars.next();
            }
            let mut precision = String::new();
            if chars.peek() == Some(&'.') {
                chars.next();
                precision.push('.');
                while let Some(&d) = chars.peek()
                    && d.is_ascii_digit()
                {
                    precision.push(d);
                    chars.next();
                }
            }
            let Some(kind) = chars.next() else {
                return Err(Exception::value_error("incomplete format"));
            };
            if kind == '%' {
                out.push('%');
                continue;
            }
            let value = args
                .next()
                .ok_or_else(|| Exception::type_error("not enough arguments for format string"))?;

            let zero = flags.contains('0') && !flags.contains('-') && !matches!(kind, 's' | 'r');
            let mut spec = String::new();
            if flags.contains('-') {
                spec.push('<');
            } else if !zero {
                spec.push('>');
            }
            if flags.contains('+') {
                spec.push('+');
            } else if flags.contains(' ') {
                spec.push(' ');
            }
            if flags.contains('#') {
                spec.push('#');
            }
            if zero {
                spec.push('0');
            }
            spec.push_str(&width);

            let text = match kind {
                's' => {
                    let text = self.to_str(&value)?;
                    spec.push_str(&precision);
                    format::format_value(&Value::str(&text), &text, &spec)?
                }
                'r' => {
                    let text = self.repr(&value)?;
                    format::format_value(&Value::str(&text), &text, &spec)?
                }
                'd' | 'i' => {
                    let number = match &value {
                        Value::Float(f) => Value::Int(f.trunc() as i64),
                        other if other.as_int().is_some() => Value::Int(other.as_int().unwrap_or(0)),
                        other => {
                            return Err(Exception::type_error(format!(
                                "%{kind} format: a real number is required, not {}",
                                other.type_name()
                            )));
                        }
                    };
                    spec.push('d');
                    format::format_value(&number, "", &spec)?
                }
                'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o' => {
                    spec.push_str(&precision);
                    spec.push(kind);
                    format::format_value(&value, "", &spec)?
                }
                other => {
                    return Err(Exception::value_error(format!(
                        "unsupported format character '{other}'"
                    )));
                }
            };
            out.push_str(&text);
        }

        if args.next().is_some() {
            return Err(Exception::type_error(
                "not all arguments converted during string formatting",
            ));
        }
        Ok(out)
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

fn overflow() -> Exception {
    Exception::new(ExceptionKind::OverflowError, "integer overflow")
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> Exception {
    if op == BinOp::Add && matches!(left, Value::Str(_)) {
        return Exception::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            right.type_name()
        ));
    }
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

/// Builtin operator semantics; `None` when the operand types do not support `op`.
fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Option<Value>, Exception> {
    let numeric = |v: &Value| matches!(v, Value::Int(_) | Value::Bool(_) | Value::Float(_));
    if let (Some(x), Some(y)) = (left.as_int(), right.as_int()) {
        let both_bool = matches!((left, right), (Value::Bool(_), Value::Bool(_)));
        return int_op(op, x, y, both_bool);
    }
    if numeric(left) && numeric(right) {
        let (x, y) = (left.as_float().unwrap_or(0.0), right.as_float().unwrap_or(0.0));
        return float_op(op, x, y);
    }

    Ok(match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Some(Value::str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Some(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Some(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Mul, sequence, count) | (BinOp::Mul, count, sequence)
            if matches!(sequence, Value::Str(_) | Value::List(_) | Value::Tuple(_))
                && count.as_int().is_some() =>
        {
            let n = usize::try_from(count.as_int().unwrap_or(0)).unwrap_or(0);
            Some(match sequence {
                Value::Str(s) => {
                    repeated_len(s.len(), n).ok_or_else(|| {
                        Exception::new(ExceptionKind::OverflowError, "repeated string is too long")
                    })?;
                    Value::str(s.repeat(n))
                }
                Value::List(items) => Value::list(repeat(&items.borrow(), n)?),
                Value::Tuple(items) => Value::tuple(repeat(items, n)?),
                _ => return Ok(None),
            })
        }
        (BinOp::Sub, Value::Set(a), Value::Set(b)) => {
            let b = b.borrow();
            Some(Value::set(a.borrow().iter().filter(|k| !b.contains(*k)).cloned().collect()))
        }
        (BinOp::BitAnd, Value::Set(a), Value::Set(b)) => {
            let b = b.borrow();
            Some(Value::set(a.borrow().iter().filter(|k| b.contains(*k)).cloned().collect()))
        }
        (BinOp::BitOr, Value::Set(a), Value::Set(b)) => {
            let mut items: IndexSet<HashKey> = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Some(Value::set(items))
        }
        (BinOp::BitXor, Value::Set(a), Value::Set(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            let items = a
                .iter()
                .filter(|k| !b.contains(*k))
                .chain(b.iter().filter(|k| !a.contains(*k)))
                .cloned()
                .collect();
            Some(Value::set(items))
        }
        (BinOp::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut entries: IndexMap<HashKey, Value> = a.borrow().clone();
            entries.extend(b.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(Value::dict(entries))
        }
        _ => None,
    })
}

/// Longest sequence repetition may build.
pub const MAX_REPEAT_LEN: usize = 1 << 24;

/// Length of `n` copies of a `len`-long sequence, if within [`MAX_REPEAT_LEN`].
fn repeated_len(len: usize, n: usize) -> Option<usize> {
    len.checked_mul(n).filter(|&total| total <= MAX_REPEAT_LEN)
}

fn repeat(items: &[Value], n: usize) -> Result<Vec<Value>, Exception> {
    let total = repeated_len(items.len(), n)
        .ok_or_else(|| Exception::new(ExceptionKind::MemoryError, ""))?;
    let mut out = Vec::with_capacity(total);
    if !items.is_empty() {
        for _ in 0..n {
            out.extend(items.iter().cloned());
        }
    }
    Ok(out)
}

fn int_op(op: BinOp, x: i64, y: i64, both_bool: bool) -> Result<Option<Value>, Exception> {
    let int = |v: Option<i64>| v.map(Value::Int).ok_or_else(overflow).map(Some);
    match op {
        BinOp::Add => int(x.checked_add(y)),
        BinOp::Sub => int(x.checked_sub(y)),
        BinOp::Mul => int(x.checked_mul(y)),
        BinOp::Div => {
            if y == 0 {
                return Err(Exception::zero_division("division by zero"));
            }
            Ok(Some(Value::Float(x as f64 / y as f64)))
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            let adjust = x % y != 0 && ((x < 0) != (y < 0));
            Ok(Some(Value::Int(if adjust { q - 1 } else { q })))
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(Exception::zero_division("integer modulo by zero"));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            Ok(Some(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })))
        }
        BinOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(Exception::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Some(Value::Float((x as f64).powf(y as f64))));
            }
            let exponent = u32::try_from(y).map_err(|_| overflow())?;
            int(x.checked_pow(exponent))
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            let result = match op {
                BinOp::BitAnd => x & y,
                BinOp::BitOr => x | y,
                _ => x ^ y,
            };
            Ok(Some(if both_bool { Value::Bool(result != 0) } else { Value::Int(result) }))
        }
        BinOp::LShift => {
            if y < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            if x == 0 {
                return Ok(Some(Value::Int(0)));
            }
            if y >= 63 || (x << y) >> y != x {
                return Err(overflow());
            }
            Ok(Some(Value::Int(x << y)))
        }
        BinOp::RShift => {
            if y < 0 {
                return Err(Exception::value_error("negative shift count"));
            }
            Ok(Some(Value::Int(if y >= 64 { if x < 0 { -1 } else { 0 } } else { x >> y })))
        }
        BinOp::MatMul => Ok(None),
    }
}

fn float_op(op: BinOp, x: f64, y: f64) -> Result<Option<Value>, Exception> {
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(Exception::zero_division("float division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(Exception::zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(Exception::zero_division("float modulo"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(Exception::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(Exception::value_error("math domain error"));
            }
            x.powf(y)
        }
        _ => return Ok(None),
    };
    Ok(Some(Value::Float(result)))
}

// =============================================================================
// Indexing helpers
// =============================================================================

fn not_subscriptable(value: &Value) -> Exception {
    Exception::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}

fn no_item_assignment(value: &Value) -> Exception {
    Exception::type_error(format!(
        "'{}' object does not support item assignment",
        value.type_name()
    ))
}

/// Resolve a possibly negative index against a sequence length.
pub(crate) fn sequence_index(index: &Value, len: usize, what: &str) -> Result<usize, Exception> {
    let Some(i) = index.as_int() else {
        let noun = what.split(' ').next().unwrap_or(what);
        return Err(Exception::type_error(format!(
            "{noun} indices must be integers or slices, not {}",
            index.type_name()
        )));
    };
    let len = len as i64;
    let resolved = if i < 0 { i + len } else { i };
    if (0..len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(Exception::index_error(format!("{what} index out of range")))
    }
}

fn slice_bound(value: &Value) -> Result<Option<i64>, Exception> {
    match value {
        Value::None => Ok(None),
        other => other
            .as_int()
            .map(Some)
            .ok_or_else(|| Exception::type_error("slice indices must be integers or None")),
    }
}

/// Positions selected by a slice over a sequence of length `len`.
pub(crate) fn slice_positions(len: usize, slice: &Slice) -> Result<Vec<usize>, Exception> {
    let step = slice_bound(&slice.step)?.unwrap_or(1);
    if step == 0 {
        return Err(Exception::value_error("slice step cannot be zero"));
    }
    let len = len as i64;
    let clamp = |v: i64| -> i64 {
        if v < 0 {
            let v = v + len;
            if v < 0 { if step < 0 { -1 } else { 0 } } else { v }
        } else if v >= len {
            if step < 0 { len - 1 } else { len }
        } else {
            v
        }
    };
    let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };
    let start = slice_bound(&slice.lower)?.map(clamp).unwrap_or(default_start);
    let stop = slice_bound(&slice.upper)?.map(clamp).unwrap_or(default_stop);

    let mut positions = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        positions.push(i as usize);
        i += step;
    }
    Ok(positions)
}

fn get_slice(object: &Value, slice: &Slice) -> Result<Value, Exception> {
    let pick = |items: &[Value]| -> Result<Vec<Value>, Exception> {
        Ok(slice_positions(items.len(), slice)?
            .into_iter()
            .map(|i| items[i].clone())
            .collect())
    };
    match object {
        Value::List(items) => Ok(Value::list(pick(&items.borrow())?)),
        Value::Tuple(items) => Ok(Value::tuple(pick(items)?)),
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let picked: String = slice_positions(chars.len(), slice)?
                .into_iter()
                .map(|i| chars[i])
                .collect();
            Ok(Value::str(picked))
        }
        Value::Range(range) => {
            let values: Vec<Value> = slice_positions(range.len(), slice)?
                .into_iter()
                .filter_map(|i| range.get(i).map(Value::Int))
                .collect();
            Ok(Value::list(values))
        }
        other => Err(not_subscriptable(other)),
    }
}

fn assign_slice(items: &mut Vec<Value>, slice: &Slice, replacement: Vec<Value>) -> Result<(), Exception> {
    let step = slice_bound(&slice.step)?.unwrap_or(1);
    if step == 1 {
        let len = items.len() as i64;
        let clamp = |v: i64| (if v < 0 { v + len } else { v }).clamp(0, len) as usize;
        let start = slice_bound(&slice.lower)?.map(clamp).unwrap_or(0);
        let stop = slice_bound(&slice.upper)?.map(clamp).unwrap_or(items.len()).max(start);
        items.splice(start..stop, replacement);
        return Ok(());
    }
    let positions = slice_positions(items.len(), slice)?;
    if positions.len() != replacement.len() {
        return Err(Exception::value_error(format!(
            "attempt to assign sequence of size {} to extended slice of size {}",
            replacement.len(),
            positions.len()
        )));
    }
    for (position, value) in positions.into_iter().zip(replacement) {
        items[position] = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::value::new_namespace;
    use crate::syntax::parse;

    fn eval(source: &str) -> Result<String, String> {
        let globals = new_namespace();
        let mut interpreter = Interpreter::default();
        let module = parse(source).map_err(|e| e.to_string())?;
        match interpreter.run_suite(&module.body, &globals) {
            Ok(Some(value)) => interpreter.repr(&value).map_err(|e| e.to_string()),
            Ok(None) => Ok(String::new()),
            Err(e) => Err(e.to_string()),
        }
    }

    #[test]
    fn test_integer_arithmetic_follows_floor_semantics() {
        assert_eq!(eval("(7 // 2, -7 // 2, 7 % -3, -7 % 3, 2 ** 10, 2 ** -1)").unwrap(), "(3, -4, -2, 2, 1024, 0.5)");
        assert_eq!(eval("7 / 2").unwrap(), "3.5");
        assert_eq!(eval("True + True").unwrap(), "2");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("1 / 0").unwrap_err(), "ZeroDivisionError: division by zero");
        assert_eq!(
            eval("1 // 0").unwrap_err(),
            "ZeroDivisionError: integer division or modulo by zero"
        );
        assert_eq!(eval("1.0 % 0").unwrap_err(), "ZeroDivisionError: float modulo");
    }

    #[test]
    fn test_overflow_is_an_exception() {
        assert_eq!(eval("2 ** 70").unwrap_err(), "OverflowError: integer overflow");
    }

    #[test]
    fn test_sequence_operators() {
        assert_eq!(eval("'ab' * 3").unwrap(), "'ababab'");
        assert_eq!(eval("[0] * 3 + [1]").unwrap(), "[0, 0, 0, 1]");
        assert_eq!(eval("(1,) + (2,)").unwrap(), "(1, 2)");
        assert_eq!(eval("'a' + 1").unwrap_err(), "TypeError: can only concatenate str (not \"int\") to str");
        assert_eq!(
            eval("[] - []").unwrap_err(),
            "TypeError: unsupported operand type(s) for -: 'list' and 'list'"
        );
    }

    #[test]
    fn test_huge_repetition_raises() {
        assert_eq!(
            eval("'ab' * (2 ** 62)").unwrap_err(),
            "OverflowError: repeated string is too long"
        );
        assert_eq!(eval("[0] * (10 ** 18)").unwrap_err(), "MemoryError");
        assert_eq!(eval("(1, 2) * (2 ** 40)").unwrap_err(), "MemoryError");
        assert_eq!(eval("[] * (10 ** 18)").unwrap(), "[]");
        assert_eq!(eval("'' * (10 ** 18)").unwrap(), "''");
        assert_eq!(eval("[1] * -3").unwrap(), "[]");
    }

    #[test]
    fn test_set_and_dict_operators() {
        assert_eq!(eval("{1, 2, 3} - {2}").unwrap(), "{1, 3}");
        assert_eq!(eval("{1, 2} & {2, 3}").unwrap(), "{2}");
        assert_eq!(eval("{'a': 1} | {'b': 2}").unwrap(), "{'a': 1, 'b': 2}");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("1 < 2 < 3, 1 < 3 < 2, 1 == 1.0, 'a' in 'cat', 3 not in [1, 2]").unwrap(), "(True, False, True, True, True)");
        assert_eq!(eval("[1, 2] < [1, 3], None is None").unwrap(), "(True, True)");
        assert_eq!(
            eval("1 < 'a'").unwrap_err(),
            "TypeError: '<' not supported between instances of 'int' and 'str'"
        );
    }

    #[test]
    fn test_indexing_and_slicing() {
        assert_eq!(eval("[1, 2, 3][-1]").unwrap(), "3");
        assert_eq!(eval("'hello'[1:4]").unwrap(), "'ell'");
        assert_eq!(eval("[0, 1, 2, 3, 4][::-2]").unwrap(), "[4, 2, 0]");
        assert_eq!(eval("(1, 2, 3)[5:]").unwrap(), "()");
        assert_eq!(eval("[1][3]").unwrap_err(), "IndexError: list index out of range");
        assert_eq!(eval("{'a': 1}['b']").unwrap_err(), "KeyError: 'b'");
        assert_eq!(eval("5[0]").unwrap_err(), "TypeError: 'int' object is not subscriptable");
    }

    #[test]
    fn test_item_assignment_and_deletion() {
        assert_eq!(eval("a = [1, 2, 3, 4]\na[1:3] = ['x']\na").unwrap(), "[1, 'x', 4]");
        assert_eq!(eval("a = [1, 2, 3]\ndel a[0]\na").unwrap(), "[2, 3]");
        assert_eq!(eval("d = {'a': 1}\nd['b'] = 2\ndel d['a']\nd").unwrap(), "{'b': 2}");
        assert_eq!(
            eval("t = (1,)\nt[0] = 2").unwrap_err(),
            "TypeError: 'tuple' object does not support item assignment"
        );
    }

    #[test]
    fn test_augmented_list_is_in_place() {
        assert_eq!(eval("a = [1]\nb = a\na += [2]\nb").unwrap(), "[1, 2]");
        assert_eq!(eval("n = 1\nn += 2\nn *= 3\nn").unwrap(), "9");
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(eval("'%s has %d items (%.1f%%)' % ('cart', 3, 42.26)").unwrap(), "'cart has 3 items (42.3%)'");
        assert_eq!(eval("'%5s|%-4d|' % ('ab', 7)").unwrap(), "'   ab|7   |'");
        assert_eq!(
            eval("'%s %s' % ('one',)").unwrap_err(),
            "TypeError: not enough arguments for format string"
        );
    }

    #[test]
    fn test_operator_overloading() {
        let source = "\
class V:
    def __init__(self, x):
        self.x = x
    def __add__(self, other):
        return V(self.x + other.x)
    def __eq__(self, other):
        return self.x == other.x

V(1) + V(2) == V(3)
";
        assert_eq!(eval(source).unwrap(), "True");
    }
}
