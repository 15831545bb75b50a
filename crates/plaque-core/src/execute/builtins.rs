//! Builtin functions and types available to every cell.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::format;
use super::interpreter::Interpreter;
use super::value::{
    Args, Builtin, BuiltinFn, Exception, ExceptionKind, HashKey, IterState, Range, Value,
    compare_values,
};
use crate::syntax::ast::BinOp;

const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("print", builtin_print),
    ("len", builtin_len),
    ("range", builtin_range),
    ("str", builtin_str),
    ("int", builtin_int),
    ("float", builtin_float),
    ("bool", builtin_bool),
    ("list", builtin_list),
    ("tuple", builtin_tuple),
    ("dict", builtin_dict),
    ("set", builtin_set),
    ("repr", builtin_repr),
    ("abs", builtin_abs),
    ("min", builtin_min),
    ("max", builtin_max),
    ("sum", builtin_sum),
    ("round", builtin_round),
    ("sorted", builtin_sorted),
    ("reversed", builtin_reversed),
    ("enumerate", builtin_enumerate),
    ("zip", builtin_zip),
    ("map", builtin_map),
    ("filter", builtin_filter),
    ("any", builtin_any),
    ("all", builtin_all),
    ("isinstance", builtin_isinstance),
    ("type", builtin_type),
    ("hasattr", builtin_hasattr),
    ("getattr", builtin_getattr),
    ("setattr", builtin_setattr),
    ("iter", builtin_iter),
    ("next", builtin_next),
    ("divmod", builtin_divmod),
    ("pow", builtin_pow),
    ("chr", builtin_chr),
    ("ord", builtin_ord),
    ("format", builtin_format),
];

/// Builtins that name a type and act as its constructor.
const TYPE_NAMES: &[&str] = &[
    "int", "float", "str", "bool", "list", "tuple", "dict", "set", "range",
];

/// Type objects returned by `type()` for values without a constructor.
const OPAQUE_TYPES: &[&str] = &[
    "NoneType",
    "function",
    "builtin_function_or_method",
    "method",
    "module",
    "type",
    "iterator",
    "slice",
];

/// Resolve a builtin name (function, type or exception type).
pub fn lookup(name: &str) -> Option<Value> {
    if let Some((name, func)) = BUILTINS.iter().find(|(n, _)| *n == name) {
        return Some(Value::Builtin(Builtin { name: *name, func: *func }));
    }
    ExceptionKind::from_name(name).map(Value::ExceptionType)
}

/// Whether a builtin name denotes a type rather than a plain function.
pub fn is_type_name(name: &str) -> bool {
    TYPE_NAMES.contains(&name) || OPAQUE_TYPES.contains(&name)
}

/// All builtin names, for listing and analysis.
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS
        .iter()
        .map(|(name, _)| *name)
        .chain(ExceptionKind::ALL.iter().map(|kind| kind.name()))
}

fn int_arg(value: &Value, function: &str) -> Result<i64, Exception> {
    value.as_int().ok_or_else(|| {
        Exception::type_error(format!(
            "'{}' object cannot be interpreted as an integer (in {function}())",
            value.type_name()
        ))
    })
}

fn str_arg<'a>(value: &'a Value, function: &str) -> Result<&'a str, Exception> {
    value.as_str().ok_or_else(|| {
        Exception::type_error(format!(
            "{function}() argument must be str, not {}",
            value.type_name()
        ))
    })
}

/// Materialize an iterable into a fresh iterator value.
pub(crate) fn to_iterator(interpreter: &mut Interpreter, value: &Value) -> Result<Value, Exception> {
    Ok(match value {
        Value::Iterator(_) => value.clone(),
        Value::Range(range) => Value::Iterator(Rc::new(RefCell::new(IterState::Range {
            next: range.start,
            stop: range.stop,
            step: range.step,
        }))),
        other => Value::iterator(interpreter.iterate(other)?.collect()),
    })
}

// =============================================================================
// Output and conversion
// =============================================================================

fn builtin_print(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("print", 0, usize::MAX, &["sep", "end"])?;
    let text_option = |value: Option<&Value>, default: &str| -> Result<String, Exception> {
        match value {
            None | Some(Value::None) => Ok(default.to_string()),
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(other) => Err(Exception::type_error(format!(
                "sep and end must be None or a string, not {}",
                other.type_name()
            ))),
        }
    };
    let sep = text_option(args.keyword("sep"), " ")?;
    let end = text_option(args.keyword("end"), "\n")?;

    let mut parts = Vec::with_capacity(args.len());
    for value in &args.positional {
        parts.push(interp.to_str(value)?);
    }
    let line = format!("{}{end}", parts.join(&sep));
    interp.write_stdout(&line);
    Ok(Value::None)
}

fn builtin_len(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("len", 1, 1, &[])?;
    let value = &args.positional[0];
    let len = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(entries) => entries.borrow().len(),
        Value::Set(items) => items.borrow().len(),
        Value::Range(range) => range.len(),
        Value::Instance(instance) if instance.class.lookup("__len__").is_some() => {
            let method = instance.class.lookup("__len__").unwrap_or(Value::None);
            let result = interp.call_value(&method, Args::new(vec![value.clone()]))?;
            return match result.as_int() {
                Some(n) if n >= 0 => Ok(Value::Int(n)),
                _ => Err(Exception::value_error("__len__() should return >= 0")),
            };
        }
        other => {
            return Err(Exception::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_range(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("range", 1, 3, &[])?;
    let ints = args
        .positional
        .iter()
        .map(|v| int_arg(v, "range"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("argument count checked above"),
    };
    if step == 0 {
        return Err(Exception::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(Range { start, stop, step }))
}

fn builtin_str(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("str", 0, 1, &[])?;
    match args.get(0) {
        Some(value) => Ok(Value::str(interp.to_str(value)?)),
        None => Ok(Value::str("")),
    }
}

fn builtin_repr(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("repr", 1, 1, &[])?;
    Ok(Value::str(interp.repr(&args.positional[0])?))
}

fn builtin_int(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("int", 0, 2, &["base"])?;
    let base = match args.get(1).or(args.keyword("base")) {
        Some(base) => Some(int_arg(base, "int")?),
        None => None,
    };
    let Some(value) = args.get(0) else {
        return Ok(Value::Int(0));
    };
    match (value, base) {
        (Value::Str(text), base) => parse_int(text, base.unwrap_or(10)),
        (_, Some(_)) => Err(Exception::type_error("int() can't convert non-string with explicit base")),
        (Value::Float(f), None) => {
            if f.is_nan() {
                Err(Exception::value_error("cannot convert float NaN to integer"))
            } else if f.is_infinite() || f.abs() >= 9.2e18 {
                Err(Exception::new(
                    ExceptionKind::OverflowError,
                    "cannot convert float infinity to integer",
                ))
            } else {
                Ok(Value::Int(f.trunc() as i64))
            }
        }
        (other, None) => other.as_int().map(Value::Int).ok_or_else(|| {
            Exception::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn parse_int(text: &str, base: i64) -> Result<Value, Exception> {
    let invalid = || {
        Exception::value_error(format!(
            "invalid literal for int() with base {base}: {}",
            format::quote(text)
        ))
    };
    if !(2..=36).contains(&base) {
        return Err(Exception::value_error("int() base must be >= 2 and <= 36"));
    }
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = match base {
        16 => digits.strip_prefix("0x").or(digits.strip_prefix("0X")).unwrap_or(digits),
        8 => digits.strip_prefix("0o").or(digits.strip_prefix("0O")).unwrap_or(digits),
        2 => digits.strip_prefix("0b").or(digits.strip_prefix("0B")).unwrap_or(digits),
        _ => digits,
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return Err(invalid());
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = i64::from_str_radix(&cleaned, base as u32).map_err(|_| invalid())?;
    Ok(Value::Int(if negative { -magnitude } else { magnitude }))
}

fn builtin_float(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("float", 0, 1, &[])?;
    let Some(value) = args.get(0) else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Str(text) => {
            let trimmed = text.trim().replace('_', "");
            let parsed = match trimmed.to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" | "+nan" | "-nan" => Some(f64::NAN),
                _ => trimmed.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                Exception::value_error(format!(
                    "could not convert string to float: {}",
                    format::quote(text)
                ))
            })
        }
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            Exception::type_error(format!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn builtin_bool(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("bool", 0, 1, &[])?;
    Ok(Value::Bool(args.get(0).is_some_and(Value::truthy)))
}

fn builtin_list(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("list", 0, 1, &[])?;
    match args.get(0) {
        Some(iterable) => Ok(Value::list(interp.iterate(iterable)?.collect())),
        None => Ok(Value::list(Vec::new())),
    }
}

fn builtin_tuple(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("tuple", 0, 1, &[])?;
    match args.get(0) {
        Some(iterable) => Ok(Value::tuple(interp.iterate(iterable)?.collect())),
        None => Ok(Value::tuple(Vec::new())),
    }
}

fn builtin_set(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("set", 0, 1, &[])?;
    let mut items = IndexSet::new();
    if let Some(iterable) = args.get(0) {
        for item in interp.iterate(iterable)? {
            items.insert(HashKey::new(item)?);
        }
    }
    Ok(Value::set(items))
}

fn builtin_dict(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    if args.len() > 1 {
        return Err(Exception::type_error(format!(
            "dict expected at most 1 argument, got {}",
            args.len()
        )));
    }
    let mut entries = IndexMap::new();
    match args.get(0) {
        Some(Value::Dict(source)) => {
            entries.extend(source.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(iterable) => {
            for pair in interp.iterate(iterable)? {
                let items = pair.to_vec()?;
                let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
                    Exception::value_error(format!(
                        "dictionary update sequence element has length {}; 2 is required",
                        items.len()
                    ))
                })?;
                entries.insert(HashKey::new(key)?, value);
            }
        }
        None => {}
    }
    for (key, value) in args.keywords {
        entries.insert(HashKey::new(Value::str(key))?, value);
    }
    Ok(Value::dict(entries))
}

// =============================================================================
// Numbers
// =============================================================================

fn builtin_abs(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("abs", 1, 1, &[])?;
    match &args.positional[0] {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => match other.as_int() {
            Some(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                Exception::new(ExceptionKind::OverflowError, "integer overflow")
            }),
            None => Err(Exception::type_error(format!(
                "bad operand type for abs(): '{}'",
                other.type_name()
            ))),
        },
    }
}

fn builtin_round(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("round", 1, 2, &["ndigits"])?;
    let value = &args.positional[0];
    let ndigits = match args.get(1).or(args.keyword("ndigits")) {
        None | Some(Value::None) => None,
        Some(n) => Some(int_arg(n, "round")?),
    };
    match (value, ndigits) {
        (Value::Float(f), None) => {
            if !f.is_finite() {
                return Err(Exception::value_error("cannot convert float to integer"));
            }
            Ok(Value::Int(f.round_ties_even() as i64))
        }
        (Value::Float(f), Some(n)) => Ok(Value::Float(round_float(*f, n))),
        (other, ndigits) => match other.as_int() {
            Some(i) => match ndigits {
                Some(n) if n < 0 => round_int(i, n.unsigned_abs()).map(Value::Int),
                _ => Ok(Value::Int(i)),
            },
            None => Err(Exception::type_error(format!(
                "type {} doesn't define __round__ method",
                other.type_name()
            ))),
        },
    }
}

/// Round half to even at `ndigits` decimal places.
fn round_float(f: f64, ndigits: i64) -> f64 {
    if !f.is_finite() || ndigits > 308 {
        return f;
    }
    if ndigits < -308 {
        return 0.0 * f;
    }
    let scale = 10f64.powi(ndigits as i32);
    let scaled = f * scale;
    if !scaled.is_finite() {
        return f;
    }
    scaled.round_ties_even() / scale
}

/// Round an integer half to even at a multiple of `10^places`.
fn round_int(i: i64, places: u64) -> Result<i64, Exception> {
    // 10^19 already exceeds every i64
    let Some(scale) = u32::try_from(places).ok().and_then(|p| 10i128.checked_pow(p)) else {
        return Ok(0);
    };
    let value = i128::from(i);
    let quotient = value.div_euclid(scale);
    let rounded = match (2 * value.rem_euclid(scale)).cmp(&scale) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal => quotient + (quotient & 1),
    };
    i64::try_from(rounded * scale)
        .map_err(|_| Exception::new(ExceptionKind::OverflowError, "integer overflow"))
}

fn builtin_divmod(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("divmod", 2, 2, &[])?;
    let (a, b) = (args.positional[0].clone(), args.positional[1].clone());
    let quotient = interp.binary_op(BinOp::FloorDiv, a.clone(), b.clone())?;
    let remainder = interp.binary_op(BinOp::Mod, a, b)?;
    Ok(Value::tuple(vec![quotient, remainder]))
}

fn builtin_pow(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("pow", 2, 3, &[])?;
    let (base, exponent) = (args.positional[0].clone(), args.positional[1].clone());
    let Some(modulus) = args.get(2) else {
        return interp.binary_op(BinOp::Pow, base, exponent);
    };
    let (Some(b), Some(e), Some(m)) = (base.as_int(), exponent.as_int(), modulus.as_int()) else {
        return Err(Exception::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if m == 0 {
        return Err(Exception::value_error("pow() 3rd argument cannot be 0"));
    }
    if e < 0 {
        return Err(Exception::value_error("pow() negative exponent not supported"));
    }
    let m128 = m as i128;
    let (mut result, mut b, mut e) = (1i128, (b as i128).rem_euclid(m128), e);
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m128);
        }
        b = (b * b).rem_euclid(m128);
        e >>= 1;
    }
    // result carries the sign of the modulus
    if m < 0 && result > 0 {
        result += m128;
    }
    Ok(Value::Int(result as i64))
}

fn builtin_chr(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("chr", 1, 1, &[])?;
    let code = int_arg(&args.positional[0], "chr")?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::str(c.to_string()))
        .ok_or_else(|| Exception::value_error("chr() arg not in range(0x110000)"))
}

fn builtin_ord(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("ord", 1, 1, &[])?;
    let text = str_arg(&args.positional[0], "ord")?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(c as i64)),
        _ => Err(Exception::type_error(format!(
            "ord() expected a character, but string of length {} found",
            text.chars().count()
        ))),
    }
}

fn builtin_format(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("format", 1, 2, &[])?;
    let value = &args.positional[0];
    let spec = match args.get(1) {
        Some(spec) => str_arg(spec, "format")?.to_string(),
        None => String::new(),
    };
    let text = interp.to_str(value)?;
    Ok(Value::str(format::format_value(value, &text, &spec)?))
}

// =============================================================================
// Iteration
// =============================================================================

fn builtin_min(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    extreme(interp, args, "min", Ordering::Less)
}

fn builtin_max(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    extreme(interp, args, "max", Ordering::Greater)
}

fn extreme(interp: &mut Interpreter, args: Args, name: &str, wanted: Ordering) -> Result<Value, Exception> {
    args.check(name, 1, usize::MAX, &["key", "default"])?;
    let key = args.keyword("key").filter(|k| !k.is_none()).cloned();
    let candidates: Vec<Value> = if args.len() == 1 {
        interp.iterate(&args.positional[0])?.collect()
    } else {
        args.positional.clone()
    };

    let mut best: Option<(Value, Value)> = None;
    for candidate in candidates {
        let score = match &key {
            Some(key) => interp.call_value(key, Args::new(vec![candidate.clone()]))?,
            None => candidate.clone(),
        };
        let replace = match &best {
            None => true,
            Some((_, best_score)) => compare_values(&score, best_score)? == wanted,
        };
        if replace {
            best = Some((candidate, score));
        }
    }
    match best {
        Some((value, _)) => Ok(value),
        None => args
            .keyword("default")
            .cloned()
            .ok_or_else(|| Exception::value_error(format!("{name}() arg is an empty sequence"))),
    }
}

fn builtin_sum(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("sum", 1, 2, &["start"])?;
    let mut total = args
        .get(1)
        .or(args.keyword("start"))
        .cloned()
        .unwrap_or(Value::Int(0));
    if matches!(total, Value::Str(_)) {
        return Err(Exception::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    for item in interp.iterate(&args.positional[0])? {
        total = interp.binary_op(BinOp::Add, total, item)?;
    }
    Ok(total)
}

impl Interpreter {
    /// Stable sort with an optional key function, as `sorted()` and `list.sort()` do.
    pub(crate) fn sort_values(
        &mut self,
        items: Vec<Value>,
        key: Option<&Value>,
        reverse: bool,
    ) -> Result<Vec<Value>, Exception> {
        let mut keyed = Vec::with_capacity(items.len());
        for item in items {
            let score = match key {
                Some(key) if !key.is_none() => self.call_value(key, Args::new(vec![item.clone()]))?,
                _ => item.clone(),
            };
            keyed.push((score, item));
        }
        let mut failure = None;
        keyed.sort_by(|(a, _), (b, _)| {
            let ordering = compare_values(a, b).unwrap_or_else(|e| {
                failure.get_or_insert(e);
                Ordering::Equal
            });
            if reverse { ordering.reverse() } else { ordering }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(keyed.into_iter().map(|(_, item)| item).collect()),
        }
    }
}

fn builtin_sorted(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("sorted", 1, 1, &["key", "reverse"])?;
    let items = interp.iterate(&args.positional[0])?.collect();
    let reverse = args.keyword("reverse").is_some_and(Value::truthy);
    let sorted = interp.sort_values(items, args.keyword("key"), reverse)?;
    Ok(Value::list(sorted))
}

fn builtin_reversed(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("reversed", 1, 1, &[])?;
    let value = &args.positional[0];
    match value {
        Value::List(_) | Value::Tuple(_) | Value::Str(_) | Value::Range(_) => {
            let mut items = value.to_vec()?;
            items.reverse();
            Ok(Value::iterator(items))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not reversible",
            other.type_name()
        ))),
    }
}

fn builtin_enumerate(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("enumerate", 1, 2, &["start"])?;
    let start = match args.get(1).or(args.keyword("start")) {
        Some(start) => int_arg(start, "enumerate")?,
        None => 0,
    };
    let items = interp
        .iterate(&args.positional[0])?
        .enumerate()
        .map(|(i, item)| Value::tuple(vec![Value::Int(start + i as i64), item]))
        .collect();
    Ok(Value::iterator(items))
}

fn builtin_zip(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("zip", 0, usize::MAX, &[])?;
    let mut columns = Vec::with_capacity(args.len());
    for iterable in &args.positional {
        columns.push(interp.iterate(iterable)?.collect::<Vec<_>>());
    }
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let items = (0..rows)
        .map(|row| Value::tuple(columns.iter().map(|column| column[row].clone()).collect()))
        .collect();
    Ok(Value::iterator(items))
}

fn builtin_map(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("map", 2, usize::MAX, &[])?;
    let function = args.positional[0].clone();
    let mut columns = Vec::with_capacity(args.len() - 1);
    for iterable in &args.positional[1..] {
        columns.push(interp.iterate(iterable)?.collect::<Vec<_>>());
    }
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut items = Vec::with_capacity(rows);
    for row in 0..rows {
        let call_args = columns.iter().map(|column| column[row].clone()).collect();
        items.push(interp.call_value(&function, Args::new(call_args))?);
    }
    Ok(Value::iterator(items))
}

fn builtin_filter(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("filter", 2, 2, &[])?;
    let predicate = args.positional[0].clone();
    let mut kept = Vec::new();
    for item in interp.iterate(&args.positional[1])? {
        let keep = if predicate.is_none() {
            item.truthy()
        } else {
            interp.call_value(&predicate, Args::new(vec![item.clone()]))?.truthy()
        };
        if keep {
            kept.push(item);
        }
    }
    Ok(Value::iterator(kept))
}

fn builtin_any(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("any", 1, 1, &[])?;
    Ok(Value::Bool(interp.iterate(&args.positional[0])?.any(|v| v.truthy())))
}

fn builtin_all(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("all", 1, 1, &[])?;
    Ok(Value::Bool(interp.iterate(&args.positional[0])?.all(|v| v.truthy())))
}

fn builtin_iter(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("iter", 1, 1, &[])?;
    to_iterator(interp, &args.positional[0])
}

fn builtin_next(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("next", 1, 2, &[])?;
    let Value::Iterator(state) = &args.positional[0] else {
        return Err(Exception::type_error(format!(
            "'{}' object is not an iterator",
            args.positional[0].type_name()
        )));
    };
    let next = state.borrow_mut().next();
    match (next, args.get(1)) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(Exception::new(ExceptionKind::StopIteration, "")),
    }
}

// =============================================================================
// Types and attributes
// =============================================================================

fn builtin_isinstance(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("isinstance", 2, 2, &[])?;
    Ok(Value::Bool(is_instance(&args.positional[0], &args.positional[1])?))
}

fn is_instance(value: &Value, class: &Value) -> Result<bool, Exception> {
    match class {
        Value::Builtin(builtin) if is_type_name(builtin.name) => Ok(match builtin.name {
            "int" => matches!(value, Value::Int(_) | Value::Bool(_)),
            "type" => matches!(value, Value::Class(_) | Value::ExceptionType(_) | Value::Builtin(_)),
            name => value.type_name() == name,
        }),
        Value::ExceptionType(kind) => Ok(match value {
            Value::Exception(exception) => exception.kind.is_subtype_of(*kind),
            Value::Instance(instance) => instance
                .class
                .exception_base()
                .is_some_and(|base| base.is_subtype_of(*kind)),
            _ => false,
        }),
        Value::Class(class) => Ok(match value {
            Value::Instance(instance) => instance.class.is_subclass_of(class),
            _ => false,
        }),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(value, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "isinstance() arg 2 must be a type, a tuple of types, or a union",
        )),
    }
}

fn builtin_type(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("type", 1, 1, &[])?;
    let value = &args.positional[0];
    let name = match value {
        Value::Instance(instance) => return Ok(Value::Class(instance.class.clone())),
        Value::Exception(exception) => return Ok(Value::ExceptionType(exception.kind)),
        Value::None => "NoneType",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Str(_) => "str",
        Value::List(_) => "list",
        Value::Tuple(_) => "tuple",
        Value::Dict(_) => "dict",
        Value::Set(_) => "set",
        Value::Range(_) => "range",
        Value::Slice(_) => "slice",
        Value::Iterator(_) => "iterator",
        Value::Function(_) => "function",
        Value::Builtin(_) => "builtin_function_or_method",
        Value::BoundMethod(_) | Value::NativeMethod(_) => "method",
        Value::Module(_) => "module",
        Value::Class(_) | Value::ExceptionType(_) => "type",
    };
    Ok(lookup(name).unwrap_or(Value::Builtin(Builtin {
        name,
        func: not_constructible,
    })))
}

fn not_constructible(_: &mut Interpreter, _: Args) -> Result<Value, Exception> {
    Err(Exception::type_error("cannot create instances of this type"))
}

fn builtin_hasattr(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("hasattr", 2, 2, &[])?;
    let name = str_arg(&args.positional[1], "hasattr")?;
    match interp.get_attr(&args.positional[0], name) {
        Ok(_) => Ok(Value::Bool(true)),
        Err(e) if e.kind() == Some(ExceptionKind::AttributeError) => Ok(Value::Bool(false)),
        Err(e) => Err(e),
    }
}

fn builtin_getattr(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("getattr", 2, 3, &[])?;
    let name = str_arg(&args.positional[1], "getattr")?;
    match (interp.get_attr(&args.positional[0], name), args.get(2)) {
        (Err(e), Some(default)) if e.kind() == Some(ExceptionKind::AttributeError) => Ok(default.clone()),
        (result, _) => result,
    }
}

fn builtin_setattr(interp: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("setattr", 3, 3, &[])?;
    let name = str_arg(&args.positional[1], "setattr")?;
    interp.set_attr(&args.positional[0], name, args.positional[2].clone())?;
    Ok(Value::None)
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
            Ok(Some(value)) if !value.is_none() => interpreter.repr(&value).map_err(|e| e.to_string()),
            Ok(_) => Ok(interpreter.take_stdout()),
            Err(e) => Err(e.to_string()),
        }
    }

    #[test]
    fn test_print_separators() {
        assert_eq!(eval("print(1, 'a', None, sep=', ', end='!')").unwrap(), "1, a, None!");
        assert_eq!(eval("print()").unwrap(), "\n");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval("int('  -42 '), int('ff', 16), int(3.9), float('1e3'), str(2.0)").unwrap(), "(-42, 255, 3, 1000.0, '2.0')");
        assert_eq!(
            eval("int('abc')").unwrap_err(),
            "ValueError: invalid literal for int() with base 10: 'abc'"
        );
        assert_eq!(eval("bool([]), bool('x')").unwrap(), "(False, True)");
    }

    #[test]
    fn test_collections() {
        assert_eq!(eval("list(range(3)), tuple('ab'), set([1, 1, 2])").unwrap(), "([0, 1, 2], ('a', 'b'), {1, 2})");
        assert_eq!(eval("dict([('a', 1)], b=2)").unwrap(), "{'a': 1, 'b': 2}");
        assert_eq!(eval("len({'a': 1}), len('héllo'), len(range(0, 10, 3))").unwrap(), "(1, 5, 4)");
        assert_eq!(eval("len(5)").unwrap_err(), "TypeError: object of type 'int' has no len()");
    }

    #[test]
    fn test_numeric_helpers() {
        assert_eq!(eval("abs(-3), round(2.5), round(3.14159, 2), divmod(7, -2), pow(3, 4, 5)").unwrap(), "(3, 2, 3.14, (-4, -1), 1)");
        assert_eq!(eval("min(3, 1, 2), max([4, 9, 2]), max(['a', 'bbb'], key=len)").unwrap(), "(1, 9, 'bbb')");
        assert_eq!(eval("min([])").unwrap_err(), "ValueError: min() arg is an empty sequence");
        assert_eq!(eval("sum([1, 2, 3]), sum([0.5, 0.5], 1)").unwrap(), "(6, 2.0)");
    }

    #[test]
    fn test_round_with_extreme_ndigits() {
        assert_eq!(eval("round(5, -9223372036854775807 - 1)").unwrap(), "0");
        assert_eq!(eval("round(-7, -4294967297)").unwrap(), "0");
        assert_eq!(eval("round(1250, -2), round(1350, -2), round(-1250, -2)").unwrap(), "(1200, 1400, -1200)");
        assert_eq!(eval("round(123456789, -19)").unwrap(), "0");
        assert_eq!(
            eval("round(9223372036854775807, -1)").unwrap_err(),
            "OverflowError: integer overflow"
        );
        assert_eq!(eval("round(2.675, 4294967298), round(3.5, -400)").unwrap(), "(2.675, 0.0)");
        assert_eq!(eval("round(1e300, 20)").unwrap(), "1e+300");
    }

    #[test]
    fn test_iteration_helpers() {
        assert_eq!(eval("sorted([3, 1, 2], reverse=True)").unwrap(), "[3, 2, 1]");
        assert_eq!(eval("sorted(['bb', 'a', 'ccc'], key=len)").unwrap(), "['a', 'bb', 'ccc']");
        assert_eq!(eval("list(enumerate('ab', 1))").unwrap(), "[(1, 'a'), (2, 'b')]");
        assert_eq!(eval("list(zip([1, 2, 3], 'ab'))").unwrap(), "[(1, 'a'), (2, 'b')]");
        assert_eq!(eval("list(map(lambda x: x * 2, [1, 2]))").unwrap(), "[2, 4]");
        assert_eq!(eval("list(filter(None, [0, 1, '', 'x']))").unwrap(), "[1, 'x']");
        assert_eq!(eval("list(reversed(range(3)))").unwrap(), "[2, 1, 0]");
        assert_eq!(eval("any([0, 1]), all([]), all([1, 0])").unwrap(), "(True, True, False)");
    }

    #[test]
    fn test_iter_and_next() {
        assert_eq!(eval("it = iter([1, 2])\n(next(it), next(it), next(it, 'done'))").unwrap(), "(1, 2, 'done')");
        assert_eq!(eval("next(iter([]))").unwrap_err(), "StopIteration");
    }

    #[test]
    fn test_types() {
        assert_eq!(eval("isinstance(True, int), isinstance(1.0, (str, float)), isinstance([], dict)").unwrap(), "(True, True, False)");
        assert_eq!(eval("type(1) is int, type('x').__name__").unwrap(), "(True, 'str')");
        assert_eq!(eval("type(len)").unwrap(), "<class 'builtin_function_or_method'>");
        assert_eq!(eval("isinstance(KeyError('k'), LookupError)").unwrap(), "True");
    }

    #[test]
    fn test_attribute_builtins() {
        let source = "\
class C:
    pass
c = C()
setattr(c, 'x', 5)
(hasattr(c, 'x'), hasattr(c, 'y'), getattr(c, 'x'), getattr(c, 'y', 0))
";
        assert_eq!(eval(source).unwrap(), "(True, False, 5, 0)");
    }

    #[test]
    fn test_chr_ord_format() {
        assert_eq!(eval("chr(65), ord('a'), format(3.14159, '.2f'), format(42)").unwrap(), "('A', 97, '3.14', '42')");
        assert!(eval("ord('ab')").is_err());
    }
}
