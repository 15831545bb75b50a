//! Importable standard modules: `math`, `json` and `string`.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};

use super::interpreter::Interpreter;
use super::value::{Args, Builtin, BuiltinFn, Exception, ExceptionKind, Module, Value};

/// Build a fresh module object, or `None` for unknown names.
pub fn import(name: &str) -> Option<Value> {
    let attrs = match name {
        "math" => math_module(),
        "json" => functions(&[("dumps", json_dumps)]),
        "string" => string_module(),
        _ => return None,
    };
    Some(Value::Module(Rc::new(Module {
        name: name.to_string(),
        attrs,
    })))
}

fn functions(table: &[(&'static str, BuiltinFn)]) -> IndexMap<String, Value> {
    table
        .iter()
        .map(|(name, func)| (name.to_string(), Value::Builtin(Builtin { name: *name, func: *func })))
        .collect()
}

// =============================================================================
// math
// =============================================================================

fn math_module() -> IndexMap<String, Value> {
    let mut attrs = functions(&[
        ("sqrt", math_sqrt),
        ("floor", math_floor),
        ("ceil", math_ceil),
        ("exp", math_exp),
        ("log", math_log),
        ("log2", math_log2),
        ("log10", math_log10),
        ("sin", math_sin),
        ("cos", math_cos),
        ("tan", math_tan),
        ("atan2", math_atan2),
        ("fabs", math_fabs),
        ("isclose", math_isclose),
    ]);
    for (name, value) in [
        ("pi", std::f64::consts::PI),
        ("e", std::f64::consts::E),
        ("tau", std::f64::consts::TAU),
        ("inf", f64::INFINITY),
        ("nan", f64::NAN),
    ] {
        attrs.insert(name.to_string(), Value::Float(value));
    }
    attrs
}

fn float_arg(args: &Args, index: usize) -> Result<f64, Exception> {
    let value = args.get(index).unwrap_or(&Value::None);
    value.as_float().ok_or_else(|| {
        Exception::type_error(format!("must be real number, not {}", value.type_name()))
    })
}

fn domain_error() -> Exception {
    Exception::value_error("math domain error")
}

fn unary(args: Args, name: &str, f: impl Fn(f64) -> Result<f64, Exception>) -> Result<Value, Exception> {
    args.check(name, 1, 1, &[])?;
    Ok(Value::Float(f(float_arg(&args, 0)?)?))
}

fn math_sqrt(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "sqrt", |x| if x < 0.0 { Err(domain_error()) } else { Ok(x.sqrt()) })
}

fn to_int(x: f64) -> Result<Value, Exception> {
    if x.is_nan() {
        return Err(Exception::value_error("cannot convert float NaN to integer"));
    }
    if x.is_infinite() || x.abs() >= 9.2e18 {
        return Err(Exception::new(
            ExceptionKind::OverflowError,
            "cannot convert float infinity to integer",
        ));
    }
    Ok(Value::Int(x as i64))
}

fn math_floor(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("floor", 1, 1, &[])?;
    match &args.positional[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        _ => to_int(float_arg(&args, 0)?.floor()),
    }
}

fn math_ceil(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("ceil", 1, 1, &[])?;
    match &args.positional[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        _ => to_int(float_arg(&args, 0)?.ceil()),
    }
}

fn math_exp(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "exp", |x| {
        let y = x.exp();
        if y.is_infinite() && x.is_finite() {
            Err(Exception::new(ExceptionKind::OverflowError, "math range error"))
        } else {
            Ok(y)
        }
    })
}

fn positive_log(x: f64, f: fn(f64) -> f64) -> Result<f64, Exception> {
    if x <= 0.0 { Err(domain_error()) } else { Ok(f(x)) }
}

fn math_log(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("log", 1, 2, &[])?;
    let x = positive_log(float_arg(&args, 0)?, f64::ln)?;
    if args.len() == 2 {
        let base = positive_log(float_arg(&args, 1)?, f64::ln)?;
        if base == 0.0 {
            return Err(Exception::zero_division("float division by zero"));
        }
        return Ok(Value::Float(x / base));
    }
    Ok(Value::Float(x))
}

fn math_log2(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "log2", |x| positive_log(x, f64::log2))
}

fn math_log10(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "log10", |x| positive_log(x, f64::log10))
}

fn math_sin(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "sin", |x| Ok(x.sin()))
}

fn math_cos(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "cos", |x| Ok(x.cos()))
}

fn math_tan(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "tan", |x| Ok(x.tan()))
}

fn math_fabs(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    unary(args, "fabs", |x| Ok(x.abs()))
}

fn math_atan2(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("atan2", 2, 2, &[])?;
    Ok(Value::Float(float_arg(&args, 0)?.atan2(float_arg(&args, 1)?)))
}

fn math_isclose(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("isclose", 2, 2, &["rel_tol", "abs_tol"])?;
    let (a, b) = (float_arg(&args, 0)?, float_arg(&args, 1)?);
    let tolerance = |name: &str, default: f64| match args.keyword(name) {
        Some(value) => value.as_float().ok_or_else(|| {
            Exception::type_error(format!("must be real number, not {}", value.type_name()))
        }),
        None => Ok(default),
    };
    let rel_tol = tolerance("rel_tol", 1e-9)?;
    let abs_tol = tolerance("abs_tol", 0.0)?;
    if rel_tol < 0.0 || abs_tol < 0.0 {
        return Err(Exception::value_error("tolerances must be non-negative"));
    }
    let close = a == b || (a - b).abs() <= (rel_tol * b.abs().max(a.abs())).max(abs_tol);
    Ok(Value::Bool(close))
}

// =============================================================================
// json
// =============================================================================

fn to_json(value: &Value) -> Result<serde_json::Value, Exception> {
    to_json_nested(value, &mut Vec::new())
}

/// `active` holds the containers enclosing `value`.
fn to_json_nested(value: &Value, active: &mut Vec<usize>) -> Result<serde_json::Value, Exception> {
    let container = super::format::cycle_marker(value);
    if let Some((id, _)) = container {
        if active.contains(&id) {
            return Err(Exception::value_error("Circular reference detected"));
        }
        if active.len() >= super::format::MAX_REPR_DEPTH {
            return Err(Exception::recursion_error(
                "maximum recursion depth exceeded while encoding a JSON object",
            ));
        }
        active.push(id);
    }
    let json = to_json_value(value, active);
    if container.is_some() {
        active.pop();
    }
    json
}

fn to_json_value(value: &Value, active: &mut Vec<usize>) -> Result<serde_json::Value, Exception> {
    use serde_json::Value as Json;

    let array = |items: &[Value], active: &mut Vec<usize>| {
        items
            .iter()
            .map(|item| to_json_nested(item, active))
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array)
    };
    Ok(match value {
        Value::None => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number).ok_or_else(|| {
            Exception::value_error("Out of range float values are not JSON compliant")
        })?,
        Value::Str(s) => Json::String(s.to_string()),
        Value::List(items) => array(&items.borrow(), active)?,
        Value::Tuple(items) => array(items, active)?,
        Value::Dict(entries) => {
            let mut object = serde_json::Map::new();
            for (key, item) in entries.borrow().iter() {
                let key = match key.value() {
                    Value::Str(s) => s.to_string(),
                    Value::None => "null".to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Int(i) => i.to_string(),
                    Value::Float(f) => super::format::format_float(*f),
                    other => {
                        return Err(Exception::type_error(format!(
                            "keys must be str, int, float, bool or None, not {}",
                            other.type_name()
                        )));
                    }
                };
                object.insert(key, to_json_nested(item, active)?);
            }
            Json::Object(object)
        }
        other => {
            return Err(Exception::type_error(format!(
                "Object of type {} is not JSON serializable",
                other.type_name()
            )));
        }
    })
}

/// Widest `indent` accepted by `json.dumps`.
const MAX_INDENT: usize = 1 << 16;

/// Single-line output with `", "` and `": "` separators.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + std::io::Write>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + std::io::Write>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + std::io::Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(b": ")
    }
}

fn json_dumps(_: &mut Interpreter, args: Args) -> Result<Value, Exception> {
    args.check("dumps", 1, 1, &["indent", "sort_keys"])?;
    let mut json = to_json(&args.positional[0])?;
    if args.keyword("sort_keys").is_some_and(Value::truthy) {
        sort_keys(&mut json);
    }

    let mut out = Vec::new();
    let written = match args.keyword("indent").and_then(Value::as_int) {
        Some(width) => {
            let width = usize::try_from(width).unwrap_or(0);
            if width > MAX_INDENT {
                return Err(Exception::value_error("indent is too large"));
            }
            let indent = " ".repeat(width);
            let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
            json.serialize(&mut serializer)
        }
        None => json.serialize(&mut Serializer::with_formatter(&mut out, SpacedFormatter)),
    };
    written.map_err(|e| Exception::value_error(e.to_string()))?;
    String::from_utf8(out)
        .map(Value::str)
        .map_err(|e| Exception::value_error(e.to_string()))
}

fn sort_keys(json: &mut serde_json::Value) {
    match json {
        serde_json::Value::Object(object) => {
            let mut entries: Vec<_> = std::mem::take(object).into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            for (key, mut value) in entries {
                sort_keys(&mut value);
                object.insert(key, value);
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(sort_keys),
        _ => {}
    }
}

// =============================================================================
// string
// =============================================================================

fn string_module() -> IndexMap<String, Value> {
    [
        ("ascii_lowercase", "abcdefghijklmnopqrstuvwxyz"),
        ("ascii_uppercase", "ABCDEFGHIJKLMNOPQRSTUVWXYZ"),
        ("digits", "0123456789"),
    ]
    .into_iter()
    .map(|(name, text)| (name.to_string(), Value::str(text)))
    .collect()
}

#[cfg(test)]
mod tests {
    use crate::execute::interpreter::Interpreter;
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
    fn test_math() {
        assert_eq!(eval("import math\n(math.floor(2.7), math.ceil(2.1), math.sqrt(16))").unwrap(), "(2, 3, 4.0)");
        assert_eq!(eval("from math import log, isclose\n(log(8, 2), isclose(0.1 + 0.2, 0.3))").unwrap(), "(3.0, True)");
        assert_eq!(eval("import math\nmath.sqrt(-1)").unwrap_err(), "ValueError: math domain error");
    }

    #[test]
    fn test_json_dumps() {
        assert_eq!(
            eval("import json\njson.dumps({'a': [1, 2.5, None], 'b': True})").unwrap(),
            r#"'{"a": [1, 2.5, null], "b": true}'"#
        );
        assert_eq!(
            eval("import json\njson.dumps({'b': 1, 'a': 2}, sort_keys=True)").unwrap(),
            r#"'{"a": 2, "b": 1}'"#
        );
        assert_eq!(
            eval("import json\njson.dumps({1, 2})").unwrap_err(),
            "TypeError: Object of type set is not JSON serializable"
        );
    }

    #[test]
    fn test_json_dumps_rejects_cycles_and_huge_indent() {
        assert_eq!(
            eval("import json\na = [1]\na.append(a)\njson.dumps(a)").unwrap_err(),
            "ValueError: Circular reference detected"
        );
        assert_eq!(
            eval("import json\nshared = [0]\njson.dumps([shared, shared])").unwrap(),
            "'[[0], [0]]'"
        );
        assert_eq!(
            eval("import json\njson.dumps([], indent=10 ** 15)").unwrap_err(),
            "ValueError: indent is too large"
        );
    }

    #[test]
    fn test_string_constants() {
        assert_eq!(eval("import string\nstring.digits").unwrap(), "'0123456789'");
    }

    #[test]
    fn test_unknown_module() {
        assert_eq!(eval("import numpy").unwrap_err(), "ImportError: No module named 'numpy'");
    }
}
