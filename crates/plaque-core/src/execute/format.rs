//! Text rendering of values: `repr`, `str` and format specs.

use std::convert::Infallible;
use std::rc::Rc;

use super::value::{Exception, ExceptionKind, Value};

/// Containers nested deeper than this render as `...` in [`repr`].
pub const MAX_REPR_DEPTH: usize = 500;

/// Render a value as `repr()` would, without calling user `__repr__`.
pub fn repr(value: &Value) -> String {
    repr_nested(value, &mut Vec::new())
}

fn repr_nested(value: &Value, active: &mut Vec<usize>) -> String {
    let container = cycle_marker(value);
    if let Some((id, marker)) = container {
        if active.contains(&id) {
            return marker.into();
        }
        if active.len() >= MAX_REPR_DEPTH {
            return "...".into();
        }
        active.push(id);
    }
    let text = match repr_with(value, &mut |item| Ok::<_, Infallible>(repr_nested(item, active))) {
        Ok(text) => text,
        Err(never) => match never {},
    };
    if container.is_some() {
        active.pop();
    }
    text
}

/// Identity of a container that can hold itself, and what `repr` prints
/// when it is reached again while still being rendered.
pub fn cycle_marker(value: &Value) -> Option<(usize, &'static str)> {
    match value {
        Value::List(list) => Some((Rc::as_ptr(list) as *const () as usize, "[...]")),
        Value::Dict(dict) => Some((Rc::as_ptr(dict) as *const () as usize, "{...}")),
        Value::Tuple(items) => Some((Rc::as_ptr(items) as *const () as usize, "(...)")),
        _ => None,
    }
}

/// Render a value as `str()` would, without calling user `__str__`.
pub fn display(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        Value::Exception(exc) => exc.message(),
        other => repr(other),
    }
}

/// Render `value`, delegating container elements to `item`.
pub fn repr_with<E>(
    value: &Value,
    item: &mut dyn FnMut(&Value) -> Result<String, E>,
) -> Result<String, E> {
    Ok(match value {
        Value::None => "None".into(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => quote(s),
        Value::List(list) => {
            let items = list.borrow().clone();
            format!("[{}]", joined(&items, item)?)
        }
        Value::Tuple(items) => {
            if items.len() == 1 {
                format!("({},)", item(&items[0])?)
            } else {
                format!("({})", joined(items, item)?)
            }
        }
        Value::Dict(dict) => {
            let entries: Vec<(Value, Value)> = dict
                .borrow()
                .iter()
                .map(|(k, v)| (k.value().clone(), v.clone()))
                .collect();
            let mut parts = Vec::with_capacity(entries.len());
            for (k, v) in &entries {
                parts.push(format!("{}: {}", item(k)?, item(v)?));
            }
            format!("{{{}}}", parts.join(", "))
        }
        Value::Set(set) => {
            let items: Vec<Value> = set.borrow().iter().map(|k| k.value().clone()).collect();
            if items.is_empty() {
                "set()".into()
            } else {
                format!("{{{}}}", joined(&items, item)?)
            }
        }
        Value::Range(range) => {
            if range.step == 1 {
                format!("range({}, {})", range.start, range.stop)
            } else {
                format!("range({}, {}, {})", range.start, range.stop, range.step)
            }
        }
        Value::Slice(slice) => format!(
            "slice({}, {}, {})",
            item(&slice.lower)?,
            item(&slice.upper)?,
            item(&slice.step)?
        ),
        Value::Iterator(_) => "<iterator object>".into(),
        Value::Function(f) => format!("<function {}>", f.name()),
        Value::Builtin(b) if super::builtins::is_type_name(b.name) => format!("<class '{}'>", b.name),
        Value::Builtin(b) => format!("<built-in function {}>", b.name),
        Value::BoundMethod(m) => match &m.function {
            Value::Function(f) => format!("<bound method {}>", f.name()),
            _ => "<bound method>".into(),
        },
        Value::NativeMethod(m) => format!(
            "<built-in method {} of {} object>",
            m.name,
            m.receiver.type_name()
        ),
        Value::Class(class) => format!("<class '{}'>", class.name),
        Value::ExceptionType(kind) => format!("<class '{}'>", kind.name()),
        Value::Instance(instance) => format!("<{} object>", instance.class.name),
        Value::Module(module) => format!("<module '{}'>", module.name),
        Value::Exception(exc) => {
            format!("{}({})", exc.kind.name(), joined(&exc.args, item)?)
        }
    })
}

fn joined<E>(
    items: &[Value],
    item: &mut dyn FnMut(&Value) -> Result<String, E>,
) -> Result<String, E> {
    let mut parts = Vec::with_capacity(items.len());
    for value in items {
        parts.push(item(value)?);
    }
    Ok(parts.join(", "))
}

/// Quote a string the way `repr()` does.
pub fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

/// Shortest round-trip float text, switching to exponent notation for very
/// large or small magnitudes.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0".into() } else { "0.0".into() };
    }
    let magnitude = f.abs();
    if !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{f:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exponent.abs())
            }
            None => text,
        };
    }
    let text = f.to_string();
    if text.contains('.') { text } else { format!("{text}.0") }
}

/// Truncate a rendering to `limit` characters, marking the cut with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(limit).collect();
        cut.push_str("...");
        cut
    }
}

// =============================================================================
// Format specs
// =============================================================================

#[derive(Debug, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: Option<usize>,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self, Exception> {
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = FormatSpec::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');

        if chars.len() >= 2 && is_align(chars[1]) {
            parsed.fill = Some(chars[0]);
            parsed.align = Some(chars[1]);
            i = 2;
        } else if !chars.is_empty() && is_align(chars[0]) {
            parsed.align = Some(chars[0]);
            i = 1;
        }
        if let Some(&c) = chars.get(i)
            && matches!(c, '+' | '-' | ' ')
        {
            parsed.sign = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            parsed.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            parsed.zero = true;
            i += 1;
        }
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > start {
            parsed.width = Some(field_size(&chars[start..i])?);
        }
        if let Some(&c) = chars.get(i)
            && matches!(c, ',' | '_')
        {
            parsed.grouping = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if i == start {
                return Err(Exception::value_error("Format specifier missing precision"));
            }
            parsed.precision = Some(field_size(&chars[start..i])?);
        }
        if let Some(&c) = chars.get(i) {
            parsed.kind = Some(c);
            i += 1;
        }
        if i != chars.len() {
            return Err(Exception::value_error(format!(
                "Invalid format specifier '{spec}'"
            )));
        }
        Ok(parsed)
    }
}

/// Widest width or precision a format spec may ask for.
const MAX_FIELD_SIZE: usize = 1 << 24;

fn field_size(digits: &[char]) -> Result<usize, Exception> {
    digits
        .iter()
        .collect::<String>()
        .parse()
        .ok()
        .filter(|&size| size <= MAX_FIELD_SIZE)
        .ok_or_else(|| Exception::value_error("Too many decimal digits in format string"))
}

/// Apply a format spec such as `>8.2f` to an already-evaluated value.
///
/// `text` is the value's `str()` rendering, used for non-numeric values.
pub fn format_value(value: &Value, text: &str, spec: &str) -> Result<String, Exception> {
    if spec.is_empty() {
        return Ok(text.to_string());
    }
    let spec = FormatSpec::parse(spec)?;
    let numeric = matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_));

    let body = match (spec.kind, value) {
        (Some('s') | None, _) if !numeric => {
            let mut s = text.to_string();
            if let Some(precision) = spec.precision {
                s = s.chars().take(precision).collect();
            }
            s
        }
        (Some('s'), _) => {
            return Err(Exception::value_error(format!(
                "Unknown format code 's' for object of type '{}'",
                value.type_name()
            )));
        }
        (Some(kind @ ('d' | 'n' | 'x' | 'X' | 'o' | 'b' | 'c')), _) => {
            let Some(i) = value.as_int() else {
                return Err(Exception::value_error(format!(
                    "Unknown format code '{kind}' for object of type '{}'",
                    value.type_name()
                )));
            };
            let digits = match kind {
                'x' => format!("{:x}", i.unsigned_abs()),
                'X' => format!("{:X}", i.unsigned_abs()),
                'o' => format!("{:o}", i.unsigned_abs()),
                'b' => format!("{:b}", i.unsigned_abs()),
                'c' => u32::try_from(i)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .ok_or_else(|| {
                        Exception::new(ExceptionKind::OverflowError, "%c arg not in range(0x110000)")
                    })?,
                _ => group(&i.unsigned_abs().to_string(), spec.grouping),
            };
            let prefix = match (spec.alternate, kind) {
                (true, 'x') => "0x",
                (true, 'X') => "0X",
                (true, 'o') => "0o",
                (true, 'b') => "0b",
                _ => "",
            };
            signed(i < 0, spec.sign, format!("{prefix}{digits}"))
        }
        (kind, _) => {
            let Some(f) = value.as_float() else {
                return Err(Exception::value_error(format!(
                    "Unknown format code '{}' for object of type '{}'",
                    kind.unwrap_or('s'),
                    value.type_name()
                )));
            };
            let negative = f.is_sign_negative() && f != 0.0;
            let magnitude = f.abs();
            let digits = match kind {
                Some('f' | 'F') => fixed(magnitude, spec.precision.unwrap_or(6), spec.grouping),
                Some('%') => format!("{}%", fixed(magnitude * 100.0, spec.precision.unwrap_or(6), spec.grouping)),
                Some('e' | 'E') => {
                    let text = exponent(magnitude, spec.precision.unwrap_or(6));
                    if kind == Some('E') { text.to_uppercase() } else { text }
                }
                Some('g' | 'G') => general(magnitude, spec.precision.unwrap_or(6)),
                None => match (value, spec.precision) {
                    (Value::Int(i), None) => group(&i.unsigned_abs().to_string(), spec.grouping),
                    (_, Some(p)) => general(magnitude, p.max(1)),
                    _ => {
                        let text = format_float(magnitude);
                        match text.split_once('.') {
                            Some((whole, frac)) if spec.grouping.is_some() => {
                                format!("{}.{frac}", group(whole, spec.grouping))
                            }
                            _ => text,
                        }
                    }
                },
                Some(other) => {
                    return Err(Exception::value_error(format!(
                        "Unknown format code '{other}' for object of type '{}'",
                        value.type_name()
                    )));
                }
            };
            signed(negative, spec.sign, digits)
        }
    };

    Ok(pad(body, &spec, numeric))
}

fn signed(negative: bool, sign: Option<char>, digits: String) -> String {
    match (negative, sign) {
        (true, _) => format!("-{digits}"),
        (false, Some('+')) => format!("+{digits}"),
        (false, Some(' ')) => format!(" {digits}"),
        _ => digits,
    }
}

fn fixed(f: f64, precision: usize, grouping: Option<char>) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    let text = format!("{f:.precision$}");
    match text.split_once('.') {
        Some((whole, frac)) => format!("{}.{frac}", group(whole, grouping)),
        None => group(&text, grouping),
    }
}

fn exponent(f: f64, precision: usize) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    let text = format!("{f:.precision$e}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => text,
    }
}

fn general(f: f64, precision: usize) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    if f == 0.0 {
        return "0".into();
    }
    let precision = precision.max(1);
    let exp = f.log10().floor() as i32;
    if exp < -4 || exp >= precision as i32 {
        let text = exponent(f, precision - 1);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", strip_zeros(mantissa)),
            None => text,
        }
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{f:.decimals$}"))
    }
}

fn strip_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

fn group(digits: &str, separator: Option<char>) -> String {
    let Some(separator) = separator else {
        return digits.to_string();
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn pad(body: String, spec: &FormatSpec, numeric: bool) -> String {
    let Some(width) = spec.width else {
        return body;
    };
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let missing = width - len;
    let (fill, align) = if spec.zero && spec.align.is_none() && numeric {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let fill_str = |n: usize| fill.to_string().repeat(n);
    match align {
        '<' => format!("{body}{}", fill_str(missing)),
        '^' => format!("{}{body}{}", fill_str(missing / 2), fill_str(missing - missing / 2)),
        '=' => {
            let (sign, rest) = match body.chars().next() {
                Some(c @ ('-' | '+' | ' ')) => (c.to_string(), &body[1..]),
                _ => (String::new(), body.as_str()),
            };
            format!("{sign}{}{rest}", fill_str(missing))
        }
        _ => format!("{}{body}", fill_str(missing)),
    }
}

// =============================================================================
// str.format templates
// =============================================================================

/// A replacement field of a `str.format` template.
#[derive(Debug, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Field {
        /// Positional index or keyword name; empty means "next positional".
        name: String,
        conversion: Option<char>,
        spec: String,
    },
}

/// Split a `str.format` template into literal text and replacement fields.
pub fn parse_template(template: &str) -> Result<Vec<TemplatePart>, Exception> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(Exception::value_error(
                    "Single '}' encountered in format string",
                ));
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                if !closed {
                    return Err(Exception::value_error(
                        "Single '{' encountered in format string",
                    ));
                }
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                let (head, spec) = match field.split_once(':') {
                    Some((head, spec)) => (head.to_string(), spec.to_string()),
                    None => (field, String::new()),
                };
                let (name, conversion) = match head.split_once('!') {
                    Some((name, conv)) => (name.to_string(), conv.chars().next()),
                    None => (head, None),
                };
                parts.push(TemplatePart::Field {
                    name,
                    conversion,
                    spec,
                });
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_repr() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_string_repr_quotes() {
        assert_eq!(quote("abc"), "'abc'");
        assert_eq!(quote("it's"), "\"it's\"");
        assert_eq!(quote("a\nb"), "'a\\nb'");
    }

    #[test]
    fn test_container_repr() {
        let value = Value::list(vec![
            Value::Int(1),
            Value::str("a"),
            Value::tuple(vec![Value::None]),
        ]);
        assert_eq!(repr(&value), "[1, 'a', (None,)]");
    }

    #[test]
    fn test_self_containing_containers_repr() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(repr(&list), "[1, [...]]");

        let dict = Value::dict(Default::default());
        if let Value::Dict(entries) = &dict {
            let key = super::super::value::HashKey::new(Value::str("me")).unwrap();
            entries.borrow_mut().insert(key, Value::tuple(vec![dict.clone()]));
        }
        assert_eq!(repr(&dict), "{'me': ({...},)}");
    }

    #[test]
    fn test_shared_container_is_not_a_cycle() {
        let inner = Value::list(vec![Value::Int(0)]);
        let outer = Value::list(vec![inner.clone(), inner]);
        assert_eq!(repr(&outer), "[[0], [0]]");
    }

    #[test]
    fn test_deep_nesting_repr_is_cut_off() {
        let mut value = Value::Int(0);
        for _ in 0..(MAX_REPR_DEPTH + 10) {
            value = Value::list(vec![value]);
        }
        let text = repr(&value);
        assert!(text.starts_with("[[[["));
        assert!(text.contains("..."));
    }

    #[test]
    fn test_format_specs() {
        assert_eq!(format_value(&Value::Float(3.14159), "", ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Int(42), "42", ">5").unwrap(), "   42");
        assert_eq!(format_value(&Value::Int(42), "42", "05d").unwrap(), "00042");
        assert_eq!(format_value(&Value::Int(1234567), "", ",").unwrap(), "1,234,567");
        assert_eq!(format_value(&Value::str("ab"), "ab", "*^6").unwrap(), "**ab**");
        assert_eq!(format_value(&Value::Float(0.25), "", ".0%").unwrap(), "25%");
        assert_eq!(format_value(&Value::Int(255), "", "#x").unwrap(), "0xff");
        assert_eq!(format_value(&Value::Float(12345.678), "", ".3g").unwrap(), "1.23e+04");
        assert_eq!(format_value(&Value::Float(-1.5), "", "+.1f").unwrap(), "-1.5");
    }

    #[test]
    fn test_char_format_range() {
        assert_eq!(format_value(&Value::Int(65), "65", "c").unwrap(), "A");
        let err = format_value(&Value::Int(-1), "-1", "c").unwrap_err();
        assert_eq!(err.to_string(), "OverflowError: %c arg not in range(0x110000)");
    }

    #[test]
    fn test_huge_field_sizes_are_rejected() {
        for spec in [">99999999999", ".99999999999f", "099999999999999999999999d"] {
            let err = format_value(&Value::Int(1), "1", spec).unwrap_err();
            assert_eq!(err.to_string(), "ValueError: Too many decimal digits in format string");
        }
    }

    #[test]
    fn test_bad_format_spec() {
        assert!(format_value(&Value::str("x"), "x", "d").is_err());
        assert!(format_value(&Value::Int(1), "1", "5.q").is_err());
    }

    #[test]
    fn test_parse_template() {
        let parts = parse_template("{} and {name!r:>4} {{x}}").unwrap();
        assert_eq!(
            parts,
            vec![
                TemplatePart::Field {
                    name: String::new(),
                    conversion: None,
                    spec: String::new()
                },
                TemplatePart::Literal(" and ".into()),
                TemplatePart::Field {
                    name: "name".into(),
                    conversion: Some('r'),
                    spec: ">4".into()
                },
                TemplatePart::Literal(" {x}".into()),
            ]
        );
        assert!(parse_template("{oops").is_err());
    }
}
