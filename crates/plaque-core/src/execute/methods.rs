//! Methods of the builtin container and string types.

use indexmap::IndexSet;

use super::format::{self, TemplatePart};
use super::interpreter::Interpreter;
use super::ops::sequence_index;
use super::value::{Args, Exception, HashKey, Value};

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "join", "replace", "startswith",
    "endswith", "find", "count", "format", "title", "isdigit",
];

const LIST_METHODS: &[&str] = &[
    "append", "extend", "pop", "insert", "remove", "index", "count", "sort", "reverse", "copy",
    "clear",
];

const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "update", "setdefault", "copy", "clear",
];

const SET_METHODS: &[&str] = &[
    "add", "remove", "discard", "union", "intersection", "difference",
];

/// Whether `value` has a native method called `name`.
pub fn has_method(value: &Value, name: &str) -> bool {
    let table = match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

/// Call the native method `name` on `receiver`.
pub fn call_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: Args,
) -> Result<Value, Exception> {
    match receiver {
        Value::Str(text) => str_method(interp, text, name, args),
        Value::List(_) => list_method(interp, receiver, name, args),
        Value::Dict(_) => dict_method(interp, receiver, name, args),
        Value::Set(_) => set_method(interp, receiver, name, args),
        other => Err(Exception::attribute_error(other, name)),
    }
}

fn str_param<'a>(value: &'a Value, method: &str) -> Result<&'a str, Exception> {
    value.as_str().ok_or_else(|| {
        Exception::type_error(format!(
            "{method}() argument must be str, not {}",
            value.type_name()
        ))
    })
}

// =============================================================================
// str
// =============================================================================

fn str_method(interp: &mut Interpreter, text: &str, name: &str, args: Args) -> Result<Value, Exception> {
    match name {
        "upper" | "lower" | "title" | "isdigit" => {
            args.check(name, 0, 0, &[])?;
            Ok(match name {
                "upper" => Value::str(text.to_uppercase()),
                "lower" => Value::str(text.to_lowercase()),
                "title" => Value::str(title_case(text)),
                _ => Value::Bool(!text.is_empty() && text.chars().all(|c| c.is_ascii_digit())),
            })
        }
        "strip" | "lstrip" | "rstrip" => {
            args.check(name, 0, 1, &[])?;
            let chars: Option<Vec<char>> = match args.get(0) {
                None | Some(Value::None) => None,
                Some(value) => Some(str_param(value, name)?.chars().collect()),
            };
            let strip = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Ok(Value::str(match name {
                "strip" => text.trim_matches(strip),
                "lstrip" => text.trim_start_matches(strip),
                _ => text.trim_end_matches(strip),
            }))
        }
        "split" => {
            args.check(name, 0, 2, &["sep", "maxsplit"])?;
            let sep = args.get(0).or(args.keyword("sep")).filter(|v| !v.is_none());
            let maxsplit = match args.get(1).or(args.keyword("maxsplit")) {
                Some(value) => value.as_int().unwrap_or(-1),
                None => -1,
            };
            let limit = usize::try_from(maxsplit).ok();
            let parts: Vec<Value> = match sep {
                Some(sep) => {
                    let sep = str_param(sep, name)?;
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    match limit {
                        Some(n) => text.splitn(n + 1, sep).map(Value::str).collect(),
                        None => text.split(sep).map(Value::str).collect(),
                    }
                }
                None => split_whitespace(text, limit).into_iter().map(Value::str).collect(),
            };
            Ok(Value::list(parts))
        }
        "join" => {
            args.check(name, 1, 1, &[])?;
            let mut pieces = Vec::new();
            for (i, item) in interp.iterate(&args.positional[0])?.enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece.to_string()),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::str(pieces.join(text)))
        }
        "replace" => {
            args.check(name, 2, 3, &[])?;
            let old = str_param(&args.positional[0], name)?;
            let new = str_param(&args.positional[1], name)?;
            match args.get(2).and_then(Value::as_int) {
                Some(count) if count >= 0 => Ok(Value::str(text.replacen(old, new, count as usize))),
                _ => Ok(Value::str(text.replace(old, new))),
            }
        }
        "startswith" | "endswith" => {
            args.check(name, 1, 1, &[])?;
            let candidates = match &args.positional[0] {
                Value::Tuple(items) => items.to_vec(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let affix = str_param(candidate, name)?;
                let hit = if name == "startswith" {
                    text.starts_with(affix)
                } else {
                    text.ends_with(affix)
                };
                if hit {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "find" => {
            args.check(name, 1, 1, &[])?;
            let needle = str_param(&args.positional[0], name)?;
            Ok(Value::Int(match text.find(needle) {
                Some(byte) => text[..byte].chars().count() as i64,
                None => -1,
            }))
        }
        "count" => {
            args.check(name, 1, 1, &[])?;
            let needle = str_param(&args.positional[0], name)?;
            let count = if needle.is_empty() {
                text.chars().count() + 1
            } else {
                text.matches(needle).count()
            };
            Ok(Value::Int(count as i64))
        }
        "format" => str_format(interp, text, &args),
        _ => Err(Exception::attribute_error(&Value::str(text), name)),
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_cased = false;
    for c in text.chars() {
        if previous_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_cased = c.is_alphabetic();
    }
    out
}

fn split_whitespace(text: &str, limit: Option<usize>) -> Vec<&str> {
    let Some(limit) = limit else {
        return text.split_whitespace().collect();
    };
    let mut parts = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        if parts.len() == limit {
            parts.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }
    parts
}

fn str_format(interp: &mut Interpreter, template: &str, args: &Args) -> Result<Value, Exception> {
    let mut out = String::new();
    let mut next_auto = 0usize;
    for part in format::parse_template(template)? {
        let (name, conversion, spec) = match part {
            TemplatePart::Literal(text) => {
                out.push_str(&text);
                continue;
            }
            TemplatePart::Field { name, conversion, spec } => (name, conversion, spec),
        };

        let mut path = name.split('.');
        let head = path.next().unwrap_or_default();
        let mut value = if head.is_empty() {
            let value = args.get(next_auto).cloned();
            next_auto += 1;
            value.ok_or_else(|| {
                Exception::index_error(format!(
                    "Replacement index {} out of range for positional args tuple",
                    next_auto - 1
                ))
            })?
        } else if let Ok(index) = head.parse::<usize>() {
            args.get(index).cloned().ok_or_else(|| {
                Exception::index_error(format!(
                    "Replacement index {index} out of range for positional args tuple"
                ))
            })?
        } else {
            args.keyword(head)
                .cloned()
                .ok_or_else(|| Exception::key_error(&Value::str(head)))?
        };
        for attr in path {
            value = interp.get_attr(&value, attr)?;
        }

        let text = match conversion {
            Some('r') => interp.repr(&value)?,
            Some('s') | None => interp.to_str(&value)?,
            Some(other) => {
                return Err(Exception::value_error(format!(
                    "Unknown conversion specifier {other}"
                )));
            }
        };
        let formatted = if conversion.is_some() {
            format::format_value(&Value::str(&text), &text, &spec)?
        } else {
            format::format_value(&value, &text, &spec)?
        };
        out.push_str(&formatted);
    }
    Ok(Value::str(out))
}

// =============================================================================
// list
// =============================================================================

fn list_method(interp: &mut Interpreter, receiver: &Value, name: &str, args: Args) -> Result<Value, Exception> {
    let Value::List(items) = receiver else {
        return Err(Exception::attribute_error(receiver, name));
    };
    match name {
        "append" => {
            args.check(name, 1, 1, &[])?;
            items.borrow_mut().push(args.positional[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            args.check(name, 1, 1, &[])?;
            let extra: Vec<Value> = interp.iterate(&args.positional[0])?.collect();
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "pop" => {
            args.check(name, 0, 1, &[])?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Exception::index_error("pop from empty list"));
            }
            let index = match args.get(0) {
                Some(index) => sequence_index(index, items.len(), "pop")?,
                None => items.len() - 1,
            };
            Ok(items.remove(index))
        }
        "insert" => {
            args.check(name, 2, 2, &[])?;
            let position = args.positional[0].as_int().ok_or_else(|| {
                Exception::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    args.positional[0].type_name()
                ))
            })?;
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let index = if position < 0 { (position + len).max(0) } else { position.min(len) };
            items.insert(index as usize, args.positional[1].clone());
            Ok(Value::None)
        }
        "remove" | "index" => {
            args.check(name, 1, 1, &[])?;
            let target = &args.positional[0];
            let snapshot = items.borrow().clone();
            for (i, item) in snapshot.iter().enumerate() {
                if interp.equals(item, target)? {
                    if name == "remove" {
                        items.borrow_mut().remove(i);
                        return Ok(Value::None);
                    }
                    return Ok(Value::Int(i as i64));
                }
            }
            let message = if name == "remove" {
                "list.remove(x): x not in list".to_string()
            } else {
                format!("{} is not in list", interp.repr(target)?)
            };
            Err(Exception::value_error(message))
        }
        "count" => {
            args.check(name, 1, 1, &[])?;
            let snapshot = items.borrow().clone();
            let mut count = 0;
            for item in &snapshot {
                if interp.equals(item, &args.positional[0])? {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }
        "sort" => {
            args.check(name, 0, 0, &["key", "reverse"])?;
            let reverse = args.keyword("reverse").is_some_and(Value::truthy);
            let snapshot = items.borrow().clone();
            let sorted = interp.sort_values(snapshot, args.keyword("key"), reverse)?;
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "reverse" => {
            args.check(name, 0, 0, &[])?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "copy" => {
            args.check(name, 0, 0, &[])?;
            Ok(Value::list(items.borrow().clone()))
        }
        "clear" => {
            args.check(name, 0, 0, &[])?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(Exception::attribute_error(receiver, name)),
    }
}

// =============================================================================
// dict
// =============================================================================

fn dict_method(interp: &mut Interpreter, receiver: &Value, name: &str, args: Args) -> Result<Value, Exception> {
    let Value::Dict(entries) = receiver else {
        return Err(Exception::attribute_error(receiver, name));
    };
    match name {
        "get" => {
            args.check(name, 1, 2, &[])?;
            let key = HashKey::new(args.positional[0].clone())?;
            let found = entries.borrow().get(&key).cloned();
            Ok(found.or_else(|| args.get(1).cloned()).unwrap_or(Value::None))
        }
        "keys" | "values" | "items" => {
            args.check(name, 0, 0, &[])?;
            let entries = entries.borrow();
            Ok(Value::list(match name {
                "keys" => entries.keys().map(|k| k.value().clone()).collect(),
                "values" => entries.values().cloned().collect(),
                _ => entries
                    .iter()
                    .map(|(k, v)| Value::tuple(vec![k.value().clone(), v.clone()]))
                    .collect(),
            }))
        }
        "pop" => {
            args.check(name, 1, 2, &[])?;
            let key = HashKey::new(args.positional[0].clone())?;
            let removed = entries.borrow_mut().shift_remove(&key);
            match (removed, args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Exception::key_error(&args.positional[0])),
            }
        }
        "update" => {
            if args.len() > 1 {
                return Err(Exception::type_error(format!(
                    "update expected at most 1 argument, got {}",
                    args.len()
                )));
            }
            let mut updates = Vec::new();
            match args.get(0) {
                Some(Value::Dict(other)) => {
                    updates.extend(other.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                Some(iterable) => {
                    for pair in interp.iterate(iterable)? {
                        let pair = pair.to_vec()?;
                        let [key, value] = <[Value; 2]>::try_from(pair).map_err(|_| {
                            Exception::value_error("dictionary update sequence element has wrong length")
                        })?;
                        updates.push((HashKey::new(key)?, value));
                    }
                }
                None => {}
            }
            for (key, value) in &args.keywords {
                updates.push((HashKey::new(Value::str(key))?, value.clone()));
            }
            entries.borrow_mut().extend(updates);
            Ok(Value::None)
        }
        "setdefault" => {
            args.check(name, 1, 2, &[])?;
            let key = HashKey::new(args.positional[0].clone())?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            Ok(entries.borrow_mut().entry(key).or_insert(default).clone())
        }
        "copy" => {
            args.check(name, 0, 0, &[])?;
            Ok(Value::dict(entries.borrow().clone()))
        }
        "clear" => {
            args.check(name, 0, 0, &[])?;
            entries.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(Exception::attribute_error(receiver, name)),
    }
}

// =============================================================================
// set
// =============================================================================

fn set_method(interp: &mut Interpreter, receiver: &Value, name: &str, args: Args) -> Result<Value, Exception> {
    let Value::Set(items) = receiver else {
        return Err(Exception::attribute_error(receiver, name));
    };
    match name {
        "add" | "remove" | "discard" => {
            args.check(name, 1, 1, &[])?;
            let key = HashKey::new(args.positional[0].clone())?;
            let mut items = items.borrow_mut();
            match name {
                "add" => {
                    items.insert(key);
                }
                "remove" => {
                    if !items.shift_remove(&key) {
                        return Err(Exception::key_error(&args.positional[0]));
                    }
                }
                _ => {
                    items.shift_remove(&key);
                }
            }
            Ok(Value::None)
        }
        "union" | "intersection" | "difference" => {
            let mut result: IndexSet<HashKey> = items.borrow().clone();
            for other in &args.positional {
                let mut other_keys = IndexSet::new();
                for item in interp.iterate(other)? {
                    other_keys.insert(HashKey::new(item)?);
                }
                result = match name {
                    "union" => result.union(&other_keys).cloned().collect(),
                    "intersection" => result.intersection(&other_keys).cloned().collect(),
                    _ => result.difference(&other_keys).cloned().collect(),
                };
            }
            Ok(Value::set(result))
        }
        _ => Err(Exception::attribute_error(receiver, name)),
    }
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
    fn test_str_methods() {
        assert_eq!(eval("'  Hi  '.strip(), 'xxhixx'.strip('x'), 'ab'.upper()").unwrap(), "('Hi', 'hi', 'AB')");
        assert_eq!(eval("'a,b,,c'.split(','), ' a  b '.split(), 'a b c'.split(None, 1)").unwrap(), "(['a', 'b', '', 'c'], ['a', 'b'], ['a', 'b c'])");
        assert_eq!(eval("'-'.join(['a', 'b']), 'aaa'.replace('a', 'b', 2)").unwrap(), "('a-b', 'bba')");
        assert_eq!(eval("'héllo'.find('l'), 'banana'.count('an'), 'x'.find('y')").unwrap(), "(2, 2, -1)");
        assert_eq!(eval("'hello world'.title(), '123'.isdigit(), ''.isdigit()").unwrap(), "('Hello World', True, False)");
        assert_eq!(eval("'file.py'.endswith(('.rs', '.py'))").unwrap(), "True");
        assert_eq!(
            eval("'-'.join([1])").unwrap_err(),
            "TypeError: sequence item 0: expected str instance, int found"
        );
    }

    #[test]
    fn test_str_format() {
        assert_eq!(eval("'{} + {} = {total}'.format(1, 2, total=3)").unwrap(), "'1 + 2 = 3'");
        assert_eq!(eval("'{0}{1}{0}'.format('a', 'b')").unwrap(), "'aba'");
        assert_eq!(eval("'{:>5}|{:.2f}|{!r}'.format('x', 3.14159, 'q')").unwrap(), "\"    x|3.14|'q'\"");
    }

    #[test]
    fn test_list_methods() {
        let source = "\
xs = [3, 1, 2]
xs.append(4)
xs.extend([5])
xs.insert(0, 9)
last = xs.pop()
xs.remove(9)
xs.sort()
(xs, last, xs.index(3), xs.count(1))
";
        assert_eq!(eval(source).unwrap(), "([1, 2, 3, 4], 5, 2, 1)");
        assert_eq!(eval("[].pop()").unwrap_err(), "IndexError: pop from empty list");
        assert_eq!(eval("[1].index(2)").unwrap_err(), "ValueError: 2 is not in list");
    }

    #[test]
    fn test_sort_keeps_list_on_error() {
        let source = "\
xs = [2, 'a', 1]
try:
    xs.sort()
except TypeError:
    pass
xs
";
        assert_eq!(eval(source).unwrap(), "[2, 'a', 1]");
    }

    #[test]
    fn test_dict_methods() {
        let source = "\
d = {'a': 1}
d.update({'b': 2}, c=3)
d.setdefault('a', 100)
d.setdefault('z', 0)
gone = d.pop('z')
(d.get('a'), d.get('q', -1), d.keys(), d.items()[1], gone)
";
        assert_eq!(eval(source).unwrap(), "(1, -1, ['a', 'b', 'c'], ('b', 2), 0)");
        assert_eq!(eval("{}.pop('k')").unwrap_err(), "KeyError: 'k'");
    }

    #[test]
    fn test_set_methods() {
        let source = "\
s = {1, 2}
s.add(3)
s.discard(10)
(s.union([4]), s.intersection({2, 3, 7}), s.difference([1]))
";
        assert_eq!(eval(source).unwrap(), "({1, 2, 3, 4}, {2, 3}, {2, 3})");
        assert_eq!(eval("{1}.remove(5)").unwrap_err(), "KeyError: 5");
    }
}
