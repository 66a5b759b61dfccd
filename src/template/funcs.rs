//! # Template Helpers
//!
//! Helpers callable from macro bodies. Each is a plain function from its
//! evaluated arguments, plus the shared data store, to a value; [`FnHelper`]
//! adapts it to Handlebars so it works both as `[[ upper .s ]]` and inside a
//! subexpression such as `[[ add 1 (mul 2 3) ]]`.
//!
//! Argument order keeps the subject last: `replace "a" "b" .s`.

use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, RenderErrorReason,
    ScopedJson,
};
use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use super::{print_value, truthy, type_name};

/// A template helper: arguments and the data store in, a value or a message out.
pub type TemplateFn = fn(&[Value], &Value) -> Result<Value, String>;

/// The longest string `repeat` will build, in bytes.
pub const MAX_REPEAT_BYTES: usize = 1 << 20;

/// Context key holding the shared data store.
const DATA_KEY: &str = "data";

/// Every helper installed in a fresh engine.
pub static STANDARD_HELPERS: &[(&str, TemplateFn)] = &[
    // Strings
    ("upper", FN_UPPER),
    ("lower", FN_LOWER),
    ("title", FN_TITLE),
    ("trim", FN_TRIM),
    ("replace", FN_REPLACE),
    ("repeat", FN_REPEAT),
    ("split", FN_SPLIT),
    ("join", FN_JOIN),
    ("contains", FN_CONTAINS),
    ("hasPrefix", FN_HAS_PREFIX),
    ("hasSuffix", FN_HAS_SUFFIX),
    ("len", FN_LEN),
    ("print", FN_PRINT),
    // Arithmetic
    ("add", FN_ADD),
    ("sub", FN_SUB),
    ("mul", FN_MUL),
    ("div", FN_DIV),
    ("mod", FN_MOD),
    // Comparison and logic
    ("eq", FN_EQ),
    ("ne", FN_NE),
    ("lt", FN_LT),
    ("le", FN_LE),
    ("gt", FN_GT),
    ("ge", FN_GE),
    ("and", FN_AND),
    ("or", FN_OR),
    ("not", FN_NOT),
    ("default", FN_DEFAULT),
    // Data store
    ("getdata", FN_GETDATA),
];

/// Runs a [`TemplateFn`] as a Handlebars helper.
#[derive(Clone, Copy)]
pub struct FnHelper(pub TemplateFn);

impl HelperDef for FnHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let args: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        let data = ctx.data().get(DATA_KEY).unwrap_or(&Value::Null);
        (self.0)(&args, data)
            .map(ScopedJson::Derived)
            .map_err(|message| {
                RenderErrorReason::Other(format!("{}: {}", h.name(), message)).into()
            })
    }
}

// ============================================================================
// ARGUMENT HELPERS
// ============================================================================

fn arity(args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!(
            "wrong number of args: want {}, got {}",
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn string(value: &Value) -> Result<String, String> {
    match value {
        Value::Array(_) | Value::Object(_) => {
            Err(format!("expected a string, got {}", type_name(value)))
        }
        other => Ok(print_value(other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::Number(i.into()),
            Num::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

fn number(value: &Value) -> Result<Num, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Num::Int)
            .or_else(|| n.as_f64().map(Num::Float))
            .ok_or_else(|| format!("number {} out of range", n)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Num::Int)
            .or_else(|_| s.trim().parse::<f64>().map(Num::Float))
            .map_err(|_| format!("expected a number, got {:?}", s)),
        other => Err(format!("expected a number, got {}", type_name(other))),
    }
}

fn arithmetic(
    args: &[Value],
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value, String> {
    arity(args, 2)?;
    match (number(&args[0])?, number(&args[1])?) {
        (Num::Int(a), Num::Int(b)) => int(a, b)
            .map(|n| Num::Int(n).into_value())
            .ok_or_else(|| "integer overflow or division by zero".to_string()),
        (a, b) => Ok(Num::Float(float(a.as_f64(), b.as_f64())).into_value()),
    }
}

/// Equality that treats `1` and `1.0` as equal and compares other values
/// structurally.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => match (number(a), number(b)) {
            (Ok(x), Ok(y)) => x.as_f64() == y.as_f64(),
            _ => false,
        },
        _ => a == b,
    }
}

fn compare(args: &[Value]) -> Result<std::cmp::Ordering, String> {
    arity(args, 2)?;
    match (&args[0], &args[1]) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (a, b) => {
            let (x, y) = (number(a)?.as_f64(), number(b)?.as_f64());
            x.partial_cmp(&y)
                .ok_or_else(|| "incomparable values".to_string())
        }
    }
}

fn bool_value(b: bool) -> Value {
    Value::Bool(b)
}

// ============================================================================
// STRINGS
// ============================================================================

/// Usage: upper <s>
pub const FN_UPPER: TemplateFn = |args, _data| {
    arity(args, 1)?;
    Ok(Value::String(string(&args[0])?.to_uppercase()))
};

/// Usage: lower <s>
pub const FN_LOWER: TemplateFn = |args, _data| {
    arity(args, 1)?;
    Ok(Value::String(string(&args[0])?.to_lowercase()))
};

/// Capitalizes the first letter of every word.
///
/// Usage: title <s>
pub const FN_TITLE: TemplateFn = |args, _data| {
    arity(args, 1)?;
    let s = string(&args[0])?;
    let titled: String = s
        .split_word_bounds()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) if first.is_alphabetic() => {
                    first.to_uppercase().chain(chars).collect::<String>()
                }
                _ => word.to_string(),
            }
        })
        .collect();
    Ok(Value::String(titled))
};

/// Usage: trim <s>
pub const FN_TRIM: TemplateFn = |args, _data| {
    arity(args, 1)?;
    Ok(Value::String(string(&args[0])?.trim().to_string()))
};

/// Usage: replace <old> <new> <s>
pub const FN_REPLACE: TemplateFn = |args, _data| {
    arity(args, 3)?;
    let (old, new, s) = (string(&args[0])?, string(&args[1])?, string(&args[2])?);
    Ok(Value::String(s.replace(&old, &new)))
};

/// Usage: repeat <count> <s>
pub const FN_REPEAT: TemplateFn = |args, _data| {
    arity(args, 2)?;
    let count = match number(&args[0])? {
        Num::Int(n) => usize::try_from(n)
            .map_err(|_| "repeat count must be a non-negative integer".to_string())?,
        Num::Float(_) => return Err("repeat count must be a non-negative integer".to_string()),
    };
    let s = string(&args[1])?;
    match s.len().checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_BYTES => Ok(Value::String(s.repeat(count))),
        _ => Err(format!("result would exceed {} bytes", MAX_REPEAT_BYTES)),
    }
};

/// Usage: split <sep> <s>
pub const FN_SPLIT: TemplateFn = |args, _data| {
    arity(args, 2)?;
    let (sep, s) = (string(&args[0])?, string(&args[1])?);
    Ok(Value::Array(
        s.split(sep.as_str())
            .map(|part| Value::String(part.to_string()))
            .collect(),
    ))
};

/// Usage: join <sep> <list>
pub const FN_JOIN: TemplateFn = |args, _data| {
    arity(args, 2)?;
    let sep = string(&args[0])?;
    match &args[1] {
        Value::Array(items) => Ok(Value::String(
            items.iter().map(print_value).collect::<Vec<_>>().join(&sep),
        )),
        other => Err(format!("join expects a sequence, got {}", type_name(other))),
    }
};

/// Substring test, or membership for a sequence.
///
/// Usage: contains <needle> <s|list>
pub const FN_CONTAINS: TemplateFn = |args, _data| {
    arity(args, 2)?;
    match &args[1] {
        Value::Array(items) => Ok(bool_value(
            items.iter().any(|item| values_equal(item, &args[0])),
        )),
        haystack => Ok(bool_value(string(haystack)?.contains(&string(&args[0])?))),
    }
};

/// Usage: hasPrefix <prefix> <s>
pub const FN_HAS_PREFIX: TemplateFn = |args, _data| {
    arity(args, 2)?;
    Ok(bool_value(string(&args[1])?.starts_with(&string(&args[0])?)))
};

/// Usage: hasSuffix <suffix> <s>
pub const FN_HAS_SUFFIX: TemplateFn = |args, _data| {
    arity(args, 2)?;
    Ok(bool_value(string(&args[1])?.ends_with(&string(&args[0])?)))
};

/// Grapheme clusters in a string, items in a sequence or entries in a map.
pub const FN_LEN: TemplateFn = |args, _data| {
    arity(args, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.graphemes(true).count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(format!("len of {}", type_name(other))),
    };
    Ok(Value::from(len))
};

/// Concatenates the printed form of every argument.
pub const FN_PRINT: TemplateFn = |args, _data| {
    Ok(Value::String(args.iter().map(print_value).collect()))
};

// ============================================================================
// ARITHMETIC
// ============================================================================

pub const FN_ADD: TemplateFn = |args, _data| arithmetic(args, i64::checked_add, |a, b| a + b);

pub const FN_SUB: TemplateFn = |args, _data| arithmetic(args, i64::checked_sub, |a, b| a - b);

pub const FN_MUL: TemplateFn = |args, _data| arithmetic(args, i64::checked_mul, |a, b| a * b);

pub const FN_DIV: TemplateFn = |args, _data| {
    arity(args, 2)?;
    if number(&args[1])?.as_f64() == 0.0 {
        return Err("division by zero".to_string());
    }
    arithmetic(args, i64::checked_div, |a, b| a / b)
};

pub const FN_MOD: TemplateFn = |args, _data| {
    arity(args, 2)?;
    if number(&args[1])?.as_f64() == 0.0 {
        return Err("division by zero".to_string());
    }
    arithmetic(args, i64::checked_rem, |a, b| a % b)
};

// ============================================================================
// COMPARISON AND LOGIC
// ============================================================================

/// True when the first argument equals any of the others.
///
/// Usage: eq <a> <b> [<c> ...]
pub const FN_EQ: TemplateFn = |args, _data| {
    if args.len() < 2 {
        return Err("eq needs at least two arguments".to_string());
    }
    Ok(bool_value(
        args[1..].iter().any(|other| values_equal(&args[0], other)),
    ))
};

pub const FN_NE: TemplateFn = |args, _data| {
    arity(args, 2)?;
    Ok(bool_value(!values_equal(&args[0], &args[1])))
};

pub const FN_LT: TemplateFn = |args, _data| Ok(bool_value(compare(args)?.is_lt()));

pub const FN_LE: TemplateFn = |args, _data| Ok(bool_value(compare(args)?.is_le()));

pub const FN_GT: TemplateFn = |args, _data| Ok(bool_value(compare(args)?.is_gt()));

pub const FN_GE: TemplateFn = |args, _data| Ok(bool_value(compare(args)?.is_ge()));

/// The first false argument, or the last one.
pub const FN_AND: TemplateFn = |args, _data| {
    let found = args.iter().find(|arg| !truthy(arg)).or(args.last());
    Ok(found.cloned().unwrap_or(Value::Bool(true)))
};

/// The first true argument, or the last one.
pub const FN_OR: TemplateFn = |args, _data| {
    let found = args.iter().find(|arg| truthy(arg)).or(args.last());
    Ok(found.cloned().unwrap_or(Value::Bool(false)))
};

pub const FN_NOT: TemplateFn = |args, _data| {
    arity(args, 1)?;
    Ok(bool_value(!truthy(&args[0])))
};

/// The given value when it is true, otherwise the fallback.
///
/// Usage: default <fallback> <value>
pub const FN_DEFAULT: TemplateFn = |args, _data| {
    match args {
        [fallback] => Ok(fallback.clone()),
        [fallback, value] => Ok(if truthy(value) {
            value.clone()
        } else {
            fallback.clone()
        }),
        _ => Err(format!("wrong number of args: want 1 or 2, got {}", args.len())),
    }
};

// ============================================================================
// DATA STORE
// ============================================================================

/// Reads the shared data store by dotted path. Missing keys are an error.
///
/// Usage: getdata <path>
pub const FN_GETDATA: TemplateFn = |args, data| {
    arity(args, 1)?;
    let path = string(&args[0])?;
    let mut current = data;
    for key in path.split('.').filter(|k| !k.is_empty()) {
        current = match current {
            Value::Object(map) => map
                .get(key)
                .ok_or_else(|| format!("map has no entry for key {:?}", key))?,
            other => return Err(format!("can't read {:?} of {}", key, type_name(other))),
        };
    }
    Ok(current.clone())
};

#[cfg(test)]
mod tests {
    use super::*;

    fn helper(name: &str) -> TemplateFn {
        STANDARD_HELPERS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
            .unwrap()
    }

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        helper(name)(args, &Value::Null)
    }

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    fn n(i: i64) -> Value {
        Value::from(i)
    }

    #[test]
    fn title_capitalizes_words() {
        assert_eq!(call("title", &[s("hello wide world")]).unwrap(), s("Hello Wide World"));
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(call("add", &[n(2), n(3)]).unwrap(), n(5));
        assert_eq!(call("mod", &[n(7), n(3)]).unwrap(), n(1));
        assert!(call("div", &[n(1), n(0)]).is_err());
        assert_eq!(call("mul", &[s("4"), n(2)]).unwrap(), n(8));
        assert!(call("add", &[n(i64::MAX), n(1)]).is_err());
    }

    #[test]
    fn comparisons() {
        assert_eq!(call("eq", &[n(1), n(2), n(1)]).unwrap(), Value::Bool(true));
        assert_eq!(call("lt", &[s("a"), s("b")]).unwrap(), Value::Bool(true));
        assert_eq!(call("ge", &[n(2), n(3)]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn default_prefers_true_value() {
        assert_eq!(call("default", &[s("x"), s("")]).unwrap(), s("x"));
        assert_eq!(call("default", &[s("x"), s("y")]).unwrap(), s("y"));
    }

    #[test]
    fn getdata_walks_dotted_path() {
        let data = serde_json::json!({"site": {"name": "Folio"}});
        let get = helper("getdata");
        assert_eq!(get(&[s("site.name")], &data).unwrap(), s("Folio"));
        assert_eq!(
            get(&[s("site.url")], &data).unwrap_err(),
            r#"map has no entry for key "url""#
        );
    }

    #[test]
    fn split_and_join() {
        let parts = call("split", &[s(","), s("a,b")]).unwrap();
        assert_eq!(call("join", &[s("-"), parts]).unwrap(), s("a-b"));
    }

    #[test]
    fn len_counts_graphemes() {
        assert_eq!(call("len", &[s("e\u{301}a")]).unwrap(), n(2));
        assert_eq!(call("len", &[serde_json::json!([1, 2, 3])]).unwrap(), n(3));
    }

    #[test]
    fn repeat_refuses_huge_results() {
        assert_eq!(call("repeat", &[n(3), s("ab")]).unwrap(), s("ababab"));
        let err = call("repeat", &[n(i64::MAX), s("ab")]).unwrap_err();
        assert!(err.contains("exceed"), "{err}");
        assert!(call("repeat", &[n(-1), s("ab")]).is_err());
    }
}
