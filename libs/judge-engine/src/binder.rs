/// Argument Binder
///
/// Turns a test case's `input` (a JSON object of named arguments) into an
/// ordered argument list, then renders each value as a source literal for
/// the target language.
///
/// Key order is the object's order in the input text (serde_json is built
/// with `preserve_order`), and must match the parameter order of the
/// generated entry point.
use crate::error::BindError;
use judge_common::types::LanguageId;
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bindings {
    pub args: Vec<(String, Value)>,
}

impl Bindings {
    pub fn names(&self) -> Vec<&str> {
        self.args.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// A Java argument: declared parameter type plus the literal passed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaArg {
    pub ty: &'static str,
    pub literal: String,
}

/// Parse `input` into bindings.
///
/// Input that is not valid JSON, or not a JSON object, binds zero arguments.
pub fn bind(input: &str) -> Result<Bindings, BindError> {
    let object = match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            debug!(kind = json_kind(&other), "Test input is not an object; binding zero arguments");
            Map::new()
        }
        Err(e) => {
            debug!(error = %e, "Test input is not JSON; binding zero arguments");
            Map::new()
        }
    };

    let mut args = Vec::with_capacity(object.len());
    for (name, value) in object {
        if !is_identifier(&name) {
            return Err(BindError::InvalidName(name));
        }
        args.push((name, value));
    }

    Ok(Bindings { args })
}

/// Comma-separated argument literals for Python and JavaScript.
pub fn argument_list(language: LanguageId, bindings: &Bindings) -> Result<String, BindError> {
    let literals: Vec<String> = match language {
        LanguageId::Python => bindings.args.iter().map(|(_, v)| python_literal(v)).collect(),
        LanguageId::JavaScript => bindings.args.iter().map(|(_, v)| v.to_string()).collect(),
        LanguageId::Java => java_args(bindings)?.into_iter().map(|a| a.literal).collect(),
    };
    Ok(literals.join(", "))
}

pub fn java_args(bindings: &Bindings) -> Result<Vec<JavaArg>, BindError> {
    bindings
        .args
        .iter()
        .map(|(name, value)| {
            java_arg(value).ok_or_else(|| BindError::UnsupportedJavaValue {
                name: name.clone(),
                value: value.to_string(),
            })
        })
        .collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON value as a Python expression.
pub fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        // JSON string escapes are all valid in Python string literals
        Value::Number(_) | Value::String(_) => value.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), python_literal(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn java_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

enum JavaNumber {
    Int(i64),
    Long(i64),
    Double(f64),
}

fn java_number(n: &serde_json::Number) -> Option<JavaNumber> {
    if let Some(i) = n.as_i64() {
        if i32::try_from(i).is_ok() {
            Some(JavaNumber::Int(i))
        } else {
            Some(JavaNumber::Long(i))
        }
    } else if n.is_u64() {
        // Above i64::MAX: no primitive holds it
        None
    } else {
        n.as_f64().map(JavaNumber::Double)
    }
}

fn java_double(f: f64) -> String {
    // Debug keeps a fractional part or exponent, so javac reads a double
    format!("{:?}", f)
}

fn java_arg(value: &Value) -> Option<JavaArg> {
    let arg = match value {
        Value::Null => JavaArg { ty: "Object", literal: "null".to_string() },
        Value::Bool(b) => JavaArg { ty: "boolean", literal: b.to_string() },
        Value::String(s) => JavaArg { ty: "String", literal: java_string(s) },
        Value::Number(n) => match java_number(n)? {
            JavaNumber::Int(i) => JavaArg { ty: "int", literal: i.to_string() },
            JavaNumber::Long(i) => JavaArg { ty: "long", literal: format!("{}L", i) },
            JavaNumber::Double(f) => JavaArg { ty: "double", literal: java_double(f) },
        },
        Value::Array(items) => java_array(items)?,
        Value::Object(_) => return None,
    };
    Some(arg)
}

fn java_array(items: &[Value]) -> Option<JavaArg> {
    let array = |ty: &'static str, element: &str, literals: Vec<String>| JavaArg {
        ty,
        literal: format!("new {}[]{{{}}}", element, literals.join(", ")),
    };

    // An empty array binds as int[], the common case for these problems
    if items.iter().all(|v| v.is_i64()) {
        let ints: Vec<i64> = items.iter().filter_map(Value::as_i64).collect();
        if ints.iter().all(|i| i32::try_from(*i).is_ok()) {
            return Some(array("int[]", "int", ints.iter().map(|i| i.to_string()).collect()));
        }
        return Some(array("long[]", "long", ints.iter().map(|i| format!("{}L", i)).collect()));
    }
    if items.iter().all(|v| v.is_number()) {
        let doubles: Option<Vec<String>> =
            items.iter().map(|v| v.as_f64().map(java_double)).collect();
        return Some(array("double[]", "double", doubles?));
    }
    if items.iter().all(Value::is_boolean) {
        let bools = items.iter().map(|v| v.to_string()).collect();
        return Some(array("boolean[]", "boolean", bools));
    }
    if items.iter().all(Value::is_string) {
        let strings = items.iter().filter_map(Value::as_str).map(java_string).collect();
        return Some(array("String[]", "String", strings));
    }
    None
}
