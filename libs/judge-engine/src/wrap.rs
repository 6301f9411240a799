//! Wrapping templates: a bare function body plus bound arguments become a
//! complete program that calls the entry point once and prints its result.

use crate::binder::{self, Bindings};
use crate::error::BindError;
use crate::language::JAVA_MAIN_CLASS;
use judge_common::types::LanguageId;

/// How the Java driver prints the entry point's return value.
///
/// The entry point is declared to return `Object`, so any body compiles
/// whatever it returns. The driver's `render` helper is generated from this
/// table: one branch per shape, tried in `ALL` order, `Scalar` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Null,
    IntArray,
    LongArray,
    DoubleArray,
    BooleanArray,
    StringArray,
    ObjectArray,
    /// Any other array (`char[]`, `float[]`, ...).
    UnsupportedArray,
    Scalar,
}

impl ReturnShape {
    pub const ALL: [ReturnShape; 9] = [
        ReturnShape::Null,
        ReturnShape::IntArray,
        ReturnShape::LongArray,
        ReturnShape::DoubleArray,
        ReturnShape::BooleanArray,
        ReturnShape::StringArray,
        ReturnShape::ObjectArray,
        ReturnShape::UnsupportedArray,
        ReturnShape::Scalar,
    ];

    /// Java condition on `result` selecting this shape; `None` always matches.
    fn java_test(&self) -> Option<&'static str> {
        match self {
            ReturnShape::Null => Some("result == null"),
            ReturnShape::IntArray => Some("result instanceof int[]"),
            ReturnShape::LongArray => Some("result instanceof long[]"),
            ReturnShape::DoubleArray => Some("result instanceof double[]"),
            ReturnShape::BooleanArray => Some("result instanceof boolean[]"),
            ReturnShape::StringArray => Some("result instanceof String[]"),
            ReturnShape::ObjectArray => Some("result instanceof Object[]"),
            ReturnShape::UnsupportedArray => Some("result.getClass().isArray()"),
            ReturnShape::Scalar => None,
        }
    }

    fn java_render(&self) -> &'static str {
        match self {
            ReturnShape::Null => "\"null\"",
            ReturnShape::IntArray => "Arrays.toString((int[]) result)",
            ReturnShape::LongArray => "Arrays.toString((long[]) result)",
            ReturnShape::DoubleArray => "Arrays.toString((double[]) result)",
            ReturnShape::BooleanArray => "Arrays.toString((boolean[]) result)",
            ReturnShape::StringArray => "Arrays.toString((String[]) result)",
            ReturnShape::ObjectArray => "Arrays.deepToString((Object[]) result)",
            ReturnShape::UnsupportedArray => "\"Unsupported array type\"",
            ReturnShape::Scalar => "String.valueOf(result)",
        }
    }
}

/// Body of the driver's `static String render(Object result)`.
fn java_renderer() -> String {
    ReturnShape::ALL
        .iter()
        .map(|shape| match shape.java_test() {
            Some(test) => format!("        if ({}) return {};", test, shape.java_render()),
            None => format!("        return {};", shape.java_render()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate the full artifact source for one test case.
pub fn wrap(language: LanguageId, body: &str, bindings: &Bindings) -> Result<String, BindError> {
    match language {
        LanguageId::Python => wrap_python(body, bindings),
        LanguageId::JavaScript => wrap_javascript(body, bindings),
        LanguageId::Java => wrap_java(body, bindings),
    }
}

fn wrap_python(body: &str, bindings: &Bindings) -> Result<String, BindError> {
    let params = bindings.names().join(", ");
    let args = binder::argument_list(LanguageId::Python, bindings)?;
    let body = reindent(body, "    ");
    let body = if body.trim().is_empty() { "    pass".to_string() } else { body };

    Ok(format!(
        "def main({params}):\n{body}\n\n\nif __name__ == \"__main__\":\n    print(main({args}))\n"
    ))
}

fn wrap_javascript(body: &str, bindings: &Bindings) -> Result<String, BindError> {
    let params = bindings.names().join(", ");
    let args = binder::argument_list(LanguageId::JavaScript, bindings)?;

    Ok(format!(
        "function main({params}) {{\n{body}\n}}\n\nconsole.log(main({args}));\n"
    ))
}

fn wrap_java(body: &str, bindings: &Bindings) -> Result<String, BindError> {
    let java_args = binder::java_args(bindings)?;
    let params = bindings
        .names()
        .iter()
        .zip(&java_args)
        .map(|(name, arg)| format!("{} {}", arg.ty, name))
        .collect::<Vec<_>>()
        .join(", ");
    let args = java_args
        .iter()
        .map(|a| a.literal.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let class = JAVA_MAIN_CLASS;
    let render = java_renderer();

    Ok(format!(
        r#"import java.util.*;

public class {class} {{
    public static void main(String[] args) {{
        Object result = Solution.main({args});
        System.out.println(render(result));
    }}

    static String render(Object result) {{
{render}
    }}
}}

class Solution {{
    public static Object main({params}) {{
{body}
    }}
}}
"#
    ))
}

/// Strip the body's common leading indentation and indent it by `prefix`.
///
/// Works line by line, so the contents of a multi-line string literal in the
/// body are re-indented too.
fn reindent(body: &str, prefix: &str) -> String {
    let common = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    body.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                let stripped = line.get(common..).unwrap_or_else(|| line.trim_start());
                format!("{}{}", prefix, stripped)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
