// src/render/template.rs

//! `${expr}` template expansion over JSON documents.

use serde_json::{Map, Value};

use crate::expr::{display_value, evaluate, Expr, Val};
use crate::render::RenderError;

/// Render `template` against `scope`.
///
/// Absent values are only tolerated under optional (`key?`) fields.
pub fn render_template(template: &Value, scope: &Value) -> Result<Value, RenderError> {
    match render_node(template, scope, &mut vec!["$".to_string()])? {
        Some(v) => Ok(v),
        // Only reachable for a bare `${...}` template; treat like a required field.
        None => Err(RenderError::Absent {
            path: "$".to_string(),
        }),
    }
}

/// Returns `Ok(None)` when a required value is absent and the caller may
/// decide (an optional field); every other caller turns it into an error.
fn render_node(
    node: &Value,
    scope: &Value,
    path: &mut Vec<String>,
) -> Result<Option<Value>, RenderError> {
    match node {
        Value::String(s) => render_string(s, scope, path),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(format!("[{i}]"));
                let rendered = render_required(item, scope, path);
                path.pop();
                out.push(rendered?);
            }
            Ok(Some(Value::Array(out)))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let (field, optional) = match key.strip_suffix('?') {
                    Some(stripped) => (stripped, true),
                    None => (key.as_str(), false),
                };
                path.push(format!(".{field}"));
                let rendered = if optional {
                    render_node(value, scope, path)
                } else {
                    render_required(value, scope, path).map(Some)
                };
                path.pop();
                if let Some(v) = rendered? {
                    out.insert(field.to_string(), v);
                }
            }
            Ok(Some(Value::Object(out)))
        }
        other => Ok(Some(other.clone())),
    }
}

fn render_required(
    node: &Value,
    scope: &Value,
    path: &mut Vec<String>,
) -> Result<Value, RenderError> {
    render_node(node, scope, path)?.ok_or_else(|| RenderError::Absent {
        path: path.concat(),
    })
}

fn render_string(
    s: &str,
    scope: &Value,
    path: &[String],
) -> Result<Option<Value>, RenderError> {
    let segments = split_segments(s).map_err(|msg| RenderError::Template {
        path: path.concat(),
        msg,
    })?;

    // A lone hole keeps the evaluated type.
    if let [Segment::Hole(src)] = segments.as_slice() {
        return Ok(eval_hole(src, scope, path)?.into_value());
    }

    let mut out = String::new();
    for segment in &segments {
        match segment {
            Segment::Lit(text) => out.push_str(text),
            Segment::Hole(src) => match eval_hole(src, scope, path)? {
                Val::Absent => return Ok(None),
                Val::Value(v) => out.push_str(&display_value(&v)),
            },
        }
    }
    Ok(Some(Value::String(out)))
}

fn eval_hole(src: &str, scope: &Value, path: &[String]) -> Result<Val, RenderError> {
    let expr = Expr::parse(src).map_err(|source| RenderError::Expr {
        path: path.concat(),
        source,
    })?;
    evaluate(&expr, scope).map_err(|source| RenderError::Expr {
        path: path.concat(),
        source,
    })
}

#[derive(Debug, PartialEq)]
enum Segment {
    Lit(String),
    Hole(String),
}

/// Split a template string into literal text and `${...}` holes.
///
/// `$$` is a literal `$`. Braces inside string literals within a hole do not
/// close it.
fn split_segments(s: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut lit = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            lit.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                lit.push('$');
            }
            Some('{') => {
                chars.next();
                let mut src = String::new();
                let mut in_str = false;
                let mut escaped = false;
                let mut closed = false;
                for c in chars.by_ref() {
                    if in_str {
                        if escaped {
                            escaped = false;
                        } else if c == '\\' {
                            escaped = true;
                        } else if c == '"' {
                            in_str = false;
                        }
                    } else if c == '"' {
                        in_str = true;
                    } else if c == '}' {
                        closed = true;
                        break;
                    }
                    src.push(c);
                }
                if !closed {
                    return Err(format!("unterminated `${{` in {s:?}"));
                }
                if !lit.is_empty() {
                    segments.push(Segment::Lit(std::mem::take(&mut lit)));
                }
                segments.push(Segment::Hole(src));
            }
            _ => lit.push('$'),
        }
    }

    if !lit.is_empty() || segments.is_empty() {
        segments.push(Segment::Lit(lit));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Value {
        json!({
            "context": { "name": "express-server", "namespace": "default" },
            "parameter": { "image": "nginx:1.25", "replicas": 3, "port": 80 }
        })
    }

    #[test]
    fn lone_hole_keeps_type() {
        let t = json!({ "spec": { "replicas": "${parameter.replicas}" } });
        assert_eq!(
            render_template(&t, &scope()).unwrap(),
            json!({ "spec": { "replicas": 3 } })
        );
    }

    #[test]
    fn mixed_string_interpolates() {
        let t = json!({ "name": "${context.name}-svc:${parameter.port}", "cost": "$$5" });
        assert_eq!(
            render_template(&t, &scope()).unwrap(),
            json!({ "name": "express-server-svc:80", "cost": "$5" })
        );
    }

    #[test]
    fn optional_field_is_omitted_when_absent() {
        let t = json!({ "cpu?": "${parameter.cpu}", "image?": "${parameter.image}" });
        assert_eq!(
            render_template(&t, &scope()).unwrap(),
            json!({ "image": "nginx:1.25" })
        );
    }

    #[test]
    fn required_absent_names_the_path() {
        let t = json!({ "spec": { "containers": [{ "image": "${parameter.missing}" }] } });
        let err = render_template(&t, &scope()).unwrap_err();
        assert_eq!(
            err,
            RenderError::Absent {
                path: "$.spec.containers[0].image".to_string()
            }
        );
    }

    #[test]
    fn braces_inside_string_literals_do_not_close_holes() {
        let t = json!(r#"${"}" + context.name}"#);
        assert_eq!(render_template(&t, &scope()).unwrap(), json!("}express-server"));
    }

    #[test]
    fn reports_bad_expressions() {
        assert!(matches!(
            render_template(&json!("${context.}"), &scope()),
            Err(RenderError::Expr { .. })
        ));
        assert!(matches!(
            render_template(&json!("${context.name"), &scope()),
            Err(RenderError::Template { .. })
        ));
    }
}
