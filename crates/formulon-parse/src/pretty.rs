//! Rendering an AST back to formula text — the canonical serialized form
//! is the smallest reference syntax that represents the range — and a
//! debug tree dump used in tests and diagnostics.

use crate::parser::{ASTNode, ASTNodeType, ParserError};
use crate::{parse, ErrKind, Value};

/// Precedence used when deciding whether a child needs parentheses.
/// Mirrors `Token::get_precedence` in `tokenizer.rs`.
fn precedence(op: &str) -> u8 {
    match op {
        ":" | " " | "," => 8,
        "u" => 7,
        "%" => 6,
        "^" => 5,
        "*" | "/" => 4,
        "+" | "-" => 3,
        "&" => 2,
        "=" | "<" | ">" | "<=" | ">=" | "<>" => 1,
        _ => 0,
    }
}

fn render_value(v: &Value) -> String {
    match v {
        Value::Number(n) => Value::canonical_number_string(*n),
        Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::String(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        Value::Infinity(sign) => sign.to_string(),
    }
}

fn render_error(kind: &ErrKind) -> String {
    kind.code().to_string()
}

/// Render a node, wrapping it in parentheses if `parent_precedence` binds
/// tighter than the node's own top-level operator.
fn render(node: &ASTNode, parent_precedence: u8) -> String {
    match &node.node_type {
        ASTNodeType::Literal(v) => render_value(v),
        ASTNodeType::LiteralError(kind) => render_error(kind),
        ASTNodeType::Reference { original, .. } => original.clone(),
        ASTNodeType::UnaryOp { op, expr } => {
            let inner_prec = precedence("u").max(precedence(op));
            let inner = render(expr, inner_prec);
            let rendered = if op == "%" {
                format!("{inner}%")
            } else {
                format!("{op}{inner}")
            };
            if inner_prec < parent_precedence {
                format!("({rendered})")
            } else {
                rendered
            }
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            let prec = precedence(op);
            let left_rendered = render(left, prec);
            // Right side renders at prec+1 so equal-precedence left-associative
            // chains (a-b-c) don't gain redundant parens while a-(b-c) keeps them.
            let right_rendered = render(right, prec + 1);
            let rendered = format!("{left_rendered}{op}{right_rendered}");
            if prec < parent_precedence {
                format!("({rendered})")
            } else {
                rendered
            }
        }
        ASTNodeType::Function { name, args } => {
            let rendered_args: Vec<String> = args.iter().map(|a| render(a, 0)).collect();
            format!("{name}({})", rendered_args.join(","))
        }
        ASTNodeType::Array(rows) => {
            let rendered_rows: Vec<String> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| render(cell, 0))
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .collect();
            format!("{{{}}}", rendered_rows.join(";"))
        }
    }
}

/// Render an AST back to canonical formula text, including the leading `=`.
pub fn canonical_formula(node: &ASTNode) -> String {
    format!("={}", render(node, 0))
}

/// Parse `formula` and immediately render it back to canonical form.
pub fn pretty_parse_render(formula: &str) -> Result<String, ParserError> {
    let ast = parse(formula)?;
    Ok(canonical_formula(&ast))
}

/// An indented debug tree, one node per line, for tests and diagnostics.
pub fn pretty_print(node: &ASTNode) -> String {
    let mut out = String::new();
    pretty_print_into(node, 0, &mut out);
    out
}

fn pretty_print_into(node: &ASTNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match &node.node_type {
        ASTNodeType::Literal(v) => out.push_str(&format!("{indent}Literal({v})\n")),
        ASTNodeType::LiteralError(kind) => out.push_str(&format!("{indent}Error({kind})\n")),
        ASTNodeType::Reference { original, .. } => {
            out.push_str(&format!("{indent}Reference({original})\n"))
        }
        ASTNodeType::UnaryOp { op, expr } => {
            out.push_str(&format!("{indent}UnaryOp({op})\n"));
            pretty_print_into(expr, depth + 1, out);
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            out.push_str(&format!("{indent}BinaryOp({op})\n"));
            pretty_print_into(left, depth + 1, out);
            pretty_print_into(right, depth + 1, out);
        }
        ASTNodeType::Function { name, args } => {
            out.push_str(&format!("{indent}Function({name})\n"));
            for arg in args {
                pretty_print_into(arg, depth + 1, out);
            }
        }
        ASTNodeType::Array(rows) => {
            out.push_str(&format!("{indent}Array\n"));
            for row in rows {
                for cell in row {
                    pretty_print_into(cell, depth + 1, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_arithmetic() {
        assert_eq!(pretty_parse_render("=A1+B1*2").unwrap(), "=A1+B1*2");
    }

    #[test]
    fn preserves_parens_needed_for_precedence() {
        assert_eq!(pretty_parse_render("=(A1+B1)*2").unwrap(), "=(A1+B1)*2");
    }

    #[test]
    fn left_associative_subtraction_keeps_grouping() {
        assert_eq!(pretty_parse_render("=A1-(B1-C1)").unwrap(), "=A1-(B1-C1)");
        assert_eq!(pretty_parse_render("=A1-B1-C1").unwrap(), "=A1-B1-C1");
    }

    #[test]
    fn function_call_round_trips() {
        assert_eq!(pretty_parse_render("=SUM(A1,B1:B3)").unwrap(), "=SUM(A1,B1:B3)");
    }
}
