//! Pretty-printer: IR tree to textual form.
//!
//! Every choice here is mirrored by the parser; the two must stay exact
//! inverses or source trees stop round-tripping.

use crate::dsl::INDENT;
use crate::ir::{FuncNode, IrBlock, IrNode};

/// Render a root control to its complete file content.
pub fn print_document(root: &IrBlock) -> String {
  let mut out = String::new();
  print_block(root, 0, &mut out);
  out
}

fn pad(depth: usize, out: &mut String) {
  for _ in 0..depth * INDENT {
    out.push(' ');
  }
}

fn print_block(block: &IrBlock, depth: usize, out: &mut String) {
  pad(depth, out);
  out.push_str(&block.name.identifier);
  out.push_str(" As ");
  out.push_str(&block.name.kind.type_name);
  if let Some(variant) = &block.name.kind.variant {
    out.push('.');
    out.push_str(variant);
  }
  out.push_str(":\n");

  for prop in &block.properties {
    print_node(IrNode::Prop(prop), depth + 1, out);
  }
  for func in &block.functions {
    print_node(IrNode::Func(func), depth + 1, out);
  }
  for child in &block.children {
    print_block(child, depth + 1, out);
  }
}

/// Member-level dispatch over the tagged node sum.
fn print_node(node: IrNode<'_>, depth: usize, out: &mut String) {
  match node {
    IrNode::Prop(prop) => print_property(&prop.identifier, &prop.expression, depth, out),
    IrNode::Func(func) => print_function(func, depth, out),
    IrNode::ArgMeta(meta) => print_property(&meta.identifier, &meta.default_expression, depth, out),
    IrNode::Block(block) => print_block(block, depth, out),
    // Names, kinds, and bare expressions only appear inside the lines the
    // other arms emit.
    IrNode::Name(_) | IrNode::Kind(_) | IrNode::Expr(_) => {}
  }
}

fn print_property(identifier: &str, expression: &str, depth: usize, out: &mut String) {
  pad(depth, out);
  out.push_str(identifier);

  if expression.is_empty() {
    out.push_str(" =\n");
    return;
  }

  if !expression.contains('\n') {
    out.push_str(" = ");
    out.push_str(expression);
    out.push('\n');
    return;
  }

  // Block form. Trailing newlines cannot ride on indentation, so their count
  // goes after the marker.
  let body = expression.trim_end_matches('\n');
  let trailing = expression.len() - body.len();
  out.push_str(" = |");
  if trailing > 0 {
    out.push_str(&trailing.to_string());
  }
  out.push('\n');

  if !body.is_empty() {
    for line in body.split('\n') {
      if line.is_empty() {
        out.push('\n');
      } else {
        pad(depth + 1, out);
        out.push_str(line);
        out.push('\n');
      }
    }
  }
}

fn print_function(func: &FuncNode, depth: usize, out: &mut String) {
  pad(depth, out);
  out.push_str(&func.identifier);
  out.push('(');
  for (i, arg) in func.args.iter().enumerate() {
    if i > 0 {
      out.push_str(", ");
    }
    out.push_str(&arg.identifier);
    out.push_str(" As ");
    out.push_str(&arg.kind.type_name);
  }
  out.push_str("):\n");

  for meta in &func.metadata {
    print_node(IrNode::ArgMeta(meta), depth + 1, out);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::{PropNode, TypeInfo};

  fn print_property_line(prop: &PropNode) -> String {
    let mut out = String::new();
    print_property(&prop.identifier, &prop.expression, 0, &mut out);
    out
  }

  #[test]
  fn inline_property() {
    let prop = PropNode {
      identifier: "Text".to_string(),
      expression: "\"hi\"".to_string(),
    };
    assert_eq!(print_property_line(&prop), "Text = \"hi\"\n");
  }

  #[test]
  fn empty_property_has_no_trailing_space() {
    let prop = PropNode {
      identifier: "Fill".to_string(),
      expression: String::new(),
    };
    assert_eq!(print_property_line(&prop), "Fill =\n");
  }

  #[test]
  fn block_property_counts_trailing_newlines() {
    let prop = PropNode {
      identifier: "Body".to_string(),
      expression: "a\nb\n\n".to_string(),
    };
    assert_eq!(print_property_line(&prop), "Body = |2\n    a\n    b\n");
  }

  #[test]
  fn header_includes_variant() {
    let block = IrBlock::new("L", TypeInfo::with_variant("label", "compact"));
    assert_eq!(print_document(&block), "L As label.compact:\n");
  }
}
