//! Intermediate representation of a control tree.
//!
//! The IR is what the textual form serializes: logical structure only, with
//! presentation metadata split off into editor state. Blocks are rebuilt from
//! scratch on every conversion; nothing here is shared or cyclic.

use serde::{Deserialize, Serialize};

/// A control's type: template type name plus optional variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
  pub type_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub variant: Option<String>,
}

impl TypeInfo {
  pub fn new(type_name: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      variant: None,
    }
  }

  pub fn with_variant(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      variant: Some(variant.into()),
    }
  }
}

/// An identifier with a type, used for control names and function args.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedName {
  pub identifier: String,
  pub kind: TypeInfo,
}

/// One property: identifier and its stored expression (LF-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropNode {
  pub identifier: String,
  pub expression: String,
}

/// Default expression attached to a function argument, or to the function
/// body itself under the `ThisProperty` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgMetadata {
  pub identifier: String,
  pub default_expression: String,
}

/// Identifier of the metadata entry that carries a function's body default.
pub const THIS_PROPERTY: &str = "ThisProperty";

/// A function-typed custom property on a component definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncNode {
  pub identifier: String,
  pub args: Vec<TypedName>,
  pub metadata: Vec<ArgMetadata>,
}

impl FuncNode {
  /// The `ThisProperty` default expression, if present.
  pub fn this_property_default(&self) -> Option<&str> {
    self
      .metadata
      .iter()
      .find(|m| m.identifier == THIS_PROPERTY)
      .map(|m| m.default_expression.as_str())
  }

  /// Metadata entries other than `ThisProperty`, in declaration order.
  pub fn arg_metadata(&self) -> impl Iterator<Item = &ArgMetadata> {
    self.metadata.iter().filter(|m| m.identifier != THIS_PROPERTY)
  }
}

/// One control in IR form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrBlock {
  pub name: TypedName,
  pub properties: Vec<PropNode>,
  pub functions: Vec<FuncNode>,
  pub children: Vec<IrBlock>,
}

impl IrBlock {
  pub fn new(identifier: impl Into<String>, kind: TypeInfo) -> Self {
    Self {
      name: TypedName {
        identifier: identifier.into(),
        kind,
      },
      properties: Vec::new(),
      functions: Vec::new(),
      children: Vec::new(),
    }
  }

  pub fn property(&self, identifier: &str) -> Option<&PropNode> {
    self.properties.iter().find(|p| p.identifier == identifier)
  }
}

/// Tagged view over every IR node kind.
///
/// Originally a polymorphic visitor hierarchy; here a plain sum so visitors
/// are a `match` and nothing needs virtual dispatch.
#[derive(Debug, Clone, Copy)]
pub enum IrNode<'a> {
  Block(&'a IrBlock),
  Name(&'a TypedName),
  Kind(&'a TypeInfo),
  Prop(&'a PropNode),
  Func(&'a FuncNode),
  ArgMeta(&'a ArgMetadata),
  Expr(&'a str),
}

/// Depth-first walk over a block and everything it owns.
pub fn walk<'a>(block: &'a IrBlock, visit: &mut dyn FnMut(IrNode<'a>)) {
  visit(IrNode::Block(block));
  visit(IrNode::Name(&block.name));
  visit(IrNode::Kind(&block.name.kind));
  for prop in &block.properties {
    visit(IrNode::Prop(prop));
    visit(IrNode::Expr(&prop.expression));
  }
  for func in &block.functions {
    visit(IrNode::Func(func));
    for arg in &func.args {
      visit(IrNode::Name(arg));
      visit(IrNode::Kind(&arg.kind));
    }
    for meta in &func.metadata {
      visit(IrNode::ArgMeta(meta));
      visit(IrNode::Expr(&meta.default_expression));
    }
  }
  for child in &block.children {
    walk(child, visit);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> IrBlock {
    let mut screen = IrBlock::new("Screen1", TypeInfo::new("screen"));
    screen.properties.push(PropNode {
      identifier: "OnVisible".to_string(),
      expression: "Set(x, 1)".to_string(),
    });
    let label = IrBlock::new("Label1", TypeInfo::with_variant("label", "compact"));
    screen.children.push(label);
    screen
  }

  #[test]
  fn walk_visits_children_depth_first() {
    let block = sample();
    let mut blocks = Vec::new();
    walk(&block, &mut |node| {
      if let IrNode::Block(b) = node {
        blocks.push(b.name.identifier.clone());
      }
    });
    assert_eq!(blocks, vec!["Screen1", "Label1"]);
  }

  #[test]
  fn func_node_metadata_accessors() {
    let func = FuncNode {
      identifier: "Calc".to_string(),
      args: vec![TypedName {
        identifier: "p1".to_string(),
        kind: TypeInfo::new("Number"),
      }],
      metadata: vec![
        ArgMetadata {
          identifier: THIS_PROPERTY.to_string(),
          default_expression: "p1 + 1".to_string(),
        },
        ArgMetadata {
          identifier: "p1".to_string(),
          default_expression: "0".to_string(),
        },
      ],
    };

    assert_eq!(func.this_property_default(), Some("p1 + 1"));
    let args: Vec<_> = func.arg_metadata().map(|m| m.identifier.as_str()).collect();
    assert_eq!(args, vec!["p1"]);
  }
}
