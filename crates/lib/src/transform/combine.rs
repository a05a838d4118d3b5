//! Combine: IR plus editor state back into package control trees.
//!
//! Depth-first, post-order, the exact inverse of split. Children re-sort by
//! their recorded parent index; rules are rebuilt and put back into the
//! package's original per-control order; function nodes rewrite the scope
//! rule fields that split cleared.
//!
//! Component definitions must combine before any of their instances: the
//! rewrite restores the scope-rule defaults that instance dummy rules read.

use std::collections::BTreeSet;

use pasrc_core::diag::DiagCode;

use crate::document::control::{ComponentDefinitionInfo, ControlJson, JsonMap, RuleEntry, RULE_PROVIDER_UNKNOWN};
use crate::document::editor_state::ControlState;
use crate::document::template::{data_type_code, TemplateState};
use crate::document::Document;
use crate::error::fatal;
use crate::ir::{FuncNode, IrBlock};
use crate::transform::TransformCtx;
use crate::Result;

/// Names of controls produced so far, for editor-state reconciliation.
#[derive(Debug, Default)]
pub struct CombineTracker {
  pub seen: BTreeSet<String>,
}

/// Combine one top-level tree back into its package form.
pub fn combine_tree(
  ir: &IrBlock,
  doc: &mut Document,
  tracker: &mut CombineTracker,
  ctx: &mut TransformCtx<'_>,
) -> Result<ControlJson> {
  let (ctrl, _) = combine_control(ir, "", doc, tracker, ctx)?;
  Ok(ctrl)
}

fn combine_control(
  ir: &IrBlock,
  parent: &str,
  doc: &mut Document,
  tracker: &mut CombineTracker,
  ctx: &mut TransformCtx<'_>,
) -> Result<(ControlJson, f64)> {
  let name = ir.name.identifier.clone();
  let type_name = ir.name.kind.type_name.clone();
  tracker.seen.insert(name.clone());
  let state = doc.editor_states.get(&name).cloned();

  // 1. Children first; a stable ascending sort on the recorded parent index.
  //    Children without state sort first on -1.
  let mut kids: Vec<(ControlJson, f64)> = Vec::with_capacity(ir.children.len());
  for child in &ir.children {
    kids.push(combine_control(child, &name, doc, tracker, ctx)?);
  }
  kids.sort_by(|a, b| a.1.total_cmp(&b.1));
  let children: Vec<ControlJson> = kids.into_iter().map(|(c, _)| c).collect();

  // 2. Template from the store, synthesized when unknown.
  let template = match doc.templates.resolve(&type_name) {
    Some(found) => found.clone(),
    None => {
      let synthesized = TemplateState::named(type_name.clone());
      doc.templates.insert(synthesized.clone());
      synthesized
    }
  };

  // 3. Unique id from entropy, minted deterministically when absent.
  let unique_id = match doc.entropy.unique_id(&name) {
    Some(id) => id,
    None => doc.entropy.mint_unique_id(&name),
  };

  // 4. Rebuild the rule list.
  let mut rules: Vec<RuleEntry> = Vec::new();
  for prop in &ir.properties {
    rules.push(stamp_rule(
      RuleEntry::new(prop.identifier.clone(), prop.expression.clone()),
      state.as_ref(),
    ));
  }

  for func in &ir.functions {
    append_function_rules(func, &name, &type_name, state.as_ref(), &mut rules, doc, ctx)?;
  }

  if ir.functions.is_empty() && template.has_function_properties() {
    // Instance of a component: the hidden scope rules come back as dummy
    // rules from the template defaults the definition's combine restored.
    let current = doc.templates.resolve(&type_name).cloned().unwrap_or(template.clone());
    for cp in current.function_properties() {
      for scope_rule in cp.scope_rules() {
        let script = scope_rule.scope_variable_info.default_rule.clone().unwrap_or_default();
        rules.push(stamp_rule(RuleEntry::new(scope_rule.name.clone(), script), state.as_ref()));
      }
    }
  }

  // A definition may not grow properties it did not have at unpack.
  let is_definition = state.as_ref().is_some_and(|s| s.is_component_definition == Some(true));
  if let Some(state) = state.as_ref().filter(|s| s.is_component_definition == Some(true)) {
    for rule in &rules {
      if !state.properties.iter().any(|p| p.property_name == rule.property) {
        return Err(fatal(
          ctx.diags,
          DiagCode::UnsupportedChange,
          format!("cannot add property {:?} to component definition {:?}", rule.property, name),
        ));
      }
    }
  }

  // 5. Restore the original per-control rule order; unknown properties keep
  //    their relative order at the end.
  if let Some(state) = state.as_ref() {
    rules.sort_by_key(|r| {
      state
        .properties
        .iter()
        .position(|p| p.property_name == r.property)
        .unwrap_or(usize::MAX)
    });
  }

  // 6. Reassemble the control. The embedded template is re-read from the
  //    store so a definition carries its rewritten scope fields.
  let mut out_template = doc.templates.resolve(&type_name).cloned().unwrap_or(template);
  out_template.is_component_definition = is_definition;

  let component_definition_info = is_definition.then(|| ComponentDefinitionInfo {
    name: name.clone(),
    last_modified_timestamp: out_template.last_modified_timestamp.clone(),
    children_order: children.iter().map(|c| c.name.clone()).collect(),
    extension_data: JsonMap::new(),
  });

  let style_name = state
    .as_ref()
    .and_then(|s| s.style_name.clone())
    .unwrap_or_else(|| default_style_name(&out_template.name));

  let parent_index = state.as_ref().and_then(|s| s.parent_index).unwrap_or(-1.0);

  let ctrl = ControlJson {
    name,
    control_unique_id: unique_id.to_string(),
    variant_name: ir.name.kind.variant.clone().unwrap_or_default(),
    parent: parent.to_string(),
    index: parent_index,
    publish_order_index: state.as_ref().and_then(|s| s.publish_order_index).unwrap_or(0),
    style_name: Some(style_name),
    template: out_template,
    rules,
    children,
    component_definition_info,
    extension_data: state.map(|s| s.extension_data).unwrap_or_default(),
  };

  Ok((ctrl, parent_index))
}

/// Controls that lost their editor state get the stock style for their
/// template. Faithfully preserved behavior of the source system.
fn default_style_name(template_name: &str) -> String {
  let mut chars = template_name.chars();
  let capitalized = match chars.next() {
    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    None => String::new(),
  };
  format!("default{}Style", capitalized)
}

/// Attach any recorded property state to a rebuilt rule.
fn stamp_rule(mut rule: RuleEntry, state: Option<&ControlState>) -> RuleEntry {
  let recorded = state.and_then(|s| s.properties.iter().find(|p| p.property_name == rule.property));
  match recorded {
    Some(prop) => {
      rule.name_map = prop.name_map.clone();
      rule.rule_provider_type = if prop.rule_provider_type.is_empty() {
        RULE_PROVIDER_UNKNOWN.to_string()
      } else {
        prop.rule_provider_type.clone()
      };
      rule.extension_data = prop.extension_data.clone();
    }
    None => rule.rule_provider_type = RULE_PROVIDER_UNKNOWN.to_string(),
  }
  rule
}

/// Emit the rules of one function node and rewrite the template's scope-rule
/// fields from the metadata and argument type declarations.
fn append_function_rules(
  func: &FuncNode,
  control_name: &str,
  type_name: &str,
  state: Option<&ControlState>,
  rules: &mut Vec<RuleEntry>,
  doc: &mut Document,
  ctx: &mut TransformCtx<'_>,
) -> Result<()> {
  let Some(body) = func.this_property_default().map(str::to_string) else {
    return Err(fatal(
      ctx.diags,
      DiagCode::ParseError,
      format!("function {:?} on {:?} has no ThisProperty default", func.identifier, control_name),
    ));
  };

  rules.push(stamp_rule(RuleEntry::new(func.identifier.clone(), body.clone()), state));
  for meta in func.arg_metadata() {
    let rule_name = format!("{}_{}", func.identifier, meta.identifier);
    rules.push(stamp_rule(
      RuleEntry::new(rule_name, meta.default_expression.clone()),
      state,
    ));
  }

  // Validate argument types up front so the template is never half
  // rewritten.
  let mut arg_types = Vec::with_capacity(func.args.len());
  for arg in &func.args {
    match data_type_code(&arg.kind.type_name) {
      Some(code) => arg_types.push(code),
      None => {
        return Err(fatal(
          ctx.diags,
          DiagCode::ParseError,
          format!(
            "function {:?} argument {:?} has unknown type {:?}",
            func.identifier, arg.identifier, arg.kind.type_name
          ),
        ));
      }
    }
  }

  let Some(template) = doc.templates.resolve_mut(type_name) else {
    return Ok(());
  };
  let Some(cp) = template.custom_properties.iter_mut().find(|c| c.name == func.identifier) else {
    return Err(fatal(
      ctx.diags,
      DiagCode::UnsupportedChange,
      format!("template {:?} does not declare function {:?}", type_name, func.identifier),
    ));
  };

  // Body rule.
  for rule in cp.scope_rules_mut() {
    if rule.name == func.identifier {
      let info = &mut rule.scope_variable_info;
      info.default_rule = Some(body.clone());
      info.parent_property_name = Some(func.identifier.clone());
      info.parameter_index = None;
      info.scope_variable_type = None;
    }
  }

  // Parameter rules, in declaration order.
  for (index, arg) in func.args.iter().enumerate() {
    let rule_name = format!("{}_{}", func.identifier, arg.identifier);
    let default = func
      .arg_metadata()
      .find(|m| m.identifier == arg.identifier)
      .map(|m| m.default_expression.clone());
    let Some(default) = default else {
      return Err(fatal(
        ctx.diags,
        DiagCode::ParseError,
        format!("function {:?} has no default for parameter {:?}", func.identifier, arg.identifier),
      ));
    };

    let Some(rule) = cp.scope_rules_mut().iter_mut().find(|r| r.name == rule_name) else {
      return Err(fatal(
        ctx.diags,
        DiagCode::ParseError,
        format!("unknown parameter {:?} on function {:?}", arg.identifier, func.identifier),
      ));
    };
    let info = &mut rule.scope_variable_info;
    info.default_rule = Some(default);
    info.parameter_index = Some(index);
    info.parent_property_name = Some(func.identifier.clone());
    info.scope_variable_type = Some(arg_types[index]);
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::editor_state::PropertyState;
  use crate::document::Origin;
  use crate::ir::{ArgMetadata, PropNode, TypeInfo, TypedName, THIS_PROPERTY};
  use pasrc_core::diag::ErrorContainer;

  fn prop(id: &str, expr: &str) -> PropNode {
    PropNode {
      identifier: id.to_string(),
      expression: expr.to_string(),
    }
  }

  fn prop_state(name: &str) -> PropertyState {
    PropertyState {
      property_name: name.to_string(),
      name_map: None,
      rule_provider_type: "User".to_string(),
      extension_data: JsonMap::new(),
    }
  }

  fn state(name: &str, parent_index: f64) -> ControlState {
    ControlState {
      name: name.to_string(),
      top_parent_name: "Screen1".to_string(),
      publish_order_index: Some(0),
      parent_index: Some(parent_index),
      style_name: Some("myStyle".to_string()),
      properties: Vec::new(),
      is_component_definition: None,
      gallery_template_child_name: None,
      extension_data: JsonMap::new(),
    }
  }

  fn run(ir: &IrBlock, doc: &mut Document) -> Result<ControlJson> {
    let mut diags = ErrorContainer::new();
    let mut tracker = CombineTracker::default();
    let mut ctx = TransformCtx { diags: &mut diags };
    combine_tree(ir, doc, &mut tracker, &mut ctx)
  }

  #[test]
  fn children_restore_parent_index_order() {
    let mut doc = Document::new(Origin::Source);
    doc.editor_states.insert(state("A", 1.0)).unwrap();
    doc.editor_states.insert(state("B", 0.0)).unwrap();

    let mut ir = IrBlock::new("Screen1", TypeInfo::new("screen"));
    ir.children.push(IrBlock::new("A", TypeInfo::new("label")));
    ir.children.push(IrBlock::new("B", TypeInfo::new("label")));
    // A child with no state at all sorts first on -1.
    ir.children.push(IrBlock::new("New1", TypeInfo::new("label")));

    let ctrl = run(&ir, &mut doc).unwrap();
    let order: Vec<_> = ctrl.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(order, vec!["New1", "B", "A"]);
    assert!(ctrl.children.iter().all(|c| c.parent == "Screen1"));
  }

  #[test]
  fn rules_restore_recorded_order() {
    let mut doc = Document::new(Origin::Source);
    let mut s = state("L", 0.0);
    s.properties = vec![prop_state("Text"), prop_state("Fill"), prop_state("X")];
    doc.editor_states.insert(s).unwrap();

    let mut ir = IrBlock::new("L", TypeInfo::new("label"));
    // Textual order differs from the recorded order.
    ir.properties = vec![prop("X", "1"), prop("Text", "\"t\""), prop("Fill", "Blue"), prop("Extra", "0")];

    let ctrl = run(&ir, &mut doc).unwrap();
    let order: Vec<_> = ctrl.rules.iter().map(|r| r.property.as_str()).collect();
    assert_eq!(order, vec!["Text", "Fill", "X", "Extra"]);
    // Unknown property without state gets the Unknown provider.
    assert_eq!(ctrl.rules[3].rule_provider_type, RULE_PROVIDER_UNKNOWN);
    assert_eq!(ctrl.rules[0].rule_provider_type, "User");
  }

  #[test]
  fn missing_entropy_mints_max_plus_one() {
    let mut doc = Document::new(Origin::Source);
    doc.entropy.record_unique_id("Other", 42);

    let ir = IrBlock::new("ctrlName", TypeInfo::new("screen"));
    let ctrl = run(&ir, &mut doc).unwrap();
    assert_eq!(ctrl.control_unique_id, "43");
  }

  #[test]
  fn recorded_unique_id_is_used() {
    let mut doc = Document::new(Origin::Source);
    doc.entropy.record_unique_id("ctrlName", 42);

    let ir = IrBlock::new("ctrlName", TypeInfo::new("screen"));
    let ctrl = run(&ir, &mut doc).unwrap();
    assert_eq!(ctrl.control_unique_id, "42");
  }

  #[test]
  fn stateless_control_gets_default_style() {
    let mut doc = Document::new(Origin::Source);
    let ir = IrBlock::new("L", TypeInfo::new("label"));
    let ctrl = run(&ir, &mut doc).unwrap();
    assert_eq!(ctrl.style_name.as_deref(), Some("defaultLabelStyle"));
  }

  #[test]
  fn unknown_template_is_synthesized() {
    let mut doc = Document::new(Origin::Source);
    let ir = IrBlock::new("W", TypeInfo::new("widgetron"));
    let ctrl = run(&ir, &mut doc).unwrap();
    assert_eq!(ctrl.template.name, "widgetron");
    assert!(doc.templates.get("widgetron").is_some());
  }

  #[test]
  fn function_without_this_property_is_fatal() {
    let mut doc = Document::new(Origin::Source);
    let mut ir = IrBlock::new("Comp1", TypeInfo::new("Component"));
    ir.functions.push(FuncNode {
      identifier: "Calc".to_string(),
      args: Vec::new(),
      metadata: vec![ArgMetadata {
        identifier: "p1".to_string(),
        default_expression: "0".to_string(),
      }],
    });

    let err = run(&ir, &mut doc).unwrap_err();
    assert_eq!(err.code(), Some(DiagCode::ParseError));
  }

  #[test]
  fn unknown_arg_type_is_fatal() {
    let mut doc = Document::new(Origin::Source);
    let mut ir = IrBlock::new("Comp1", TypeInfo::new("Component"));
    ir.functions.push(FuncNode {
      identifier: "Calc".to_string(),
      args: vec![TypedName {
        identifier: "p1".to_string(),
        kind: TypeInfo::new("Widget"),
      }],
      metadata: vec![
        ArgMetadata {
          identifier: THIS_PROPERTY.to_string(),
          default_expression: "p1".to_string(),
        },
        ArgMetadata {
          identifier: "p1".to_string(),
          default_expression: "0".to_string(),
        },
      ],
    });

    let err = run(&ir, &mut doc).unwrap_err();
    assert_eq!(err.code(), Some(DiagCode::ParseError));
  }

  #[test]
  fn adding_property_to_definition_is_unsupported() {
    let mut doc = Document::new(Origin::Source);
    let mut s = state("Comp1", 0.0);
    s.is_component_definition = Some(true);
    s.properties = vec![prop_state("Fill")];
    doc.editor_states.insert(s).unwrap();

    let mut ir = IrBlock::new("Comp1", TypeInfo::new("Component"));
    ir.properties = vec![prop("Fill", "Blue"), prop("Brand", "\"new\"")];

    let err = run(&ir, &mut doc).unwrap_err();
    assert_eq!(err.code(), Some(DiagCode::UnsupportedChange));
  }
}
