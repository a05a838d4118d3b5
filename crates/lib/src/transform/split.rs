//! Split: package control trees into IR plus editor state.
//!
//! Depth-first, post-order. Children are recursed first and sorted by their
//! `ZIndex` rule; presentation metadata peels off into [`ControlState`]s;
//! function-typed custom properties of component definitions become
//! [`FuncNode`]s while their scope-rule fields are cleared from the template
//! state (combine reconstructs them; leaving them would duplicate the
//! defaults in the source tree).

use std::collections::BTreeSet;

use pasrc_core::diag::DiagCode;
use pasrc_core::json::normalize_expression;

use crate::document::editor_state::{ControlState, PropertyState};
use crate::document::template::{data_type_name, is_test_template, CustomProperty};
use crate::document::{ControlJson, Document};
use crate::error::fatal;
use crate::ir::{ArgMetadata, FuncNode, IrBlock, PropNode, TypeInfo, TypedName, THIS_PROPERTY};
use crate::transform::TransformCtx;
use crate::Result;

/// Split one top-level tree. The root's name is the top parent for every
/// control in the tree.
pub fn split_tree(root: &ControlJson, doc: &mut Document, ctx: &mut TransformCtx<'_>) -> Result<IrBlock> {
  split_control(root, &root.name.clone(), false, doc, ctx)
}

fn split_control(
  ctrl: &ControlJson,
  top_parent: &str,
  in_test_suite: bool,
  doc: &mut Document,
  ctx: &mut TransformCtx<'_>,
) -> Result<IrBlock> {
  let in_test_suite = in_test_suite || is_test_template(&ctrl.template.name);

  // 1. Children first, then a stable ascending sort on ZIndex.
  let mut kids: Vec<(IrBlock, f64)> = Vec::with_capacity(ctrl.children.len());
  for child in &ctrl.children {
    let ir = split_control(child, top_parent, in_test_suite, doc, ctx)?;
    kids.push((ir, child.z_index()));
  }
  kids.sort_by(|a, b| a.1.total_cmp(&b.1));

  // 2. Component definitions are flagged on their template.
  let is_definition = ctrl.template.is_component_definition;

  // 3. Properties whose rules live on the template, not in the text.
  let hidden = custom_props_to_hide(ctrl, is_definition);

  // 4. Definitions render their function-typed custom properties as
  //    function nodes.
  let functions = if is_definition {
    ctrl
      .template
      .function_properties()
      .map(|cp| build_func_node(cp))
      .collect()
  } else {
    Vec::new()
  };

  // 5. Rules become property nodes; every rule keeps a property state even
  //    when the node is hidden, because the state list carries the only
  //    ordering that round-trips.
  let mut properties = Vec::new();
  let mut prop_states = Vec::new();
  for rule in &ctrl.rules {
    prop_states.push(PropertyState {
      property_name: rule.property.clone(),
      name_map: rule.name_map.clone(),
      rule_provider_type: rule.rule_provider_type.clone(),
      extension_data: rule.extension_data.clone(),
    });
    if !hidden.contains(rule.property.as_str()) {
      properties.push(PropNode {
        identifier: rule.property.clone(),
        expression: normalize_expression(&rule.invariant_script),
      });
    }
  }

  // 6. The block's type name prefers the template's display name.
  let kind = match ctrl.variant_name.is_empty() {
    true => TypeInfo::new(ctrl.template.type_name()),
    false => TypeInfo::with_variant(ctrl.template.type_name(), ctrl.variant_name.clone()),
  };

  // 7. Register the template; the definition owns the custom properties and
  //    has its scope-rule fields cleared in the store.
  doc.templates.register(&ctrl.template, is_definition);
  if is_definition {
    if let Some(stored) = doc.templates.get_mut(&ctrl.template.name) {
      clear_scope_fields(stored);
    }
  }

  // 8. The unique id is entropy, not structure.
  if !ctrl.control_unique_id.is_empty() {
    match ctrl.control_unique_id.parse::<u64>() {
      Ok(id) => doc.entropy.record_unique_id(&ctrl.name, id),
      Err(_) => ctx.diags.report(
        DiagCode::GenericWarning,
        format!("control {} has non-numeric unique id {:?}", ctrl.name, ctrl.control_unique_id),
      ),
    }
  }

  // 9. Emit the editor state. Duplicate names violate document-wide
  //    uniqueness except inside a test suite subtree.
  let gallery_child = ctrl
    .children
    .iter()
    .find(|c| c.template.name.eq_ignore_ascii_case("galleryTemplate"))
    .map(|c| c.name.clone());

  let state = ControlState {
    name: ctrl.name.clone(),
    top_parent_name: top_parent.to_string(),
    publish_order_index: Some(ctrl.publish_order_index),
    parent_index: Some(ctrl.index),
    style_name: ctrl.style_name.clone(),
    properties: prop_states,
    is_component_definition: is_definition.then_some(true),
    gallery_template_child_name: gallery_child,
    extension_data: ctrl.extension_data.clone(),
  };

  if in_test_suite {
    doc.editor_states.insert_or_replace(state);
  } else if let Err(dup) = doc.editor_states.insert(state) {
    return Err(fatal(
      ctx.diags,
      DiagCode::DuplicateSymbol,
      format!("control name {:?} is defined more than once", dup.name),
    ));
  }

  Ok(IrBlock {
    name: TypedName {
      identifier: ctrl.name.clone(),
      kind,
    },
    properties,
    functions,
    children: kids.into_iter().map(|(ir, _)| ir).collect(),
  })
}

/// Rule names that must not appear as property nodes.
///
/// Instances hide every scope rule of every function-typed custom property;
/// definitions additionally hide the property names themselves (the function
/// node carries them).
fn custom_props_to_hide(ctrl: &ControlJson, is_definition: bool) -> BTreeSet<&str> {
  let mut hidden = BTreeSet::new();
  for cp in ctrl.template.function_properties() {
    if is_definition {
      hidden.insert(cp.name.as_str());
    }
    for rule in cp.scope_rules() {
      hidden.insert(rule.name.as_str());
    }
  }
  hidden
}

/// Build the function node for one function-typed custom property.
///
/// The scope rule named after the property carries the body (`ThisProperty`);
/// the remaining rules are parameters ordered by their parameter index.
fn build_func_node(cp: &CustomProperty) -> FuncNode {
  let body_default = cp
    .scope_rules()
    .iter()
    .find(|r| r.name == cp.name)
    .and_then(|r| r.scope_variable_info.default_rule.as_deref())
    .unwrap_or("");

  let mut metadata = vec![ArgMetadata {
    identifier: THIS_PROPERTY.to_string(),
    default_expression: normalize_expression(body_default),
  }];

  let prefix = format!("{}_", cp.name);
  let mut params: Vec<(usize, TypedName, ArgMetadata)> = Vec::new();
  for rule in cp.scope_rules().iter().filter(|r| r.name != cp.name) {
    let arg_id = rule.name.strip_prefix(&prefix).unwrap_or(&rule.name);
    let type_name = rule
      .scope_variable_info
      .scope_variable_type
      .and_then(data_type_name)
      .unwrap_or("Unknown");
    params.push((
      rule.scope_variable_info.parameter_index.unwrap_or(usize::MAX),
      TypedName {
        identifier: arg_id.to_string(),
        kind: TypeInfo::new(type_name),
      },
      ArgMetadata {
        identifier: arg_id.to_string(),
        default_expression: normalize_expression(rule.scope_variable_info.default_rule.as_deref().unwrap_or("")),
      },
    ));
  }
  params.sort_by_key(|(index, _, _)| *index);

  let mut args = Vec::with_capacity(params.len());
  for (_, arg, meta) in params {
    args.push(arg);
    metadata.push(meta);
  }

  FuncNode {
    identifier: cp.name.clone(),
    args,
    metadata,
  }
}

/// Clear the reconstructable half of every function property's scope rules.
fn clear_scope_fields(template: &mut crate::document::TemplateState) {
  for cp in template.custom_properties.iter_mut().filter(|cp| cp.is_function()) {
    for rule in cp.scope_rules_mut() {
      let info = &mut rule.scope_variable_info;
      info.default_rule = None;
      info.scope_variable_type = None;
      info.parameter_index = None;
      info.parent_property_name = None;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::control::{JsonMap, RuleEntry};
  use crate::document::template::{PropertyScope, ScopeRule, ScopeVariableInfo, TemplateState};
  use crate::document::Origin;
  use pasrc_core::diag::ErrorContainer;

  fn control(name: &str, template: TemplateState) -> ControlJson {
    ControlJson {
      name: name.to_string(),
      control_unique_id: String::new(),
      variant_name: String::new(),
      parent: String::new(),
      index: -1.0,
      publish_order_index: 0,
      style_name: None,
      template,
      rules: Vec::new(),
      children: Vec::new(),
      component_definition_info: None,
      extension_data: JsonMap::new(),
    }
  }

  fn with_z(mut ctrl: ControlJson, z: &str) -> ControlJson {
    ctrl.rules.push(RuleEntry::new("ZIndex", z));
    ctrl
  }

  fn run_split(root: &ControlJson) -> (IrBlock, Document, ErrorContainer) {
    let mut doc = Document::new(Origin::Package);
    let mut diags = ErrorContainer::new();
    let ir = {
      let mut ctx = TransformCtx { diags: &mut diags };
      split_tree(root, &mut doc, &mut ctx).unwrap()
    };
    (ir, doc, diags)
  }

  #[test]
  fn children_sort_by_z_index_non_numeric_first() {
    let mut screen = control("Screen1", TemplateState::named("screen"));
    screen.children.push(with_z(control("A", TemplateState::named("label")), "2"));
    screen.children.push(with_z(control("B", TemplateState::named("label")), "1"));
    screen.children.push(with_z(control("C", TemplateState::named("label")), "foo"));

    let (ir, _, _) = run_split(&screen);
    let order: Vec<_> = ir.children.iter().map(|c| c.name.identifier.as_str()).collect();
    assert_eq!(order, vec!["C", "B", "A"]);
  }

  #[test]
  fn z_index_ties_preserve_input_order() {
    let mut screen = control("Screen1", TemplateState::named("screen"));
    screen.children.push(with_z(control("X", TemplateState::named("label")), "1"));
    screen.children.push(with_z(control("Y", TemplateState::named("label")), "1"));

    let (ir, _, _) = run_split(&screen);
    let order: Vec<_> = ir.children.iter().map(|c| c.name.identifier.as_str()).collect();
    assert_eq!(order, vec!["X", "Y"]);
  }

  #[test]
  fn unique_id_lands_in_entropy() {
    let mut screen = control("ctrlName", TemplateState::named("screen"));
    screen.control_unique_id = "42".to_string();

    let (_, doc, _) = run_split(&screen);
    assert_eq!(doc.entropy.unique_id("ctrlName"), Some(42));
  }

  #[test]
  fn duplicate_name_is_fatal_outside_tests() {
    let mut screen = control("Screen1", TemplateState::named("screen"));
    screen.children.push(control("Dup", TemplateState::named("label")));
    screen.children.push(control("Dup", TemplateState::named("label")));

    let mut doc = Document::new(Origin::Package);
    let mut diags = ErrorContainer::new();
    let mut ctx = TransformCtx { diags: &mut diags };
    let err = split_tree(&screen, &mut doc, &mut ctx).unwrap_err();
    assert_eq!(err.code(), Some(DiagCode::DuplicateSymbol));
  }

  #[test]
  fn duplicate_name_is_permitted_in_test_suites() {
    let mut suite = control("Suite1", TemplateState::named("testSuite"));
    suite.children.push(control("Step", TemplateState::named("testCase")));
    suite.children.push(control("Step", TemplateState::named("testCase")));

    let (ir, _, diags) = run_split(&suite);
    assert_eq!(ir.children.len(), 2);
    assert!(!diags.has_errors());
  }

  fn component_template() -> TemplateState {
    let mut template = TemplateState::named("MyComponent");
    template.is_component_definition = true;
    template.custom_properties.push(CustomProperty {
      name: "Calc".to_string(),
      property_data_type_key: Some("Function".to_string()),
      property_scope_key: Some(PropertyScope {
        property_scope_rules_key: vec![
          ScopeRule {
            name: "Calc".to_string(),
            scope_variable_info: ScopeVariableInfo {
              default_rule: Some("  p1 + 1\r\n".to_string()),
              scope_variable_type: None,
              parameter_index: None,
              parent_property_name: Some("Calc".to_string()),
              extension_data: JsonMap::new(),
            },
            extension_data: JsonMap::new(),
          },
          ScopeRule {
            name: "Calc_p1".to_string(),
            scope_variable_info: ScopeVariableInfo {
              default_rule: Some("0".to_string()),
              scope_variable_type: Some(2),
              parameter_index: Some(0),
              parent_property_name: Some("Calc".to_string()),
              extension_data: JsonMap::new(),
            },
            extension_data: JsonMap::new(),
          },
        ],
        extension_data: JsonMap::new(),
      }),
      extension_data: JsonMap::new(),
    });
    template
  }

  #[test]
  fn definition_produces_func_node_and_clears_scope_fields() {
    let mut def = control("Comp1", component_template());
    def.rules.push(RuleEntry::new("Calc", "p1 + 1"));
    def.rules.push(RuleEntry::new("Calc_p1", "0"));
    def.rules.push(RuleEntry::new("Fill", "Blue"));

    let (ir, doc, _) = run_split(&def);

    // Hidden rules keep their states but lose their property nodes.
    assert_eq!(ir.properties.len(), 1);
    assert_eq!(ir.properties[0].identifier, "Fill");
    let state = doc.editor_states.get("Comp1").unwrap();
    assert_eq!(state.properties.len(), 3);

    // Function node: body default is LF-normalized and left-trimmed.
    assert_eq!(ir.functions.len(), 1);
    let func = &ir.functions[0];
    assert_eq!(func.identifier, "Calc");
    assert_eq!(func.this_property_default(), Some("p1 + 1\n"));
    assert_eq!(func.args.len(), 1);
    assert_eq!(func.args[0].identifier, "p1");
    assert_eq!(func.args[0].kind.type_name, "Number");

    // The store template's scope fields are cleared.
    let stored = doc.templates.get("MyComponent").unwrap();
    let rules = stored.custom_properties[0].scope_rules();
    assert!(rules.iter().all(|r| r.scope_variable_info.default_rule.is_none()));
    assert!(rules.iter().all(|r| r.scope_variable_info.parameter_index.is_none()));
  }

  #[test]
  fn instance_hides_scope_rules_but_keeps_own_properties() {
    let mut template = component_template();
    template.is_component_definition = false;
    let mut instance = control("Comp1_1", template);
    instance.rules.push(RuleEntry::new("Calc", "p1 + 1"));
    instance.rules.push(RuleEntry::new("Calc_p1", "0"));
    instance.rules.push(RuleEntry::new("X", "10"));

    let (ir, _, _) = run_split(&instance);
    let visible: Vec<_> = ir.properties.iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(visible, vec!["X"]);
    assert!(ir.functions.is_empty());
  }

  #[test]
  fn gallery_template_child_is_recorded() {
    let mut gallery = control("Gallery1", TemplateState::named("gallery"));
    gallery.children.push(control("galTpl", TemplateState::named("galleryTemplate")));

    let (_, doc, _) = run_split(&gallery);
    let state = doc.editor_states.get("Gallery1").unwrap();
    assert_eq!(state.gallery_template_child_name.as_deref(), Some("galTpl"));
  }
}
