//! Control templates and the document-wide template registry.
//!
//! Templates are referenced by name, never by pointer, so split/combine stays
//! purely tree-shaped. The registry owns the logical template state; controls
//! embed faithful copies for the wire format.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::control::JsonMap;
use crate::{Error, Result};

/// Data type names indexed by their wire code (`ScopeVariableType`).
pub const DATA_TYPES: &[&str] = &[
  "Unknown",
  "Boolean",
  "Number",
  "String",
  "Date",
  "Time",
  "DateTime",
  "Color",
  "Currency",
  "Image",
  "Media",
  "Record",
  "Table",
  "Hyperlink",
  "Guid",
  "Screen",
];

/// Wire code for a data type name, matched case-insensitively.
pub fn data_type_code(name: &str) -> Option<u32> {
  DATA_TYPES
    .iter()
    .position(|t| t.eq_ignore_ascii_case(name))
    .map(|i| i as u32)
}

/// Data type name for a wire code.
pub fn data_type_name(code: u32) -> Option<&'static str> {
  DATA_TYPES.get(code as usize).copied()
}

/// Template names whose subtrees form a test suite, where duplicate control
/// names are permitted.
const TEST_TEMPLATE_NAMES: &[&str] = &["appTest", "testSuite", "testCase"];

pub fn is_test_template(name: &str) -> bool {
  TEST_TEMPLATE_NAMES.iter().any(|t| t.eq_ignore_ascii_case(name))
}

fn is_false(b: &bool) -> bool {
  !*b
}

/// A control template: faithful reflection of the package's template JSON
/// plus two local flags that never hit the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateState {
  #[serde(default)]
  pub id: String,

  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,

  #[serde(default)]
  pub version: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_modified_timestamp: Option<String>,

  #[serde(default, skip_serializing_if = "is_false")]
  pub is_component_definition: bool,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub custom_properties: Vec<CustomProperty>,

  /// Raw control template XML when the package carries one.
  #[serde(rename = "Template", default, skip_serializing_if = "Option::is_none")]
  pub template_xml: Option<String>,

  #[serde(flatten)]
  pub extension_data: JsonMap,

  /// Local flag: this template belongs to a user-authored component.
  #[serde(skip)]
  pub is_component_template: bool,

  /// Local flag: the name as first registered, before case folding.
  #[serde(skip)]
  pub original_name: Option<String>,
}

impl TemplateState {
  /// A minimal template with the given name, used for tests and synthesis.
  pub fn named(name: impl Into<String>) -> Self {
    let name = name.into();
    Self {
      id: format!("http://microsoft.com/appmagic/{}", name.to_lowercase()),
      name,
      display_name: None,
      version: "1.0".to_string(),
      last_modified_timestamp: None,
      is_component_definition: false,
      custom_properties: Vec::new(),
      template_xml: None,
      extension_data: JsonMap::new(),
      is_component_template: false,
      original_name: None,
    }
  }

  /// The name the IR uses as the control's type.
  pub fn type_name(&self) -> &str {
    self.display_name.as_deref().unwrap_or(&self.name)
  }

  /// Custom properties whose value is a function.
  pub fn function_properties(&self) -> impl Iterator<Item = &CustomProperty> {
    self.custom_properties.iter().filter(|p| p.is_function())
  }

  pub fn has_function_properties(&self) -> bool {
    self.function_properties().next().is_some()
  }
}

/// A user-authored property on a component template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomProperty {
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub property_data_type_key: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub property_scope_key: Option<PropertyScope>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

impl CustomProperty {
  pub fn is_function(&self) -> bool {
    self.property_data_type_key.as_deref() == Some("Function")
  }

  pub fn scope_rules(&self) -> &[ScopeRule] {
    self
      .property_scope_key
      .as_ref()
      .map(|s| s.property_scope_rules_key.as_slice())
      .unwrap_or(&[])
  }

  pub fn scope_rules_mut(&mut self) -> &mut [ScopeRule] {
    self
      .property_scope_key
      .as_mut()
      .map(|s| s.property_scope_rules_key.as_mut_slice())
      .unwrap_or(&mut [])
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyScope {
  #[serde(default)]
  pub property_scope_rules_key: Vec<ScopeRule>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

/// One scoped rule of a function-typed custom property. The rule named after
/// the property itself carries the function body; the others carry one
/// parameter each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScopeRule {
  pub name: String,

  #[serde(default)]
  pub scope_variable_info: ScopeVariableInfo,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

/// The volatile half of a scope rule. All fields are optional: split clears
/// them and combine reconstructs them, so absence must be expressible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScopeVariableInfo {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_rule: Option<String>,

  #[serde(rename = "ScopeVariableType", default, skip_serializing_if = "Option::is_none")]
  pub scope_variable_type: Option<u32>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parameter_index: Option<usize>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent_property_name: Option<String>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

/// Registry of control templates, built-in and discovered, keyed
/// case-insensitively by template name.
#[derive(Debug, Default, Clone)]
pub struct TemplateStore {
  templates: BTreeMap<String, TemplateState>,
}

impl TemplateStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a template seen on a control.
  ///
  /// New names copy the incoming template. Known names are updated only when
  /// this sighting is the component definition: the definition owns the
  /// custom properties and turns the component flag on.
  pub fn register(&mut self, incoming: &TemplateState, is_definition: bool) {
    let key = incoming.name.to_lowercase();
    match self.templates.get_mut(&key) {
      None => {
        let mut template = incoming.clone();
        template.original_name = Some(incoming.name.clone());
        template.is_component_template = is_definition || incoming.is_component_definition;
        self.templates.insert(key, template);
      }
      Some(existing) => {
        if is_definition {
          existing.is_component_template = true;
          existing.custom_properties = incoming.custom_properties.clone();
        }
      }
    }
  }

  /// Insert a template as-is, replacing any previous entry with the name.
  pub fn insert(&mut self, mut template: TemplateState) {
    let key = template.name.to_lowercase();
    if template.original_name.is_none() {
      template.original_name = Some(template.name.clone());
    }
    self.templates.insert(key, template);
  }

  pub fn get(&self, name: &str) -> Option<&TemplateState> {
    self.templates.get(&name.to_lowercase())
  }

  pub fn get_mut(&mut self, name: &str) -> Option<&mut TemplateState> {
    self.templates.get_mut(&name.to_lowercase())
  }

  /// Look up by the IR's type name: the template name, or its display name.
  pub fn resolve(&self, type_name: &str) -> Option<&TemplateState> {
    self.get(type_name).or_else(|| {
      self
        .templates
        .values()
        .find(|t| t.display_name.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(type_name)))
    })
  }

  pub fn resolve_mut(&mut self, type_name: &str) -> Option<&mut TemplateState> {
    let key = if self.templates.contains_key(&type_name.to_lowercase()) {
      type_name.to_lowercase()
    } else {
      match self
        .templates
        .iter()
        .find(|(_, t)| t.display_name.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(type_name)))
      {
        Some((k, _)) => k.clone(),
        None => return None,
      }
    };
    self.templates.get_mut(&key)
  }

  /// Templates in key order.
  pub fn iter(&self) -> impl Iterator<Item = &TemplateState> {
    self.templates.values()
  }

  pub fn len(&self) -> usize {
    self.templates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.templates.is_empty()
  }
}

/// Read stock templates from a directory of `<template>_<version>.xml` files.
///
/// Only the root element's `name` and `version` attributes are consulted; the
/// raw XML is preserved so the package keeps it verbatim.
pub fn discover_templates(dir: &Path) -> Result<Vec<TemplateState>> {
  let mut found = Vec::new();

  let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter(|e| e.path().extension().is_some_and(|x| x.eq_ignore_ascii_case("xml")))
    .map(|e| e.into_path())
    .collect();
  paths.sort();

  for path in paths {
    let content = fs::read_to_string(&path)?;
    let mut reader = Reader::from_str(&content);
    let mut name = None;
    let mut version = None;

    loop {
      match reader.read_event()? {
        Event::Start(e) | Event::Empty(e) => {
          for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            match attr.key.as_ref() {
              b"name" => name = Some(String::from_utf8_lossy(&attr.value).into_owned()),
              b"version" => version = Some(String::from_utf8_lossy(&attr.value).into_owned()),
              _ => {}
            }
          }
          break;
        }
        Event::Eof => break,
        _ => {}
      }
    }

    let Some(name) = name else {
      debug!(path = %path.display(), "template XML has no name attribute, skipping");
      continue;
    };

    let mut template = TemplateState::named(&name);
    template.version = version.unwrap_or_else(|| "1.0".to_string());
    template.template_xml = Some(content);
    found.push(template);
  }

  if found.is_empty() {
    return Err(Error::Fatal {
      code: pasrc_core::diag::DiagCode::BadParameter,
      message: format!("no control templates found under {}", dir.display()),
    });
  }
  Ok(found)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn data_type_table_round_trips() {
    assert_eq!(data_type_code("String"), Some(3));
    assert_eq!(data_type_code("string"), Some(3));
    assert_eq!(data_type_name(3), Some("String"));
    assert_eq!(data_type_code("Widget"), None);
    assert_eq!(data_type_name(999), None);
  }

  #[test]
  fn register_first_sighting_wins_until_definition() {
    let mut store = TemplateStore::new();
    let mut instance = TemplateState::named("MyComponent");
    instance.version = "3".to_string();
    store.register(&instance, false);
    assert!(!store.get("mycomponent").unwrap().is_component_template);

    let mut definition = TemplateState::named("MyComponent");
    definition.is_component_definition = true;
    definition.custom_properties.push(CustomProperty {
      name: "Calc".to_string(),
      property_data_type_key: Some("Function".to_string()),
      property_scope_key: None,
      extension_data: JsonMap::new(),
    });
    store.register(&definition, true);

    let stored = store.get("MyComponent").unwrap();
    assert!(stored.is_component_template);
    assert_eq!(stored.custom_properties.len(), 1);
    // The first sighting's fields are kept.
    assert_eq!(stored.version, "3");
  }

  #[test]
  fn resolve_matches_display_name() {
    let mut store = TemplateStore::new();
    let mut template = TemplateState::named("label");
    template.display_name = Some("Label".to_string());
    store.insert(template);

    assert!(store.resolve("Label").is_some());
    assert!(store.resolve("label").is_some());
    assert!(store.resolve("nope").is_none());
  }

  #[test]
  fn test_templates_are_recognized() {
    assert!(is_test_template("appTest"));
    assert!(is_test_template("TESTSUITE"));
    assert!(!is_test_template("label"));
  }

  #[test]
  fn discover_reads_name_and_version() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
      dir.path().join("label_2.5.0.xml"),
      r#"<widget name="label" version="2.5.0"><example/></widget>"#,
    )
    .unwrap();

    let templates = discover_templates(dir.path()).unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name, "label");
    assert_eq!(templates[0].version, "2.5.0");
    assert!(templates[0].template_xml.as_deref().unwrap().contains("<example/>"));
  }
}
