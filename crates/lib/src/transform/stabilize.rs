//! Asset stabilization: deterministic file names for local-file resources.
//!
//! On unpack every local-file resource is renamed to
//! `<resourceName><originalExtension>`, the app logo becomes `logo<ext>`, and
//! every original name lands in entropy so pack can undo the whole thing.
//! Names that differ only in case get a `_<k>` alias; resources sharing one
//! original file name additionally get a JSON sidecar next to the asset.

use std::collections::BTreeSet;

use pasrc_core::diag::{DiagCode, ErrorContainer};
use tracing::info;

use crate::document::assets::AssetSidecar;
use crate::document::Document;
use crate::Result;

/// Archive directory assets live under.
pub const ASSET_PREFIX: &str = "Assets";

/// Stem used for the normalized app logo.
const LOGO_STEM: &str = "logo";

fn dir_of(path: &str) -> &str {
  match path.rfind('/') {
    Some(i) => &path[..i],
    None => "",
  }
}

fn join_dir(dir: &str, file: &str) -> String {
  if dir.is_empty() {
    file.to_string()
  } else {
    format!("{}/{}", dir, file)
  }
}

fn extension_of(file_name: &str) -> &str {
  match file_name.rfind('.') {
    Some(i) => &file_name[i..],
    None => "",
  }
}

/// Unpack direction: rename assets to resource names, record originals.
pub fn stabilize_assets(doc: &mut Document, diags: &mut ErrorContainer) -> Result<()> {
  // Resources process in ordinal name order so alias numbering is stable.
  let mut order: Vec<usize> = (0..doc.resources.resources.len()).collect();
  order.sort_by(|&a, &b| doc.resources.resources[a].name.cmp(&doc.resources.resources[b].name));

  let mut used_stems: BTreeSet<String> = BTreeSet::new();
  let mut seen_originals: BTreeSet<String> = BTreeSet::new();

  for idx in order {
    let resource = &doc.resources.resources[idx];
    if !resource.is_local_file() {
      continue;
    }
    let original_file = resource.file_name.clone();
    let old_path = resource.path.clone();
    let ext = extension_of(&original_file).to_string();

    // Case collision: the later name (ordinal order) gets the least free
    // numeric alias.
    let mut new_stem = resource.name.clone();
    if used_stems.contains(&new_stem.to_lowercase()) {
      let mut k = 1;
      while used_stems.contains(&format!("{}_{}", new_stem, k).to_lowercase()) {
        k += 1;
      }
      new_stem = format!("{}_{}", new_stem, k);
      info!(resource = %resource.name, alias = %new_stem, "resource name collides by case, using alias");
    }
    used_stems.insert(new_stem.to_lowercase());

    let new_file = format!("{}{}", new_stem, ext);
    let new_path = join_dir(dir_of(&old_path), &new_file);

    doc.entropy.record_resource_file_name(&new_stem, &original_file);

    // Two resources backed by one original file name: leave a sidecar so
    // pack can restore the name even without entropy.
    if !seen_originals.insert(original_file.to_lowercase()) {
      doc.asset_sidecars.push(AssetSidecar {
        original_name: original_file.clone(),
        new_file_name: new_file.clone(),
        path: new_path.clone(),
      });
    }

    if old_path != new_path && !doc.assets.rename(&old_path, &new_path) {
      diags.report(
        DiagCode::ValidationWarning,
        format!("resource {:?} points at missing asset {:?}", resource.name, old_path),
      );
    }

    let resource = &mut doc.resources.resources[idx];
    resource.file_name = new_file;
    resource.path = new_path;
  }

  // The manifest's original array order is entropy; the source form sorts by
  // name so diffs stay quiet.
  for (i, resource) in doc.resources.resources.iter().enumerate() {
    doc.entropy.resource_order.insert(resource.name.clone(), i as u32);
  }
  doc.resources.resources.sort_by(|a, b| a.name.cmp(&b.name));

  stabilize_logo(doc);
  Ok(())
}

/// Replace the logo's generated file name with `logo<ext>`.
fn stabilize_logo(doc: &mut Document) {
  let Some(publish) = doc.publish_info.as_mut() else { return };
  if publish.logo_file_name.is_empty() {
    return;
  }
  let original = publish.logo_file_name.clone();
  let new_file = format!("{}{}", LOGO_STEM, extension_of(&original));
  if original == new_file {
    return;
  }

  let old_path = join_dir(ASSET_PREFIX, &original);
  let new_path = join_dir(ASSET_PREFIX, &new_file);
  doc.assets.rename(&old_path, &new_path);

  doc.entropy.old_logo_file_name = Some(original);
  publish.logo_file_name = new_file;
}

/// Pack direction: restore original names from entropy, or assign fresh
/// numeric names greater than any number entropy has seen.
pub fn unstabilize_assets(doc: &mut Document, _diags: &mut ErrorContainer) -> Result<()> {
  let mut next_number = doc.entropy.next_resource_number();

  for idx in 0..doc.resources.resources.len() {
    let resource = &doc.resources.resources[idx];
    if !resource.is_local_file() {
      continue;
    }
    let stem = resource.file_stem().to_string();
    let ext = resource.file_extension().to_string();
    let current_path = resource.path.clone();

    let original = match doc.entropy.resource_file_name(&stem) {
      Some(name) => name.to_string(),
      None => match doc
        .asset_sidecars
        .iter()
        .find(|s| s.new_file_name == resource.file_name)
      {
        Some(sidecar) => sidecar.original_name.clone(),
        None => {
          let fresh = format!("{:04}{}", next_number, ext);
          next_number += 1;
          fresh
        }
      },
    };

    let restored_path = join_dir(dir_of(&current_path), &original);
    if current_path != restored_path {
      doc.assets.rename(&current_path, &restored_path);
    }

    let resource = &mut doc.resources.resources[idx];
    resource.file_name = original;
    resource.path = restored_path;
  }

  // Original manifest order; resources entropy never saw keep their sorted
  // order at the end.
  doc
    .resources
    .resources
    .sort_by_key(|r| doc.entropy.resource_order.get(&r.name).copied().unwrap_or(u32::MAX));

  unstabilize_logo(doc);
  Ok(())
}

fn unstabilize_logo(doc: &mut Document) {
  let Some(original) = doc.entropy.old_logo_file_name.clone() else { return };
  let Some(publish) = doc.publish_info.as_mut() else { return };
  if publish.logo_file_name == original {
    return;
  }

  let old_path = join_dir(ASSET_PREFIX, &publish.logo_file_name);
  let new_path = join_dir(ASSET_PREFIX, &original);
  doc.assets.rename(&old_path, &new_path);
  publish.logo_file_name = original;
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::assets::{PublishInfo, ResourceEntry, CONTENT_LOCAL_FILE};
  use crate::document::control::JsonMap;
  use crate::document::Origin;

  fn resource(name: &str, file: &str) -> ResourceEntry {
    ResourceEntry {
      name: name.to_string(),
      content: CONTENT_LOCAL_FILE.to_string(),
      path: format!("Assets/Images/{}", file),
      file_name: file.to_string(),
      extension_data: JsonMap::new(),
    }
  }

  fn doc_with_resources(resources: Vec<ResourceEntry>) -> Document {
    let mut doc = Document::new(Origin::Package);
    for r in &resources {
      doc.assets.insert(&r.path, r.file_name.clone().into_bytes());
    }
    doc.resources.resources = resources;
    doc
  }

  #[test]
  fn rename_to_resource_name_records_entropy() {
    let mut doc = doc_with_resources(vec![resource("Photo", "e6c4d3-ab.png")]);
    let mut diags = ErrorContainer::new();
    stabilize_assets(&mut doc, &mut diags).unwrap();

    let entry = &doc.resources.resources[0];
    assert_eq!(entry.file_name, "Photo.png");
    assert_eq!(entry.path, "Assets/Images/Photo.png");
    assert!(doc.assets.contains("Assets/Images/Photo.png"));
    assert_eq!(doc.entropy.resource_file_name("Photo"), Some("e6c4d3-ab.png"));
  }

  #[test]
  fn case_collision_gets_numeric_alias_and_round_trips() {
    let mut doc = doc_with_resources(vec![resource("Photo", "aaa.png"), resource("photo", "bbb.png")]);
    let mut diags = ErrorContainer::new();
    stabilize_assets(&mut doc, &mut diags).unwrap();

    let files: Vec<_> = doc.resources.resources.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(files, vec!["Photo.png", "photo_1.png"]);
    assert_eq!(doc.entropy.resource_file_name("Photo"), Some("aaa.png"));
    assert_eq!(doc.entropy.resource_file_name("photo_1"), Some("bbb.png"));

    unstabilize_assets(&mut doc, &mut diags).unwrap();
    let files: Vec<_> = doc.resources.resources.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(files, vec!["aaa.png", "bbb.png"]);
    assert!(doc.assets.contains("Assets/Images/aaa.png"));
    assert!(doc.assets.contains("Assets/Images/bbb.png"));
  }

  #[test]
  fn duplicate_original_file_writes_sidecar() {
    let mut a = resource("First", "shared.png");
    let b = resource("Second", "shared.png");
    a.path = "Assets/Images/shared.png".to_string();
    let mut doc = doc_with_resources(vec![a, b]);
    let mut diags = ErrorContainer::new();
    stabilize_assets(&mut doc, &mut diags).unwrap();

    assert_eq!(doc.asset_sidecars.len(), 1);
    let sidecar = &doc.asset_sidecars[0];
    assert_eq!(sidecar.original_name, "shared.png");
    assert_eq!(sidecar.new_file_name, "Second.png");
  }

  #[test]
  fn logo_normalizes_and_restores() {
    let mut doc = Document::new(Origin::Package);
    doc.publish_info = Some(PublishInfo {
      logo_file_name: "e6c4d3-ab.png".to_string(),
      extension_data: JsonMap::new(),
    });
    doc.assets.insert("Assets/e6c4d3-ab.png", vec![1]);

    let mut diags = ErrorContainer::new();
    stabilize_assets(&mut doc, &mut diags).unwrap();
    assert_eq!(doc.publish_info.as_ref().unwrap().logo_file_name, "logo.png");
    assert!(doc.assets.contains("Assets/logo.png"));
    assert_eq!(doc.entropy.old_logo_file_name.as_deref(), Some("e6c4d3-ab.png"));

    unstabilize_assets(&mut doc, &mut diags).unwrap();
    assert_eq!(doc.publish_info.as_ref().unwrap().logo_file_name, "e6c4d3-ab.png");
    assert!(doc.assets.contains("Assets/e6c4d3-ab.png"));
  }

  #[test]
  fn missing_entropy_assigns_fresh_numeric_names() {
    let mut doc = doc_with_resources(vec![resource("Photo", "Photo.png")]);
    // Simulate a source tree whose entropy file was deleted.
    let mut diags = ErrorContainer::new();
    unstabilize_assets(&mut doc, &mut diags).unwrap();

    let entry = &doc.resources.resources[0];
    assert_eq!(entry.file_name, "0001.png");
    assert!(doc.assets.contains("Assets/Images/0001.png"));
  }

  #[test]
  fn resource_order_restores_from_entropy() {
    let mut doc = doc_with_resources(vec![resource("Zed", "z.png"), resource("Alpha", "a.png")]);
    let mut diags = ErrorContainer::new();
    stabilize_assets(&mut doc, &mut diags).unwrap();

    // Source form is name-sorted.
    let names: Vec<_> = doc.resources.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Zed"]);

    unstabilize_assets(&mut doc, &mut diags).unwrap();
    let names: Vec<_> = doc.resources.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Zed", "Alpha"]);
  }
}
