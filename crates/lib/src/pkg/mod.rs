//! Package (ZIP) wire format: entry classification, loader, writer, checksum.

pub mod checksum;
pub mod loader;
pub mod writer;

pub use loader::load_pkg;
pub use writer::write_pkg;

/// What a package entry is, decided by its exact normalized path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  Header,
  Properties,
  PublishInfo,
  Control,
  Component,
  Templates,
  Themes,
  Resources,
  DataSources,
  Connections,
  ComponentReferences,
  Asset,
  Checksum,
  CheckerResult,
  Unknown,
}

/// Fixed filename → kind lookup over normalized archive paths. Anything not
/// recognized is preserved verbatim.
pub fn classify(normalized: &str) -> EntryKind {
  match normalized {
    "header.json" => EntryKind::Header,
    "properties.json" => EntryKind::Properties,
    "publishinfo.json" => EntryKind::PublishInfo,
    "references/templates.json" => EntryKind::Templates,
    "references/themes.json" => EntryKind::Themes,
    "references/resources.json" => EntryKind::Resources,
    "references/datasources.json" => EntryKind::DataSources,
    "references/connections.json" => EntryKind::Connections,
    "references/componentreferences.json" => EntryKind::ComponentReferences,
    "checksum.json" => EntryKind::Checksum,
    "appcheckerresult.sarif" => EntryKind::CheckerResult,
    _ if normalized.starts_with("controls/") && normalized.ends_with(".json") => EntryKind::Control,
    _ if normalized.starts_with("components/") && normalized.ends_with(".json") => EntryKind::Component,
    _ if normalized.starts_with("assets/") => EntryKind::Asset,
    _ => EntryKind::Unknown,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classification_is_exact_and_case_insensitive() {
    use pasrc_core::paths::normalize;

    assert_eq!(classify(&normalize("Header.json")), EntryKind::Header);
    assert_eq!(classify(&normalize("References\\Templates.json")), EntryKind::Templates);
    assert_eq!(classify(&normalize("Controls/1.json")), EntryKind::Control);
    assert_eq!(classify(&normalize("Assets/Images/logo.png")), EntryKind::Asset);
    assert_eq!(classify(&normalize("Controls/readme.txt")), EntryKind::Unknown);
    assert_eq!(classify(&normalize("something/else.bin")), EntryKind::Unknown);
  }
}
