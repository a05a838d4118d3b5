//! Parser: textual form to IR tree.

use pasrc_core::diag::SourceSpan;
use pasrc_core::json::normalize_newlines;

use crate::dsl::{ParseError, INDENT};
use crate::ir::{ArgMetadata, FuncNode, IrBlock, PropNode, TypeInfo, TypedName};

/// Parse one source file into its root control.
pub fn parse_document(text: &str, file: &str) -> Result<IrBlock, ParseError> {
  let mut parser = Parser::new(text, file)?;
  parser.skip_blank();
  let root = parser.parse_block(0)?;
  parser.skip_blank();
  if let Some(line) = parser.peek() {
    let number = line.number;
    return Err(parser.err_at(number, "expected a single root control per file"));
  }
  Ok(root)
}

#[derive(Clone)]
struct Line {
  /// Leading spaces.
  indent: usize,
  /// Line content without the leading indent.
  text: String,
  /// Raw line as written, for expression bodies.
  raw: String,
  /// 1-based.
  number: u32,
}

struct Parser {
  lines: Vec<Line>,
  pos: usize,
  file: String,
}

impl Parser {
  fn new(text: &str, file: &str) -> Result<Self, ParseError> {
    let normalized = normalize_newlines(text);
    let mut lines = Vec::new();
    for (i, raw) in normalized.split('\n').enumerate() {
      let number = (i + 1) as u32;
      if let Some(tab) = raw.find('\t') {
        return Err(ParseError {
          message: "tabs are not allowed; indent with spaces".to_string(),
          span: SourceSpan::point(file, number, (tab + 1) as u32),
        });
      }
      let indent = raw.len() - raw.trim_start_matches(' ').len();
      lines.push(Line {
        indent,
        text: raw[indent..].to_string(),
        raw: raw.to_string(),
        number,
      });
    }
    // A final newline leaves one empty trailing piece; drop it.
    if lines.last().is_some_and(|l| l.raw.is_empty()) {
      lines.pop();
    }
    Ok(Self {
      lines,
      pos: 0,
      file: file.to_string(),
    })
  }

  fn peek(&self) -> Option<&Line> {
    self.lines.get(self.pos)
  }

  fn bump(&mut self) -> Line {
    let line = self.lines[self.pos].clone();
    self.pos += 1;
    line
  }

  fn skip_blank(&mut self) {
    while self.peek().is_some_and(|l| l.text.trim().is_empty()) {
      self.pos += 1;
    }
  }

  fn err_at(&self, line: u32, message: impl Into<String>) -> ParseError {
    ParseError {
      message: message.into(),
      span: SourceSpan::point(&self.file, line, 1),
    }
  }

  /// Indentation must land exactly on a level boundary.
  fn depth_of(&self, indent: usize, number: u32) -> Result<usize, ParseError> {
    if indent % INDENT != 0 {
      return Err(self.err_at(number, format!("indentation must be a multiple of {} spaces", INDENT)));
    }
    Ok(indent / INDENT)
  }

  fn parse_block(&mut self, depth: usize) -> Result<IrBlock, ParseError> {
    if self.peek().is_none() {
      return Err(self.err_at(self.lines.len() as u32, "expected a control header"));
    }
    let header = self.bump();
    if self.depth_of(header.indent, header.number)? != depth {
      return Err(self.err_at(header.number, "unexpected indentation for control header"));
    }

    let name =
      parse_header(&header.text).ok_or_else(|| self.err_at(header.number, "expected `Name As Type[.Variant]:`"))?;
    let mut block = IrBlock {
      name,
      properties: Vec::new(),
      functions: Vec::new(),
      children: Vec::new(),
    };

    loop {
      self.skip_blank();
      let Some(line) = self.peek() else { break };
      let number = line.number;
      let text = line.text.clone();
      let line_depth = self.depth_of(line.indent, number)?;
      if line_depth <= depth {
        break;
      }
      if line_depth != depth + 1 {
        return Err(self.err_at(number, "unexpected indentation"));
      }

      match classify(&text) {
        MemberKind::Function => block.functions.push(self.parse_function(depth + 1)?),
        MemberKind::Property => {
          let (identifier, expression) = self.parse_property(depth + 1)?;
          block.properties.push(PropNode { identifier, expression });
        }
        MemberKind::Block => block.children.push(self.parse_block(depth + 1)?),
        MemberKind::Unknown => {
          return Err(self.err_at(number, format!("cannot parse line: {:?}", text)));
        }
      }
    }

    Ok(block)
  }

  /// Parse a property line (with a possible block body) at `depth`.
  fn parse_property(&mut self, depth: usize) -> Result<(String, String), ParseError> {
    let line = self.bump();
    let number = line.number;

    let (identifier, rest) = if let Some(stripped) = line.text.strip_suffix(" =") {
      (stripped.to_string(), None)
    } else {
      match line.text.split_once(" = ") {
        Some((id, rest)) => (id.to_string(), Some(rest.to_string())),
        None => return Err(self.err_at(number, "expected `Name = expression`")),
      }
    };
    if identifier.is_empty() {
      return Err(self.err_at(number, "property name is empty"));
    }

    let expression = match rest {
      None => String::new(),
      Some(rest) => match rest.strip_prefix('|') {
        None => rest,
        Some(count) => {
          let trailing: usize = if count.is_empty() {
            0
          } else {
            count
              .parse()
              .map_err(|_| self.err_at(number, "expected a count after `|`"))?
          };
          self.parse_expression_body(depth, trailing)
        }
      },
    };

    Ok((identifier, expression))
  }

  /// Collect a block expression's body lines at one level deeper.
  fn parse_expression_body(&mut self, property_depth: usize, trailing: usize) -> String {
    let base = (property_depth + 1) * INDENT;
    let mut collected: Vec<String> = Vec::new();

    while let Some(line) = self.peek() {
      let blank = line.text.trim().is_empty();
      if !blank && line.indent < base {
        break;
      }
      let line = self.bump();
      if line.raw.len() >= base {
        collected.push(line.raw[base..].to_string());
      } else {
        collected.push(String::new());
      }
    }

    // Empty lines at the end of the region are not body content; the marker's
    // count is the single owner of trailing newlines.
    while collected.last().is_some_and(|l| l.is_empty()) {
      collected.pop();
    }

    let mut expression = collected.join("\n");
    for _ in 0..trailing {
      expression.push('\n');
    }
    expression
  }

  fn parse_function(&mut self, depth: usize) -> Result<FuncNode, ParseError> {
    let line = self.bump();
    let number = line.number;

    let open = line.text.find('(').expect("classified as function");
    let identifier = line.text[..open].to_string();
    let Some(args_text) = line.text[open + 1..].strip_suffix("):") else {
      return Err(self.err_at(number, "expected `Name(args...):`"));
    };

    let mut args = Vec::new();
    if !args_text.trim().is_empty() {
      for piece in args_text.split(", ") {
        let Some((arg_name, type_name)) = piece.split_once(" As ") else {
          return Err(self.err_at(number, format!("cannot parse function argument {:?}", piece)));
        };
        args.push(TypedName {
          identifier: arg_name.to_string(),
          kind: TypeInfo::new(type_name),
        });
      }
    }

    let mut metadata = Vec::new();
    loop {
      self.skip_blank();
      let Some(line) = self.peek() else { break };
      let line_number = line.number;
      let line_depth = self.depth_of(line.indent, line_number)?;
      if line_depth <= depth {
        break;
      }
      if line_depth != depth + 1 {
        return Err(self.err_at(line_number, "unexpected indentation in function block"));
      }
      let (identifier, default_expression) = self.parse_property(depth + 1)?;
      metadata.push(ArgMetadata {
        identifier,
        default_expression,
      });
    }

    Ok(FuncNode {
      identifier,
      args,
      metadata,
    })
  }
}

enum MemberKind {
  Property,
  Function,
  Block,
  Unknown,
}

/// Decide what a member line is without consuming it.
fn classify(text: &str) -> MemberKind {
  let eq = text.find(" = ").or_else(|| text.ends_with(" =").then(|| text.len() - 2));
  let paren = text.find('(');

  // A function header has its paren before any `=`; a property whose
  // expression merely ends in `):` does not.
  if text.ends_with("):") && paren.is_some_and(|p| eq.is_none_or(|e| p < e)) {
    return MemberKind::Function;
  }
  if eq.is_some() {
    return MemberKind::Property;
  }
  if text.ends_with(':') && text.contains(" As ") {
    return MemberKind::Block;
  }
  MemberKind::Unknown
}

/// Parse `Name As Type[.Variant]:`.
fn parse_header(text: &str) -> Option<TypedName> {
  let text = text.strip_suffix(':')?;
  let (name, kind) = text.split_once(" As ")?;
  if name.is_empty() || kind.is_empty() {
    return None;
  }
  let kind = match kind.split_once('.') {
    Some((type_name, variant)) if !variant.is_empty() => TypeInfo::with_variant(type_name, variant),
    _ => TypeInfo::new(kind),
  };
  Some(TypedName {
    identifier: name.to_string(),
    kind,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_nested_blocks() {
    let text = "Screen1 As screen:\n    OnVisible = Set(x, 1)\n    Label1 As label:\n        Text = \"hi\"\n";
    let root = parse_document(text, "s.pa.yaml").unwrap();
    assert_eq!(root.name.identifier, "Screen1");
    assert_eq!(root.properties.len(), 1);
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].property("Text").unwrap().expression, "\"hi\"");
  }

  #[test]
  fn variant_is_split_from_type() {
    let root = parse_document("L As label.compact:\n", "x").unwrap();
    assert_eq!(root.name.kind.type_name, "label");
    assert_eq!(root.name.kind.variant.as_deref(), Some("compact"));
  }

  #[test]
  fn block_expression_collects_deeper_lines() {
    let text = "S As screen:\n    Body = |1\n        If(a,\n            b)\n";
    let root = parse_document(text, "x").unwrap();
    assert_eq!(root.property("Body").unwrap().expression, "If(a,\n    b)\n");
  }

  #[test]
  fn property_expression_ending_in_paren_colon_is_a_property() {
    let text = "S As screen:\n    OnSelect = Back():\n";
    let root = parse_document(text, "x").unwrap();
    assert_eq!(root.property("OnSelect").unwrap().expression, "Back():");
    assert!(root.functions.is_empty());
  }

  #[test]
  fn tabs_are_rejected_with_span() {
    let err = parse_document("S As screen:\n\tText = 1\n", "s.pa.yaml").unwrap_err();
    assert!(err.message.contains("tabs"));
    assert_eq!(err.span.file, "s.pa.yaml");
    assert_eq!(err.span.start_line, 2);
  }

  #[test]
  fn second_root_is_an_error() {
    let err = parse_document("A As screen:\nB As screen:\n", "x").unwrap_err();
    assert!(err.message.contains("single root"));
    assert_eq!(err.span.start_line, 2);
  }

  #[test]
  fn misaligned_indent_is_an_error() {
    let err = parse_document("A As screen:\n   Text = 1\n", "x").unwrap_err();
    assert!(err.message.contains("multiple of 4"));
  }

  #[test]
  fn expression_containing_as_is_not_a_block() {
    let text = "S As screen:\n    Text = a As b:\n";
    let root = parse_document(text, "x").unwrap();
    assert_eq!(root.property("Text").unwrap().expression, "a As b:");
  }
}
