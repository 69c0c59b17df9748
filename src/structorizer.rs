use crate::nsd::{Diagram, Element as NsdElement};
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use xmltree::{Element, XMLNode};

/// Reads a Structorizer `.nsd` file into a [`Diagram`].
pub fn read_nsd_file(path: &Path) -> Result<Diagram> {
    let source = fs::read_to_string(path).with_context(|| format!("Failed to read '{}'.", path.display()))?;
    parse_nsd_str(&source).with_context(|| format!("Invalid diagram file '{}'.", path.display()))
}

pub fn parse_nsd_str(source: &str) -> Result<Diagram> {
    let root = Element::parse(Cursor::new(source.trim_start_matches('\u{feff}').as_bytes()))
        .map_err(|e| anyhow!("Malformed XML: {}.", e))?;
    if root.name != "root" {
        bail!("Expected a <root> element, found <{}>.", root.name);
    }
    let reader = TextReader::new()?;
    let label = reader.joined(&root);
    let children = match root.get_child("children") {
        Some(children) => reader.elements(children)?,
        None => Vec::new(),
    };
    Ok(Diagram { label, children })
}

/// Decodes the `text` attribute, which holds one double-quoted string per
/// line with `""` standing for a literal quote.
struct TextReader {
    line_re: Regex,
}

impl TextReader {
    fn new() -> Result<Self> {
        Ok(Self {
            line_re: Regex::new(r#""((?:[^"]|"")*)""#)?,
        })
    }

    fn lines(&self, element: &Element) -> Vec<String> {
        let raw = match element.attributes.get("text") {
            Some(raw) => raw,
            None => return Vec::new(),
        };
        let lines: Vec<String> = self
            .line_re
            .captures_iter(raw)
            .map(|caps| caps[1].replace("\"\"", "\""))
            .filter(|line| !line.trim().is_empty())
            .collect();
        if lines.is_empty() && !raw.contains('"') && !raw.trim().is_empty() {
            return vec![raw.trim().to_string()];
        }
        lines
    }

    fn joined(&self, element: &Element) -> String {
        self.lines(element)
            .iter()
            .map(|line| line.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn elements(&self, container: &Element) -> Result<Vec<NsdElement>> {
        let mut out = Vec::new();
        for child in child_elements(container) {
            match child.name.as_str() {
                "instruction" => out.extend(
                    self.lines(child)
                        .into_iter()
                        .map(|line| NsdElement::instruction(line.trim())),
                ),
                "alternative" => out.push(NsdElement::Decision {
                    label: self.joined(child),
                    then_branch: self.branch(child, "qTrue")?,
                    else_branch: self.branch(child, "qFalse")?,
                }),
                "forever" => out.push(NsdElement::Forever {
                    body: self.branch(child, "qForever")?,
                }),
                "while" => out.push(NsdElement::TestFirstLoop {
                    label: self.joined(child),
                    body: self.branch(child, "qWhile")?,
                }),
                "for" => out.push(NsdElement::TestFirstLoop {
                    label: self.joined(child),
                    body: self.branch(child, "qFor")?,
                }),
                other => out.push(NsdElement::Unsupported {
                    kind: other.to_string(),
                    label: self.joined(child),
                }),
            }
        }
        Ok(out)
    }

    fn branch(&self, element: &Element, name: &str) -> Result<Vec<NsdElement>> {
        match element.get_child(name) {
            Some(branch) => self.elements(branch),
            None => Ok(Vec::new()),
        }
    }
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root xmlns:nsd="https://structorizer.fisch.lu" text="&#34;REPORTER add (a) and (b)&#34;" comment="" color="ffffff" type="sub" style="nice">
  <children>
    <instruction text="&#34;say &#34;&#34;adding now!&#34;&#34;&#34;,&#34;report ((a) + (b))&#34;" comment="" color="ffffff" rotated="0"></instruction>
    <alternative text="&#34;(a) &#62; 3&#34;" comment="" color="ffffff">
      <qTrue>
        <instruction text="&#34;say &#34;&#34;big&#34;&#34;&#34;" comment="" color="ffffff" rotated="0"></instruction>
      </qTrue>
      <qFalse color="ffffff"></qFalse>
    </alternative>
    <while text="&#34;repeat 10&#34;" comment="" color="ffffff">
      <qWhile>
        <forever comment="" color="ffffff">
          <qForever></qForever>
        </forever>
      </qWhile>
    </while>
    <case text="&#34;x&#34;,&#34;1&#34;" comment="" color="ffffff"></case>
  </children>
</root>
"#;

    #[test]
    fn reads_structorizer_documents() {
        let diagram = parse_nsd_str(SAMPLE).unwrap();
        assert_eq!(diagram.label, "REPORTER add (a) and (b)");
        assert_eq!(diagram.children.len(), 5);
        assert_eq!(diagram.children[0], NsdElement::instruction("say \"adding now!\""));
        assert_eq!(diagram.children[1], NsdElement::instruction("report ((a) + (b))"));

        match &diagram.children[2] {
            NsdElement::Decision {
                label,
                then_branch,
                else_branch,
            } => {
                assert_eq!(label, "(a) > 3");
                assert_eq!(then_branch.len(), 1);
                assert!(else_branch.is_empty());
            }
            other => panic!("expected a decision, got {:?}", other),
        }

        match &diagram.children[3] {
            NsdElement::TestFirstLoop { label, body } => {
                assert_eq!(label, "repeat 10");
                assert_eq!(body, &vec![NsdElement::Forever { body: Vec::new() }]);
            }
            other => panic!("expected a loop, got {:?}", other),
        }

        assert_eq!(
            diagram.children[4],
            NsdElement::Unsupported {
                kind: "case".to_string(),
                label: "x 1".to_string(),
            }
        );
    }

    #[test]
    fn tolerates_missing_children() {
        let diagram = parse_nsd_str(r#"<root text="&#34;main&#34;"></root>"#).unwrap();
        assert_eq!(diagram.label, "main");
        assert!(diagram.children.is_empty());
    }

    #[test]
    fn rejects_foreign_documents() {
        assert!(parse_nsd_str("<svg></svg>").is_err());
        assert!(parse_nsd_str("<root text=").is_err());
    }
}
