use crate::blocks::Block;
use crate::description::BlockDescription;
use crate::parser::{BlockDescriptionParser, ExpressionParser, ParseError};
use crate::program::{BlockExpression, Expression, ProgramUnit, ScriptExpression, Source, UnitKind};
use crate::types::ScratchType;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

static REPEAT_UNTIL: LazyLock<BlockDescription> = LazyLock::new(|| {
    BlockDescription::builder()
        .label("repeat")
        .label("until")
        .param(ScratchType::Boolean)
        .param(ScratchType::Loop)
        .build()
});

/// A Nassi-Shneiderman diagram: a labelled root with an ordered body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagram {
    pub label: String,
    pub children: Vec<Element>,
}

impl Diagram {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, element: Element) -> Self {
        self.children.push(element);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Instruction {
        label: String,
    },
    Decision {
        label: String,
        then_branch: Vec<Element>,
        else_branch: Vec<Element>,
    },
    Forever {
        body: Vec<Element>,
    },
    TestFirstLoop {
        label: String,
        body: Vec<Element>,
    },
    /// Any element kind the converter has no block for (case, call, jump...).
    Unsupported {
        kind: String,
        label: String,
    },
}

impl Element {
    pub fn instruction(label: impl Into<String>) -> Self {
        Element::Instruction { label: label.into() }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            Element::Instruction { .. } => "instruction",
            Element::Decision { .. } => "decision",
            Element::Forever { .. } => "forever loop",
            Element::TestFirstLoop { .. } => "test-first loop",
            Element::Unsupported { kind, .. } => kind,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Element::Instruction { label }
            | Element::Decision { label, .. }
            | Element::TestFirstLoop { label, .. }
            | Element::Unsupported { label, .. } => label,
            Element::Forever { .. } => "",
        }
    }

    fn source(&self) -> Source {
        Source {
            kind: self.kind_name().to_string(),
            label: self.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NsdError {
    InvalidHeader { label: String, error: ParseError },
    Expression { element: Source, error: ParseError },
    /// An instruction whose text is a literal rather than a block call.
    Classification { element: Source, found: String },
    UnrecognizedElement { kind: String, label: String },
    UnrecognizedLoopKind { element: Source },
}

impl Display for NsdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NsdError::InvalidHeader { label, error } => {
                write!(f, "Invalid block label '{}': {}", label, error)
            }
            NsdError::Expression { element, error } => {
                write!(f, "Expression error in {}: {}", element, error)
            }
            NsdError::Classification { element, found } => {
                write!(f, "{} must be a block, got '{}'.", element, found)
            }
            NsdError::UnrecognizedElement { kind, label } => {
                write!(f, "Unrecognized element '{}' ('{}').", kind, label)
            }
            NsdError::UnrecognizedLoopKind { element } => {
                write!(f, "Unrecognized loop kind in {}.", element)
            }
        }
    }
}

impl Error for NsdError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NsdError::InvalidHeader { error, .. } | NsdError::Expression { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Walks one diagram and builds the [`ProgramUnit`] it describes.
pub struct NsdParser<'d> {
    diagram: &'d Diagram,
}

impl<'d> NsdParser<'d> {
    pub fn new(diagram: &'d Diagram) -> Self {
        Self { diagram }
    }

    pub fn parse(&self) -> Result<ProgramUnit, NsdError> {
        let label = self.diagram.label.trim();
        let (kind, header) = split_unit_kind(label);
        let description = BlockDescriptionParser::new(header, true)
            .parse()
            .map_err(|error| NsdError::InvalidHeader {
                label: label.to_string(),
                error,
            })?;
        let body = self.parse_elements(&self.diagram.children)?;
        Ok(ProgramUnit::new(kind, description, body))
    }

    fn parse_elements(&self, elements: &[Element]) -> Result<Vec<BlockExpression>, NsdError> {
        elements.iter().map(|element| self.parse_element(element)).collect()
    }

    fn parse_script(&self, elements: &[Element]) -> Result<Expression, NsdError> {
        Ok(Expression::Script(ScriptExpression::new(self.parse_elements(elements)?)))
    }

    fn parse_element(&self, element: &Element) -> Result<BlockExpression, NsdError> {
        let source = element.source();
        match element {
            Element::Instruction { label } => match self.parse_expression(label, &source)? {
                Expression::Block(block) => Ok(block),
                other => Err(NsdError::Classification {
                    element: source,
                    found: other.to_string(),
                }),
            },
            Element::Decision {
                label,
                then_branch,
                else_branch,
            } => {
                let condition = self.parse_expression(label, &source)?;
                let then_script = self.parse_script(then_branch)?;
                if else_branch.is_empty() {
                    return Ok(structure(source, Block::If.description(), vec![condition, then_script]));
                }
                let else_script = self.parse_script(else_branch)?;
                Ok(structure(
                    source,
                    Block::IfElse.description(),
                    vec![condition, then_script, else_script],
                ))
            }
            Element::Forever { body } => {
                let script = self.parse_script(body)?;
                Ok(structure(source, Block::Forever.description(), vec![script]))
            }
            Element::TestFirstLoop { label, body } => {
                let script = self.parse_script(body)?;
                let rest = match strip_keyword(label.trim(), "repeat") {
                    Some(rest) => rest.trim(),
                    None => return Err(NsdError::UnrecognizedLoopKind { element: source }),
                };
                let until = strip_keyword(rest, "until")
                    .filter(|tail| !tail.starts_with(|ch: char| ch.is_alphanumeric() || ch == '_'));
                if let Some(condition) = until {
                    let condition = self.parse_expression(condition.trim(), &source)?;
                    return Ok(structure(source, &REPEAT_UNTIL, vec![condition, script]));
                }
                let count = self.parse_expression(rest, &source)?;
                Ok(structure(source, Block::Repeat.description(), vec![count, script]))
            }
            Element::Unsupported { kind, label } => Err(NsdError::UnrecognizedElement {
                kind: kind.clone(),
                label: label.clone(),
            }),
        }
    }

    fn parse_expression(&self, text: &str, source: &Source) -> Result<Expression, NsdError> {
        let mut expression = ExpressionParser::new(text)
            .parse()
            .map_err(|error| NsdError::Expression {
                element: source.clone(),
                error,
            })?;
        expression.attach_source(source);
        Ok(expression)
    }
}

fn structure(source: Source, description: &BlockDescription, params: Vec<Expression>) -> BlockExpression {
    BlockExpression::new(Some(source), description.clone(), params)
}

/// `COMMAND`, `REPORTER` or `PREDICATE` followed by whitespace selects a
/// custom block; anything else is a plain script.
fn split_unit_kind(label: &str) -> (UnitKind, &str) {
    if let Some((head, rest)) = label.split_once(char::is_whitespace) {
        if let Some(kind) = UnitKind::from_prefix(head) {
            return (kind, rest.trim());
        }
    }
    (UnitKind::Script, label)
}

/// Strips a leading keyword, ignoring case. `repeat(10)` and `REPEAT10`
/// both start with `repeat`.
fn strip_keyword<'s>(text: &'s str, keyword: &str) -> Option<&'s str> {
    let head = text.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        Some(&text[keyword.len()..])
    } else {
        None
    }
}
