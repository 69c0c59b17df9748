use crate::ast::{AstError, AstNode, Position};
use crate::description::{BlockDescription, Segment};
use crate::lexer::{lex_tree, LexerError, Token, TokenType};
use crate::program::{BlockExpression, Expression};
use crate::types::ScratchType;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Symbols that split an expression into left-associative binary blocks.
const INFIX_OPERATORS: &[&str] = &["+", "-", "*", "/", "<", ">", "="];

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Lex(LexerError),
    Structure(AstError),
    Description {
        message: String,
        fragment: String,
        pos: Position,
    },
    Expression {
        message: String,
        fragment: String,
        pos: Position,
    },
}

impl ParseError {
    pub fn pos(&self) -> Option<Position> {
        match self {
            ParseError::Lex(err) => Some(err.pos),
            ParseError::Structure(_) => None,
            ParseError::Description { pos, .. } | ParseError::Expression { pos, .. } => Some(*pos),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Lex(err) => write!(f, "Lex error: {}", err),
            ParseError::Structure(err) => write!(f, "Malformed parse tree: {}", err),
            ParseError::Description {
                message,
                fragment,
                pos,
            }
            | ParseError::Expression {
                message,
                fragment,
                pos,
            } => write!(
                f,
                "{} at '{}' (line {}, column {})",
                message, fragment, pos.line, pos.column
            ),
        }
    }
}

impl Error for ParseError {}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        ParseError::Lex(err)
    }
}

impl From<AstError> for ParseError {
    fn from(err: AstError) -> Self {
        ParseError::Structure(err)
    }
}

/// Turns a block label into a [`BlockDescription`].
///
/// In header mode (`header == true`) a parenthesized group is a declared
/// parameter name, as in `add (a) and (b)`. Otherwise it names the slot type,
/// as in `move (number) steps`.
pub struct BlockDescriptionParser<'a> {
    source: &'a str,
    header: bool,
}

impl<'a> BlockDescriptionParser<'a> {
    pub fn new(source: &'a str, header: bool) -> Self {
        Self { source, header }
    }

    pub fn parse(&self) -> Result<BlockDescription, ParseError> {
        let tree = lex_tree(self.source)?;
        let items = tree.children()?;
        if items.is_empty() {
            return Err(self.error("Empty block label", self.source, Position::new(1, 1)));
        }
        let mut segments = Vec::with_capacity(items.len());
        let mut near = Position::new(1, 1);
        for node in items {
            match node {
                AstNode::Leaf(token) => {
                    near = token.pos;
                    if token.typ == TokenType::String {
                        return Err(self.error(
                            "String literal in block label",
                            &render(std::slice::from_ref(node)),
                            token.pos,
                        ));
                    }
                    segments.push(Segment::Label(token.value.clone()));
                }
                AstNode::Branch { children, open } => {
                    segments.push(self.parse_slot(children, open.unwrap_or(near))?);
                }
            }
        }
        Ok(BlockDescription::new(segments))
    }

    fn parse_slot(&self, children: &[AstNode], pos: Position) -> Result<Segment, ParseError> {
        let fragment = format!("({})", render(children));
        let mut words = Vec::with_capacity(children.len());
        for child in children {
            match child {
                AstNode::Leaf(token) if token.typ != TokenType::String => words.push(token.value.as_str()),
                AstNode::Leaf(_) => {
                    return Err(self.error("String literal in parameter slot", &fragment, pos));
                }
                AstNode::Branch { .. } => {
                    return Err(self.error("Nested parentheses in parameter slot", &fragment, pos));
                }
            }
        }
        if words.is_empty() {
            return Err(self.error("Empty parameter slot", &fragment, pos));
        }
        if self.header {
            return Ok(Segment::Param {
                typ: ScratchType::Any,
                name: Some(words.join(" ")),
            });
        }
        match words.as_slice() {
            [name] => match ScratchType::from_name(name) {
                Some(typ) => Ok(Segment::Param { typ, name: None }),
                None => Err(self.error("Unknown parameter type", &fragment, pos)),
            },
            _ => Err(self.error("Expected a single parameter type", &fragment, pos)),
        }
    }

    fn error(&self, message: &str, fragment: &str, pos: Position) -> ParseError {
        ParseError::Description {
            message: message.to_string(),
            fragment: fragment.to_string(),
            pos,
        }
    }
}

/// Parses instruction, condition and value text into an [`Expression`].
///
/// Infix operators bind loosest and associate to the left; their operands
/// are block calls made of words interleaved with literals and parenthesized
/// sub-expressions. A lone literal or group is the value itself.
pub struct ExpressionParser<'a> {
    source: &'a str,
}

impl<'a> ExpressionParser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn parse(&self) -> Result<Expression, ParseError> {
        let tree = lex_tree(self.source)?;
        let items = tree.children()?;
        if items.is_empty() {
            return Err(ParseError::Expression {
                message: "Empty expression".to_string(),
                fragment: self.source.to_string(),
                pos: Position::new(1, 1),
            });
        }
        self.parse_sequence(items)
    }

    fn parse_sequence(&self, items: &[AstNode]) -> Result<Expression, ParseError> {
        let mut operands: Vec<&[AstNode]> = Vec::new();
        let mut operators: Vec<&Token> = Vec::new();
        let mut start = 0;
        for (index, node) in items.iter().enumerate() {
            if let Some(op) = infix_operator(node) {
                operands.push(&items[start..index]);
                operators.push(op);
                start = index + 1;
            }
        }
        operands.push(&items[start..]);

        if operators.is_empty() {
            return self.parse_call(items);
        }
        for (index, op) in operators.iter().enumerate() {
            if operands[index].is_empty() || operands[index + 1].is_empty() {
                return Err(expression_error(
                    format!("Missing operand for '{}'", op.value),
                    &render(items),
                    op.pos,
                ));
            }
        }

        let mut left = self.parse_call(operands[0])?;
        for (op, operand) in operators.iter().zip(operands.iter().skip(1)) {
            let right = self.parse_call(operand)?;
            let description = BlockDescription::builder()
                .param(left.typ())
                .label(op.value.clone())
                .param(right.typ())
                .build();
            left = Expression::Block(BlockExpression::new(None, description, vec![left, right]));
        }
        Ok(left)
    }

    fn parse_call(&self, items: &[AstNode]) -> Result<Expression, ParseError> {
        let has_word = items.iter().any(is_word);
        if !has_word {
            if let [single] = items {
                return self.parse_value(single);
            }
            let rest = &items[1..];
            return Err(expression_error(
                "Unexpected trailing input".to_string(),
                &render(rest),
                first_pos(&rest[0]).unwrap_or(Position::new(1, 1)),
            ));
        }

        let mut segments = Vec::with_capacity(items.len());
        let mut params = Vec::new();
        for node in items {
            match node {
                AstNode::Leaf(token) if token.is_word() => segments.push(Segment::Label(token.value.clone())),
                _ => {
                    let value = self.parse_value(node)?;
                    segments.push(Segment::Param {
                        typ: value.typ(),
                        name: None,
                    });
                    params.push(value);
                }
            }
        }
        Ok(Expression::Block(BlockExpression::new(
            None,
            BlockDescription::new(segments),
            params,
        )))
    }

    fn parse_value(&self, node: &AstNode) -> Result<Expression, ParseError> {
        match node {
            AstNode::Leaf(token) => match token.typ {
                TokenType::Number => token
                    .value
                    .parse::<f64>()
                    .map(|value| Expression::Number { value })
                    .map_err(|_| expression_error("Malformed number".to_string(), &token.value, token.pos)),
                TokenType::String => Ok(Expression::String {
                    value: token.value.clone(),
                }),
                _ => self.parse_call(std::slice::from_ref(node)),
            },
            AstNode::Branch { children, open } => {
                if children.is_empty() {
                    return Err(expression_error(
                        "Empty parenthesized slot".to_string(),
                        "()",
                        open.unwrap_or(Position::new(1, 1)),
                    ));
                }
                self.parse_sequence(children)
            }
        }
    }
}

fn expression_error(message: String, fragment: &str, pos: Position) -> ParseError {
    ParseError::Expression {
        message,
        fragment: fragment.to_string(),
        pos,
    }
}

fn infix_operator(node: &AstNode) -> Option<&Token> {
    match node {
        AstNode::Leaf(token) if token.typ == TokenType::Symbol && INFIX_OPERATORS.contains(&token.value.as_str()) => {
            Some(token)
        }
        _ => None,
    }
}

fn is_word(node: &AstNode) -> bool {
    matches!(node, AstNode::Leaf(token) if token.is_word())
}

fn first_pos(node: &AstNode) -> Option<Position> {
    match node {
        AstNode::Leaf(token) => Some(token.pos),
        AstNode::Branch { children, open } => open.or_else(|| children.iter().find_map(first_pos)),
    }
}

fn render(nodes: &[AstNode]) -> String {
    nodes
        .iter()
        .map(|node| match node {
            AstNode::Leaf(token) if token.typ == TokenType::String => format!("{:?}", token.value),
            AstNode::Leaf(token) => token.value.clone(),
            AstNode::Branch { children, .. } => format!("({})", render(children)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
