use crate::lexer::Token;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Raised when a leaf is used like a branch or the other way around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstError {
    pub message: String,
}

impl Display for AstError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for AstError {}

/// Intermediate parse tree: a leaf holds exactly one token, a branch holds an
/// ordered list of children (one per parenthesized group level).
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Leaf(Token),
    /// `open` is where the group's `(` stood; the top level has none.
    Branch {
        children: Vec<AstNode>,
        open: Option<Position>,
    },
}

impl AstNode {
    pub fn leaf(token: Token) -> Self {
        AstNode::Leaf(token)
    }

    pub fn branch() -> Self {
        AstNode::Branch {
            children: Vec::new(),
            open: None,
        }
    }

    /// Position of the opening parenthesis of a group, if any.
    pub fn open_pos(&self) -> Option<Position> {
        match self {
            AstNode::Branch { open, .. } => *open,
            AstNode::Leaf(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, AstNode::Leaf(_))
    }

    pub fn push(&mut self, node: AstNode) -> Result<(), AstError> {
        match self {
            AstNode::Branch { children, .. } => {
                children.push(node);
                Ok(())
            }
            AstNode::Leaf(_) => Err(leaf_misuse("push")),
        }
    }

    pub fn len(&self) -> Result<usize, AstError> {
        self.children().map(<[AstNode]>::len)
    }

    pub fn is_empty(&self) -> Result<bool, AstError> {
        self.children().map(<[AstNode]>::is_empty)
    }

    pub fn get(&self, index: usize) -> Result<&AstNode, AstError> {
        let children = self.children()?;
        children.get(index).ok_or_else(|| AstError {
            message: format!(
                "branch index {} out of range ({} children)",
                index,
                children.len()
            ),
        })
    }

    pub fn children(&self) -> Result<&[AstNode], AstError> {
        match self {
            AstNode::Branch { children, .. } => Ok(children),
            AstNode::Leaf(_) => Err(leaf_misuse("children")),
        }
    }

    pub fn value(&self) -> Result<&Token, AstError> {
        match self {
            AstNode::Leaf(token) => Ok(token),
            AstNode::Branch { .. } => Err(AstError {
                message: "value: node is a branch".to_string(),
            }),
        }
    }
}

fn leaf_misuse(op: &str) -> AstError {
    AstError {
        message: format!("{}: node is a leaf", op),
    }
}

impl Display for AstNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AstNode::Leaf(token) => write!(f, "[{}]", token.value),
            AstNode::Branch { children, .. } => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
