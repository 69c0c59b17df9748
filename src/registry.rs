use crate::blocks::{Block, FunctionBlock, FUNCTION_BLOCKS, MAX_SCRIPT_VARIABLES};
use crate::description::BlockDescription;
use crate::parser::BlockDescriptionParser;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

static BUILTINS: LazyLock<BlockRegistry<'static>> = LazyLock::new(builtin_registry);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateBlockError {
    pub description: String,
}

impl Display for DuplicateBlockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block '{}' is already defined.", self.description)
    }
}

impl Error for DuplicateBlockError {}

/// Blocks keyed by description shape, optionally layered over a base
/// registry that is consulted on a miss.
#[derive(Debug, Default)]
pub struct BlockRegistry<'a> {
    blocks: HashMap<BlockDescription, Block>,
    base: Option<&'a BlockRegistry<'a>>,
}

impl<'a> BlockRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: &'a BlockRegistry<'a>) -> Self {
        Self {
            blocks: HashMap::new(),
            base: Some(base),
        }
    }

    /// Only this layer is checked for duplicates; shadowing a base entry is
    /// allowed.
    pub fn register(&mut self, block: Block) -> Result<(), DuplicateBlockError> {
        match self.blocks.entry(block.description().clone()) {
            Entry::Occupied(existing) => Err(DuplicateBlockError {
                description: existing.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(block);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, description: &BlockDescription) -> Option<&Block> {
        self.blocks
            .get(description)
            .or_else(|| self.base.and_then(|base| base.lookup(description)))
    }

    /// Number of blocks in this layer.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// The shared, read-only built-in layer.
pub fn builtins() -> &'static BlockRegistry<'static> {
    &BUILTINS
}

fn builtin_registry() -> BlockRegistry<'static> {
    let mut blocks = vec![
        Block::SetVariable,
        Block::ChangeVariable,
        Block::Forever,
        Block::If,
        Block::IfElse,
        Block::Repeat,
    ];
    blocks.extend((1..=MAX_SCRIPT_VARIABLES).map(Block::script_variables));
    for (spec, return_type, opcode) in FUNCTION_BLOCKS {
        let description = BlockDescriptionParser::new(spec, false)
            .parse()
            .expect("built-in block specs are well-formed");
        blocks.push(Block::Function(FunctionBlock::new(description, *return_type, *opcode)));
    }

    let mut registry = BlockRegistry::new();
    for block in blocks {
        registry
            .register(block)
            .expect("built-in block specs are distinct");
    }
    registry
}
