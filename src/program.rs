use crate::blocks::Block;
use crate::description::{BlockDescription, Segment};
use crate::registry::BlockRegistry;
use crate::types::ScratchType;
use crate::variables::{VariableContext, VariableMap};
use crate::wire::Wire;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Script,
    Command,
    Reporter,
    Predicate,
}

impl UnitKind {
    pub fn keyword(self) -> &'static str {
        match self {
            UnitKind::Script => "SCRIPT",
            UnitKind::Command => "COMMAND",
            UnitKind::Reporter => "REPORTER",
            UnitKind::Predicate => "PREDICATE",
        }
    }

    /// Header prefixes that turn a diagram into a custom block definition.
    pub fn from_prefix(word: &str) -> Option<Self> {
        [UnitKind::Command, UnitKind::Reporter, UnitKind::Predicate]
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(word))
    }

    pub fn return_type(self) -> Option<ScratchType> {
        match self {
            UnitKind::Script | UnitKind::Command => None,
            UnitKind::Reporter => Some(ScratchType::Any),
            UnitKind::Predicate => Some(ScratchType::Boolean),
        }
    }
}

/// The diagram element an expression was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub kind: String,
    pub label: String,
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind, self.label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    UnresolvedReference {
        label: String,
        source: Option<Source>,
    },
    NotAVariable {
        block: String,
        found: String,
        source: Option<Source>,
    },
    TypeMismatch {
        block: String,
        index: usize,
        expected: ScratchType,
        found: ScratchType,
        source: Option<Source>,
    },
    ArityMismatch {
        block: String,
        expected: usize,
        found: usize,
        source: Option<Source>,
    },
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionError::UnresolvedReference { label, source } => {
                write!(f, "No block or variable matches '{}'", label)?;
                write_source(f, source)
            }
            ConversionError::NotAVariable {
                block,
                found,
                source,
            } => {
                write!(f, "'{}' expects a variable name, got '{}'", block, found)?;
                write_source(f, source)
            }
            ConversionError::TypeMismatch {
                block,
                index,
                expected,
                found,
                source,
            } => {
                write!(
                    f,
                    "Argument {} of '{}' expects {}, got {}",
                    index + 1,
                    block,
                    expected,
                    found
                )?;
                write_source(f, source)
            }
            ConversionError::ArityMismatch {
                block,
                expected,
                found,
                source,
            } => {
                write!(f, "'{}' takes {} arguments, got {}", block, expected, found)?;
                write_source(f, source)
            }
        }
    }
}

fn write_source(f: &mut Formatter<'_>, source: &Option<Source>) -> std::fmt::Result {
    match source {
        Some(source) => write!(f, " (in {}).", source),
        None => write!(f, "."),
    }
}

impl Error for ConversionError {}

#[derive(Debug, Clone)]
pub enum Expression {
    Number { value: f64 },
    String { value: String },
    Block(BlockExpression),
    Script(ScriptExpression),
}

impl Expression {
    pub fn typ(&self) -> ScratchType {
        match self {
            Expression::Number { .. } => ScratchType::Number,
            Expression::String { .. } => ScratchType::Text,
            Expression::Block(_) => ScratchType::Any,
            Expression::Script(_) => ScratchType::Loop,
        }
    }

    pub fn as_block(&self) -> Option<&BlockExpression> {
        match self {
            Expression::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptExpression> {
        match self {
            Expression::Script(script) => Some(script),
            _ => None,
        }
    }

    pub fn emit(&self, vars: &VariableMap<'_>, registry: &BlockRegistry<'_>) -> Result<Wire, ConversionError> {
        match self {
            Expression::Number { value } => Ok(Wire::number(*value)),
            Expression::String { value } => Ok(Wire::String(value.clone())),
            Expression::Block(block) => block.emit(vars, registry),
            Expression::Script(script) => script.emit(vars, registry),
        }
    }

    pub(crate) fn attach_source(&mut self, source: &Source) {
        match self {
            Expression::Block(block) => block.attach_source(source),
            Expression::Script(script) => {
                for block in &mut script.blocks {
                    block.attach_source(source);
                }
            }
            Expression::Number { .. } | Expression::String { .. } => {}
        }
    }

    /// Whether a value of this expression may fill a slot declared `declared`.
    /// Numbers and numeric text are interchangeable.
    fn fits(&self, declared: ScratchType) -> bool {
        if declared.is_compatible(self.typ()) {
            return true;
        }
        match (declared, self) {
            (ScratchType::Text, Expression::Number { .. }) => true,
            (ScratchType::Number, Expression::String { value }) => value.trim().parse::<f64>().is_ok(),
            _ => false,
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Number { value } => f.write_str(&format_num(*value)),
            Expression::String { value } => write!(f, "{:?}", value),
            Expression::Block(block) => write!(f, "{}", block),
            Expression::Script(script) => write!(f, "{}", script),
        }
    }
}

/// A call site: a description plus its already-parsed arguments in slot
/// order. Niladic call sites may also turn out to be variable reads.
#[derive(Debug, Clone)]
pub struct BlockExpression {
    source: Option<Source>,
    description: BlockDescription,
    params: Vec<Expression>,
}

impl BlockExpression {
    pub fn new(source: Option<Source>, description: BlockDescription, params: Vec<Expression>) -> Self {
        Self {
            source,
            description,
            params,
        }
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn description(&self) -> &BlockDescription {
        &self.description
    }

    pub fn params(&self) -> &[Expression] {
        &self.params
    }

    pub fn typ(&self) -> ScratchType {
        ScratchType::Any
    }

    /// The name this call site would read if it is a variable reference.
    pub fn variable_name(&self) -> Option<String> {
        if self.params.is_empty() {
            Some(self.description.label_text())
        } else {
            None
        }
    }

    pub fn emit(&self, vars: &VariableMap<'_>, registry: &BlockRegistry<'_>) -> Result<Wire, ConversionError> {
        if let Some(block) = registry.lookup(&self.description) {
            self.check_arguments(block)?;
            return block.emit(&self.params, self.source.as_ref(), vars, registry);
        }
        if let Some(name) = self.variable_name() {
            if let Some(context) = vars.get(&name) {
                return Ok(read_variable(&name, context));
            }
        }
        Err(ConversionError::UnresolvedReference {
            label: self.description.to_string(),
            source: self.source.clone(),
        })
    }

    fn check_arguments(&self, block: &Block) -> Result<(), ConversionError> {
        for (index, param) in self.params.iter().enumerate() {
            let declared = block.description().param_type(index).unwrap_or(ScratchType::Any);
            if !param.fits(declared) {
                return Err(ConversionError::TypeMismatch {
                    block: block.description().to_string(),
                    index,
                    expected: declared,
                    found: param.typ(),
                    source: self.source.clone(),
                });
            }
        }
        Ok(())
    }

    fn attach_source(&mut self, source: &Source) {
        if self.source.is_none() {
            self.source = Some(source.clone());
        }
        for param in &mut self.params {
            param.attach_source(source);
        }
    }
}

fn read_variable(name: &str, context: &VariableContext<'_>) -> Wire {
    match context.read_reference() {
        None => Wire::Array(vec![Wire::symbol("readVariable"), Wire::utf8(name)]),
        Some(last) => Wire::Array(vec![
            Wire::symbol("byob"),
            Wire::String(String::new()),
            Wire::symbol("readBlockVariable"),
            Wire::utf8(name),
            last,
        ]),
    }
}

impl Display for BlockExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut params = self.params.iter();
        f.write_str("(")?;
        for (i, seg) in self.description.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match seg {
                Segment::Label(text) => f.write_str(text)?,
                Segment::Param { typ, .. } => match params.next() {
                    Some(param) => write!(f, "{}", param)?,
                    None => write!(f, "({})", typ)?,
                },
            }
        }
        f.write_str(")")
    }
}

/// Ordered statements nested inside a C-shaped block.
#[derive(Debug, Clone, Default)]
pub struct ScriptExpression {
    blocks: Vec<BlockExpression>,
}

impl ScriptExpression {
    pub fn new(blocks: Vec<BlockExpression>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[BlockExpression] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn emit(&self, vars: &VariableMap<'_>, registry: &BlockRegistry<'_>) -> Result<Wire, ConversionError> {
        emit_sequence(&self.blocks, vars, registry)
    }
}

impl Display for ScriptExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", block)?;
        }
        f.write_str("}")
    }
}

pub(crate) fn emit_sequence(
    blocks: &[BlockExpression],
    vars: &VariableMap<'_>,
    registry: &BlockRegistry<'_>,
) -> Result<Wire, ConversionError> {
    blocks
        .iter()
        .map(|block| block.emit(vars, registry))
        .collect::<Result<Vec<_>, _>>()
        .map(Wire::Array)
}

/// One diagram's worth of program: a script, or a custom block definition
/// with its own header description.
#[derive(Debug, Clone)]
pub struct ProgramUnit {
    kind: UnitKind,
    description: BlockDescription,
    body: Vec<BlockExpression>,
}

impl ProgramUnit {
    pub fn new(kind: UnitKind, description: BlockDescription, body: Vec<BlockExpression>) -> Self {
        Self {
            kind,
            description,
            body,
        }
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn description(&self) -> &BlockDescription {
        &self.description
    }

    pub fn body(&self) -> &[BlockExpression] {
        &self.body
    }

    pub fn user_spec(&self) -> String {
        self.description.user_spec()
    }

    pub fn emit_body(&self, vars: &VariableMap<'_>, registry: &BlockRegistry<'_>) -> Result<Wire, ConversionError> {
        emit_sequence(&self.body, vars, registry)
    }
}

fn format_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::FunctionBlock;
    use crate::variables::FrameArena;

    fn move_steps() -> BlockDescription {
        BlockDescription::builder()
            .label("move")
            .param(ScratchType::Number)
            .label("steps")
            .build()
    }

    fn var(name: &str) -> BlockExpression {
        BlockExpression::new(None, BlockDescription::builder().label(name).build(), Vec::new())
    }

    #[test]
    fn block_expressions_are_untyped() {
        let expr = BlockExpression::new(None, move_steps(), vec![Expression::Number { value: 42.0 }]);
        assert_eq!(expr.typ(), ScratchType::Any);
        assert_eq!(expr.description(), &move_steps());
    }

    #[test]
    fn emits_function_blocks_through_the_registry() {
        let mut registry = BlockRegistry::new();
        registry
            .register(Block::Function(FunctionBlock::new(move_steps(), None, "forward:")))
            .unwrap();
        let expr = BlockExpression::new(None, move_steps(), vec![Expression::Number { value: 42.0 }]);

        let wire = expr.emit(&VariableMap::empty(), &registry).unwrap();
        assert_eq!(wire, Wire::Array(vec![Wire::symbol("forward:"), Wire::Integer(42)]));
    }

    #[test]
    fn reads_global_variable() {
        let vars: VariableMap = [("foobar".to_string(), VariableContext::Global)].into_iter().collect();
        let wire = var("foobar").emit(&vars, &BlockRegistry::new()).unwrap();
        assert_eq!(
            wire,
            Wire::Array(vec![Wire::symbol("readVariable"), Wire::utf8("foobar")])
        );
    }

    #[test]
    fn reads_unit_variable_with_owning_spec() {
        let unit = ProgramUnit::new(
            UnitKind::Command,
            BlockDescription::builder()
                .label("doSomething")
                .named_param(ScratchType::Any, "foobar")
                .build(),
            Vec::new(),
        );
        let vars: VariableMap = [("foobar".to_string(), VariableContext::Unit(&unit))]
            .into_iter()
            .collect();
        let wire = var("foobar").emit(&vars, &BlockRegistry::new()).unwrap();
        assert_eq!(
            wire,
            Wire::Array(vec![
                Wire::symbol("byob"),
                Wire::String(String::new()),
                Wire::symbol("readBlockVariable"),
                Wire::utf8("foobar"),
                Wire::utf8("doSomething %foobar"),
            ])
        );
    }

    #[test]
    fn reads_script_variable_with_frame() {
        let mut arena = FrameArena::new();
        let frame = arena.alloc(vec!["foobar".to_string()]);
        let vars: VariableMap = [("foobar".to_string(), VariableContext::Script(frame))]
            .into_iter()
            .collect();
        let wire = var("foobar").emit(&vars, &BlockRegistry::new()).unwrap();
        let items = wire.as_array().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[4], Wire::Frame(frame));
    }

    #[test]
    fn registry_match_wins_over_variable() {
        let timer = BlockDescription::builder().label("timer").build();
        let mut registry = BlockRegistry::new();
        registry
            .register(Block::Function(FunctionBlock::new(timer, Some(ScratchType::Number), "timer")))
            .unwrap();
        let vars: VariableMap = [("timer".to_string(), VariableContext::Global)].into_iter().collect();
        let wire = var("timer").emit(&vars, &registry).unwrap();
        assert_eq!(wire, Wire::Array(vec![Wire::symbol("timer")]));
    }

    #[test]
    fn unknown_block_is_unresolved() {
        let source = Source {
            kind: "instruction".to_string(),
            label: "move 42 steps".to_string(),
        };
        let expr = BlockExpression::new(
            Some(source.clone()),
            move_steps(),
            vec![Expression::Number { value: 42.0 }],
        );
        let err = expr.emit(&VariableMap::empty(), &BlockRegistry::new()).unwrap_err();
        assert_eq!(
            err,
            ConversionError::UnresolvedReference {
                label: "move (number) steps".to_string(),
                source: Some(source),
            }
        );
        assert!(err.to_string().contains("instruction 'move 42 steps'"));
    }

    #[test]
    fn rejects_incompatible_argument_types() {
        let wait_until = BlockDescription::builder()
            .label("wait")
            .label("until")
            .param(ScratchType::Boolean)
            .build();
        let mut registry = BlockRegistry::new();
        registry
            .register(Block::Function(FunctionBlock::new(wait_until.clone(), None, "doWaitUntil")))
            .unwrap();
        let expr = BlockExpression::new(None, wait_until, vec![Expression::Number { value: 1.0 }]);
        let err = expr.emit(&VariableMap::empty(), &registry).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::TypeMismatch {
                expected: ScratchType::Boolean,
                found: ScratchType::Number,
                ..
            }
        ));
    }

    #[test]
    fn numbers_and_numeric_text_are_interchangeable() {
        assert!(Expression::Number { value: 1.0 }.fits(ScratchType::Text));
        assert!(Expression::String { value: "2.5".to_string() }.fits(ScratchType::Number));
        assert!(!Expression::String { value: "abc".to_string() }.fits(ScratchType::Number));
        assert!(!Expression::Script(ScriptExpression::default()).fits(ScratchType::Number));
    }

    #[test]
    fn renders_call_sites() {
        assert_eq!(var("foo").to_string(), "(foo)");
        let nested = BlockExpression::new(
            None,
            BlockDescription::builder()
                .label("foo")
                .param(ScratchType::Any)
                .label("bar")
                .build(),
            vec![Expression::Block(var("param"))],
        );
        assert_eq!(nested.to_string(), "(foo (param) bar)");
    }

    #[test]
    fn re_emission_is_stable() {
        let vars: VariableMap = [("n".to_string(), VariableContext::Global)].into_iter().collect();
        let script = ScriptExpression::new(vec![var("n"), var("n")]);
        let registry = BlockRegistry::new();
        let first = script.emit(&vars, &registry).unwrap();
        let second = script.emit(&vars, &registry).unwrap();
        assert_eq!(first, second);
    }
}
