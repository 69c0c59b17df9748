use crate::description::BlockDescription;
use crate::program::{ConversionError, Expression, Source};
use crate::registry::BlockRegistry;
use crate::types::ScratchType;
use crate::variables::{VariableContext, VariableMap};
use crate::wire::Wire;
use std::sync::LazyLock;

/// Most names a single `script variables` block may declare.
pub const MAX_SCRIPT_VARIABLES: usize = 8;

static SET_VARIABLE: LazyLock<BlockDescription> = LazyLock::new(|| {
    BlockDescription::builder()
        .label("set")
        .param(ScratchType::Any)
        .label("to")
        .param(ScratchType::Any)
        .build()
});

static CHANGE_VARIABLE: LazyLock<BlockDescription> = LazyLock::new(|| {
    BlockDescription::builder()
        .label("change")
        .param(ScratchType::Any)
        .label("by")
        .param(ScratchType::Number)
        .build()
});

static FOREVER: LazyLock<BlockDescription> =
    LazyLock::new(|| BlockDescription::builder().label("forever").param(ScratchType::Loop).build());

static IF: LazyLock<BlockDescription> = LazyLock::new(|| {
    BlockDescription::builder()
        .label("if")
        .param(ScratchType::Boolean)
        .param(ScratchType::Loop)
        .build()
});

static IF_ELSE: LazyLock<BlockDescription> = LazyLock::new(|| {
    BlockDescription::builder()
        .label("if")
        .param(ScratchType::Boolean)
        .param(ScratchType::Loop)
        .label("else")
        .param(ScratchType::Loop)
        .build()
});

static REPEAT: LazyLock<BlockDescription> = LazyLock::new(|| {
    BlockDescription::builder()
        .label("repeat")
        .param(ScratchType::Number)
        .param(ScratchType::Loop)
        .build()
});

/// Every kind of block the converter knows how to emit.
#[derive(Debug, Clone)]
pub enum Block {
    SetVariable,
    ChangeVariable,
    Forever,
    If,
    IfElse,
    Repeat,
    /// `script variables (a) (b) ...`; one entry per arity.
    ScriptVariables(BlockDescription),
    Function(FunctionBlock),
}

/// A block that emits its fixed selector followed by its arguments. Used for
/// the built-in catalogue and for custom blocks defined by other units.
#[derive(Debug, Clone)]
pub struct FunctionBlock {
    description: BlockDescription,
    return_type: Option<ScratchType>,
    opcode: String,
}

impl FunctionBlock {
    pub fn new(description: BlockDescription, return_type: Option<ScratchType>, opcode: impl Into<String>) -> Self {
        Self {
            description,
            return_type,
            opcode: opcode.into(),
        }
    }

    pub fn opcode(&self) -> &str {
        &self.opcode
    }
}

impl Block {
    pub fn script_variables(count: usize) -> Self {
        let mut builder = BlockDescription::builder().label("script").label("variables");
        for _ in 0..count {
            builder = builder.param(ScratchType::Any);
        }
        Block::ScriptVariables(builder.build())
    }

    pub fn description(&self) -> &BlockDescription {
        match self {
            Block::SetVariable => &SET_VARIABLE,
            Block::ChangeVariable => &CHANGE_VARIABLE,
            Block::Forever => &FOREVER,
            Block::If => &IF,
            Block::IfElse => &IF_ELSE,
            Block::Repeat => &REPEAT,
            Block::ScriptVariables(description) => description,
            Block::Function(function) => &function.description,
        }
    }

    /// `None` for command blocks.
    pub fn return_type(&self) -> Option<ScratchType> {
        match self {
            Block::Function(function) => function.return_type,
            _ => None,
        }
    }

    pub fn emit(
        &self,
        params: &[Expression],
        source: Option<&Source>,
        vars: &VariableMap<'_>,
        registry: &BlockRegistry<'_>,
    ) -> Result<Wire, ConversionError> {
        let expected = self.description().param_count();
        if params.len() != expected {
            return Err(ConversionError::ArityMismatch {
                block: self.description().to_string(),
                expected,
                found: params.len(),
                source: source.cloned(),
            });
        }
        let mut out = Vec::with_capacity(params.len() + 2);
        match self {
            Block::SetVariable => {
                return self.emit_variable_write("setVar:to:", params, source, vars, registry);
            }
            Block::ChangeVariable => {
                return self.emit_variable_write("changeVar:by:", params, source, vars, registry);
            }
            Block::Forever => out.push(Wire::symbol("doForever")),
            Block::If => out.push(Wire::symbol("doIf")),
            Block::IfElse => out.push(Wire::symbol("doIfElse")),
            Block::Repeat => out.push(Wire::symbol("doRepeat")),
            Block::ScriptVariables(_) => {
                return self.emit_script_variables(params, source, vars);
            }
            Block::Function(function) => out.push(Wire::symbol(&function.opcode)),
        }
        for param in params {
            out.push(param.emit(vars, registry)?);
        }
        Ok(Wire::Array(out))
    }

    fn emit_variable_write(
        &self,
        opcode: &str,
        params: &[Expression],
        source: Option<&Source>,
        vars: &VariableMap<'_>,
        registry: &BlockRegistry<'_>,
    ) -> Result<Wire, ConversionError> {
        let name = self.variable_argument(&params[0], source)?;
        let context = lookup_variable(vars, &name, source)?;

        let mut out = Vec::with_capacity(5);
        out.push(Wire::symbol(if context.requires_byob() {
            "changeBlockVariable"
        } else {
            "changeVariable"
        }));
        out.push(Wire::Utf8(name));
        out.push(Wire::symbol(opcode));
        if let Some(marker) = context.write_marker() {
            out.push(marker);
        }
        out.push(params[1].emit(vars, registry)?);
        Ok(Wire::Array(out))
    }

    fn emit_script_variables(
        &self,
        params: &[Expression],
        source: Option<&Source>,
        vars: &VariableMap<'_>,
    ) -> Result<Wire, ConversionError> {
        let mut frame = None;
        for param in params {
            let name = self.variable_argument(param, source)?;
            match lookup_variable(vars, &name, source)? {
                VariableContext::Script(declared) => frame = Some(*declared),
                _ => {
                    return Err(ConversionError::NotAVariable {
                        block: self.description().to_string(),
                        found: name,
                        source: source.cloned(),
                    })
                }
            }
        }
        let frame = frame.ok_or_else(|| ConversionError::ArityMismatch {
            block: self.description().to_string(),
            expected: 1,
            found: 0,
            source: source.cloned(),
        })?;
        Ok(Wire::Array(vec![
            Wire::symbol("byob"),
            Wire::String(String::new()),
            Wire::symbol("doDeclareVariables"),
            Wire::Frame(frame),
        ]))
    }

    fn variable_argument(&self, param: &Expression, source: Option<&Source>) -> Result<String, ConversionError> {
        param
            .as_block()
            .and_then(|block| block.variable_name())
            .ok_or_else(|| ConversionError::NotAVariable {
                block: self.description().to_string(),
                found: param.to_string(),
                source: source.cloned(),
            })
    }
}

fn lookup_variable<'m, 'u>(
    vars: &'m VariableMap<'u>,
    name: &str,
    source: Option<&Source>,
) -> Result<&'m VariableContext<'u>, ConversionError> {
    vars.get(name).ok_or_else(|| ConversionError::UnresolvedReference {
        label: name.to_string(),
        source: source.cloned(),
    })
}

/// Built-in function blocks: typed description, return type, selector.
pub(crate) const FUNCTION_BLOCKS: &[(&str, Option<ScratchType>, &str)] = &[
    // motion
    ("move (number) steps", None, "forward:"),
    ("turn right (number) degrees", None, "turnRight:"),
    ("turn left (number) degrees", None, "turnLeft:"),
    ("point in direction (number)", None, "heading:"),
    ("go to x: (number) y: (number)", None, "gotoX:y:"),
    ("change x by (number)", None, "changeXposBy:"),
    ("set x to (number)", None, "xpos:"),
    ("change y by (number)", None, "changeYposBy:"),
    ("set y to (number)", None, "ypos:"),
    ("x position", Some(ScratchType::Number), "xpos"),
    ("y position", Some(ScratchType::Number), "ypos"),
    ("direction", Some(ScratchType::Number), "heading"),
    // looks
    ("say (text)", None, "say:"),
    ("say (text) for (number) secs", None, "say:duration:elapsed:from:"),
    ("think (text)", None, "think:"),
    ("show", None, "show"),
    ("hide", None, "hide"),
    ("next costume", None, "nextCostume"),
    // pen
    ("clear", None, "clearPenTrails"),
    ("pen down", None, "putPenDown"),
    ("pen up", None, "putPenUp"),
    ("stamp", None, "stampCostume"),
    // control
    ("wait (number) secs", None, "wait:elapsed:from:"),
    ("wait until (boolean)", None, "doWaitUntil"),
    ("repeat until (boolean) (loop)", None, "doUntil"),
    ("broadcast (text)", None, "broadcast:"),
    ("stop script", None, "doReturn"),
    ("stop all", None, "stopAll"),
    // operators
    ("(number) + (number)", Some(ScratchType::Number), "+"),
    ("(number) - (number)", Some(ScratchType::Number), "-"),
    ("(number) * (number)", Some(ScratchType::Number), "*"),
    ("(number) / (number)", Some(ScratchType::Number), "/"),
    ("(number) mod (number)", Some(ScratchType::Number), "\\\\"),
    ("(any) < (any)", Some(ScratchType::Boolean), "<"),
    ("(any) > (any)", Some(ScratchType::Boolean), ">"),
    ("(any) = (any)", Some(ScratchType::Boolean), "="),
    ("(boolean) and (boolean)", Some(ScratchType::Boolean), "&"),
    ("(boolean) or (boolean)", Some(ScratchType::Boolean), "|"),
    ("not (boolean)", Some(ScratchType::Boolean), "not"),
    ("pick random (number) to (number)", Some(ScratchType::Number), "randomFrom:to:"),
    ("round (number)", Some(ScratchType::Number), "rounded"),
    ("join (text) (text)", Some(ScratchType::Text), "concatenate:with:"),
    ("letter (number) of (text)", Some(ScratchType::Text), "letter:of:"),
    ("length of (text)", Some(ScratchType::Number), "stringLength:"),
    // sensing
    ("ask (text) and wait", None, "doAsk"),
    ("answer", Some(ScratchType::Text), "answer"),
    ("timer", Some(ScratchType::Number), "timer"),
    ("reset timer", None, "timerReset"),
    ("mouse x", Some(ScratchType::Number), "mouseX"),
    ("mouse y", Some(ScratchType::Number), "mouseY"),
    // custom block bodies
    ("report (any)", None, "doReport"),
    ("stop block", None, "doStopBlock"),
];
