use crate::program::ProgramUnit;
use crate::wire::Wire;
use std::collections::HashMap;

/// Handle to one script's private variable storage inside a [`FrameArena`].
/// Declaration and every read/write site of a script variable carry the same
/// handle, so frames are identified by value rather than by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef(usize);

impl FrameRef {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableFrame {
    pub names: Vec<String>,
}

/// Per-unit arena of variable frames.
#[derive(Debug, Clone, Default)]
pub struct FrameArena {
    frames: Vec<VariableFrame>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, names: Vec<String>) -> FrameRef {
        self.frames.push(VariableFrame { names });
        FrameRef(self.frames.len() - 1)
    }

    pub fn get(&self, frame: FrameRef) -> Option<&VariableFrame> {
        self.frames.get(frame.0)
    }

    pub fn frames(&self) -> &[VariableFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Where a variable lives, which decides how reads and writes are encoded.
#[derive(Debug, Clone, Copy)]
pub enum VariableContext<'u> {
    /// Project-wide (stage) variable.
    Global,
    /// Parameter of the custom block defined by the owning unit.
    Unit(&'u ProgramUnit),
    /// Script variable stored in the given frame.
    Script(FrameRef),
}

impl<'u> VariableContext<'u> {
    pub fn requires_byob(&self) -> bool {
        !matches!(self, VariableContext::Global)
    }

    /// Extra argument written between opcode and value by BYOB-style
    /// set/change blocks.
    pub fn write_marker(&self) -> Option<Wire> {
        match self {
            VariableContext::Global => None,
            VariableContext::Unit(_) => Some(Wire::Nil),
            VariableContext::Script(frame) => Some(Wire::Frame(*frame)),
        }
    }

    /// Trailing reference of a BYOB-style variable read.
    pub fn read_reference(&self) -> Option<Wire> {
        match self {
            VariableContext::Global => None,
            VariableContext::Unit(unit) => Some(Wire::Utf8(unit.user_spec())),
            VariableContext::Script(frame) => Some(Wire::Frame(*frame)),
        }
    }
}

/// Name to storage mapping visible to one unit's conversion.
#[derive(Debug, Clone, Default)]
pub struct VariableMap<'u> {
    entries: HashMap<String, VariableContext<'u>>,
}

impl<'u> VariableMap<'u> {
    pub fn new(entries: HashMap<String, VariableContext<'u>>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&VariableContext<'u>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'u> FromIterator<(String, VariableContext<'u>)> for VariableMap<'u> {
    fn from_iter<I: IntoIterator<Item = (String, VariableContext<'u>)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
