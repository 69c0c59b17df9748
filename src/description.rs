use crate::types::ScratchType;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub enum Segment {
    Label(String),
    Param {
        typ: ScratchType,
        name: Option<String>,
    },
}

/// The label/slot shape of a block.
///
/// Equality and hashing only look at label text and where the parameter
/// slots sit. Declared slot types and parameter names are metadata: a call
/// site typed `foo (number)` and a definition `foo (any)` are the same block.
#[derive(Debug, Clone)]
pub struct BlockDescription {
    segments: Vec<Segment>,
}

#[derive(Hash, PartialEq)]
enum ShapeKey<'a> {
    Label(&'a str),
    Param,
}

impl BlockDescription {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn builder() -> BlockDescriptionBuilder {
        BlockDescriptionBuilder::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn param_count(&self) -> usize {
        self.params().count()
    }

    pub fn params(&self) -> impl Iterator<Item = (ScratchType, Option<&str>)> + '_ {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Param { typ, name } => Some((*typ, name.as_deref())),
            Segment::Label(_) => None,
        })
    }

    pub fn param_type(&self, index: usize) -> Option<ScratchType> {
        self.params().nth(index).map(|(typ, _)| typ)
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.params().filter_map(|(_, name)| name)
    }

    /// Label words joined with single spaces; the variable name a niladic
    /// call site refers to.
    pub fn label_text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::Label(text) => Some(text.as_str()),
                Segment::Param { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// BYOB user spec, e.g. `add %a and %b`.
    pub fn user_spec(&self) -> String {
        self.segments
            .iter()
            .map(|seg| match seg {
                Segment::Label(text) => text.clone(),
                Segment::Param {
                    name: Some(name), ..
                } => format!("%{}", name),
                Segment::Param { typ, name: None } => format!("%{}", typ.name()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn shape(&self) -> impl Iterator<Item = ShapeKey<'_>> + '_ {
        self.segments.iter().map(|seg| match seg {
            Segment::Label(text) => ShapeKey::Label(text),
            Segment::Param { .. } => ShapeKey::Param,
        })
    }
}

impl PartialEq for BlockDescription {
    fn eq(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len() && self.shape().eq(other.shape())
    }
}

impl Eq for BlockDescription {}

impl Hash for BlockDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.len().hash(state);
        for key in self.shape() {
            key.hash(state);
        }
    }
}

impl Display for BlockDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match seg {
                Segment::Label(text) => f.write_str(text)?,
                Segment::Param {
                    name: Some(name), ..
                } => write!(f, "({})", name)?,
                Segment::Param { typ, name: None } => write!(f, "({})", typ)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BlockDescriptionBuilder {
    segments: Vec<Segment>,
}

impl BlockDescriptionBuilder {
    pub fn label(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Label(text.into()));
        self
    }

    pub fn param(mut self, typ: ScratchType) -> Self {
        self.segments.push(Segment::Param { typ, name: None });
        self
    }

    pub fn named_param(mut self, typ: ScratchType, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Param {
            typ,
            name: Some(name.into()),
        });
        self
    }

    pub fn build(self) -> BlockDescription {
        BlockDescription::new(self.segments)
    }
}
