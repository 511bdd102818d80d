//! Class units: names, the parsed in-memory tree, and annotation helpers
//!
//! A class unit travels through the pipeline as raw bytes. Passes only ever
//! see the [`ClassNode`] tree produced by a [`codec::UnitCodec`]; the tree
//! lives for the duration of one pipeline phase and is never shared.

pub mod codec;
pub mod insn;

pub use codec::{UnitCodec, WireCodec};
pub use insn::{Insn, InvokeKind, MemberRef, ValueKind};

use crate::error::{WeaveError, WeaveResult};
use crate::flags::WriterFlags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access flag bits shared by classes, fields and methods
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
}

/// Annotation descriptors the pipeline itself interprets
pub mod markers {
    /// Requests definition in the privileged loading domain
    pub const FORCE_PRIVILEGED: &str = "Lclassweave/api/annotation/ForcePrivileged;";
    /// Pipeline-side spelling of the runtime inline hint
    pub const FORCE_INLINE: &str = "Lclassweave/api/annotation/ForceInline;";
    /// Runtime-recognized inline hint
    pub const RUNTIME_FORCE_INLINE: &str = "Ljdk/internal/vm/annotation/ForceInline;";
}

/// Identity of a unit entering the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitName {
    /// Fully-qualified dotted name (`pkg.sub.Name`), the dedup key
    pub name: String,
    /// Name the unit will be known as after the pipeline
    pub transformed_name: String,
}

impl UnitName {
    /// A unit whose transformed name equals its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            transformed_name: name.clone(),
            name,
        }
    }

    /// A unit with a distinct transformed name
    pub fn with_transformed(name: impl Into<String>, transformed_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transformed_name: transformed_name.into(),
        }
    }

    /// Whether the name falls under `prefix`
    pub fn in_namespace(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.transformed_name {
            f.write_str(&self.name)
        } else {
            write!(f, "{} ({})", self.name, self.transformed_name)
        }
    }
}

/// Constant value carried by an annotation element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    String(String),
    /// Class literal, as a descriptor
    Type(String),
    Array(Vec<AnnotationValue>),
}

/// An annotation attached to a class, field or method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Type descriptor, e.g. `Lpkg/Marker;`
    pub descriptor: String,
    /// Visible to reflection at run time
    pub visible: bool,
    pub values: Vec<(String, AnnotationValue)>,
}

impl Annotation {
    /// A marker annotation without elements
    pub fn marker(descriptor: impl Into<String>, visible: bool) -> Self {
        Self {
            descriptor: descriptor.into(),
            visible,
            values: Vec::new(),
        }
    }
}

/// Shared annotation lookups for every annotated element
pub trait Annotated {
    fn annotations(&self) -> &[Annotation];
    fn annotations_mut(&mut self) -> &mut Vec<Annotation>;

    fn has_annotation(&self, descriptor: &str) -> bool {
        self.annotations().iter().any(|a| a.descriptor == descriptor)
    }

    /// Remove every annotation of the given type, returning whether any was removed
    fn remove_annotations(&mut self, descriptor: &str) -> bool {
        let list = self.annotations_mut();
        let before = list.len();
        list.retain(|a| a.descriptor != descriptor);
        list.len() != before
    }

    /// Rewrite the type of matching annotations, returning how many changed
    fn retype_annotations(&mut self, from: &str, to: &str) -> usize {
        let mut changed = 0;
        for annotation in self.annotations_mut().iter_mut() {
            if annotation.descriptor == from {
                annotation.descriptor = to.to_string();
                changed += 1;
            }
        }
        changed
    }
}

/// Metadata section of a unit; readable without decoding member bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassHeader {
    /// Internal name (`pkg/sub/Name`)
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access: u16,
    pub annotations: Vec<Annotation>,
}

impl ClassHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            access: access::PUBLIC,
            annotations: Vec::new(),
        }
    }
}

impl Annotated for ClassHeader {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn annotations_mut(&mut self) -> &mut Vec<Annotation> {
        &mut self.annotations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub annotations: Vec<Annotation>,
}

impl Annotated for Field {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn annotations_mut(&mut self) -> &mut Vec<Annotation> {
        &mut self.annotations
    }
}

/// Verification frame recorded at a branch target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub label: u32,
    pub stack: u16,
    pub locals: u16,
}

/// Executable body of a method
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Insn>,
    pub frames: Vec<Frame>,
}

impl Code {
    pub fn new(instructions: Vec<Insn>) -> Self {
        Self {
            instructions,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub annotations: Vec<Annotation>,
    /// `None` for abstract and native methods
    pub code: Option<Code>,
}

impl Method {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, code: Option<Code>) -> Self {
        Self {
            access: access::PUBLIC,
            name: name.into(),
            descriptor: descriptor.into(),
            annotations: Vec::new(),
            code,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    /// Recompute stack and local maximums and/or frames, as requested
    pub fn recompute(&mut self, flags: WriterFlags) -> WeaveResult<()> {
        let Some(code) = self.code.as_mut() else {
            return Ok(());
        };
        if flags.is_empty() {
            return Ok(());
        }

        let walk = insn::walk(&code.instructions)?;
        let (arg_words, _) = insn::method_words(&self.descriptor)?;
        let receiver = u16::from(self.access & access::STATIC == 0);
        let params = arg_words
            .checked_add(receiver)
            .ok_or_else(|| WeaveError::BadDescriptor(self.descriptor.clone()))?;
        let locals = walk.max_slot.max(params);

        if flags.contains(WriterFlags::COMPUTE_MAXS) {
            code.max_stack = walk.max_stack;
            code.max_locals = locals;
        }
        if flags.contains(WriterFlags::COMPUTE_FRAMES) {
            code.frames = walk
                .targets
                .iter()
                .map(|label| Frame {
                    label: *label,
                    stack: walk.label_depths.get(label).copied().unwrap_or(0),
                    locals,
                })
                .collect();
        }
        Ok(())
    }
}

impl Annotated for Method {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn annotations_mut(&mut self) -> &mut Vec<Annotation> {
        &mut self.annotations
    }
}

/// Member section of a unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassBody {
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
}

/// Fully parsed, mutable unit handed to passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub header: ClassHeader,
    pub body: ClassBody,
}

impl ClassNode {
    pub fn new(header: ClassHeader) -> Self {
        Self {
            header,
            body: ClassBody::default(),
        }
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.body
            .methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn find_method_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut Method> {
        self.body
            .methods
            .iter_mut()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_name_display() {
        assert_eq!(UnitName::new("pkg.A").to_string(), "pkg.A");
        assert_eq!(
            UnitName::with_transformed("a.b", "pkg.B").to_string(),
            "a.b (pkg.B)"
        );
        assert!(UnitName::new("pkg.sub.A").in_namespace("pkg."));
    }

    #[test]
    fn remove_and_retype_annotations() {
        let mut header = ClassHeader::new("pkg/A");
        header
            .annotations
            .push(Annotation::marker(markers::FORCE_PRIVILEGED, false));
        header.annotations.push(Annotation::marker("Lpkg/Keep;", true));

        assert!(header.has_annotation(markers::FORCE_PRIVILEGED));
        assert!(header.remove_annotations(markers::FORCE_PRIVILEGED));
        assert!(!header.remove_annotations(markers::FORCE_PRIVILEGED));
        assert_eq!(header.annotations.len(), 1);

        assert_eq!(header.retype_annotations("Lpkg/Keep;", "Lpkg/New;"), 1);
        assert!(header.has_annotation("Lpkg/New;"));
    }

    #[test]
    fn recompute_maxs_counts_receiver_and_wide_args() {
        let mut method = Method::new(
            "add",
            "(JI)J",
            Some(Code::new(vec![
                Insn::Load {
                    kind: ValueKind::Long,
                    slot: 1,
                },
                Insn::Return(Some(ValueKind::Long)),
            ])),
        );
        method.recompute(WriterFlags::COMPUTE_MAXS).unwrap();
        let code = method.code.as_ref().unwrap();
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 4);
        assert!(code.frames.is_empty());
    }

    #[test]
    fn recompute_frames_only_leaves_maxs() {
        let mut method = Method::new(
            "f",
            "()V",
            Some(Code::new(vec![
                Insn::Goto(1),
                Insn::Label(1),
                Insn::Return(None),
            ])),
        );
        method.recompute(WriterFlags::COMPUTE_FRAMES).unwrap();
        let code = method.code.as_ref().unwrap();
        assert_eq!(code.max_stack, 0);
        assert_eq!(code.max_locals, 0);
        assert_eq!(code.frames, vec![Frame { label: 1, stack: 0, locals: 1 }]);
    }
}
