//! Instruction model, opcode table and stack effects
//!
//! Stack depths and local slots are counted in words: `long` and `double`
//! values take two, everything else one.

use crate::error::{WeaveError, WeaveResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Type of a value moved between the operand stack and locals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Ref,
}

impl ValueKind {
    /// Width in words
    pub fn width(&self) -> u16 {
        match self {
            Self::Long | Self::Double => 2,
            Self::Int | Self::Float | Self::Ref => 1,
        }
    }

    fn prefix(&self) -> char {
        match self {
            Self::Int => 'i',
            Self::Long => 'l',
            Self::Float => 'f',
            Self::Double => 'd',
            Self::Ref => 'a',
        }
    }
}

/// Method invocation flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// Symbolic reference to a field or method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    /// Internal name of the declaring class (`pkg/Owner`)
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// A single instruction. `Label` is a pseudo-instruction marking a jump target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Insn {
    Nop,
    ConstNull,
    ConstInt(i32),
    ConstLong(i64),
    ConstString(String),
    Load { kind: ValueKind, slot: u16 },
    Store { kind: ValueKind, slot: u16 },
    Pop,
    Dup,
    IAdd,
    GetField(MemberRef),
    PutField(MemberRef),
    GetStatic(MemberRef),
    PutStatic(MemberRef),
    Invoke { kind: InvokeKind, target: MemberRef },
    New(String),
    Label(u32),
    Goto(u32),
    IfEq(u32),
    Return(Option<ValueKind>),
    Throw,
}

impl Insn {
    /// Opcode byte, `None` for pseudo-instructions
    pub fn opcode(&self) -> Option<u8> {
        let op = match self {
            Self::Nop => 0x00,
            Self::ConstNull => 0x01,
            Self::ConstInt(_) | Self::ConstString(_) => 0x12,
            Self::ConstLong(_) => 0x14,
            Self::Load { kind, .. } => match kind {
                ValueKind::Int => 0x15,
                ValueKind::Long => 0x16,
                ValueKind::Float => 0x17,
                ValueKind::Double => 0x18,
                ValueKind::Ref => 0x19,
            },
            Self::Store { kind, .. } => match kind {
                ValueKind::Int => 0x36,
                ValueKind::Long => 0x37,
                ValueKind::Float => 0x38,
                ValueKind::Double => 0x39,
                ValueKind::Ref => 0x3a,
            },
            Self::Pop => 0x57,
            Self::Dup => 0x59,
            Self::IAdd => 0x60,
            Self::IfEq(_) => 0x99,
            Self::Goto(_) => 0xa7,
            Self::Return(kind) => match kind {
                Some(ValueKind::Int) => 0xac,
                Some(ValueKind::Long) => 0xad,
                Some(ValueKind::Float) => 0xae,
                Some(ValueKind::Double) => 0xaf,
                Some(ValueKind::Ref) => 0xb0,
                None => 0xb1,
            },
            Self::GetStatic(_) => 0xb2,
            Self::PutStatic(_) => 0xb3,
            Self::GetField(_) => 0xb4,
            Self::PutField(_) => 0xb5,
            Self::Invoke { kind, .. } => match kind {
                InvokeKind::Virtual => 0xb6,
                InvokeKind::Special => 0xb7,
                InvokeKind::Static => 0xb8,
                InvokeKind::Interface => 0xb9,
            },
            Self::New(_) => 0xbb,
            Self::Throw => 0xbf,
            Self::Label(_) => return None,
        };
        Some(op)
    }

    /// Mnemonic as printed by disassemblers
    pub fn mnemonic(&self) -> String {
        match self {
            Self::Nop => "nop".into(),
            Self::ConstNull => "aconst_null".into(),
            Self::ConstInt(_) | Self::ConstString(_) => "ldc".into(),
            Self::ConstLong(_) => "ldc2_w".into(),
            Self::Load { kind, .. } => format!("{}load", kind.prefix()),
            Self::Store { kind, .. } => format!("{}store", kind.prefix()),
            Self::Pop => "pop".into(),
            Self::Dup => "dup".into(),
            Self::IAdd => "iadd".into(),
            Self::GetField(_) => "getfield".into(),
            Self::PutField(_) => "putfield".into(),
            Self::GetStatic(_) => "getstatic".into(),
            Self::PutStatic(_) => "putstatic".into(),
            Self::Invoke { kind, .. } => match kind {
                InvokeKind::Virtual => "invokevirtual".into(),
                InvokeKind::Special => "invokespecial".into(),
                InvokeKind::Static => "invokestatic".into(),
                InvokeKind::Interface => "invokeinterface".into(),
            },
            Self::New(_) => "new".into(),
            Self::Label(_) => "label".into(),
            Self::Goto(_) => "goto".into(),
            Self::IfEq(_) => "ifeq".into(),
            Self::Return(Some(kind)) => format!("{}return", kind.prefix()),
            Self::Return(None) => "return".into(),
            Self::Throw => "athrow".into(),
        }
    }

    /// Words popped and pushed
    pub fn stack_effect(&self) -> WeaveResult<(u16, u16)> {
        let effect = match self {
            Self::Nop | Self::Label(_) | Self::Goto(_) => (0, 0),
            Self::ConstNull | Self::ConstInt(_) | Self::ConstString(_) | Self::New(_) => (0, 1),
            Self::ConstLong(_) => (0, 2),
            Self::Load { kind, .. } => (0, kind.width()),
            Self::Store { kind, .. } => (kind.width(), 0),
            Self::Pop | Self::IfEq(_) | Self::Throw => (1, 0),
            Self::Dup => (1, 2),
            Self::IAdd => (2, 1),
            Self::GetField(f) => (1, field_words(&f.descriptor)?),
            Self::PutField(f) => (1 + field_words(&f.descriptor)?, 0),
            Self::GetStatic(f) => (0, field_words(&f.descriptor)?),
            Self::PutStatic(f) => (field_words(&f.descriptor)?, 0),
            Self::Invoke { kind, target } => {
                let (args, ret) = method_words(&target.descriptor)?;
                let receiver = u16::from(*kind != InvokeKind::Static);
                let pops = args
                    .checked_add(receiver)
                    .ok_or_else(|| WeaveError::BadDescriptor(target.descriptor.clone()))?;
                (pops, ret)
            }
            Self::Return(kind) => (kind.map_or(0, |k| k.width()), 0),
        };
        Ok(effect)
    }

    /// Jump target, if this is a branch
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Self::Goto(t) | Self::IfEq(t) => Some(*t),
            _ => None,
        }
    }

    /// Whether control never falls through to the next instruction
    fn ends_block(&self) -> bool {
        matches!(self, Self::Goto(_) | Self::Return(_) | Self::Throw)
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstInt(v) => write!(f, "ldc {}", v),
            Self::ConstLong(v) => write!(f, "ldc2_w {}", v),
            Self::ConstString(s) => write!(f, "ldc {:?}", s),
            Self::Load { slot, .. } | Self::Store { slot, .. } => {
                write!(f, "{} {}", self.mnemonic(), slot)
            }
            Self::GetField(m) | Self::PutField(m) | Self::GetStatic(m) | Self::PutStatic(m) => {
                write!(f, "{} {}.{}:{}", self.mnemonic(), m.owner, m.name, m.descriptor)
            }
            Self::Invoke { target, .. } => write!(
                f,
                "{} {}.{}{}",
                self.mnemonic(),
                target.owner,
                target.name,
                target.descriptor
            ),
            Self::New(class) => write!(f, "new {}", class),
            Self::Label(id) => write!(f, "L{}:", id),
            Self::Goto(t) | Self::IfEq(t) => write!(f, "{} L{}", self.mnemonic(), t),
            _ => f.write_str(&self.mnemonic()),
        }
    }
}

/// Words occupied by a value of the given field descriptor
pub fn field_words(descriptor: &str) -> WeaveResult<u16> {
    let mut chars = descriptor.chars().peekable();
    let words = next_type_words(&mut chars, descriptor)?;
    if chars.next().is_some() {
        return Err(WeaveError::BadDescriptor(descriptor.to_string()));
    }
    Ok(words)
}

/// Argument and return words of a method descriptor `(args)ret`
pub fn method_words(descriptor: &str) -> WeaveResult<(u16, u16)> {
    let bad = || WeaveError::BadDescriptor(descriptor.to_string());
    let mut chars = descriptor.chars().peekable();
    if chars.next() != Some('(') {
        return Err(bad());
    }

    let mut args = 0u16;
    loop {
        match chars.peek() {
            Some(')') => {
                chars.next();
                break;
            }
            Some(_) => {
                let words = next_type_words(&mut chars, descriptor)?;
                args = args.checked_add(words).ok_or_else(bad)?;
            }
            None => return Err(bad()),
        }
    }

    let ret = match chars.peek() {
        Some('V') => {
            chars.next();
            0
        }
        Some(_) => next_type_words(&mut chars, descriptor)?,
        None => return Err(bad()),
    };
    if chars.next().is_some() {
        return Err(bad());
    }
    Ok((args, ret))
}

fn next_type_words(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    descriptor: &str,
) -> WeaveResult<u16> {
    let bad = || WeaveError::BadDescriptor(descriptor.to_string());
    match chars.next().ok_or_else(bad)? {
        'J' | 'D' => Ok(2),
        'B' | 'C' | 'F' | 'I' | 'S' | 'Z' => Ok(1),
        'L' => {
            if chars.by_ref().any(|c| c == ';') {
                Ok(1)
            } else {
                Err(bad())
            }
        }
        '[' => {
            while chars.peek() == Some(&'[') {
                chars.next();
            }
            next_type_words(chars, descriptor)?;
            Ok(1)
        }
        _ => Err(bad()),
    }
}

/// Result of a linear walk over an instruction list
#[derive(Debug, Default)]
pub(crate) struct StackWalk {
    pub max_stack: u16,
    pub max_slot: u16,
    /// Stack depth on entry to each label
    pub label_depths: BTreeMap<u32, u16>,
    /// Labels that are the target of at least one branch
    pub targets: BTreeSet<u32>,
}

/// Walk `insns` in order, tracking operand stack depth.
///
/// Depth at a label is the maximum over fall-through and every branch seen
/// so far; backward branches do not revisit earlier instructions.
pub(crate) fn walk(insns: &[Insn]) -> WeaveResult<StackWalk> {
    let mut out = StackWalk::default();
    let mut depth: Option<u16> = Some(0);

    for insn in insns {
        if let Insn::Label(id) = insn {
            let entry = match (depth, out.label_depths.get(id).copied()) {
                (Some(a), Some(b)) => a.max(b),
                (a, b) => a.or(b).unwrap_or(0),
            };
            out.label_depths.insert(*id, entry);
            depth = Some(entry);
            continue;
        }

        if let Insn::Load { kind, slot } | Insn::Store { kind, slot } = insn {
            let end = slot.checked_add(kind.width()).ok_or_else(|| {
                WeaveError::Malformed(format!("local slot {slot} out of range for {insn}"))
            })?;
            out.max_slot = out.max_slot.max(end);
        }

        let current = depth.unwrap_or(0);
        let (pops, pushes) = insn.stack_effect()?;
        let after = current
            .saturating_sub(pops)
            .checked_add(pushes)
            .ok_or_else(|| WeaveError::Malformed(format!("operand stack overflow at {insn}")))?;
        out.max_stack = out.max_stack.max(current).max(after);

        if let Some(target) = insn.jump_target() {
            out.targets.insert(target);
            let seen = out.label_depths.entry(target).or_insert(after);
            *seen = (*seen).max(after);
        }

        depth = if insn.ends_block() { None } else { Some(after) };
    }

    Ok(out)
}
