//! Binary container codec for class units
//!
//! Layout of a unit written by [`WireCodec`]:
//!
//! | Offset | Content |
//! |--------|---------|
//! | 0 | magic `CWU1` |
//! | 4 | postcard-encoded [`ClassHeader`] |
//! | .. | postcard-encoded [`ClassBody`] |
//!
//! The header comes first so that [`UnitCodec::read_header`] can stop
//! before any member body.

use crate::error::{WeaveError, WeaveResult};
use crate::flags::WriterFlags;
use crate::unit::{ClassBody, ClassHeader, ClassNode};
use std::borrow::Cow;

/// Magic bytes opening every unit
pub const MAGIC: [u8; 4] = *b"CWU1";

/// Parser and serializer the pipeline uses for passes
pub trait UnitCodec: Send + Sync {
    /// Parse a full unit
    fn read(&self, bytes: &[u8]) -> WeaveResult<ClassNode>;

    /// Parse metadata only, skipping member bodies
    fn read_header(&self, bytes: &[u8]) -> WeaveResult<ClassHeader>;

    /// Serialize a unit, recomputing what `flags` asks for
    fn write(&self, node: &ClassNode, flags: WriterFlags) -> WeaveResult<Vec<u8>>;
}

/// The bundled codec
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

impl WireCodec {
    fn strip_magic(bytes: &[u8]) -> WeaveResult<&[u8]> {
        match bytes.strip_prefix(&MAGIC[..]) {
            Some(rest) => Ok(rest),
            None => Err(WeaveError::BadMagic {
                found: bytes.iter().take(MAGIC.len()).copied().collect(),
            }),
        }
    }
}

impl UnitCodec for WireCodec {
    fn read(&self, bytes: &[u8]) -> WeaveResult<ClassNode> {
        let rest = Self::strip_magic(bytes)?;
        let (header, rest) = postcard::take_from_bytes::<ClassHeader>(rest)?;
        let (body, rest) = postcard::take_from_bytes::<ClassBody>(rest)?;
        if !rest.is_empty() {
            return Err(WeaveError::Malformed(format!(
                "{} trailing bytes after {}",
                rest.len(),
                header.name
            )));
        }
        Ok(ClassNode { header, body })
    }

    fn read_header(&self, bytes: &[u8]) -> WeaveResult<ClassHeader> {
        let rest = Self::strip_magic(bytes)?;
        let (header, _) = postcard::take_from_bytes::<ClassHeader>(rest)?;
        Ok(header)
    }

    fn write(&self, node: &ClassNode, flags: WriterFlags) -> WeaveResult<Vec<u8>> {
        let mut body = Cow::Borrowed(&node.body);
        if !flags.is_empty() {
            for method in body.to_mut().methods.iter_mut() {
                method.recompute(flags)?;
            }
        }

        let mut out = MAGIC.to_vec();
        out.extend(postcard::to_stdvec(&node.header)?);
        out.extend(postcard::to_stdvec(&*body)?);
        Ok(out)
    }
}
