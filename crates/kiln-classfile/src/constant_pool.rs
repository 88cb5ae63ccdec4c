use crate::error::{ClassFormatError, Result};
use crate::reader::Reader;

/// One parsed constant pool entry.
///
/// Reference-style entries keep raw indices; ABI extraction only ever chases
/// `Utf8`/`Class`/scalar constants, so the rest are retained just far enough
/// to keep the table well-formed.
#[derive(Debug, Clone)]
pub(crate) enum CpInfo {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

impl CpInfo {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CpInfo::Utf8(_) => "Utf8",
            CpInfo::Integer(_) => "Integer",
            CpInfo::Float(_) => "Float",
            CpInfo::Long(_) => "Long",
            CpInfo::Double(_) => "Double",
            CpInfo::Class(_) => "Class",
            CpInfo::String(_) => "String",
            CpInfo::FieldRef(..) => "Fieldref",
            CpInfo::MethodRef(..) => "Methodref",
            CpInfo::InterfaceMethodRef(..) => "InterfaceMethodref",
            CpInfo::NameAndType(..) => "NameAndType",
            CpInfo::MethodHandle(..) => "MethodHandle",
            CpInfo::MethodType(_) => "MethodType",
            CpInfo::Dynamic(..) => "Dynamic",
            CpInfo::InvokeDynamic(..) => "InvokeDynamic",
            CpInfo::Module(_) => "Module",
            CpInfo::Package(_) => "Package",
        }
    }
}

/// The class file constant pool. Slot 0 is unused; `Long`/`Double` entries
/// occupy two slots, with the second slot left vacant.
#[derive(Debug)]
pub(crate) struct ConstantPool {
    entries: Vec<Option<CpInfo>>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries: Vec<Option<CpInfo>> = Vec::with_capacity(count.max(1));
        entries.push(None);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    CpInfo::Utf8(decode_modified_utf8(bytes)?)
                }
                3 => CpInfo::Integer(reader.read_u4()? as i32),
                4 => CpInfo::Float(f32::from_bits(reader.read_u4()?)),
                5 => CpInfo::Long(reader.read_u8()? as i64),
                6 => CpInfo::Double(f64::from_bits(reader.read_u8()?)),
                7 => CpInfo::Class(reader.read_u2()?),
                8 => CpInfo::String(reader.read_u2()?),
                9 => CpInfo::FieldRef(reader.read_u2()?, reader.read_u2()?),
                10 => CpInfo::MethodRef(reader.read_u2()?, reader.read_u2()?),
                11 => CpInfo::InterfaceMethodRef(reader.read_u2()?, reader.read_u2()?),
                12 => CpInfo::NameAndType(reader.read_u2()?, reader.read_u2()?),
                15 => CpInfo::MethodHandle(reader.read_u1()?, reader.read_u2()?),
                16 => CpInfo::MethodType(reader.read_u2()?),
                17 => CpInfo::Dynamic(reader.read_u2()?, reader.read_u2()?),
                18 => CpInfo::InvokeDynamic(reader.read_u2()?, reader.read_u2()?),
                19 => CpInfo::Module(reader.read_u2()?),
                20 => CpInfo::Package(reader.read_u2()?),
                other => return Err(ClassFormatError::InvalidConstantPoolTag(other)),
            };

            let takes_two_slots = matches!(entry, CpInfo::Long(_) | CpInfo::Double(_));
            entries.push(Some(entry));
            if takes_two_slots {
                entries.push(None);
            }
        }

        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&CpInfo> {
        self.entries
            .get(index as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(ClassFormatError::InvalidConstantPoolIndex(index))
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s),
            other => Err(ClassFormatError::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Class(name_index) => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(ClassFormatError::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_integer(&self, index: u16) -> Result<i32> {
        match self.get(index)? {
            CpInfo::Integer(v) => Ok(*v),
            other => Err(ClassFormatError::ConstantPoolTypeMismatch {
                index,
                expected: "Integer",
                found: other.kind(),
            }),
        }
    }
}

/// Decode the JVM's "modified UTF-8": no embedded NUL bytes, no four-byte
/// sequences, and supplementary characters encoded as surrogate pairs of
/// three-byte sequences.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 == 0 || b0 >= 0xF0 {
            return Err(ClassFormatError::InvalidModifiedUtf8);
        }
        if b0 < 0x80 {
            out.push(b0 as char);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            let code = ((u32::from(b0) & 0x1F) << 6) | (u32::from(b1) & 0x3F);
            out.push(char::from_u32(code).ok_or(ClassFormatError::InvalidModifiedUtf8)?);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            let unit = ((u32::from(b0) & 0x0F) << 12)
                | ((u32::from(b1) & 0x3F) << 6)
                | (u32::from(b2) & 0x3F);
            i += 3;
            if (0xD800..=0xDBFF).contains(&unit) {
                // High surrogate: the low half must follow as another
                // three-byte sequence.
                let low = decode_surrogate_half(bytes, i)?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(ClassFormatError::InvalidModifiedUtf8);
                }
                let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                out.push(char::from_u32(code).ok_or(ClassFormatError::InvalidModifiedUtf8)?);
                i += 3;
            } else if (0xDC00..=0xDFFF).contains(&unit) {
                return Err(ClassFormatError::InvalidModifiedUtf8);
            } else {
                out.push(char::from_u32(unit).ok_or(ClassFormatError::InvalidModifiedUtf8)?);
            }
        } else {
            return Err(ClassFormatError::InvalidModifiedUtf8);
        }
    }
    Ok(out)
}

fn decode_surrogate_half(bytes: &[u8], at: usize) -> Result<u32> {
    let b0 = *bytes.get(at).ok_or(ClassFormatError::InvalidModifiedUtf8)?;
    if b0 & 0xF0 != 0xE0 {
        return Err(ClassFormatError::InvalidModifiedUtf8);
    }
    let b1 = continuation(bytes, at + 1)?;
    let b2 = continuation(bytes, at + 2)?;
    Ok(((u32::from(b0) & 0x0F) << 12) | ((u32::from(b1) & 0x3F) << 6) | (u32::from(b2) & 0x3F))
}

fn continuation(bytes: &[u8], at: usize) -> Result<u8> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(b),
        _ => Err(ClassFormatError::InvalidModifiedUtf8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ascii() {
        assert_eq!(decode_modified_utf8(b"java/lang/Object").unwrap(), "java/lang/Object");
    }

    #[test]
    fn decodes_two_byte_sequences() {
        // U+00E9 (e with acute) encodes as 0xC3 0xA9, same as standard UTF-8.
        assert_eq!(decode_modified_utf8(&[0xC3, 0xA9]).unwrap(), "\u{e9}");
        // Modified UTF-8 encodes U+0000 as 0xC0 0x80 rather than a NUL byte.
        assert_eq!(decode_modified_utf8(&[0xC0, 0x80]).unwrap(), "\u{0}");
    }

    #[test]
    fn decodes_supplementary_surrogate_pairs() {
        // U+1F600 as a surrogate pair D83D/DE00, each in three bytes.
        let bytes = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(decode_modified_utf8(&bytes).unwrap(), "\u{1F600}");
    }

    #[test]
    fn rejects_nul_and_truncated_input() {
        assert!(decode_modified_utf8(&[0x00]).is_err());
        assert!(decode_modified_utf8(&[0xC3]).is_err());
        assert!(decode_modified_utf8(&[0xED, 0xA0, 0xBD]).is_err());
        assert!(decode_modified_utf8(&[0xF0, 0x9F, 0x98, 0x80]).is_err());
    }
}
