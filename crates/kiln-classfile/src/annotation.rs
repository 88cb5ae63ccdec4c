use crate::constant_pool::{ConstantPool, CpInfo};
use crate::error::{ClassFormatError, Result};
use crate::reader::Reader;

/// A parsed annotation. Element order matches declaration order in the class
/// file; repeatable-annotation semantics make that order meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_descriptor: String,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let type_descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

        let num_pairs = reader.read_u2()? as usize;
        let mut elements = Vec::with_capacity(num_pairs);
        for _ in 0..num_pairs {
            let name = cp.get_utf8(reader.read_u2()?)?.to_string();
            let value = ElementValue::parse(reader, cp)?;
            elements.push((name, value));
        }

        Ok(Self {
            type_descriptor,
            elements,
        })
    }
}

/// An annotation element value.
///
/// Enum constants are kept as a (type, constant name) pair so that reordering
/// unrelated constants in the enum declaration cannot change the value.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Const(ConstValue),
    Enum {
        type_descriptor: String,
        const_name: String,
    },
    Class(String),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let tag = reader.read_u1()? as char;
        match tag {
            'B' | 'C' | 'I' | 'S' | 'Z' => {
                let value = cp.get_integer(reader.read_u2()?)?;
                let cv = match tag {
                    'B' => ConstValue::Byte(value as i8),
                    'C' => ConstValue::Char(value as u16),
                    'S' => ConstValue::Short(value as i16),
                    'Z' => ConstValue::Boolean(value != 0),
                    _ => ConstValue::Int(value),
                };
                Ok(ElementValue::Const(cv))
            }
            'J' => match cp.get(reader.read_u2()?)? {
                CpInfo::Long(v) => Ok(ElementValue::Const(ConstValue::Long(*v))),
                _ => Err(ClassFormatError::MalformedAttribute("annotation")),
            },
            'F' => match cp.get(reader.read_u2()?)? {
                CpInfo::Float(v) => Ok(ElementValue::Const(ConstValue::Float(*v))),
                _ => Err(ClassFormatError::MalformedAttribute("annotation")),
            },
            'D' => match cp.get(reader.read_u2()?)? {
                CpInfo::Double(v) => Ok(ElementValue::Const(ConstValue::Double(*v))),
                _ => Err(ClassFormatError::MalformedAttribute("annotation")),
            },
            's' => Ok(ElementValue::Const(ConstValue::String(
                cp.get_utf8(reader.read_u2()?)?.to_string(),
            ))),
            'e' => {
                let type_descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
                let const_name = cp.get_utf8(reader.read_u2()?)?.to_string();
                Ok(ElementValue::Enum {
                    type_descriptor,
                    const_name,
                })
            }
            'c' => Ok(ElementValue::Class(
                cp.get_utf8(reader.read_u2()?)?.to_string(),
            )),
            '@' => Ok(ElementValue::Annotation(Box::new(Annotation::parse(
                reader, cp,
            )?))),
            '[' => {
                let num_values = reader.read_u2()? as usize;
                let mut values = Vec::with_capacity(num_values);
                for _ in 0..num_values {
                    values.push(ElementValue::parse(reader, cp)?);
                }
                Ok(ElementValue::Array(values))
            }
            _ => Err(ClassFormatError::MalformedAttribute("annotation")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Boolean(bool),
    Byte(i8),
    /// Raw UTF-16 code unit. Unpaired surrogates are legal Java `char`
    /// constants, so this is not a `char`.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}
