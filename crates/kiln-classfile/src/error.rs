pub type Result<T> = std::result::Result<T, ClassFormatError>;

/// A class file that cannot be trusted as input to ABI extraction.
///
/// Failures are scoped to the single class being parsed; fingerprinting of
/// other classes in the same compilation unit continues.
#[derive(Debug, thiserror::Error)]
pub enum ClassFormatError {
    #[error("unexpected end of class data")]
    UnexpectedEof,

    #[error("invalid class file magic: 0x{0:08x}")]
    InvalidMagic(u32),

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),

    #[error("invalid constant pool tag: {0}")]
    InvalidConstantPoolTag(u8),

    #[error("constant pool type mismatch at index {index}: expected {expected}, found {found}")]
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid modified UTF-8 constant")]
    InvalidModifiedUtf8,

    #[error("malformed {0} attribute")]
    MalformedAttribute(&'static str),

    #[error("trailing bytes after end of class file")]
    TrailingBytes,
}
