use crate::error::{ClassFormatError, Result};

/// Big-endian cursor over raw class-file bytes.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn read_u1(&mut self) -> Result<u8> {
        let [b] = *self.read_array::<1>()?;
        Ok(b)
    }

    pub(crate) fn read_u2(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(*self.read_array::<2>()?))
    }

    pub(crate) fn read_u4(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(*self.read_array::<4>()?))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(*self.read_array::<8>()?))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ClassFormatError::UnexpectedEof)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Fails unless every byte has been consumed. Attribute payloads carry an
    /// explicit length, so leftover bytes mean the structure was misread.
    pub(crate) fn ensure_empty(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(ClassFormatError::TrailingBytes)
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<&'a [u8; N]> {
        let slice = self.read_bytes(N)?;
        Ok(slice.try_into().map_err(|_| ClassFormatError::UnexpectedEof)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values() {
        let mut reader = Reader::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34]);
        assert_eq!(reader.read_u4().unwrap(), 0xCAFE_BABE);
        assert_eq!(reader.read_u2().unwrap(), 0x34);
        reader.ensure_empty().unwrap();
    }

    #[test]
    fn eof_is_an_error() {
        let mut reader = Reader::new(&[0x01]);
        assert!(matches!(
            reader.read_u2(),
            Err(ClassFormatError::UnexpectedEof)
        ));
    }

    #[test]
    fn leftover_bytes_are_an_error() {
        let mut reader = Reader::new(&[0x01, 0x02]);
        reader.read_u1().unwrap();
        assert!(matches!(
            reader.ensure_empty(),
            Err(ClassFormatError::TrailingBytes)
        ));
    }
}
