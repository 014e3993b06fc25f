// Seekable byte stream over in-memory data, with bit-level reads and
// bounds-checked sub-stream carving

use crate::engine::eval::StreamInfo;
use crate::error::EvalError;

/// Seek origin, mirroring the usual whence triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// A window over a byte buffer. Positions reported through `pos`/`seek`
/// are relative to the window start; `abs_pos` exposes the offset in the
/// underlying buffer for annotation ranges. Byte-oriented reads discard
/// any partially consumed bit buffer first.
#[derive(Debug, Clone)]
pub struct Stream<'d> {
    data: &'d [u8],
    start: u64,
    end: u64,
    pos: u64,
    bit_buf: u64,
    bits_left: u32,
}

impl<'d> Stream<'d> {
    pub fn new(data: &'d [u8]) -> Self {
        Self {
            data,
            start: 0,
            end: data.len() as u64,
            pos: 0,
            bit_buf: 0,
            bits_left: 0,
        }
    }

    /// Carve a sub-stream of `length` bytes starting at the absolute
    /// offset `abs_offset`. Bounds are checked against this window.
    pub fn sub_stream(&self, abs_offset: u64, length: u64) -> Result<Stream<'d>, EvalError> {
        let end = abs_offset
            .checked_add(length)
            .ok_or_else(|| EvalError::range("sub-stream length overflow"))?;
        if abs_offset < self.start || end > self.end {
            return Err(EvalError::range(format!(
                "sub-stream {}..{} exceeds parent {}..{}",
                abs_offset, end, self.start, self.end
            )));
        }
        Ok(Stream {
            data: self.data,
            start: abs_offset,
            end,
            pos: abs_offset,
            bit_buf: 0,
            bits_left: 0,
        })
    }

    /// Offset in the underlying buffer.
    pub fn abs_pos(&self) -> u64 {
        self.pos
    }

    pub fn pos(&self) -> u64 {
        self.pos - self.start
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.end && self.bits_left == 0
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, EvalError> {
        let base = match whence {
            Whence::Start => self.start as i64,
            Whence::Current => self.pos as i64,
            Whence::End => self.end as i64,
        };
        let target = base + offset;
        if target < self.start as i64 || target > self.end as i64 {
            return Err(EvalError::range(format!(
                "seek to {} outside stream of {} bytes",
                target - self.start as i64,
                self.size()
            )));
        }
        self.align_to_byte();
        self.pos = target as u64;
        Ok(self.pos())
    }

    /// Drop any partially consumed bits. Called before every byte-oriented
    /// read.
    pub fn align_to_byte(&mut self) {
        self.bit_buf = 0;
        self.bits_left = 0;
    }

    fn take(&mut self, n: u64) -> Result<&'d [u8], EvalError> {
        self.align_to_byte();
        if self.pos + n > self.end {
            return Err(EvalError::stream(format!(
                "unexpected end of stream: need {} bytes at offset {}, have {}",
                n,
                self.pos(),
                self.end - self.pos
            )));
        }
        let slice = &self.data[self.pos as usize..(self.pos + n) as usize];
        self.pos += n;
        Ok(slice)
    }

    // ========== Integer reads ==========

    pub fn read_u1(&mut self) -> Result<u8, EvalError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u2le(&mut self) -> Result<u16, EvalError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u2be(&mut self) -> Result<u16, EvalError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u4le(&mut self) -> Result<u32, EvalError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u4be(&mut self) -> Result<u32, EvalError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u8le(&mut self) -> Result<u64, EvalError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_u8be(&mut self) -> Result<u64, EvalError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_s1(&mut self) -> Result<i8, EvalError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_s2le(&mut self) -> Result<i16, EvalError> {
        Ok(i16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_s2be(&mut self) -> Result<i16, EvalError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_s4le(&mut self) -> Result<i32, EvalError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_s4be(&mut self) -> Result<i32, EvalError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_s8le(&mut self) -> Result<i64, EvalError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_s8be(&mut self) -> Result<i64, EvalError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f4le(&mut self) -> Result<f32, EvalError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f4be(&mut self) -> Result<f32, EvalError> {
        Ok(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f8le(&mut self) -> Result<f64, EvalError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f8be(&mut self) -> Result<f64, EvalError> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    // ========== Byte reads ==========

    pub fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>, EvalError> {
        Ok(self.take(n)?.to_vec())
    }

    pub fn read_bytes_full(&mut self) -> Result<Vec<u8>, EvalError> {
        let n = self.end - self.pos;
        self.read_bytes(n)
    }

    /// Read up to a terminator byte. `include` keeps the terminator in the
    /// result; `consume` positions the stream after it; `eos_error` makes
    /// a missing terminator an error instead of reading to the end.
    pub fn read_bytes_term(
        &mut self,
        term: u8,
        include: bool,
        consume: bool,
        eos_error: bool,
    ) -> Result<Vec<u8>, EvalError> {
        self.align_to_byte();
        let rest = &self.data[self.pos as usize..self.end as usize];
        match memchr::memchr(term, rest) {
            Some(i) => {
                let mut out = rest[..i].to_vec();
                if include {
                    out.push(term);
                }
                self.pos += i as u64 + u64::from(consume);
                Ok(out)
            }
            None if eos_error => Err(EvalError::stream(format!(
                "terminator {:#04x} not found before end of stream",
                term
            ))),
            None => {
                self.pos = self.end;
                Ok(rest.to_vec())
            }
        }
    }

    /// Read exactly `size` bytes, then truncate at the first `term` (kept
    /// when `include`), otherwise strip trailing `term_pad` bytes. The two
    /// sentinel bytes are independent parameters.
    pub fn read_bytes_pad_term(
        &mut self,
        size: u64,
        term_pad: u8,
        term: u8,
        include: bool,
    ) -> Result<Vec<u8>, EvalError> {
        let raw = self.take(size)?;
        match memchr::memchr(term, raw) {
            Some(i) => {
                let end = if include { i + 1 } else { i };
                Ok(raw[..end].to_vec())
            }
            None => {
                let mut end = raw.len();
                while end > 0 && raw[end - 1] == term_pad {
                    end -= 1;
                }
                Ok(raw[..end].to_vec())
            }
        }
    }

    /// Read the rest of the stream and decode it with the named encoding.
    pub fn read_str_eos(&mut self, encoding: &str) -> Result<String, EvalError> {
        let bytes = self.read_bytes_full()?;
        decode_str(&bytes, encoding)
    }

    // ========== Bit reads ==========

    /// Read `n` bits, big bit-endian: bits fill from the most significant
    /// end of each byte.
    pub fn read_bits_int_be(&mut self, n: u32) -> Result<u64, EvalError> {
        if n == 0 || n > 64 {
            return Err(EvalError::range(format!("cannot read {} bits", n)));
        }
        while self.bits_left < n {
            if self.pos >= self.end {
                return Err(EvalError::stream("unexpected end of stream in bit read"));
            }
            let byte = self.data[self.pos as usize];
            self.pos += 1;
            self.bit_buf = (self.bit_buf << 8) | u64::from(byte);
            self.bits_left += 8;
        }
        let shift = self.bits_left - n;
        let result = (self.bit_buf >> shift) & mask(n);
        self.bits_left -= n;
        self.bit_buf &= mask(self.bits_left);
        Ok(result)
    }

    /// Read `n` bits, little bit-endian: bits fill from the least
    /// significant end of each byte.
    pub fn read_bits_int_le(&mut self, n: u32) -> Result<u64, EvalError> {
        if n == 0 || n > 64 {
            return Err(EvalError::range(format!("cannot read {} bits", n)));
        }
        while self.bits_left < n {
            if self.pos >= self.end {
                return Err(EvalError::stream("unexpected end of stream in bit read"));
            }
            let byte = self.data[self.pos as usize];
            self.pos += 1;
            self.bit_buf |= u64::from(byte)
                .checked_shl(self.bits_left)
                .unwrap_or(0);
            self.bits_left += 8;
        }
        let result = self.bit_buf & mask(n);
        self.bit_buf = self.bit_buf.checked_shr(n).unwrap_or(0);
        self.bits_left -= n;
        Ok(result)
    }
}

fn mask(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// Decode bytes with a named encoding; empty names mean UTF-8.
pub fn decode_str(bytes: &[u8], encoding: &str) -> Result<String, EvalError> {
    let label = if encoding.is_empty() { "UTF-8" } else { encoding };
    let enc = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EvalError::type_mismatch(format!("unknown encoding {:?}", label)))?;
    let (text, _, _) = enc.decode(bytes);
    Ok(text.into_owned())
}

impl StreamInfo for Stream<'_> {
    fn eof(&mut self) -> Result<bool, EvalError> {
        Ok(Stream::eof(self))
    }

    fn pos(&self) -> u64 {
        Stream::pos(self)
    }

    fn size(&self) -> u64 {
        Stream::size(self)
    }
}
