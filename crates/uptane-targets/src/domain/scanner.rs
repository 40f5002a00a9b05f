//! # Grammar Scanner
//!
//! Primitive readers for the fixed Targets grammar, built on a [`ByteSource`].
//!
//! The scanner is also the tee between the source and the signature contexts: while a
//! signed region is open, every consumed byte is forwarded to the [`SignedFeed`] in
//! document order. Peeked bytes are not forwarded until they are consumed.

use super::entities::UptaneTime;
use super::errors::ScanError;
use super::limits::LITERAL_CHUNK;
use crate::ports::outbound::ByteSource;

/// Receiver of the raw bytes inside the signed region.
pub(crate) trait SignedFeed {
    fn feed(&mut self, bytes: &[u8]);
}

/// Cursor over a byte source with an explicit signed-region scope.
pub(crate) struct Scanner<'a, S: ?Sized, F: ?Sized> {
    source: &'a mut S,
    feed: &'a mut F,
    in_signed: bool,
    offset: u64,
}

impl<'a, S, F> Scanner<'a, S, F>
where
    S: ByteSource + ?Sized,
    F: SignedFeed + ?Sized,
{
    pub(crate) fn new(source: &'a mut S, feed: &'a mut F) -> Self {
        Self {
            source,
            feed,
            in_signed: false,
            offset: 0,
        }
    }

    /// The feed, for binding new contexts before the signed region opens.
    pub(crate) fn feed_mut(&mut self) -> &mut F {
        self.feed
    }

    /// Bytes consumed so far.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn in_signed(&self) -> bool {
        self.in_signed
    }

    /// Start forwarding consumed bytes to the feed.
    pub(crate) fn begin_signed(&mut self) {
        self.in_signed = true;
    }

    /// Stop forwarding consumed bytes to the feed.
    pub(crate) fn end_signed(&mut self) {
        self.in_signed = false;
    }

    // =========================================================================
    // Raw access
    // =========================================================================

    fn consume(&mut self, buf: &mut [u8]) -> Result<(), ScanError> {
        self.source.read(buf)?;
        self.offset += buf.len() as u64;
        if self.in_signed {
            self.feed.feed(buf);
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Result<u8, ScanError> {
        let mut byte = [0u8; 1];
        self.consume(&mut byte)?;
        Ok(byte[0])
    }

    fn unexpected(&self, found: u8) -> ScanError {
        ScanError::UnexpectedByte {
            found,
            offset: self.offset - 1,
        }
    }

    /// Observe the next byte without consuming it.
    pub(crate) fn peek(&mut self) -> Result<u8, ScanError> {
        Ok(self.source.peek()?)
    }

    // =========================================================================
    // Grammar primitives
    // =========================================================================

    /// Consume `literal.len()` bytes and require them to equal `literal`.
    pub(crate) fn literal(&mut self, literal: &[u8]) -> Result<(), ScanError> {
        let mut staging = [0u8; LITERAL_CHUNK];
        for chunk in literal.chunks(LITERAL_CHUNK) {
            let buf = &mut staging[..chunk.len()];
            self.consume(buf)?;
            if let Some(pos) = buf.iter().zip(chunk).position(|(got, want)| got != want) {
                return Err(ScanError::UnexpectedByte {
                    found: buf[pos],
                    offset: self.offset - (chunk.len() - pos) as u64,
                });
            }
        }
        Ok(())
    }

    /// Consume a list separator. Returns `true` when `close` ends the list,
    /// `false` when a `,` announces another element.
    pub(crate) fn separator(&mut self, close: u8) -> Result<bool, ScanError> {
        match self.next_byte()? {
            b',' => Ok(false),
            byte if byte == close => Ok(true),
            byte => Err(self.unexpected(byte)),
        }
    }

    /// Consume `close` if it is the next byte. Used for empty containers.
    pub(crate) fn close_if_empty(&mut self, close: u8) -> Result<bool, ScanError> {
        if self.peek()? == close {
            self.next_byte()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Quoted hex string decoded into `out`. Returns the decoded length.
    pub(crate) fn hex_string(&mut self, out: &mut [u8]) -> Result<usize, ScanError> {
        let max_len = out.len();
        self.hex_inner(Some(out), max_len)
    }

    /// Quoted hex string, validated and dropped. Returns the decoded length.
    pub(crate) fn skip_hex_string(&mut self) -> Result<usize, ScanError> {
        self.hex_inner(None, usize::MAX)
    }

    /// Quoted hex string that must decode to exactly `out.len()` bytes.
    pub(crate) fn fixed_hex_string(&mut self, out: &mut [u8]) -> Result<(), ScanError> {
        let expected = out.len();
        let actual = self.hex_string(out)?;
        if actual != expected {
            return Err(ScanError::WrongLength { expected, actual });
        }
        Ok(())
    }

    fn hex_inner(&mut self, mut out: Option<&mut [u8]>, max_len: usize) -> Result<usize, ScanError> {
        let start = self.offset;
        self.literal(b"\"")?;

        let mut count = 0usize;
        loop {
            let hi = self.next_byte()?;
            if hi == b'"' {
                return Ok(count);
            }
            if count == max_len {
                return Err(ScanError::StringTooLong {
                    offset: start,
                    max_len,
                });
            }
            let hi = hex_value(hi).ok_or_else(|| self.unexpected(hi))?;
            let lo = self.next_byte()?;
            let lo = hex_value(lo).ok_or_else(|| self.unexpected(lo))?;

            if let Some(out) = out.as_deref_mut() {
                out[count] = (hi << 4) | lo;
            }
            count += 1;
        }
    }

    /// Quoted text string copied into `out`. No escape sequences are recognized.
    pub(crate) fn text_string<'b>(&mut self, out: &'b mut [u8]) -> Result<&'b [u8], ScanError> {
        let max_len = out.len();
        let len = self.text_inner(Some(&mut *out), max_len)?;
        Ok(&out[..len])
    }

    /// Quoted text string, traversed byte by byte and dropped.
    pub(crate) fn skip_text_string(&mut self) -> Result<usize, ScanError> {
        self.text_inner(None, usize::MAX)
    }

    fn text_inner(&mut self, mut out: Option<&mut [u8]>, max_len: usize) -> Result<usize, ScanError> {
        let start = self.offset;
        self.literal(b"\"")?;

        let mut count = 0usize;
        loop {
            let byte = self.next_byte()?;
            if byte == b'"' {
                return Ok(count);
            }
            if count == max_len {
                return Err(ScanError::StringTooLong {
                    offset: start,
                    max_len,
                });
            }
            if let Some(out) = out.as_deref_mut() {
                out[count] = byte;
            }
            count += 1;
        }
    }

    /// Unsigned decimal number; at least one digit, stops at the first non-digit.
    pub(crate) fn uint(&mut self) -> Result<u32, ScanError> {
        let start = self.offset;
        let mut value: u32 = 0;
        let mut digits = 0usize;

        loop {
            let byte = self.peek()?;
            if !byte.is_ascii_digit() {
                break;
            }
            self.next_byte()?;
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(byte - b'0')))
                .ok_or(ScanError::NumberOverflow { offset: start })?;
            digits += 1;
        }

        if digits == 0 {
            return Err(ScanError::MissingNumber { offset: start });
        }
        Ok(value)
    }

    /// `"YYYY-MM-DDThh:mm:ssZ"`
    pub(crate) fn timestamp(&mut self) -> Result<UptaneTime, ScanError> {
        self.literal(b"\"")?;
        let year = self.uint()?;
        self.literal(b"-")?;
        let month = self.uint()?;
        self.literal(b"-")?;
        let day = self.uint()?;
        self.literal(b"T")?;
        let hour = self.uint()?;
        self.literal(b":")?;
        let minute = self.uint()?;
        self.literal(b":")?;
        let second = self.uint()?;
        self.literal(b"Z\"")?;

        Ok(UptaneTime::new(year, month, day, hour, minute, second))
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
