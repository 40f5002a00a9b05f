//! # Byte Source Adapters
//!
//! [`ByteSource`] implementations over an in-memory buffer and over any
//! [`std::io::Read`].

use std::io::{ErrorKind, Read};

use crate::domain::errors::SourceError;
use crate::ports::outbound::ByteSource;

/// Byte source over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Read from the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

impl ByteSource for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), SourceError> {
        let end = self
            .pos
            .checked_add(buf.len())
            .filter(|end| *end <= self.data.len())
            .ok_or(SourceError::UnexpectedEof)?;
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn peek(&mut self) -> Result<u8, SourceError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(SourceError::UnexpectedEof)
    }
}

/// Byte source over a reader, with one byte of lookahead.
///
/// Wrap unbuffered transports in a [`std::io::BufReader`]; the scanner reads in
/// small chunks.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
    lookahead: Option<u8>,
}

impl<R: Read> ReaderSource<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            lookahead: None,
        }
    }

    /// Recover the reader. A peeked but unconsumed byte is lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn map_io(err: std::io::Error) -> SourceError {
    if err.kind() == ErrorKind::UnexpectedEof {
        SourceError::UnexpectedEof
    } else {
        SourceError::Io(err)
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), SourceError> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(());
        };
        match self.lookahead.take() {
            Some(byte) => {
                *first = byte;
                self.inner.read_exact(rest).map_err(map_io)
            }
            None => self.inner.read_exact(buf).map_err(map_io),
        }
    }

    fn peek(&mut self) -> Result<u8, SourceError> {
        if let Some(byte) = self.lookahead {
            return Ok(byte);
        }
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte).map_err(map_io)?;
        self.lookahead = Some(byte[0]);
        Ok(byte[0])
    }
}
