//! Audio sources for the send pacer.
//!
//! A source is a plain byte stream of pre-encoded Opus audio: each read of
//! [`OPUS_FRAME_SIZE`] bytes yields one 20 ms frame, and a shorter read marks
//! the end of the stream. Encoding, resampling, and mixing happen upstream.
//!
//! [`OPUS_FRAME_SIZE`]: ../constants/constant.OPUS_FRAME_SIZE.html

use std::fmt::{Debug, Error as FormatError, Formatter};
use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind as IoErrorKind, Read, Result as IoResult};
use std::result::Result as StdResult;

/// Usable data/byte sources for an audio stream.
pub enum Reader {
    /// A file of raw frame data.
    File(BufReader<File>),
    /// An in-memory buffer of raw frame data.
    Memory(Cursor<Vec<u8>>),
    /// A user-supplied source.
    Extension(Box<dyn Read + Send>),
}

impl Read for Reader {
    fn read(&mut self, buffer: &mut [u8]) -> IoResult<usize> {
        use Reader::*;
        match self {
            File(a) => Read::read(a, buffer),
            Memory(a) => Read::read(a, buffer),
            Extension(a) => a.read(buffer),
        }
    }
}

impl Debug for Reader {
    fn fmt(&self, f: &mut Formatter<'_>) -> StdResult<(), FormatError> {
        use Reader::*;
        let field = match self {
            File(a) => format!("{:?}", a),
            Memory(a) => format!("{:?}", a),
            Extension(_) => "Extension".to_string(),
        };
        f.debug_tuple("Reader").field(&field).finish()
    }
}

/// One pre-encoded Opus stream, handed to a call for playback.
#[derive(Debug)]
pub struct Input {
    reader: Reader,
}

impl Input {
    pub fn new(reader: Reader) -> Self {
        Input { reader }
    }

    /// Fills `frame` completely from the source.
    ///
    /// Returns the number of bytes read; anything short of `frame.len()`
    /// means the stream has ended.
    pub(crate) fn read_frame(&mut self, frame: &mut [u8]) -> IoResult<usize> {
        let mut filled = 0;

        while filled < frame.len() {
            match self.reader.read(&mut frame[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == IoErrorKind::Interrupted => {},
                Err(e) => return Err(e),
            }
        }

        Ok(filled)
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::new(Reader::Memory(Cursor::new(bytes)))
    }
}

impl From<File> for Input {
    fn from(file: File) -> Self {
        Input::new(Reader::File(BufReader::new(file)))
    }
}

impl<R: Read + Send + 'static> From<Box<R>> for Input {
    fn from(reader: Box<R>) -> Self {
        Input::new(Reader::Extension(reader))
    }
}
