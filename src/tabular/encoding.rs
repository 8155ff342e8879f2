//! Text encoding detection and streaming decode
//!
//! A byte-order mark wins outright. Without one, a sample window must pass a
//! strict UTF-8 check; otherwise high bytes are read as Windows-1252, the
//! usual encoding of spreadsheets exported on Western-locale machines.

use std::fmt;
use std::io::{self, Cursor, Read};

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

/// Bytes inspected before choosing an encoding
pub const SAMPLE_LEN: usize = 4096;

const READ_CHUNK: usize = 8192;

/// Encodings the tabular reader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

impl TextEncoding {
    fn encoding(&self) -> &'static Encoding {
        match self {
            Self::Utf8 => UTF_8,
            Self::Utf16Le => UTF_16LE,
            Self::Utf16Be => UTF_16BE,
            Self::Windows1252 => WINDOWS_1252,
        }
    }

    /// Canonical label (e.g. `UTF-8`, `windows-1252`)
    pub fn name(&self) -> &'static str {
        self.encoding().name()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of inspecting the start of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub encoding: TextEncoding,
    /// Length of the byte-order mark to skip
    pub bom_len: usize,
}

/// Pick an encoding for a stream from its first bytes
///
/// `at_eof` tells whether `sample` is the whole stream; if not, a multi-byte
/// sequence cut off by the end of the window still counts as valid.
pub fn detect_encoding(sample: &[u8], at_eof: bool) -> Detection {
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Detection {
            encoding: TextEncoding::Utf8,
            bom_len: 3,
        };
    }
    if sample.starts_with(&[0xFE, 0xFF]) {
        return Detection {
            encoding: TextEncoding::Utf16Be,
            bom_len: 2,
        };
    }
    if sample.starts_with(&[0xFF, 0xFE]) {
        return Detection {
            encoding: TextEncoding::Utf16Le,
            bom_len: 2,
        };
    }

    let encoding = if is_utf8_sample(sample, at_eof) {
        TextEncoding::Utf8
    } else {
        TextEncoding::Windows1252
    };

    Detection {
        encoding,
        bom_len: 0,
    }
}

/// Strict UTF-8 validation of a sample window
///
/// Rejects stray continuation bytes, overlong forms, surrogates and code
/// points above U+10FFFF. A sequence truncated by the window end is accepted
/// unless the sample is the whole stream.
pub fn is_utf8_sample(sample: &[u8], at_eof: bool) -> bool {
    let mut i = 0;
    while i < sample.len() {
        let lead = sample[i];
        let (len, second): (usize, std::ops::RangeInclusive<u8>) = match lead {
            0x00..=0x7F => {
                i += 1;
                continue;
            }
            0xC2..=0xDF => (2, 0x80..=0xBF),
            0xE0 => (3, 0xA0..=0xBF),
            0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80..=0xBF),
            0xED => (3, 0x80..=0x9F),
            0xF0 => (4, 0x90..=0xBF),
            0xF1..=0xF3 => (4, 0x80..=0xBF),
            0xF4 => (4, 0x80..=0x8F),
            _ => return false,
        };

        for offset in 1..len {
            let Some(&byte) = sample.get(i + offset) else {
                return !at_eof;
            };
            let allowed = if offset == 1 {
                second.contains(&byte)
            } else {
                (0x80..=0xBF).contains(&byte)
            };
            if !allowed {
                return false;
            }
        }
        i += len;
    }
    true
}

/// Read up to `SAMPLE_LEN` bytes, tolerating short reads
fn read_sample<R: Read>(reader: &mut R) -> io::Result<(Vec<u8>, bool)> {
    let mut sample = vec![0u8; SAMPLE_LEN];
    let mut filled = 0;
    while filled < SAMPLE_LEN {
        match reader.read(&mut sample[filled..]) {
            Ok(0) => {
                sample.truncate(filled);
                return Ok((sample, true));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok((sample, false))
}

/// Decodes a byte stream into chars with one char of lookahead
pub struct CharSource<R: Read> {
    reader: io::Chain<Cursor<Vec<u8>>, R>,
    decoder: Decoder,
    encoding: TextEncoding,
    bytes: Vec<u8>,
    text: String,
    pos: usize,
    finished: bool,
}

impl<R: Read> CharSource<R> {
    /// Sniff the encoding from the head of `reader` and start decoding after any BOM
    pub fn open(mut reader: R) -> io::Result<Self> {
        let (sample, at_eof) = read_sample(&mut reader)?;
        let detection = detect_encoding(&sample, at_eof);

        let mut head = Cursor::new(sample);
        head.set_position(detection.bom_len as u64);

        Ok(Self {
            reader: head.chain(reader),
            decoder: detection.encoding.encoding().new_decoder_without_bom_handling(),
            encoding: detection.encoding,
            bytes: vec![0u8; READ_CHUNK],
            text: String::new(),
            pos: 0,
            finished: false,
        })
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Next char without consuming it
    pub fn peek(&mut self) -> io::Result<Option<char>> {
        if self.pos >= self.text.len() && !self.refill()? {
            return Ok(None);
        }
        Ok(self.text[self.pos..].chars().next())
    }

    /// Consume and return the next char
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        let next = self.peek()?;
        if let Some(c) = next {
            self.pos += c.len_utf8();
        }
        Ok(next)
    }

    /// Decode the next chunk; returns false once the stream is exhausted
    fn refill(&mut self) -> io::Result<bool> {
        self.text.clear();
        self.pos = 0;

        while self.text.is_empty() {
            if self.finished {
                return Ok(false);
            }

            let read = loop {
                match self.reader.read(&mut self.bytes) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            };
            let last = read == 0;

            let mut input = &self.bytes[..read];
            loop {
                let needed = self
                    .decoder
                    .max_utf8_buffer_length(input.len())
                    .unwrap_or(input.len() * 3 + 16);
                self.text.reserve(needed);

                let (result, consumed, _) = self.decoder.decode_to_string(input, &mut self.text, last);
                input = &input[consumed..];
                if let CoderResult::InputEmpty = result {
                    break;
                }
            }

            if last {
                self.finished = true;
            }
        }

        Ok(true)
    }
}
