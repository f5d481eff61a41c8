//! Response body decoding pipeline.
//!
//! Raw body bytes pass through a content-coding stage (identity, gzip or
//! deflate) and then a charset decoder. Both stages are chosen once per
//! response from its headers and are fed incrementally, so text can be
//! emitted as soon as the bytes that produce it arrive.

use std::io::{self, Write};

use axum::http::header::{HeaderMap, CONTENT_ENCODING, CONTENT_TYPE};
use encoding_rs::{CoderResult, Encoding, UTF_8};
use flate2::write::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};

/// Largest piece of text emitted as a single body chunk, in characters.
pub const MAX_CHUNK_CHARS: usize = 8192;

/// Content coding declared by the upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Identity,
    Gzip,
    /// zlib-wrapped deflate, as HTTP defines it.
    Deflate,
}

impl ContentCoding {
    /// Map a `Content-Encoding` value. Unknown codings pass through untouched.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("gzip") => ContentCoding::Gzip,
            Some(v) if v.eq_ignore_ascii_case("deflate") => ContentCoding::Deflate,
            _ => ContentCoding::Identity,
        }
    }
}

/// Extract the `charset` parameter from a `Content-Type` value.
///
/// The parameter name is matched case-insensitively and its value runs to
/// the next `;` or the end of the header.
pub fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then_some(value)
    })
}

/// Resolve the text encoding for a response, defaulting to UTF-8.
pub fn encoding_for(content_type: Option<&str>) -> &'static Encoding {
    let Some(label) = content_type.and_then(charset_param) else {
        return UTF_8;
    };
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding,
        None => {
            tracing::warn!(charset = %label, "Unknown response charset, decoding as UTF-8");
            UTF_8
        }
    }
}

enum Decompressor {
    Identity,
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(Inflater),
}

impl Decompressor {
    fn new(coding: ContentCoding) -> Self {
        match coding {
            ContentCoding::Identity => Decompressor::Identity,
            ContentCoding::Gzip => Decompressor::Gzip(GzDecoder::new(Vec::new())),
            ContentCoding::Deflate => Decompressor::Deflate(Inflater::new()),
        }
    }

    /// Feed compressed bytes, returning whatever plain bytes are ready.
    fn push(&mut self, input: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Decompressor::Identity => Ok(input.to_vec()),
            Decompressor::Gzip(d) => {
                d.write_all(input)?;
                Ok(std::mem::take(d.get_mut()))
            }
            Decompressor::Deflate(d) => d.push(input),
        }
    }

    fn finish(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Decompressor::Identity => Ok(Vec::new()),
            Decompressor::Gzip(d) => {
                d.try_finish()?;
                Ok(std::mem::take(d.get_mut()))
            }
            Decompressor::Deflate(d) => d.finish(),
        }
    }
}

/// zlib inflater that knows whether the stream reached its end marker.
struct Inflater {
    raw: Decompress,
    ended: bool,
}

impl Inflater {
    fn new() -> Self {
        Self {
            raw: Decompress::new(true),
            ended: false,
        }
    }

    fn push(&mut self, mut input: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while !self.ended {
            if out.capacity() - out.len() < 1024 {
                out.reserve(input.len().max(1024) * 2);
            }
            let (in_before, out_before) = (self.raw.total_in(), self.raw.total_out());
            let status = self
                .raw
                .decompress_vec(input, &mut out, FlushDecompress::None)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let consumed = (self.raw.total_in() - in_before) as usize;
            let produced = self.raw.total_out() - out_before;
            input = &input[consumed..];

            if status == Status::StreamEnd {
                self.ended = true;
            } else if (consumed == 0 && produced == 0)
                || (input.is_empty() && out.len() < out.capacity())
            {
                // Needs more input.
                break;
            }
        }
        Ok(out)
    }

    fn finish(&mut self) -> io::Result<Vec<u8>> {
        let tail = self.push(&[])?;
        if !self.ended {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "deflate stream ended before its end marker",
            ));
        }
        Ok(tail)
    }
}

/// Incremental bytes-to-text decoder for one response body.
pub struct BodyDecoder {
    coding: ContentCoding,
    decompressor: Decompressor,
    text: encoding_rs::Decoder,
}

impl BodyDecoder {
    pub fn new(coding: ContentCoding, encoding: &'static Encoding) -> Self {
        Self {
            coding,
            decompressor: Decompressor::new(coding),
            text: encoding.new_decoder(),
        }
    }

    /// Select the pipeline from the response's headers.
    pub fn for_headers(headers: &HeaderMap) -> Self {
        let coding = ContentCoding::from_header(
            headers.get(CONTENT_ENCODING).and_then(|v| v.to_str().ok()),
        );
        let encoding = encoding_for(headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()));
        Self::new(coding, encoding)
    }

    pub fn coding(&self) -> ContentCoding {
        self.coding
    }

    /// Decode one body frame. May return an empty string while a multi-byte
    /// sequence or compressed block is incomplete.
    pub fn decode(&mut self, bytes: &[u8]) -> io::Result<String> {
        let plain = self.decompressor.push(bytes)?;
        Ok(self.decode_text(&plain, false))
    }

    /// Flush both stages at end of body.
    pub fn finish(&mut self) -> io::Result<String> {
        let plain = self.decompressor.finish()?;
        Ok(self.decode_text(&plain, true))
    }

    fn decode_text(&mut self, mut input: &[u8], last: bool) -> String {
        let mut out = String::with_capacity(
            self.text
                .max_utf8_buffer_length(input.len())
                .unwrap_or(input.len() * 3 + 4),
        );
        loop {
            let (result, read, _) = self.text.decode_to_string(input, &mut out, last);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => return out,
                CoderResult::OutputFull => out.reserve(input.len() * 3 + 4),
            }
        }
    }
}

/// Split decoded text into pieces of at most `max_chars` characters.
pub fn split_chunks(text: &str, max_chars: usize) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (piece, tail) = rest.split_at(end);
        rest = tail;
        Some(piece)
    })
}
