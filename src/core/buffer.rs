// Fixed-capacity char buffers exchanged with the kernel, plus their decoding rules.
use std::ffi::CString;

use libc::c_char;

use crate::core::error::{Error, ErrorKind};

/// Zeroed byte buffer the kernel fills with NUL-terminated text.
#[derive(Debug)]
pub struct CharBuffer {
    bytes: Vec<u8>,
}

impl CharBuffer {
    /// Capacity `len` as reported by a `BMI_LEN*` constant; one spare byte keeps
    /// the buffer terminated even when the kernel fills it completely.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len + 1],
        }
    }

    pub fn with_len(len: i32) -> Result<Self, Error> {
        let len = usize::try_from(len).map_err(|_| {
            Error::new(ErrorKind::Internal).with_message(format!("negative buffer length {len}"))
        })?;
        Ok(Self::new(len))
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_char {
        self.bytes.as_mut_ptr().cast()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Text up to the first NUL.
    pub fn to_string_lossy(&self) -> String {
        until_nul(&self.bytes)
    }
}

pub fn until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Split `count` consecutive fixed-width slots, each read up to its first NUL.
pub fn split_slots(bytes: &[u8], width: usize, count: usize) -> Vec<String> {
    if width == 0 {
        return vec![String::new(); count];
    }
    bytes
        .chunks(width)
        .take(count)
        .map(until_nul)
        .collect()
}

/// Fixed-width string values: read to the first NUL, then trim the padding.
pub fn decode_padded(bytes: &[u8], width: usize, count: usize) -> Vec<String> {
    split_slots(bytes, width, count)
        .into_iter()
        .map(|slot| slot.trim().to_string())
        .collect()
}

pub fn c_string(value: &str) -> Result<CString, Error> {
    CString::new(value).map_err(|err| {
        Error::new(ErrorKind::Input)
            .with_message("string passed to the kernel contains NUL")
            .with_source(err)
    })
}
