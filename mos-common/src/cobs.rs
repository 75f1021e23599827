// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! COBS (Consistent Overhead Byte Stuffing) encoder/decoder.
//!
//! COBS eliminates 0x00 bytes from data, allowing 0x00 to be used as the
//! frame delimiter on byte-stream links (serial, TCP).

/// Frame delimiter.
pub const DELIMITER: u8 = 0x00;

/// COBS encode data.
///
/// The output includes the trailing 0x00 delimiter.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() + data.len() / 254 + 2);
    let mut code_idx = 0;
    let mut code: u8 = 1;

    output.push(0); // placeholder for first code byte

    for &byte in data {
        if byte == 0 {
            output[code_idx] = code;
            code_idx = output.len();
            output.push(0);
            code = 1;
        } else {
            output.push(byte);
            code += 1;
            if code == 255 {
                output[code_idx] = code;
                code_idx = output.len();
                output.push(0);
                code = 1;
            }
        }
    }
    output[code_idx] = code;
    output.push(DELIMITER);

    output
}

/// COBS decode one frame, with or without its trailing delimiter.
///
/// Returns None if the frame is truncated.
pub fn decode(data: &[u8]) -> Option<Vec<u8>> {
    if data.is_empty() {
        return None;
    }

    let mut output = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let code = data[i] as usize;
        if code == 0 {
            break;
        }
        i += 1;

        for _ in 1..code {
            if i >= data.len() || data[i] == 0 {
                return None; // unexpected end
            }
            output.push(data[i]);
            i += 1;
        }

        if code < 255 && i < data.len() && data[i] != 0 {
            output.push(0);
        }
    }

    Some(output)
}

/// Accumulates stream bytes and yields complete (still encoded) frames.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buf: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next delimited frame, without the delimiter.
    /// Empty frames (back-to-back delimiters) are skipped.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let end = self.buf.iter().position(|&b| b == DELIMITER)?;
            let frame: Vec<u8> = self.buf.drain(..=end).take(end).collect();
            if !frame.is_empty() {
                return Some(frame);
            }
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let data = [0x11, 0x22, 0x00, 0x33];
        let encoded = encode(&data);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_encode_no_zeros() {
        let data = [0x11, 0x22, 0x33];
        let encoded = encode(&data);
        // Check no zeros except the delimiter at the end
        assert!(encoded[..encoded.len() - 1].iter().all(|&b| b != 0));
        assert_eq!(encoded[encoded.len() - 1], 0);
    }

    #[test]
    fn test_large_data() {
        let data: Vec<u8> = (0..1024).map(|i| i as u8).collect();
        let encoded = encode(&data);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_truncated_returns_none() {
        assert!(decode(&[0x05, 0x01]).is_none()); // claims 4 more bytes
    }

    #[test]
    fn test_splitter_yields_frames_across_pushes() {
        let a = encode(b"{\"id\":1}");
        let b = encode(b"{\"id\":2}");
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        let mut splitter = FrameSplitter::new();
        splitter.push(&stream[..3]);
        assert!(splitter.next_frame().is_none());
        splitter.push(&stream[3..]);

        let first = splitter.next_frame().unwrap();
        assert_eq!(decode(&first).unwrap(), b"{\"id\":1}");
        let second = splitter.next_frame().unwrap();
        assert_eq!(decode(&second).unwrap(), b"{\"id\":2}");
        assert!(splitter.next_frame().is_none());
    }

    #[test]
    fn test_splitter_skips_empty_frames() {
        let mut splitter = FrameSplitter::new();
        splitter.push(&[0, 0]);
        splitter.push(&encode(b"x"));
        assert_eq!(decode(&splitter.next_frame().unwrap()).unwrap(), b"x");
    }
}
