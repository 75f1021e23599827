// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Device-resident file access as sequences of fixed-size chunked calls.
//!
//! ```text
//! FS.Get {filename, offset, len: 512} -> {data: base64, left}   until left == 0
//! FS.Put {filename, data: base64, append: false}                first chunk
//! FS.Put {filename, data: base64, append: true}                 every later chunk
//! ```
//!
//! Transfers never retry: a failed chunk aborts the whole operation.

use std::io::{ErrorKind as IoErrorKind, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::protocol::{
    GetArgs, GetResult, PutArgs, RemoveArgs, FS_CHUNK_SIZE, FS_GET, FS_LIST, FS_PUT, FS_REMOVE,
};
use crate::rpc::ServiceClient;
use crate::session::DeviceSession;

/// Filesystem service client: one call per method, no chunk loop.
pub struct FsClient<'s> {
    inner: ServiceClient<'s>,
}

impl<'s> FsClient<'s> {
    pub fn new(inner: ServiceClient<'s>) -> Self {
        Self { inner }
    }

    pub fn list(&mut self, cancel: &CancelToken) -> Result<Vec<String>> {
        let files: Option<Vec<String>> = self.inner.invoke::<(), _>(FS_LIST, None, cancel)?;
        Ok(files.unwrap_or_default())
    }

    pub fn get_chunk(&mut self, args: &GetArgs, cancel: &CancelToken) -> Result<GetResult> {
        let chunk: Option<GetResult> = self.inner.invoke(FS_GET, Some(args), cancel)?;
        chunk.ok_or_else(|| Error::Protocol(format!("{}: empty response", FS_GET)))
    }

    pub fn put_chunk(&mut self, args: &PutArgs, cancel: &CancelToken) -> Result<()> {
        let _: Option<serde_json::Value> = self.inner.invoke(FS_PUT, Some(args), cancel)?;
        Ok(())
    }

    pub fn remove(&mut self, args: &RemoveArgs, cancel: &CancelToken) -> Result<()> {
        let _: Option<serde_json::Value> = self.inner.invoke(FS_REMOVE, Some(args), cancel)?;
        Ok(())
    }
}

/// Device file listing, verbatim.
pub fn list(session: &mut DeviceSession, cancel: &CancelToken) -> Result<Vec<String>> {
    session.filesystem()?.list(cancel)
}

/// Fetch a whole file, 512 bytes at a time.
pub fn get(session: &mut DeviceSession, name: &str, cancel: &CancelToken) -> Result<Vec<u8>> {
    let mut fs = session.filesystem()?;
    let mut contents = Vec::new();
    let mut offset: i64 = 0;

    loop {
        let chunk = fs.get_chunk(
            &GetArgs {
                filename: name.to_string(),
                offset,
                len: FS_CHUNK_SIZE as i64,
            },
            cancel,
        )?;

        let decoded = STANDARD.decode(chunk.data.as_bytes()).map_err(|e| {
            Error::Protocol(format!("{} {} at offset {}: bad chunk data: {}", FS_GET, name, offset, e))
        })?;
        log::trace!(
            "{}: {} bytes at offset {}, {} left",
            name,
            decoded.len(),
            offset,
            chunk.left
        );

        if chunk.left == 0 {
            contents.extend_from_slice(&decoded);
            break;
        }
        if decoded.is_empty() {
            return Err(Error::Protocol(format!(
                "{} {} stalled at offset {} with {} bytes left",
                FS_GET, name, offset, chunk.left
            )));
        }

        offset += decoded.len() as i64;
        contents.extend_from_slice(&decoded);
    }

    Ok(contents)
}

/// Fill `buf` from `source`, stopping early only at end of input.
fn read_chunk(source: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Write `source` to the device file `name`.
///
/// Only the first chunk truncates the file; the rest append. An empty source
/// sends nothing. Returns the number of bytes written.
pub fn put(
    session: &mut DeviceSession,
    name: &str,
    mut source: impl Read,
    cancel: &CancelToken,
) -> Result<u64> {
    let mut fs = session.filesystem()?;
    let mut buf = [0u8; FS_CHUNK_SIZE];
    let mut append = false;
    let mut written = 0u64;

    loop {
        let n = read_chunk(&mut source, &mut buf)
            .map_err(|e| Error::io("reading source for", name, e))?;
        if n == 0 {
            break;
        }

        fs.put_chunk(
            &PutArgs {
                filename: name.to_string(),
                data: STANDARD.encode(&buf[..n]),
                append,
            },
            cancel,
        )?;
        written += n as u64;
        append = true;

        if n < FS_CHUNK_SIZE {
            break;
        }
    }

    Ok(written)
}

pub fn remove(session: &mut DeviceSession, name: &str, cancel: &CancelToken) -> Result<()> {
    session.filesystem()?.remove(
        &RemoveArgs {
            filename: name.to_string(),
        },
        cancel,
    )
}
