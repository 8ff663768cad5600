/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::str;

use bytes::BytesMut;

use crate::{error::Error, protocol::resp::RespValue};

/// `Ok(None)` means the buffer does not yet hold a complete frame; the caller should read
/// more bytes and try again.  `Ok(Some((pos, value)))` means a frame ended at `pos`.
type DecodeResult = Result<Option<(usize, RespValue)>, Error>;

#[inline]
fn parse_error(message: String) -> Error {
    Error::RESP(message, None)
}

/// Scan for the `\r\n` terminating the line that starts at `idx`.  Returns the line's bytes
/// and the position just past the terminator, or `None` if the terminator has not arrived.
fn scan_line(buf: &BytesMut, idx: usize) -> Option<(usize, &[u8])> {
    let mut pos = idx;
    while pos + 1 < buf.len() {
        if buf[pos] == b'\r' && buf[pos + 1] == b'\n' {
            return Some((pos + 2, &buf[idx..pos]));
        }
        pos += 1;
    }
    None
}

/// Lengths and integers are transmitted as a line holding a base-10 string.
fn scan_integer(buf: &BytesMut, idx: usize) -> Result<Option<(usize, i64)>, Error> {
    match scan_line(buf, idx) {
        None => Ok(None),
        Some((pos, line)) => match str::from_utf8(line) {
            Ok(string) => match string.parse() {
                Ok(int) => Ok(Some((pos, int))),
                Err(_) => Err(parse_error(format!("Not an integer: {}", string))),
            },
            Err(_) => Err(parse_error(format!("Not a valid string: {:?}", line))),
        },
    }
}

fn decode_bulk_string(buf: &BytesMut, idx: usize) -> DecodeResult {
    match scan_integer(buf, idx)? {
        None => Ok(None),
        Some((pos, -1)) => Ok(Some((pos, RespValue::Nil))),
        Some((pos, size)) if size >= 0 => {
            let size = size as usize;
            // The payload is followed by its own `\r\n`
            if buf.len() < pos + size + 2 {
                return Ok(None);
            }
            let bulk_string = RespValue::BulkString(buf[pos..pos + size].to_vec());
            Ok(Some((pos + size + 2, bulk_string)))
        }
        Some((_, size)) => Err(parse_error(format!("Invalid string size: {}", size))),
    }
}

fn decode_array(buf: &BytesMut, idx: usize) -> DecodeResult {
    match scan_integer(buf, idx)? {
        None => Ok(None),
        Some((pos, -1)) => Ok(Some((pos, RespValue::Nil))),
        Some((mut pos, size)) if size >= 0 => {
            let size = size as usize;
            let mut values = Vec::with_capacity(size);
            for _ in 0..size {
                match decode(buf, pos)? {
                    None => return Ok(None),
                    Some((new_pos, value)) => {
                        values.push(value);
                        pos = new_pos;
                    }
                }
            }
            Ok(Some((pos, RespValue::Array(values))))
        }
        Some((_, size)) => Err(parse_error(format!("Invalid array size: {}", size))),
    }
}

fn decode_integer(buf: &BytesMut, idx: usize) -> DecodeResult {
    Ok(scan_integer(buf, idx)?.map(|(pos, int)| (pos, RespValue::Integer(int))))
}

fn decode_simple_string(buf: &BytesMut, idx: usize) -> DecodeResult {
    Ok(scan_line(buf, idx).map(|(pos, line)| {
        let string = String::from_utf8_lossy(line).into_owned();
        (pos, RespValue::SimpleString(string))
    }))
}

fn decode_error(buf: &BytesMut, idx: usize) -> DecodeResult {
    Ok(scan_line(buf, idx).map(|(pos, line)| {
        let string = String::from_utf8_lossy(line).into_owned();
        (pos, RespValue::Error(string))
    }))
}

pub(crate) fn decode(buf: &BytesMut, idx: usize) -> DecodeResult {
    if buf.len() <= idx {
        return Ok(None);
    }

    match buf[idx] {
        b'$' => decode_bulk_string(buf, idx + 1),
        b'*' => decode_array(buf, idx + 1),
        b':' => decode_integer(buf, idx + 1),
        b'+' => decode_simple_string(buf, idx + 1),
        b'-' => decode_error(buf, idx + 1),
        first_byte => Err(parse_error(format!("Unexpected byte: {}", first_byte))),
    }
}
