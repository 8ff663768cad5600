/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use bytes::{BufMut, BytesMut};

use crate::protocol::resp::RespValue;

fn put_line(symb: u8, line: &[u8], buf: &mut BytesMut) {
    buf.reserve(1 + line.len() + 2);
    buf.put_u8(symb);
    buf.put_slice(line);
    buf.put_slice(b"\r\n");
}

fn put_header(symb: u8, len: i64, buf: &mut BytesMut) {
    put_line(symb, len.to_string().as_bytes(), buf);
}

fn encode_bulk_string(bstr: Vec<u8>, buf: &mut BytesMut) {
    put_header(b'$', bstr.len() as i64, buf);
    buf.reserve(bstr.len() + 2);
    buf.put_slice(&bstr);
    buf.put_slice(b"\r\n");
}

fn encode_array(ary: Vec<RespValue>, buf: &mut BytesMut) {
    put_header(b'*', ary.len() as i64, buf);
    for v in ary {
        encode(v, buf);
    }
}

pub(crate) fn encode(msg: RespValue, buf: &mut BytesMut) {
    match msg {
        // A nil is transmitted as a bulk string of length -1
        RespValue::Nil => put_header(b'$', -1, buf),
        RespValue::Array(ary) => encode_array(ary, buf),
        RespValue::BulkString(bstr) => encode_bulk_string(bstr, buf),
        RespValue::Error(ref string) => put_line(b'-', string.as_bytes(), buf),
        RespValue::Integer(val) => put_header(b':', val, buf),
        RespValue::SimpleString(ref string) => put_line(b'+', string.as_bytes(), buf),
    }
}
