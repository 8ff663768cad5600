/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! The RESP protocol: the value type that queries and replies share, conversions to and
//! from it, and the codec that frames it on the wire.

#[macro_use]
pub(crate) mod resp;

mod codec;

pub(crate) use codec::RespCodec;

pub use resp::{FromResp, RespValue, ToRespString};
