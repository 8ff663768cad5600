/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! A pipelined client connection to a single Redis server, using Tokio.
//!
//! One [`RedisConnection`](client/connection/struct.RedisConnection.html) owns one socket
//! (TCP or UNIX-domain). Any number of threads or tasks may submit queries to it
//! concurrently; queries are written to the server in submission order without waiting for
//! earlier replies, and each reply is routed back to whichever caller is owed it. This
//! implicit pipelining is what makes a single connection fast: the socket never sits idle
//! waiting for a round-trip when more work is queued.
//!
//! Two styles of submission are provided, each in single and bulk form:
//!
//! * `send_and_forget` / `send_and_forget_all` enqueue the query and return immediately.
//!   The reply is read from the socket (it must be, to keep the stream correlated) and
//!   discarded. Failures are visible only in the logs. Intended for writes where the
//!   application has no use for the result.
//! * `send` / `send_all` enqueue the query and await the reply (or list of replies, in
//!   submission order). A server-side error such as `-ERR unknown command` is a valid
//!   reply *value*, not a failure of the operation; IO and protocol errors are failures.
//!
//! Queries and replies are [`RespValue`](protocol/resp/enum.RespValue.html)s; the
//! [`resp_array!`](macro.resp_array.html) macro is the usual way to build a command.
//!
//! ```no_run
//! use redis_pipeline::{client::ConnectionBuilder, resp_array};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), redis_pipeline::error::Error> {
//!     let connection = ConnectionBuilder::new("127.0.0.1", 6379).build();
//!     connection.start();
//!
//!     connection.send_and_forget(resp_array!["SET", "key", "value"]);
//!     let value = connection.send(resp_array!["GET", "key"]).await?;
//!     println!("{:?}", value);
//!     Ok(())
//! }
//! ```
//!
//! PUBSUB, `MONITOR` and other commands that break the one-request/one-reply model are
//! not supported by this connection type.

#[macro_use]
pub mod protocol;

pub mod client;
pub mod error;

pub use crate::client::{ConnectionBuilder, RedisConnection};
pub use crate::error::Error;
pub use crate::protocol::{FromResp, RespValue};
