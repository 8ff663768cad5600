/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::path::PathBuf;

use super::connection::RedisConnection;

/// Assembles a [`RedisConnection`] from its settings.
///
/// Only the TCP endpoint is mandatory; a UNIX socket path, credentials and a database
/// index are optional.
pub struct ConnectionBuilder {
    host: String,
    port: u16,
    path: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    db: usize,
}

impl ConnectionBuilder {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectionBuilder {
            host: host.into(),
            port,
            path: None,
            username: None,
            password: None,
            db: 0,
        }
    }

    /// Connect over a UNIX-domain socket instead; `host` and `port` are then ignored.
    pub fn unix_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// ACL username, sent alongside the password in `AUTH`.  Ignored without a password.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// When set, `AUTH` is the first query issued on a fresh transport.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// When non-zero, `SELECT` is issued on a fresh transport, after any `AUTH`.
    pub fn db(mut self, db: usize) -> Self {
        self.db = db;
        self
    }

    /// Create the connection.  It is inert, and queues all submissions, until
    /// [`start`](RedisConnection::start) is called.
    pub fn build(self) -> RedisConnection {
        RedisConnection::new(
            self.host,
            self.port,
            self.path,
            self.username,
            self.password,
            self.db,
        )
    }
}
