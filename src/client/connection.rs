/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! The pipelined connection itself.
//!
//! Three tasks cooperate around one socket: a connector that establishes the transport
//! once, a writer that drains the submission queue onto the socket, and a reader that
//! consumes replies and routes each one according to the bookkeeping the writer left
//! behind.  Because the writer appends a bookkeeping entry in the same order it writes
//! queries, and the reader consumes entries strictly in order, every reply reaches the
//! caller that is owed it without any per-query tagging on the wire.
//!
//! All shared state lives in one `Queues` value behind a mutex that is only ever held for
//! straight-line bookkeeping, never across an await point; socket IO happens on transport
//! halves each loop takes exclusive ownership of.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_channel::oneshot;

use crate::error::{ConnectionReason, Error};
use crate::protocol::resp::RespValue;

use super::connect::{connect_tcp, connect_unix, ReadTransport, WriteTransport};
use super::flag::Flag;
use super::queue::{
    record_replies, BulkReplySender, PendingReplies, ReplyRoute, ReplySender, WriteItem,
};

/// How many arguments of a query are logged before the remainder is elided.
const LOGGED_QUERY_ARGS: usize = 7;

/// Render a query for the logs, bounded to the first few arguments.
fn describe_query(query: &RespValue) -> String {
    use std::fmt::Write;

    match query {
        RespValue::Array(args) => {
            let mut out = String::new();
            for (i, arg) in args.iter().enumerate() {
                if i == LOGGED_QUERY_ARGS {
                    out.push_str(" ...");
                    break;
                }
                match arg {
                    RespValue::BulkString(bytes) => {
                        let _ = write!(out, " '{}'", String::from_utf8_lossy(bytes));
                    }
                    other => {
                        let _ = write!(out, " {:?}", other);
                    }
                }
            }
            out
        }
        other => format!(" {:?}", other),
    }
}

/// Everything the submission API, the writer and the reader share.
#[derive(Default)]
struct Queues {
    /// Submitted items the writer has not yet sent
    writes: VecDeque<WriteItem>,
    /// One entry per run of replies the server still owes, in wire order
    pending_replies: VecDeque<PendingReplies>,
    /// Completion handles for `Deliver` replies, in wire order
    single_senders: VecDeque<ReplySender>,
    /// Completion handles for `DeliverBulk` runs, in wire order
    bulk_senders: VecDeque<BulkReplySender>,
    /// Transport halves parked here by the connector until each loop claims its own
    read_half: Option<ReadTransport>,
    write_half: Option<WriteTransport>,
}

/// A single logical connection to a Redis server.
///
/// This is a cheap, cloneable handle; all clones refer to the same underlying connection.
/// It is created inert by a [`ConnectionBuilder`](super::builder::ConnectionBuilder) and
/// does nothing until [`start`](RedisConnection::start) is called.  All submission
/// methods take `&self` and may be called from any thread or task.
#[derive(Clone)]
pub struct RedisConnection {
    inner: Arc<ConnectionInner>,
}

impl RedisConnection {
    pub(crate) fn new(
        host: String,
        port: u16,
        path: Option<PathBuf>,
        username: Option<String>,
        password: Option<String>,
        db: usize,
    ) -> Self {
        RedisConnection {
            inner: Arc::new(ConnectionInner {
                host,
                port,
                path,
                username,
                password,
                db,
                queues: Mutex::new(Queues::default()),
                queued_writes: Flag::new(),
                queued_reads: Flag::new(),
                started: AtomicBool::new(false),
                connecting: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the IO loops and kick off a connect attempt.
    ///
    /// The loops are spawned exactly once, however often this is called.  A connect
    /// attempt is started unless one is already running or has already succeeded, so
    /// calling `start` again after a failed attempt performs one fresh attempt.
    /// Submissions made before the transport is ready are buffered and drained in order
    /// once it is.
    ///
    /// Each spawned task holds a strong reference to the connection's state, so the
    /// connection stays alive while any loop is running even if every handle is dropped.
    pub fn start(&self) {
        // Claim the connect attempt before the loops are spawned: the writer takes
        // `connected == false && connecting == false` to mean a resolved, failed
        // attempt, so it must never observe that state ahead of the first attempt.
        let connect = !self.inner.connecting.swap(true, Ordering::AcqRel);

        if !self.inner.started.swap(true, Ordering::AcqRel) {
            let connection = self.inner.clone();
            tokio::spawn(async move { connection.read_loop().await });

            let connection = self.inner.clone();
            tokio::spawn(async move { connection.write_loop().await });
        }

        if connect {
            let connection = self.inner.clone();
            tokio::spawn(async move { connection.connect().await });
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Shut the connection down.
    ///
    /// Queued-but-unsent awaiting submissions and every pending completion handle fail
    /// with [`ConnectionReason::Closing`]; both loops exit, which closes the socket.
    /// Later submissions fail immediately without being enqueued.
    pub fn stop(&self) {
        self.inner.stop()
    }

    /// Submit a query whose reply will be read and discarded.
    ///
    /// Returns as soon as the query is queued.  There is no way to observe the reply, or
    /// any failure, other than through the logs.
    pub fn send_and_forget(&self, query: RespValue) {
        self.inner.send_and_forget(query)
    }

    /// Submit a batch of queries whose replies will be read and discarded.
    ///
    /// The batch is written contiguously: no other submission's queries are interleaved
    /// with it on the wire.
    pub fn send_and_forget_all(&self, queries: Vec<RespValue>) {
        self.inner.send_and_forget_all(queries)
    }

    /// Submit a query and await its reply.
    ///
    /// A server-side error reply resolves *successfully* to [`RespValue::Error`]; the
    /// returned `Result` only fails for connection, IO and protocol problems.
    pub async fn send(&self, query: RespValue) -> Result<RespValue, Error> {
        self.inner.send(query).await
    }

    /// Submit a batch of queries and await all their replies, in input order.
    ///
    /// The batch is written contiguously.  If any query fails to send, or any reply fails
    /// to arrive, the whole batch fails with that error and no replies are delivered.
    pub async fn send_all(&self, queries: Vec<RespValue>) -> Result<Vec<RespValue>, Error> {
        self.inner.send_all(queries).await
    }
}

struct ConnectionInner {
    host: String,
    port: u16,
    /// When set, connect over a UNIX-domain socket and ignore `host`/`port`
    path: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    db: usize,

    queues: Mutex<Queues>,
    queued_writes: Flag,
    queued_reads: Flag,

    started: AtomicBool,
    connecting: AtomicBool,
    connected: AtomicBool,
    stopping: AtomicBool,
}

impl ConnectionInner {
    fn queues(&self) -> MutexGuard<Queues> {
        self.queues.lock().expect("Lock is tainted")
    }

    fn stop(&self) {
        if !self.stopping.swap(true, Ordering::AcqRel) {
            log::info!("Closing connection to Redis server");
            self.queued_writes.set();
            self.queued_reads.set();
        }
    }

    fn send_and_forget(&self, query: RespValue) {
        log::debug!("Firing and forgetting query:{}", describe_query(&query));

        if self.stopping.load(Ordering::Acquire) {
            log::error!(
                "Connection is closing, dropping query:{}",
                describe_query(&query)
            );
            return;
        }

        self.queues().writes.push_back(WriteItem::FireSingle(query));
        self.queued_writes.set();
    }

    fn send_and_forget_all(&self, queries: Vec<RespValue>) {
        for query in &queries {
            log::debug!("Firing and forgetting query:{}", describe_query(query));
        }

        if queries.is_empty() {
            return;
        }
        if self.stopping.load(Ordering::Acquire) {
            log::error!("Connection is closing, dropping {} queries", queries.len());
            return;
        }

        self.queues().writes.push_back(WriteItem::FireBulk(queries));
        self.queued_writes.set();
    }

    async fn send(&self, query: RespValue) -> Result<RespValue, Error> {
        log::debug!("Executing query:{}", describe_query(&query));

        if self.stopping.load(Ordering::Acquire) {
            return Err(Error::Connection(ConnectionReason::Closing));
        }

        let (sender, receiver) = oneshot::channel();
        self.queues()
            .writes
            .push_back(WriteItem::AwaitSingle(query, sender));
        self.queued_writes.set();

        receiver.await?
    }

    async fn send_all(&self, queries: Vec<RespValue>) -> Result<Vec<RespValue>, Error> {
        for query in &queries {
            log::debug!("Executing query:{}", describe_query(query));
        }

        if self.stopping.load(Ordering::Acquire) {
            return Err(Error::Connection(ConnectionReason::Closing));
        }
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let (sender, receiver) = oneshot::channel();
        self.queues()
            .writes
            .push_back(WriteItem::AwaitBulk(queries, sender));
        self.queued_writes.set();

        receiver.await?
    }

    /// The one-shot connect attempt.
    async fn connect(self: Arc<Self>) {
        {
            // Restore `connecting` to mirror `connected` on every exit path out of this
            // scope, including this task being cancelled mid-connect.
            struct Restore<'a>(&'a ConnectionInner);
            impl Drop for Restore<'_> {
                fn drop(&mut self) {
                    self.0
                        .connecting
                        .store(self.0.connected.load(Ordering::Acquire), Ordering::Release);
                }
            }
            let _restore = Restore(&self);

            log::info!("Trying to connect to Redis server");

            let result = match &self.path {
                Some(path) => connect_unix(path).await,
                None => connect_tcp(&self.host, self.port).await,
            };

            match result {
                Ok((read_half, write_half)) => {
                    {
                        let mut queues = self.queues();

                        // Handshake queries go ahead of anything already buffered.  Both
                        // are fire-and-forget: a rejected AUTH/SELECT shows up in the
                        // logs and in every subsequent server reply.
                        if self.db != 0 {
                            queues.writes.push_front(WriteItem::FireSingle(resp_array![
                                "SELECT",
                                self.db.to_string()
                            ]));
                        }
                        if let Some(password) = &self.password {
                            let auth = match &self.username {
                                Some(username) => resp_array!["AUTH", username, password],
                                None => resp_array!["AUTH", password],
                            };
                            queues.writes.push_front(WriteItem::FireSingle(auth));
                        }

                        queues.read_half = Some(read_half);
                        queues.write_half = Some(write_half);
                    }
                    self.connected.store(true, Ordering::Release);

                    log::info!("Connected to Redis server");
                }
                Err(e) => match &self.path {
                    Some(path) => log::error!("Cannot connect to {}: {}", path.display(), e),
                    None => log::error!("Cannot connect to {}:{}: {}", self.host, self.port, e),
                },
            }
        }

        // Wake the writer only after `connecting` has settled, so it either drains the
        // buffered submissions or fails them, rather than going back to buffering.
        self.queued_writes.set();
    }

    async fn write_loop(self: Arc<Self>) {
        let mut transport: Option<WriteTransport> = None;

        loop {
            self.queued_writes.wait().await;
            self.queued_writes.clear();

            if self.stopping.load(Ordering::Acquire) {
                self.fail_queued_writes();
                return;
            }

            if transport.is_none() {
                if self.connected.load(Ordering::Acquire) {
                    transport = self.queues().write_half.take();
                } else if self.connecting.load(Ordering::Acquire) {
                    // The connect attempt has not resolved yet; keep submissions
                    // buffered.  The connector raises the flag again when it finishes.
                    continue;
                }
            }

            while let Some(item) = self.next_write() {
                // stop() can land while the drain is in progress; anything still
                // queued is failed rather than sent
                if self.stopping.load(Ordering::Acquire) {
                    fail_item(item, Error::Connection(ConnectionReason::Closing));
                    continue;
                }
                match transport.as_mut() {
                    Some(transport) => self.write_item(transport, item).await,
                    // The connect attempt failed; nothing was, or will be, sent
                    None => fail_item(item, Error::Connection(ConnectionReason::NotConnected)),
                }
            }
        }
    }

    fn next_write(&self) -> Option<WriteItem> {
        self.queues().writes.pop_front()
    }

    /// Send one submission and leave the matching bookkeeping behind.
    ///
    /// Bookkeeping is only recorded for queries that actually reached the socket, so the
    /// reader never attempts to read a reply the server was never asked for.
    async fn write_item(&self, transport: &mut WriteTransport, item: WriteItem) {
        match item {
            WriteItem::FireSingle(query) => {
                let what = describe_query(&query);
                match transport.write_one(query).await {
                    Ok(()) => {
                        let mut queues = self.queues();
                        record_replies(&mut queues.pending_replies, ReplyRoute::Discard, 1);
                        drop(queues);
                        self.queued_reads.set();
                    }
                    Err(e) => log::error!(
                        "Error sending query{} which has been fired and forgotten: {}",
                        what,
                        e
                    ),
                }
            }
            WriteItem::FireBulk(queries) => {
                let (sent, _) = self.write_all(transport, queries).await;
                if sent > 0 {
                    let mut queues = self.queues();
                    record_replies(&mut queues.pending_replies, ReplyRoute::Discard, sent);
                    drop(queues);
                    self.queued_reads.set();
                }
            }
            WriteItem::AwaitSingle(query, sender) => {
                let what = describe_query(&query);
                match transport.write_one(query).await {
                    Ok(()) => {
                        let mut queues = self.queues();
                        queues.single_senders.push_back(sender);
                        record_replies(&mut queues.pending_replies, ReplyRoute::Deliver, 1);
                        drop(queues);
                        self.queued_reads.set();
                    }
                    Err(e) => {
                        log::error!("Error sending query{}: {}", what, e);
                        let _ = sender.send(Err(e));
                    }
                }
            }
            WriteItem::AwaitBulk(queries, sender) => {
                let total = queries.len();
                let (sent, failure) = self.write_all(transport, queries).await;
                match failure {
                    None => {
                        let mut queues = self.queues();
                        queues.bulk_senders.push_back(sender);
                        record_replies(
                            &mut queues.pending_replies,
                            ReplyRoute::DeliverBulk,
                            total,
                        );
                        drop(queues);
                        self.queued_reads.set();
                    }
                    Some(e) => {
                        // The sent prefix is on the wire.  Its replies are read and
                        // dropped so that every later entry stays correlated.
                        if sent > 0 {
                            let mut queues = self.queues();
                            record_replies(&mut queues.pending_replies, ReplyRoute::Discard, sent);
                            drop(queues);
                            self.queued_reads.set();
                        }
                        let _ = sender.send(Err(e));
                    }
                }
            }
        }
    }

    /// Send every query of a batch in order.  Returns how many were sent, and the error
    /// that cut the run short, if any.
    async fn write_all(
        &self,
        transport: &mut WriteTransport,
        queries: Vec<RespValue>,
    ) -> (usize, Option<Error>) {
        let mut sent = 0;
        for query in queries {
            let what = describe_query(&query);
            match transport.write_one(query).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    log::error!("Error sending query{}: {}", what, e);
                    return (sent, Some(e));
                }
            }
        }
        (sent, None)
    }

    fn fail_queued_writes(&self) {
        let unsent: Vec<_> = {
            let mut queues = self.queues();
            queues.write_half = None;
            queues.writes.drain(..).collect()
        };
        for item in unsent {
            fail_item(item, Error::Connection(ConnectionReason::Closing));
        }
    }

    async fn read_loop(self: Arc<Self>) {
        let mut transport: Option<ReadTransport> = None;

        loop {
            self.queued_reads.wait().await;
            self.queued_reads.clear();

            if self.stopping.load(Ordering::Acquire) {
                self.fail_pending_replies();
                return;
            }

            if transport.is_none() {
                transport = self.queues().read_half.take();
            }
            let Some(transport) = transport.as_mut() else {
                continue;
            };

            while let Some(entry) = self.next_pending() {
                match entry.route {
                    ReplyRoute::Discard => {
                        for _ in 0..entry.amount {
                            // A failed read did not un-ask the remaining queries of this
                            // run, so keep consuming replies for the rest of it
                            if let Err(e) = transport.read_one().await {
                                log::error!(
                                    "Error receiving the reply to a query which was fired \
                                     and forgotten: {}",
                                    e
                                );
                            }
                        }
                    }
                    ReplyRoute::Deliver => {
                        for _ in 0..entry.amount {
                            let sender = self.queues().single_senders.pop_front();
                            let reply = transport.read_one().await;
                            match sender {
                                // The awaiting caller may have gone away; the reply has
                                // already been consumed from the wire, so correlation
                                // for everything behind it holds
                                Some(sender) => {
                                    let _ = sender.send(reply);
                                }
                                None => log::error!("No caller is waiting for this reply"),
                            }
                        }
                    }
                    ReplyRoute::DeliverBulk => {
                        let sender = self.queues().bulk_senders.pop_front();
                        let mut replies = Vec::with_capacity(entry.amount);
                        let mut failure = None;
                        for _ in 0..entry.amount {
                            // After a failure the rest of the run is still drained from
                            // the wire to keep later entries correlated
                            match transport.read_one().await {
                                Ok(reply) => {
                                    if failure.is_none() {
                                        replies.push(reply);
                                    }
                                }
                                Err(e) => {
                                    if failure.is_none() {
                                        failure = Some(e);
                                    }
                                }
                            }
                        }
                        let result = match failure {
                            None => Ok(replies),
                            Some(e) => Err(e),
                        };
                        match sender {
                            Some(sender) => {
                                let _ = sender.send(result);
                            }
                            None => log::error!("No caller is waiting for this batch of replies"),
                        }
                    }
                }
            }
        }
    }

    fn next_pending(&self) -> Option<PendingReplies> {
        self.queues().pending_replies.pop_front()
    }

    fn fail_pending_replies(&self) {
        let (single, bulk) = {
            let mut queues = self.queues();
            queues.pending_replies.clear();
            queues.read_half = None;
            (
                queues.single_senders.drain(..).collect::<Vec<_>>(),
                queues.bulk_senders.drain(..).collect::<Vec<_>>(),
            )
        };
        for sender in single {
            let _ = sender.send(Err(Error::Connection(ConnectionReason::Closing)));
        }
        for sender in bulk {
            let _ = sender.send(Err(Error::Connection(ConnectionReason::Closing)));
        }
    }
}

/// Fail one unsendable submission: awaiting callers get the error, fire-and-forget
/// submissions only leave a log line.
fn fail_item(item: WriteItem, error: Error) {
    match item {
        WriteItem::FireSingle(query) => {
            log::error!("Dropping query{}: {}", describe_query(&query), error)
        }
        WriteItem::FireBulk(queries) => {
            log::error!("Dropping {} queries: {}", queries.len(), error)
        }
        WriteItem::AwaitSingle(_, sender) => {
            let _ = sender.send(Err(error));
        }
        WriteItem::AwaitBulk(_, sender) => {
            let _ = sender.send(Err(error));
        }
    }
}
