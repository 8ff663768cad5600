/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Bookkeeping shared by the writer and reader loops: what has been submitted but not yet
//! written, and what has been written but not yet answered.

use std::collections::VecDeque;

use futures_channel::oneshot;

use crate::error::Error;
use crate::protocol::resp::RespValue;

/// Delivers one reply (or the failure that took its place) to an awaiting caller.
pub(crate) type ReplySender = oneshot::Sender<Result<RespValue, Error>>;

/// Delivers the replies to a whole bulk submission, atomically.
pub(crate) type BulkReplySender = oneshot::Sender<Result<Vec<RespValue>, Error>>;

/// One entry in the outbound work queue.
pub(crate) enum WriteItem {
    FireSingle(RespValue),
    FireBulk(Vec<RespValue>),
    AwaitSingle(RespValue, ReplySender),
    AwaitBulk(Vec<RespValue>, BulkReplySender),
}

/// What the reader loop should do with a forthcoming reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyRoute {
    /// Read the reply and drop it
    Discard,
    /// Read the reply and send it to the next queued `ReplySender`
    Deliver,
    /// Read a whole run of replies and send them, as one list, to the next queued
    /// `BulkReplySender`
    DeliverBulk,
}

/// A run of `amount` consecutive replies sharing one route.  The order of these entries
/// matches the order queries were written to the socket, which is what lets the reader
/// correlate replies without any per-query tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingReplies {
    pub(crate) amount: usize,
    pub(crate) route: ReplyRoute,
}

/// Record that `amount` more replies are expected with the given route.
///
/// `Discard` and `Deliver` runs extend a matching tail entry, keeping the queue short
/// under burst load; the reader treats a run of N identically to N runs of one.
/// A `DeliverBulk` entry is bound to exactly one `BulkReplySender`, so it always keeps
/// its own entry and its boundary is never merged away.
pub(crate) fn record_replies(
    queue: &mut VecDeque<PendingReplies>,
    route: ReplyRoute,
    amount: usize,
) {
    if amount == 0 {
        return;
    }
    if matches!(route, ReplyRoute::Discard | ReplyRoute::Deliver) {
        if let Some(tail) = queue.back_mut() {
            if tail.route == route {
                tail.amount += amount;
                return;
            }
        }
    }
    queue.push_back(PendingReplies { amount, route });
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::{record_replies, PendingReplies, ReplyRoute};

    fn routes(queue: &VecDeque<PendingReplies>) -> Vec<(usize, ReplyRoute)> {
        queue.iter().map(|e| (e.amount, e.route)).collect()
    }

    #[test]
    fn discard_runs_coalesce() {
        let mut queue = VecDeque::new();
        record_replies(&mut queue, ReplyRoute::Discard, 1);
        record_replies(&mut queue, ReplyRoute::Discard, 3);
        assert_eq!(routes(&queue), vec![(4, ReplyRoute::Discard)]);
    }

    #[test]
    fn deliver_runs_coalesce() {
        let mut queue = VecDeque::new();
        record_replies(&mut queue, ReplyRoute::Deliver, 1);
        record_replies(&mut queue, ReplyRoute::Deliver, 1);
        assert_eq!(routes(&queue), vec![(2, ReplyRoute::Deliver)]);
    }

    #[test]
    fn bulk_entries_keep_their_boundaries() {
        let mut queue = VecDeque::new();
        record_replies(&mut queue, ReplyRoute::DeliverBulk, 2);
        record_replies(&mut queue, ReplyRoute::DeliverBulk, 2);
        assert_eq!(
            routes(&queue),
            vec![(2, ReplyRoute::DeliverBulk), (2, ReplyRoute::DeliverBulk)]
        );
    }

    #[test]
    fn alternating_routes_start_new_runs() {
        let mut queue = VecDeque::new();
        record_replies(&mut queue, ReplyRoute::Discard, 1);
        record_replies(&mut queue, ReplyRoute::Deliver, 1);
        record_replies(&mut queue, ReplyRoute::Discard, 2);
        assert_eq!(
            routes(&queue),
            vec![
                (1, ReplyRoute::Discard),
                (1, ReplyRoute::Deliver),
                (2, ReplyRoute::Discard),
            ]
        );
    }

    #[test]
    fn no_adjacent_entries_share_a_mergeable_route() {
        // The coalescing law from the writer's point of view: whatever sequence of
        // recordings happens, Discard never sits next to Discard and Deliver never sits
        // next to Deliver.
        let mut queue = VecDeque::new();
        let recordings = [
            (ReplyRoute::Discard, 1),
            (ReplyRoute::Discard, 5),
            (ReplyRoute::Deliver, 1),
            (ReplyRoute::Deliver, 2),
            (ReplyRoute::DeliverBulk, 3),
            (ReplyRoute::Deliver, 1),
            (ReplyRoute::Discard, 1),
        ];
        for (route, amount) in recordings {
            record_replies(&mut queue, route, amount);
        }
        for pair in routes(&queue).windows(2) {
            if pair[0].1 == pair[1].1 {
                assert_eq!(pair[0].1, ReplyRoute::DeliverBulk);
            }
        }
        let total: usize = queue.iter().map(|e| e.amount).sum();
        assert_eq!(total, 14);
    }

    #[test]
    fn zero_amount_records_nothing() {
        let mut queue = VecDeque::new();
        record_replies(&mut queue, ReplyRoute::Discard, 0);
        assert!(queue.is_empty());
    }
}
