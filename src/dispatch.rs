//! The order queue and its single consumer.
//!
//! Producers (any number of threads) enqueue submissions; one dispatcher
//! thread drains them and is the sole mutator of book state. Each external
//! submission carries a bounded(1) reply channel standing in for a promise;
//! internal reinjections carry none. A shared outstanding-order counter
//! lets blocking callers wait for cascades to settle before draining the
//! deferred callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::book::BookCore;
use crate::callback::OrderExecCb;
use crate::error::BookError;
use crate::order::{ConditionTrigger, OrderCondition, OrderParams, OrderType};
use crate::side::Side;
use crate::types::{OrderId, Size};

/// One order as it travels the queue.
pub(crate) struct OrderElem {
    pub otype: OrderType,
    pub side: Side,
    /// Limit price, 0 when absent. Already grid-rounded.
    pub limit: f64,
    /// Stop price, 0 when absent. Already grid-rounded.
    pub stop: f64,
    pub sz: Size,
    pub cb: Option<OrderExecCb>,
    /// `OrderId::NONE` means "assign at dispatch"; reinjections keep the
    /// id they were assigned when queued.
    pub id: OrderId,
    pub condition: OrderCondition,
    pub trigger: ConditionTrigger,
    pub params1: Option<OrderParams>,
    pub params2: Option<OrderParams>,
    /// Entry order an active bracket/trailing leg descends from.
    pub parent: OrderId,
}

pub(crate) enum Request {
    Order(Box<OrderElem>),
    /// Cancel by id; resolves to the id on success, `NONE` on failure.
    Pull { id: OrderId },
    /// Sentinel posted by the destructor.
    Shutdown,
}

pub(crate) struct QueueElem {
    pub req: Request,
    pub reply: Option<crossbeam_channel::Sender<Result<OrderId, BookError>>>,
}

/// State shared between the public handle, producers, and the dispatcher.
pub(crate) struct Shared {
    pub core: Mutex<BookCore>,
    pub tx: crossbeam_channel::Sender<QueueElem>,
    pub outstanding: Arc<AtomicI64>,
    pub busy_with_callbacks: AtomicBool,
}

/// Lock the master mutex, recovering from a poisoned lock: a panic in a
/// previous critical section fails that submission only.
pub(crate) fn lock_core(shared: &Shared) -> MutexGuard<'_, BookCore> {
    shared
        .core
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The dispatcher loop: drain the queue until the shutdown sentinel.
pub(crate) fn run_dispatcher(shared: Arc<Shared>, rx: crossbeam_channel::Receiver<QueueElem>) {
    tracing::debug!("order dispatcher started");
    while let Ok(QueueElem { req, reply }) = rx.recv() {
        let result = match req {
            Request::Shutdown => break,
            Request::Pull { id } => {
                let mut core = lock_core(&shared);
                let ok = core.pull_order(id, true);
                Ok(if ok { id } else { OrderId::NONE })
            }
            Request::Order(mut e) => {
                let mut core = lock_core(&shared);
                if e.id.is_none() {
                    e.id = core.generate_id();
                }
                if e.condition == OrderCondition::None {
                    core.route_basic(&e).map(|_| e.id)
                } else {
                    core.route_advanced(&e)
                }
            }
        };

        shared.outstanding.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(err) = result {
                    tracing::warn!(%err, "internal order failed");
                }
            }
        }
    }
    tracing::debug!("order dispatcher stopped");
}

/// Spin until every queued order (including cascades) has completed.
pub(crate) fn block_on_outstanding(shared: &Shared) {
    while shared.outstanding.load(Ordering::SeqCst) > 0 {
        std::thread::yield_now();
    }
}

/// Drain the deferred-callback buffer outside the master lock.
///
/// The busy flag serializes drains: a nested call (a callback reentering
/// the book) returns immediately and the outer drain picks up whatever the
/// nested submission queued. A panicking callback is logged and swallowed;
/// it must not corrupt book state.
pub(crate) fn drain_callbacks(shared: &Shared) {
    if shared
        .busy_with_callbacks
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }

    loop {
        let batch = {
            let mut core = lock_core(shared);
            std::mem::take(&mut core.deferred)
        };
        if batch.is_empty() {
            break;
        }
        for e in batch {
            let cb = e.cb;
            if catch_unwind(AssertUnwindSafe(|| {
                cb(e.msg, e.id_old, e.id_new, e.price, e.size)
            }))
            .is_err()
            {
                tracing::error!(msg = %e.msg, id = %e.id_new, "order callback panicked; ignored");
            }
        }
    }

    shared.busy_with_callbacks.store(false, Ordering::SeqCst);
}
