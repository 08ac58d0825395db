//! Execution callbacks and the deferred notification records.
//!
//! Callbacks are never invoked while the master lock is held. Matching
//! pushes a record per would-be invocation; the records are drained by the
//! submitting thread after the dispatcher returns control.

use std::fmt;
use std::sync::Arc;

use crate::types::{OrderId, Size};

/// Message kind delivered to an execution callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallbackMsg {
    Cancel,
    Fill,
    /// A stop-limit triggered; the ids are (stop id, new limit id).
    StopToLimit,
    /// A stop triggered; the ids are (stop id, new market id).
    StopToMarket,
    TriggerOco,
    TriggerOto,
    TriggerBracketOpen,
    TriggerBracketOpenTarget,
    TriggerBracketOpenLoss,
    TriggerBracketClose,
    TriggerBracketAdjTarget,
    TriggerBracketAdjLoss,
    TriggerTrailingStopOpen,
    TriggerTrailingStopOpenLoss,
    TriggerTrailingStopAdjLoss,
    TriggerTrailingStopClose,
    /// An active trailing stop moved with `last`.
    AdjustTrailingStop,
    /// A fill-or-kill order could not fill and was discarded.
    Kill,
}

impl fmt::Display for CallbackMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallbackMsg::Cancel => "cancel",
            CallbackMsg::Fill => "fill",
            CallbackMsg::StopToLimit => "stop-to-limit",
            CallbackMsg::StopToMarket => "stop-to-market",
            CallbackMsg::TriggerOco => "trigger-OCO",
            CallbackMsg::TriggerOto => "trigger-OTO",
            CallbackMsg::TriggerBracketOpen => "trigger-BRACKET-open",
            CallbackMsg::TriggerBracketOpenTarget => "trigger-BRACKET-open-target",
            CallbackMsg::TriggerBracketOpenLoss => "trigger-BRACKET-open-loss",
            CallbackMsg::TriggerBracketClose => "trigger-BRACKET-close",
            CallbackMsg::TriggerBracketAdjTarget => "trigger-BRACKET-adj-target",
            CallbackMsg::TriggerBracketAdjLoss => "trigger-BRACKET-adj-loss",
            CallbackMsg::TriggerTrailingStopOpen => "trigger-TRAILING-STOP-open",
            CallbackMsg::TriggerTrailingStopOpenLoss => "trigger-TRAILING-STOP-open-loss",
            CallbackMsg::TriggerTrailingStopAdjLoss => "trigger-TRAILING-STOP-adj-loss",
            CallbackMsg::TriggerTrailingStopClose => "trigger-TRAILING-STOP-close",
            CallbackMsg::AdjustTrailingStop => "adjust-trailing-stop",
            CallbackMsg::Kill => "kill",
        };
        write!(f, "{s}")
    }
}

/// Execution callback attached to an order.
///
/// Arguments: `(msg, id_old, id_new, price, size)`. Price and size are zero
/// when not applicable. `id_old` and `id_new` differ when the book rewrites
/// an order's identity (stop trigger, bracket activation, OCO rewrite);
/// consumers must key on the latest id reported.
pub type OrderExecCb = Arc<dyn Fn(CallbackMsg, OrderId, OrderId, f64, Size) + Send + Sync>;

/// A pending notification, queued during matching and drained later.
#[derive(Clone)]
pub(crate) struct DeferredCallback {
    pub msg: CallbackMsg,
    pub cb: OrderExecCb,
    pub id_old: OrderId,
    pub id_new: OrderId,
    pub price: f64,
    pub size: Size,
}

impl fmt::Debug for DeferredCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCallback")
            .field("msg", &self.msg)
            .field("id_old", &self.id_old)
            .field("id_new", &self.id_new)
            .field("price", &self.price)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
