//! A single price level: up to one limit chain, one stop chain, and one
//! AON chain per side.
//!
//! Chains are FIFO and lazily allocated; a chain that empties is dropped so
//! an idle level is four `None`s.

use std::collections::VecDeque;

use crate::bundle::{AonBundle, LimitBundle, StopBundle};
use crate::side::Side;
use crate::types::{OrderId, Size};

#[derive(Default, Debug)]
pub(crate) struct Level {
    limit: Option<VecDeque<LimitBundle>>,
    stop: Option<VecDeque<StopBundle>>,
    aon_buy: Option<VecDeque<AonBundle>>,
    aon_sell: Option<VecDeque<AonBundle>>,
}

fn remove_by_id<T>(chain: &mut Option<VecDeque<T>>, id: OrderId, get_id: impl Fn(&T) -> OrderId) -> Option<T> {
    let q = chain.as_mut()?;
    let pos = q.iter().position(|b| get_id(b) == id)?;
    let b = q.remove(pos);
    if q.is_empty() {
        *chain = None;
    }
    b
}

impl Level {
    // --- limit chain ---

    pub fn limit_push(&mut self, b: LimitBundle) {
        self.limit.get_or_insert_with(VecDeque::new).push_back(b);
    }

    pub fn limit_is_empty(&self) -> bool {
        self.limit.is_none()
    }

    pub fn limit_front(&self) -> Option<&LimitBundle> {
        self.limit.as_ref().and_then(|q| q.front())
    }

    pub fn limit_front_mut(&mut self) -> Option<&mut LimitBundle> {
        self.limit.as_mut().and_then(|q| q.front_mut())
    }

    pub fn limit_pop_front(&mut self) -> Option<LimitBundle> {
        let q = self.limit.as_mut()?;
        let b = q.pop_front();
        if q.is_empty() {
            self.limit = None;
        }
        b
    }

    pub fn limit_remove(&mut self, id: OrderId) -> Option<LimitBundle> {
        remove_by_id(&mut self.limit, id, |b| b.id)
    }

    pub fn limit_get_mut(&mut self, id: OrderId) -> Option<&mut LimitBundle> {
        self.limit.as_mut()?.iter_mut().find(|b| b.id == id)
    }

    pub fn limit_get(&self, id: OrderId) -> Option<&LimitBundle> {
        self.limit.as_ref()?.iter().find(|b| b.id == id)
    }

    /// Total size of limit entries satisfying `pred`.
    pub fn limit_size_if(&self, pred: impl Fn(&LimitBundle) -> bool) -> Size {
        self.limit
            .as_ref()
            .map(|q| q.iter().filter(|b| pred(b)).map(|b| b.sz).sum())
            .unwrap_or(0)
    }

    /// True if at least one limit entry satisfies `pred`.
    pub fn limit_any(&self, pred: impl Fn(&LimitBundle) -> bool) -> bool {
        self.limit
            .as_ref()
            .map(|q| q.iter().any(|b| pred(b)))
            .unwrap_or(false)
    }

    pub fn limit_iter(&self) -> impl Iterator<Item = &LimitBundle> {
        self.limit.iter().flatten()
    }

    // --- stop chain ---

    pub fn stop_push(&mut self, b: StopBundle) {
        self.stop.get_or_insert_with(VecDeque::new).push_back(b);
    }

    pub fn stop_is_empty(&self) -> bool {
        self.stop.is_none()
    }

    pub fn stop_remove(&mut self, id: OrderId) -> Option<StopBundle> {
        remove_by_id(&mut self.stop, id, |b| b.id)
    }

    pub fn stop_get(&self, id: OrderId) -> Option<&StopBundle> {
        self.stop.as_ref()?.iter().find(|b| b.id == id)
    }

    pub fn stop_get_mut(&mut self, id: OrderId) -> Option<&mut StopBundle> {
        self.stop.as_mut()?.iter_mut().find(|b| b.id == id)
    }

    /// Take the whole stop chain out (used when a trade sweeps the level).
    pub fn stop_take_chain(&mut self) -> Option<VecDeque<StopBundle>> {
        self.stop.take()
    }

    /// True if any stop entry rests here for the given side.
    pub fn stop_has_side(&self, is_buy: bool) -> bool {
        self.stop
            .as_ref()
            .map(|q| q.iter().any(|b| b.is_buy == is_buy))
            .unwrap_or(false)
    }

    pub fn stop_iter(&self) -> impl Iterator<Item = &StopBundle> {
        self.stop.iter().flatten()
    }

    // --- AON chains ---

    fn aon_chain(&self, side: Side) -> &Option<VecDeque<AonBundle>> {
        match side {
            Side::Buy => &self.aon_buy,
            Side::Sell => &self.aon_sell,
        }
    }

    fn aon_chain_mut(&mut self, side: Side) -> &mut Option<VecDeque<AonBundle>> {
        match side {
            Side::Buy => &mut self.aon_buy,
            Side::Sell => &mut self.aon_sell,
        }
    }

    pub fn aon_push(&mut self, side: Side, b: AonBundle) {
        self.aon_chain_mut(side)
            .get_or_insert_with(VecDeque::new)
            .push_back(b);
    }

    pub fn aon_is_empty(&self, side: Side) -> bool {
        self.aon_chain(side).is_none()
    }

    pub fn aon_remove(&mut self, side: Side, id: OrderId) -> Option<AonBundle> {
        remove_by_id(self.aon_chain_mut(side), id, |b| b.id)
    }

    pub fn aon_get(&self, side: Side, id: OrderId) -> Option<&AonBundle> {
        self.aon_chain(side).as_ref()?.iter().find(|b| b.id == id)
    }

    pub fn aon_get_mut(&mut self, side: Side, id: OrderId) -> Option<&mut AonBundle> {
        self.aon_chain_mut(side)
            .as_mut()?
            .iter_mut()
            .find(|b| b.id == id)
    }

    /// Ids currently on the AON chain, in FIFO order.
    pub fn aon_ids(&self, side: Side) -> Vec<OrderId> {
        self.aon_chain(side)
            .as_ref()
            .map(|q| q.iter().map(|b| b.id).collect())
            .unwrap_or_default()
    }

    pub fn aon_size(&self, side: Side) -> Size {
        self.aon_chain(side)
            .as_ref()
            .map(|q| q.iter().map(|b| b.sz).sum())
            .unwrap_or(0)
    }

    pub fn aon_iter(&self, side: Side) -> impl Iterator<Item = &AonBundle> {
        self.aon_chain(side).iter().flatten()
    }
}
