// ===============================
// src/chain.rs
// ===============================
//
// Order-chain coordinator. A solved cycle becomes a sequence of dependent
// limit orders; each step advances through an explicit state machine driven
// only by asynchronous venue acknowledgments:
//
//   Pending -> Submitted -> AckReq -> AckOrder -> Filled
//                                  \-> Canceled | Failed
//
// Step i+1 is submitted only once step i is Filled. If a step fails or is
// canceled while later work is outstanding, every still-live order is
// canceled (by venue id when bound, else by client id + day) and the chain
// ends Failed. Realized intermediate balances are deliberately left alone.
//
// The chain never touches the socket: every method returns the frames to
// send, the caller owns transmission. At most one chain is active at a time.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::bitfinex;
use crate::domain::{
    Instruction, NotifKind, NotifStatus, Notification, Order, OrderStatus, Solution,
};

pub const ORDER_TYPE: &str = "EXCHANGE LIMIT";

pub const DEFAULT_STEP_DEADLINE: Duration = Duration::from_secs(10);
pub const DEFAULT_CHAIN_DEADLINE: Duration = Duration::from_secs(60);

const CID_BITS: u32 = 45;

/// Client ids are regenerated on every (re)transmission; 45 random bits keep
/// collisions within a UTC day out of reach.
pub fn gen_cid() -> i64 {
    rand::thread_rng().gen_range(0..(1i64 << CID_BITS))
}

pub fn cid_date_today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Submitted,
    AckReq,
    AckOrder,
    Filled,
    Canceled,
    Failed,
}

impl StepState {
    /// A live step has an order the venue may still execute.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            StepState::Submitted | StepState::AckReq | StepState::AckOrder
        )
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub index: usize,
    pub symbol: String,
    /// Signed target amount (buy > 0, sell < 0).
    pub amount: Decimal,
    pub price: Decimal,
    pub cid: i64,
    pub cid_date: String,
    pub order_id: Option<i64>,
    pub state: StepState,
    pub sent_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Running,
    Compensating,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct OrderChain {
    steps: Vec<Step>,
    state: ChainState,
    gid: i64,
    started_at: Option<Instant>,
    step_deadline: Duration,
    chain_deadline: Duration,
}

impl Default for OrderChain {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_DEADLINE, DEFAULT_CHAIN_DEADLINE)
    }
}

impl OrderChain {
    pub fn new(step_deadline: Duration, chain_deadline: Duration) -> Self {
        Self {
            steps: Vec::new(),
            state: ChainState::Idle,
            gid: 0,
            started_at: None,
            step_deadline,
            chain_deadline,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ChainState::Running | ChainState::Compensating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ChainState::Done | ChainState::Failed)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Populate the steps from a solution and submit step 0.
    pub fn start(&mut self, solution: &Solution, now: Instant) -> Vec<String> {
        debug_assert!(!self.is_active());
        self.steps.clear();
        for inst in solution.transitions() {
            if let Instruction::Transition {
                symbol,
                action_amount,
                action_price,
            } = inst
            {
                self.steps.push(Step {
                    index: self.steps.len(),
                    symbol: symbol.clone(),
                    amount: *action_amount,
                    price: *action_price,
                    cid: 0,
                    cid_date: String::new(),
                    order_id: None,
                    state: StepState::Pending,
                    sent_at: None,
                });
            }
        }
        if self.steps.is_empty() {
            self.state = ChainState::Done;
            return Vec::new();
        }
        self.gid = Utc::now().timestamp_millis();
        self.state = ChainState::Running;
        self.started_at = Some(now);
        info!(steps = self.steps.len(), gid = self.gid, "chain start");
        vec![self.submit(0, now)]
    }

    fn submit(&mut self, i: usize, now: Instant) -> String {
        let step = &mut self.steps[i];
        step.cid = gen_cid();
        step.cid_date = cid_date_today();
        step.state = StepState::Submitted;
        step.sent_at = Some(now);
        info!(
            step = i,
            symbol = %step.symbol,
            amount = %step.amount,
            price = %step.price,
            cid = step.cid,
            "chain submit"
        );
        bitfinex::new_order(
            self.gid,
            step.cid,
            ORDER_TYPE,
            &step.symbol,
            step.amount,
            step.price,
        )
    }

    fn find_by_cid(&self, cid: i64) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.cid == cid && s.state != StepState::Pending)
    }

    fn find_by_order_id(&self, id: i64) -> Option<usize> {
        self.steps.iter().position(|s| s.order_id == Some(id))
    }

    /// Request-level acknowledgment (`on-req`).
    pub fn on_notification(&mut self, n: &Notification, now: Instant) -> Vec<String> {
        if !self.is_active() {
            return Vec::new();
        }
        match n.kind {
            NotifKind::OnReq => {
                let cid = match n.order.as_ref() {
                    Some(o) => o.cid,
                    None => return Vec::new(),
                };
                let Some(i) = self.find_by_cid(cid) else {
                    return Vec::new();
                };
                if n.status == NotifStatus::Error {
                    warn!(step = i, text = %n.text, "order request rejected");
                    self.steps[i].state = StepState::Failed;
                    return self.fail(now);
                }
                if self.steps[i].state == StepState::Submitted {
                    self.steps[i].state = StepState::AckReq;
                }
                Vec::new()
            }
            NotifKind::OcReq => {
                if n.status == NotifStatus::Error {
                    // cancel rejected; the chain deadline is the backstop
                    warn!(text = %n.text, "cancel request rejected");
                }
                Vec::new()
            }
            NotifKind::Other => Vec::new(),
        }
    }

    /// Order snapshot/update (`on`/`ou`) or close (`oc`).
    pub fn on_order(&mut self, o: &Order, closed: bool, now: Instant) -> Vec<String> {
        if !self.is_active() {
            return Vec::new();
        }
        let Some(i) = self
            .find_by_cid(o.cid)
            .or_else(|| self.find_by_order_id(o.id))
        else {
            return Vec::new();
        };
        if self.steps[i].order_id.is_none() && o.id != 0 {
            self.steps[i].order_id = Some(o.id);
        }

        if closed {
            return match o.status {
                OrderStatus::Executed => {
                    self.steps[i].state = StepState::Filled;
                    self.advance(now)
                }
                OrderStatus::Canceled | OrderStatus::PostOnlyCanceled => {
                    warn!(step = i, "order canceled by venue");
                    self.steps[i].state = StepState::Canceled;
                    if self.state == ChainState::Compensating {
                        self.settle_compensation();
                        Vec::new()
                    } else {
                        self.fail(now)
                    }
                }
                _ => Vec::new(),
            };
        }

        // live order confirmation binds the step to the venue order
        if matches!(
            self.steps[i].state,
            StepState::Submitted | StepState::AckReq
        ) {
            self.steps[i].state = StepState::AckOrder;
        }
        Vec::new()
    }

    /// Trade execution with the order's cumulative filled size.
    pub fn on_trade(&mut self, order_id: i64, cumulative: Decimal, now: Instant) -> Vec<String> {
        if !self.is_active() {
            return Vec::new();
        }
        let Some(i) = self.find_by_order_id(order_id) else {
            return Vec::new();
        };
        if self.steps[i].state.is_live() && cumulative >= self.steps[i].amount.abs() {
            self.steps[i].state = StepState::Filled;
            return self.advance(now);
        }
        Vec::new()
    }

    /// Periodic deadline sweep.
    pub fn on_tick(&mut self, now: Instant) -> Vec<String> {
        if !self.is_active() {
            return Vec::new();
        }
        if let Some(started) = self.started_at {
            if now.duration_since(started) >= self.chain_deadline {
                warn!("chain deadline hit");
                if self.state == ChainState::Compensating {
                    // already tried to unwind; stop waiting
                    self.state = ChainState::Failed;
                    return Vec::new();
                }
                return self.fail(now);
            }
        }
        let timed_out: Vec<usize> = self
            .steps
            .iter()
            .filter(|s| {
                s.state.is_live()
                    && s.sent_at
                        .map(|t| now.duration_since(t) >= self.step_deadline)
                        .unwrap_or(false)
            })
            .map(|s| s.index)
            .collect();
        if timed_out.is_empty() || self.state != ChainState::Running {
            return Vec::new();
        }
        // a timed-out step still has a live order at the venue: cancel it
        // before marking the step failed, then unwind the rest
        let mut frames = Vec::new();
        for i in timed_out {
            warn!(step = i, "step deadline hit");
            frames.push(self.cancel_frame(i));
            self.steps[i].state = StepState::Failed;
        }
        frames.extend(self.fail(now));
        self.state = ChainState::Compensating;
        frames
    }

    fn cancel_frame(&self, i: usize) -> String {
        let s = &self.steps[i];
        match s.order_id {
            Some(id) => bitfinex::cancel_by_id(id),
            None => bitfinex::cancel_by_cid(s.cid, &s.cid_date),
        }
    }

    fn advance(&mut self, now: Instant) -> Vec<String> {
        if self.state != ChainState::Running {
            if self.state == ChainState::Compensating {
                self.settle_compensation();
            }
            return Vec::new();
        }
        if self.steps.iter().all(|s| s.state == StepState::Filled) {
            info!(gid = self.gid, "chain complete");
            self.state = ChainState::Done;
            return Vec::new();
        }
        if let Some(i) = self
            .steps
            .iter()
            .position(|s| s.state == StepState::Pending)
        {
            return vec![self.submit(i, now)];
        }
        Vec::new()
    }

    /// Enter compensation: cancel everything still live. With nothing live
    /// the chain is terminal immediately.
    fn fail(&mut self, _now: Instant) -> Vec<String> {
        let mut frames = Vec::new();
        let live: Vec<usize> = self
            .steps
            .iter()
            .filter(|s| s.state.is_live())
            .map(|s| s.index)
            .collect();
        for i in live {
            warn!(step = i, "compensating cancel");
            frames.push(self.cancel_frame(i));
        }
        if frames.is_empty() {
            self.state = ChainState::Failed;
        } else {
            self.state = ChainState::Compensating;
        }
        frames
    }

    fn settle_compensation(&mut self) {
        if !self.steps.iter().any(|s| s.state.is_live()) {
            self.state = ChainState::Failed;
        }
    }

    /// Back to Idle after the owner has consumed the terminal state.
    pub fn reset(&mut self) {
        self.steps.clear();
        self.state = ChainState::Idle;
        self.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::Value;

    fn solution() -> Solution {
        Solution {
            instructions: vec![
                Instruction::Transition {
                    symbol: "tBTCUSD".into(),
                    action_amount: dec!(0.1),
                    action_price: dec!(100),
                },
                Instruction::Transition {
                    symbol: "tETHBTC".into(),
                    action_amount: dec!(-2),
                    action_price: dec!(0.05),
                },
                Instruction::End,
            ],
            profit_base: dec!(1),
            profit_usd: dec!(1),
        }
    }

    fn notif(kind: NotifKind, status: NotifStatus, cid: i64) -> Notification {
        Notification {
            kind,
            status,
            text: String::new(),
            order: Some(order(0, cid, OrderStatus::Active)),
        }
    }

    fn order(id: i64, cid: i64, status: OrderStatus) -> Order {
        Order {
            id,
            gid: None,
            cid,
            cid_date: None,
            symbol: "tBTCUSD".into(),
            order_type: ORDER_TYPE.into(),
            amount: dec!(0.1),
            amount_orig: dec!(0.1),
            price: dec!(100),
            status,
        }
    }

    #[test]
    fn cid_fits_45_bits() {
        for _ in 0..1000 {
            let cid = gen_cid();
            assert!(cid >= 0 && cid < (1i64 << 45));
        }
    }

    #[test]
    fn happy_path_two_steps() {
        let mut chain = OrderChain::default();
        let now = Instant::now();
        let frames = chain.start(&solution(), now);
        assert_eq!(frames.len(), 1);
        assert_eq!(chain.state(), ChainState::Running);
        assert_eq!(chain.steps()[0].state, StepState::Submitted);

        let cid0 = chain.steps()[0].cid;
        assert!(chain
            .on_notification(&notif(NotifKind::OnReq, NotifStatus::Success, cid0), now)
            .is_empty());
        assert_eq!(chain.steps()[0].state, StepState::AckReq);

        assert!(chain
            .on_order(&order(500, cid0, OrderStatus::Active), false, now)
            .is_empty());
        assert_eq!(chain.steps()[0].state, StepState::AckOrder);
        assert_eq!(chain.steps()[0].order_id, Some(500));

        // close with EXECUTED advances to step 1
        let frames = chain.on_order(&order(500, cid0, OrderStatus::Executed), true, now);
        assert_eq!(frames.len(), 1);
        assert_eq!(chain.steps()[0].state, StepState::Filled);
        assert_eq!(chain.steps()[1].state, StepState::Submitted);
        // a fresh cid per submission
        assert_ne!(chain.steps()[1].cid, cid0);

        let cid1 = chain.steps()[1].cid;
        chain.on_notification(&notif(NotifKind::OnReq, NotifStatus::Success, cid1), now);
        chain.on_order(&order(501, cid1, OrderStatus::Active), false, now);
        let frames = chain.on_order(&order(501, cid1, OrderStatus::Executed), true, now);
        assert!(frames.is_empty());
        assert_eq!(chain.state(), ChainState::Done);
    }

    #[test]
    fn request_error_on_second_step_fails_without_new_orders() {
        let mut chain = OrderChain::default();
        let now = Instant::now();
        chain.start(&solution(), now);
        let cid0 = chain.steps()[0].cid;
        chain.on_notification(&notif(NotifKind::OnReq, NotifStatus::Success, cid0), now);
        chain.on_order(&order(500, cid0, OrderStatus::Active), false, now);
        chain.on_order(&order(500, cid0, OrderStatus::Executed), true, now);

        let cid1 = chain.steps()[1].cid;
        let frames =
            chain.on_notification(&notif(NotifKind::OnReq, NotifStatus::Error, cid1), now);
        // nothing live to cancel: step 0 is filled and stays filled
        assert!(frames.is_empty());
        assert_eq!(chain.state(), ChainState::Failed);
        assert_eq!(chain.steps()[0].state, StepState::Filled);
        assert_eq!(chain.steps()[1].state, StepState::Failed);
    }

    #[test]
    fn step_timeout_cancels_live_order_then_settles() {
        let mut chain = OrderChain::new(Duration::from_millis(10), Duration::from_secs(60));
        let now = Instant::now();
        chain.start(&solution(), now);
        let cid0 = chain.steps()[0].cid;
        chain.on_notification(&notif(NotifKind::OnReq, NotifStatus::Success, cid0), now);
        chain.on_order(&order(500, cid0, OrderStatus::Active), false, now);

        let later = now + Duration::from_millis(20);
        let frames = chain.on_tick(later);
        assert_eq!(chain.state(), ChainState::Compensating);
        assert_eq!(frames.len(), 1);
        let v: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(v[1], "oc");
        assert_eq!(v[3]["id"], 500);

        // venue confirms the cancel -> terminal
        chain.on_order(&order(500, cid0, OrderStatus::Canceled), true, later);
        assert_eq!(chain.state(), ChainState::Failed);
    }

    #[test]
    fn unacked_step_cancels_by_client_id() {
        let mut chain = OrderChain::new(Duration::from_millis(10), Duration::from_secs(60));
        let now = Instant::now();
        chain.start(&solution(), now);
        let cid0 = chain.steps()[0].cid;

        let frames = chain.on_tick(now + Duration::from_millis(20));
        assert_eq!(frames.len(), 1);
        let v: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(v[3]["cid"], cid0);
        assert_eq!(
            v[3]["cid_date"].as_str().unwrap(),
            chain.steps()[0].cid_date
        );
    }

    #[test]
    fn fills_via_cumulative_trades() {
        let mut chain = OrderChain::default();
        let now = Instant::now();
        chain.start(&solution(), now);
        let cid0 = chain.steps()[0].cid;
        chain.on_order(&order(500, cid0, OrderStatus::Active), false, now);

        assert!(chain.on_trade(500, dec!(0.04), now).is_empty());
        let frames = chain.on_trade(500, dec!(0.1), now);
        assert_eq!(frames.len(), 1);
        assert_eq!(chain.steps()[0].state, StepState::Filled);
        assert_eq!(chain.steps()[1].state, StepState::Submitted);
    }

    #[test]
    fn chain_deadline_forces_failure() {
        let mut chain = OrderChain::new(Duration::from_secs(10), Duration::from_millis(50));
        let now = Instant::now();
        chain.start(&solution(), now);
        let frames = chain.on_tick(now + Duration::from_millis(100));
        // step 0 was still live -> one compensating cancel
        assert_eq!(frames.len(), 1);
        assert_eq!(chain.state(), ChainState::Compensating);
        // second sweep past the deadline stops waiting
        let frames = chain.on_tick(now + Duration::from_millis(200));
        assert!(frames.is_empty());
        assert_eq!(chain.state(), ChainState::Failed);
    }

    #[test]
    fn venue_cancel_mid_chain_compensates() {
        let mut chain = OrderChain::default();
        let now = Instant::now();
        chain.start(&solution(), now);
        let cid0 = chain.steps()[0].cid;
        chain.on_order(&order(500, cid0, OrderStatus::Active), false, now);
        let frames = chain.on_order(&order(500, cid0, OrderStatus::Canceled), true, now);
        // the canceled step itself was the only live one
        assert!(frames.is_empty());
        assert_eq!(chain.state(), ChainState::Failed);
        assert_eq!(chain.steps()[0].state, StepState::Canceled);
    }
}
