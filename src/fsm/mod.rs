//! Function-pointer finite state machine engine for the node B alarm.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌─────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ StateId │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├─────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Idle    │ fn(ctx)   │    -     │ fn(ctx)->Option<> │  │
//! │  │ Active  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Cooling │ fn(ctx)   │    -     │ fn(ctx)->Option<> │  │
//! │  └─────────┴───────────┴──────────┴───────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each evaluation the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next.  All handlers receive
//! `&mut AlarmContext`.
//!
//! [`AlarmStateMachine`] bundles the engine with its context and is the
//! only type the node loop touches.

pub mod condition;
pub mod context;
pub mod states;

use context::{AlarmContext, AlarmOutputs};
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Alarm states.  Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Active = 1,
    Cooling = 2,
}

impl StateId {
    pub const COUNT: usize = 3;

    /// Convert an index back to `StateId`.  Out of range falls back to
    /// `Idle` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Active,
            2 => Self::Cooling,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut AlarmContext);

/// Per-evaluation handler.  `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut AlarmContext) -> Option<StateId>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// Table-driven engine.  Owns the table; the context is threaded through.
pub struct Fsm {
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    transitions: u32,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut AlarmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// One evaluation: `on_update`, then at most one transition.
    pub fn tick(&mut self, ctx: &mut AlarmContext) {
        if let Some(next_id) = (self.table[self.current].on_update)(ctx) {
            self.transition(next_id, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// Number of transitions taken since start.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    fn transition(&mut self, next_id: StateId, ctx: &mut AlarmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

// ---------------------------------------------------------------------------
// Alarm state machine
// ---------------------------------------------------------------------------

/// Hysteresis alarm: created once in Idle, lives for the whole process.
pub struct AlarmStateMachine {
    fsm: Fsm,
    ctx: AlarmContext,
}

impl AlarmStateMachine {
    pub fn new(sustain_ms: u64) -> Self {
        let mut fsm = Fsm::new(states::build_state_table(), StateId::Idle);
        let mut ctx = AlarmContext::new(sustain_ms);
        fsm.start(&mut ctx);
        Self { fsm, ctx }
    }

    /// Feed one evaluation and return the resulting actuator command.
    pub fn evaluate(&mut self, condition: bool, now_ms: u64) -> AlarmOutputs {
        self.ctx.now_ms = now_ms;
        self.ctx.condition = condition;
        self.fsm.tick(&mut self.ctx);
        self.ctx.outputs
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// True only while Active.
    pub fn is_alarming(&self) -> bool {
        self.state() == StateId::Active
    }

    pub fn outputs(&self) -> AlarmOutputs {
        self.ctx.outputs
    }

    pub fn entered_at_ms(&self) -> u64 {
        self.ctx.entered_at_ms
    }

    pub fn transitions(&self) -> u32 {
        self.fsm.transitions()
    }
}
