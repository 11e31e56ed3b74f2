//! Concrete alarm state handlers and table builder.
//!
//! Each state is three plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  IDLE ──[condition]──▶ ACTIVE ──[sustain elapsed, clear]──▶ IDLE
//!    ▲                    ▲  │
//!    │          [condition]  [sustain elapsed, still set]
//!    │                    │  ▼
//!    └────[clear]────── COOLING
//! ```
//!
//! While Active, nothing but the sustain timer is looked at: a condition
//! that clears after one pass still produces a full-length alarm.

use super::context::{AlarmContext, AlarmOutputs};
use super::{StateDescriptor, StateId};
use log::info;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once when the machine is created.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::Active,
            name: "Active",
            on_enter: Some(active_enter),
            on_exit: Some(active_exit),
            on_update: active_update,
        },
        StateDescriptor {
            id: StateId::Cooling,
            name: "Cooling",
            on_enter: Some(cooling_enter),
            on_exit: None,
            on_update: cooling_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut AlarmContext) {
    ctx.outputs = AlarmOutputs::IDLE;
}

fn idle_update(ctx: &mut AlarmContext) -> Option<StateId> {
    ctx.condition.then_some(StateId::Active)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACTIVE: buzzer sounding, held for the sustain period
// ═══════════════════════════════════════════════════════════════════════════

fn active_enter(ctx: &mut AlarmContext) {
    ctx.entered_at_ms = ctx.now_ms;
    ctx.outputs = AlarmOutputs::ALARM;
    info!(
        "ALARM: raised at {} ms, holding for {} ms",
        ctx.now_ms, ctx.sustain_ms
    );
}

fn active_exit(ctx: &mut AlarmContext) {
    ctx.outputs.buzzer = false;
    info!("ALARM: cleared after {} ms", ctx.ms_in_alarm());
}

fn active_update(ctx: &mut AlarmContext) -> Option<StateId> {
    if !ctx.sustain_elapsed() {
        return None;
    }
    if ctx.condition {
        Some(StateId::Cooling)
    } else {
        Some(StateId::Idle)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLING: one quiet pass between back-to-back alarms
// ═══════════════════════════════════════════════════════════════════════════

fn cooling_enter(ctx: &mut AlarmContext) {
    ctx.outputs = AlarmOutputs::COOLING;
}

fn cooling_update(ctx: &mut AlarmContext) -> Option<StateId> {
    if ctx.condition {
        Some(StateId::Active)
    } else {
        Some(StateId::Idle)
    }
}
