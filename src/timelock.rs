//! Lock time interpretation
//!
//! One integer domain covers both block heights and Unix timestamps: values
//! below [`LOCKTIME_THRESHOLD`] are heights, values at or above it are times.

use crate::constants::*;
use crate::error::RejectReason;
use crate::types::Natural;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeLock {
    BlockHeight(Natural),
    Timestamp(Natural),
}

impl TimeLock {
    pub fn from_value(value: Natural) -> Self {
        if is_block_height(value) {
            TimeLock::BlockHeight(value)
        } else {
            TimeLock::Timestamp(value)
        }
    }

    pub fn value(&self) -> Natural {
        match self {
            TimeLock::BlockHeight(v) | TimeLock::Timestamp(v) => *v,
        }
    }

    pub fn is_block_height(&self) -> bool {
        matches!(self, TimeLock::BlockHeight(_))
    }
}

pub fn is_block_height(value: Natural) -> bool {
    value < LOCKTIME_THRESHOLD
}

/// An input with the final sequence number opts out of lock time enforcement
pub fn locktime_enabled(sequence: Natural) -> bool {
    sequence < SEQUENCE_FINAL
}

/// CheckTimeLock: (deadline, lt, seq) → {ok, reject}
///
/// 1. seq < 0xFFFFFFFF (lock time must be enforced for this input)
/// 2. deadline < T ⇒ lt < T (a height deadline needs a height lock time)
/// 3. lt ≥ deadline
pub fn check_time_lock(
    deadline: Natural,
    lock_time: Natural,
    sequence: Natural,
) -> std::result::Result<(), RejectReason> {
    if !locktime_enabled(sequence) {
        return Err(RejectReason::LocktimeDisabled);
    }

    let deadline = TimeLock::from_value(deadline);
    if deadline.is_block_height() && !is_block_height(lock_time) {
        return Err(RejectReason::LocktimeKindMismatch);
    }

    if lock_time < deadline.value() {
        return Err(RejectReason::DeadlineNotReached);
    }

    Ok(())
}
