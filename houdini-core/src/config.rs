#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::observer::RunEnd;

/// What happens to the current implementation after a refutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Schedule {
    /// Re-verify the same implementation until it is dequeued.
    #[default]
    Spin,
    /// Move it to the tail of the worklist.
    RoundRobin,
}

/// `end` event kind reported for runs that terminated through flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushEnd {
    Normal,
    #[default]
    Abnormal,
}

impl From<FlushEnd> for RunEnd {
    fn from(value: FlushEnd) -> Self {
        match value {
            FlushEnd::Normal => RunEnd::Normal,
            FlushEnd::Abnormal => RunEnd::Abnormal,
        }
    }
}

/// Engine options, as read from the `[houdini]` manifest table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct HoudiniConfig {
    /// Keep refining past genuine violations instead of flushing.
    pub continue_at_error: bool,
    pub schedule: Schedule,
    pub flush_end: FlushEnd,
}

impl HoudiniConfig {
    pub fn continue_at_error(mut self, value: bool) -> Self {
        self.continue_at_error = value;
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn flush_end(mut self, flush_end: FlushEnd) -> Self {
        self.flush_end = flush_end;
        self
    }
}
