//! Outcome handling table. Kept as its
//! own small module so the control loop in `mod.rs` reads as a dispatch
//! table rather than a long `match` inlined in the loop body.

use std::time::Duration;

use crate::engine::{Classification, ExtractedUrl};
use crate::error::CoreError;

/// What happened to one dispatched request, already classified where the
/// engine adapter had a say. This is the scheduler-internal vocabulary the
/// control loop reduces a raw fetch + classify step down to before handing
/// off to `apply` in `mod.rs`.
pub enum Outcome {
    /// The engine classified the response `ok` and returned URLs (possibly
    /// zero, which is handled the same as `Empty`).
    Success {
        urls: Vec<ExtractedUrl>,
        has_next_page: bool,
        latency: Duration,
    },
    Empty {
        latency: Duration,
    },
    Captcha,
    Blocked,
    Transport,
    Timeout,
    /// An unrecoverable engine-level error; the scheduler stops outright.
    Fatal(String),
}

impl Outcome {
    pub fn from_classification(
        classification: Classification,
        urls: Vec<ExtractedUrl>,
        latency: Duration,
        has_next_page: bool,
    ) -> Self {
        match classification {
            Classification::Ok if urls.is_empty() => Outcome::Empty { latency },
            Classification::Ok => Outcome::Success {
                urls,
                has_next_page,
                latency,
            },
            Classification::Captcha => Outcome::Captcha,
            Classification::Blocked => Outcome::Blocked,
            Classification::Empty => Outcome::Empty { latency },
        }
    }

    pub fn from_error(error: &CoreError) -> Self {
        match error {
            CoreError::Timeout(_) => Outcome::Timeout,
            CoreError::FatalEngine(msg) => Outcome::Fatal(msg.clone()),
            other => {
                let _ = other;
                Outcome::Transport
            }
        }
    }

    /// Whether this outcome counts as a "success" in the recent-outcome
    /// window the adaptive-concurrency logic reads.
    pub fn counts_as_success(&self) -> bool {
        matches!(self, Outcome::Success { .. } | Outcome::Empty { .. })
    }
}
