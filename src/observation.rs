use std::{fmt, time::Duration};

/// How the two sides of a single run compared
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Both sides produced a value and the comparator judged them equivalent
    Matched,

    /// The comparator rejected the pair, or only one side produced a value
    Mismatched,

    /// Neither side produced a value. Failures are not compared with each
    /// other, so this is kept apart from both `Matched` and `Mismatched`.
    BothFailed,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Matched => "matched",
            Verdict::Mismatched => "mismatched",
            Verdict::BothFailed => "both_failed",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record of one experiment run, handed by value to a
/// [`Publisher`](crate::Publisher)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    experiment_name: String,
    verdict: Verdict,
    control_duration: Duration,
    candidate_duration: Duration,
    control_failed: bool,
    candidate_failed: bool,
}

impl Observation {
    pub(crate) fn new(
        experiment_name: String,
        verdict: Verdict,
        control_duration: Duration,
        candidate_duration: Duration,
        control_failed: bool,
        candidate_failed: bool,
    ) -> Self {
        Self {
            experiment_name,
            verdict,
            control_duration,
            candidate_duration,
            control_failed,
            candidate_failed,
        }
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// `true` only when the verdict is [`Verdict::Matched`]
    pub fn matched(&self) -> bool {
        self.verdict == Verdict::Matched
    }

    pub fn control_duration(&self) -> Duration {
        self.control_duration
    }

    pub fn candidate_duration(&self) -> Duration {
        self.candidate_duration
    }

    pub fn control_failed(&self) -> bool {
        self.control_failed
    }

    pub fn candidate_failed(&self) -> bool {
        self.candidate_failed
    }
}
