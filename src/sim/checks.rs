//! Invariant check results and their textual contract.
//!
//! Every check the validator runs produces one [`CheckLine`]. Lines render
//! as a single stable line of text so downstream tooling can parse them:
//!
//! ```text
//! phase 1: flight 0 stack overflow check: expected size <= 4, found 4 [ok]
//! phase 1: total size check: expected 8, found 8 [ok]
//! phase 1: total keysum check: expected 36, found 36 [ok]
//! phase 2: completion check: expected center=0 inserters=0 queued=0, found center=0 inserters=0 queued=0 [ok]
//! ```
//!
//! A failing line ends in `[FAILED]` instead of `[ok]`.

use std::fmt;

use super::phase::Phase;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Overflow,
    TotalSize,
    KeySum,
    Completion,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overflow => "stack overflow",
            Self::TotalSize => "total size",
            Self::KeySum => "total keysum",
            Self::Completion => "completion",
        }
    }
}

/// Outcome of one invariant check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckLine {
    /// A flight's stack must never hold more than its capacity.
    Overflow {
        flight: u32,
        capacity: usize,
        size: usize,
        /// The stack's own overflow flag, read alongside `size`.
        overflowed: bool,
    },
    /// Reservations resident in stacks and queues, against `A³`.
    TotalSize { expected: u64, found: u64 },
    /// Sum of resident reservation numbers, against `(A⁶+A³)/2`.
    KeySum { expected: i64, found: i64 },
    /// Everything routed through the center has landed on a stack.
    Completion {
        center: u64,
        inserters: usize,
        queued: u64,
    },
}

impl CheckLine {
    pub fn kind(&self) -> CheckKind {
        match self {
            Self::Overflow { .. } => CheckKind::Overflow,
            Self::TotalSize { .. } => CheckKind::TotalSize,
            Self::KeySum { .. } => CheckKind::KeySum,
            Self::Completion { .. } => CheckKind::Completion,
        }
    }

    pub fn passed(&self) -> bool {
        match *self {
            Self::Overflow {
                capacity,
                size,
                overflowed,
                ..
            } => !overflowed && size <= capacity,
            Self::TotalSize { expected, found } => expected == found,
            Self::KeySum { expected, found } => expected == found,
            Self::Completion {
                center,
                inserters,
                queued,
            } => center == 0 && inserters == 0 && queued == 0,
        }
    }
}

impl fmt::Display for CheckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind().as_str();
        match *self {
            Self::Overflow {
                flight,
                capacity,
                size,
                ..
            } => write!(
                f,
                "flight {flight} {kind} check: expected size <= {capacity}, found {size}"
            )?,
            Self::TotalSize { expected, found } => {
                write!(f, "{kind} check: expected {expected}, found {found}")?
            }
            Self::KeySum { expected, found } => {
                write!(f, "{kind} check: expected {expected}, found {found}")?
            }
            Self::Completion {
                center,
                inserters,
                queued,
            } => write!(
                f,
                "{kind} check: expected center=0 inserters=0 queued=0, \
                 found center={center} inserters={inserters} queued={queued}"
            )?,
        }
        f.write_str(if self.passed() { " [ok]" } else { " [FAILED]" })
    }
}

/// Short label used as the line prefix for a check phase.
fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Phase1Check => "phase 1",
        Phase::Phase2Check => "phase 2",
        other => other.as_str(),
    }
}

/// All check lines produced at one phase boundary, in execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckReport {
    phase: Phase,
    lines: Vec<CheckLine>,
}

impl CheckReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            lines: Vec::new(),
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn push(&mut self, line: CheckLine) {
        if line.passed() {
            tracing::debug!(phase = %self.phase, check = %line, "check passed");
        } else {
            tracing::warn!(phase = %self.phase, check = %line, "check failed");
        }
        self.lines.push(line);
    }

    #[inline]
    pub fn lines(&self) -> &[CheckLine] {
        &self.lines
    }

    pub fn passed(&self) -> bool {
        self.lines.iter().all(CheckLine::passed)
    }

    pub fn first_failure(&self) -> Option<&CheckLine> {
        self.lines.iter().find(|line| !line.passed())
    }

    /// Turn the first failing line into a violation, if there is one.
    pub fn violation(&self) -> Option<InvariantViolation> {
        self.first_failure().map(|line| InvariantViolation {
            phase: self.phase,
            line: *line,
        })
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = phase_label(self.phase);
        for line in &self.lines {
            writeln!(f, "{label}: {line}")?;
        }
        Ok(())
    }
}

/// A failed check. Fatal to the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    pub phase: Phase,
    pub line: CheckLine,
}

impl InvariantViolation {
    #[inline]
    pub fn kind(&self) -> CheckKind {
        self.line.kind()
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} invariant violated at {}: {}",
            self.line.kind().as_str(),
            phase_label(self.phase),
            self.line
        )
    }
}

impl std::error::Error for InvariantViolation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_line_text() {
        let ok = CheckLine::Overflow {
            flight: 0,
            capacity: 4,
            size: 4,
            overflowed: false,
        };
        assert!(ok.passed());
        assert_eq!(
            ok.to_string(),
            "flight 0 stack overflow check: expected size <= 4, found 4 [ok]"
        );

        let bad = CheckLine::Overflow {
            flight: 1,
            capacity: 4,
            size: 5,
            overflowed: true,
        };
        assert!(!bad.passed());
        assert!(bad.to_string().ends_with("[FAILED]"));
    }

    #[test]
    fn overflow_flag_fails_line_within_capacity() {
        let flagged = CheckLine::Overflow {
            flight: 2,
            capacity: 4,
            size: 3,
            overflowed: true,
        };
        assert!(!flagged.passed());
        assert_eq!(
            flagged.to_string(),
            "flight 2 stack overflow check: expected size <= 4, found 3 [FAILED]"
        );
    }

    #[test]
    fn aggregate_line_text() {
        assert_eq!(
            CheckLine::TotalSize {
                expected: 8,
                found: 8
            }
            .to_string(),
            "total size check: expected 8, found 8 [ok]"
        );
        assert_eq!(
            CheckLine::KeySum {
                expected: 36,
                found: 35
            }
            .to_string(),
            "total keysum check: expected 36, found 35 [FAILED]"
        );
    }

    #[test]
    fn completion_requires_everything_drained() {
        let drained = CheckLine::Completion {
            center: 0,
            inserters: 0,
            queued: 0,
        };
        assert!(drained.passed());
        for line in [
            CheckLine::Completion {
                center: 1,
                inserters: 0,
                queued: 0,
            },
            CheckLine::Completion {
                center: 0,
                inserters: 1,
                queued: 0,
            },
            CheckLine::Completion {
                center: 0,
                inserters: 0,
                queued: 3,
            },
        ] {
            assert!(!line.passed(), "{line}");
        }
    }

    #[test]
    fn report_prefixes_and_first_failure() {
        let mut report = CheckReport::new(Phase::Phase1Check);
        report.push(CheckLine::TotalSize {
            expected: 8,
            found: 8,
        });
        report.push(CheckLine::KeySum {
            expected: 36,
            found: 30,
        });
        assert!(!report.passed());
        assert_eq!(report.lines().len(), 2);

        let text = report.to_string();
        assert!(text.starts_with("phase 1: total size check"));
        assert_eq!(text.lines().count(), 2);

        let violation = report.violation().unwrap();
        assert_eq!(violation.phase, Phase::Phase1Check);
        assert_eq!(violation.kind(), CheckKind::KeySum);
        assert!(violation.to_string().contains("phase 1"));
    }

    #[test]
    fn empty_report_passes() {
        let report = CheckReport::new(Phase::Phase2Check);
        assert!(report.passed());
        assert!(report.violation().is_none());
        assert_eq!(report.to_string(), "");
    }
}
