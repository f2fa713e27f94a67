//! Candidate Fusion Engine.
//!
//! Merges freshly observed [`Candidate`]s into a running [`ResultSet`] so
//! that repeated observations of the same subject converge on the best match
//! seen so far.
//!
//! Per incoming candidate `c`:
//!
//! 1. If the set already holds an entry `e` for `c.subject`, `c` replaces `e`
//!    in place when `c.score < e.score`; otherwise `c` is discarded.
//! 2. If the subject is new, `c` is appended only when
//!    `c.score < acceptance_threshold`.
//!
//! Equal scores keep the entry that was there first, and a `NaN` score never
//! wins a comparison, so it is never accepted or used as a replacement.
//!
//! # Example
//!
//! ```rust
//! use scout_perception::fusion::{merge, ResultSet};
//! use scout_types::{Candidate, Pose, StampedPose};
//!
//! let pose = StampedPose::new("base_link", Pose::default());
//! let mut cavities = ResultSet::new();
//!
//! merge(&mut cavities, vec![Candidate::new("M20", pose.clone(), 0.08)], 0.1);
//! merge(&mut cavities, vec![Candidate::new("M20", pose.clone(), 0.03)], 0.1);
//!
//! assert_eq!(cavities.len(), 1);
//! assert_eq!(cavities.get("M20").unwrap().score, 0.03);
//! ```

use scout_types::Candidate;
use tracing::{debug, info};

/// Ordered collection of [`Candidate`]s, unique by subject.
///
/// The only way to add or replace entries is [`merge`], which maintains the
/// uniqueness invariant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    candidates: Vec<Candidate>,
}

/// Whether a [`ResultSet`] holds as many subjects as the caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete { found: usize, required: usize },
}

impl ResultSet {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.candidates
    }

    /// The entry for `subject`, if any.
    pub fn get(&self, subject: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.subject == subject)
    }

    /// Compare the number of distinct subjects against `required`.
    ///
    /// Only an exact match counts as complete.
    pub fn completeness(&self, required: usize) -> Completeness {
        if self.candidates.len() == required {
            Completeness::Complete
        } else {
            Completeness::Incomplete {
                found: self.candidates.len(),
                required,
            }
        }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Merge `incoming` into `existing`, keeping the best-scoring candidate per
/// subject.  Mutates `existing` in place and returns it for chaining.
pub fn merge<I>(existing: &mut ResultSet, incoming: I, acceptance_threshold: f64) -> &mut ResultSet
where
    I: IntoIterator<Item = Candidate>,
{
    for candidate in incoming {
        let found = existing
            .candidates
            .iter()
            .position(|e| e.subject == candidate.subject);
        match found {
            Some(idx) => {
                let previous = existing.candidates[idx].score;
                if candidate.score < previous {
                    info!(
                        subject = %candidate.subject,
                        old = previous,
                        new = candidate.score,
                        "found better candidate"
                    );
                    existing.candidates[idx] = candidate;
                } else {
                    debug!(
                        subject = %candidate.subject,
                        kept = previous,
                        discarded = candidate.score,
                        "keeping existing candidate"
                    );
                }
            }
            None if candidate.score < acceptance_threshold => {
                debug!(subject = %candidate.subject, score = candidate.score, "accepted new candidate");
                existing.candidates.push(candidate);
            }
            None => {
                debug!(
                    subject = %candidate.subject,
                    score = candidate.score,
                    threshold = acceptance_threshold,
                    "rejected candidate above acceptance threshold"
                );
            }
        }
    }
    existing
}
