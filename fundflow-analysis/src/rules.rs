//! Ordered first-match-wins rule cascades.
//!
//! Several classifications use overlapping threshold bands (a price 9% above its
//! mean satisfies both the "possible top" and "uptrend" bands). Expressing them as
//! an ordered slice of `(predicate, label)` pairs makes the tie-break explicit.

/// A single labelled predicate over a classification context `C`.
#[derive(Clone, Copy)]
pub struct Rule<C, L> {
    pub label: L,
    pub matches: fn(&C) -> bool,
}

impl<C, L> Rule<C, L> {
    pub const fn new(label: L, matches: fn(&C) -> bool) -> Self {
        Self { label, matches }
    }
}

impl<C, L: std::fmt::Debug> std::fmt::Debug for Rule<C, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("label", &self.label).finish()
    }
}

/// Evaluate `rules` in order and return the label of the first match, or
/// `fallback` if none match.
pub fn first_match<C, L: Copy>(rules: &[Rule<C, L>], context: &C, fallback: L) -> L {
    rules
        .iter()
        .find(|rule| (rule.matches)(context))
        .map(|rule| rule.label)
        .unwrap_or(fallback)
}
