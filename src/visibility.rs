//! Per-level layer visibility.
//!
//! Hide rules are cumulative: a rule at threshold `L` hides its layers at
//! level `L` and every deeper level. The hidden set at a level is the union
//! of every rule whose threshold is at or below it, so it only ever grows
//! as the pyramid shrinks.
//!
//! Rule entries naming layers that are no longer in the candidate list are
//! ignored. They simply never match.

use crate::types::{HideRule, LayerId};
use std::collections::BTreeSet;

/// Layer ids hidden at `level`.
pub fn hidden_at(rules: &[HideRule], level: u32) -> BTreeSet<LayerId> {
    rules
        .iter()
        .filter(|rule| rule.threshold <= level)
        .flat_map(|rule| rule.layers.iter().cloned())
        .collect()
}

/// Candidates minus `hidden`, in candidate order.
pub fn visible_layers(candidates: &[LayerId], hidden: &BTreeSet<LayerId>) -> Vec<LayerId> {
    candidates
        .iter()
        .filter(|id| !hidden.contains(*id))
        .cloned()
        .collect()
}

/// Layers to render at `level`.
pub fn resolve(rules: &[HideRule], candidates: &[LayerId], level: u32) -> Vec<LayerId> {
    visible_layers(candidates, &hidden_at(rules, level))
}

/// Rule entries that match no candidate layer.
///
/// Only used for diagnostics; stale ids never cause an error.
pub fn stale_rule_layers<'a>(rules: &'a [HideRule], candidates: &[LayerId]) -> Vec<&'a LayerId> {
    let known: BTreeSet<&LayerId> = candidates.iter().collect();
    let stale: BTreeSet<&LayerId> = rules
        .iter()
        .flat_map(|rule| rule.layers.iter())
        .filter(|id| !known.contains(id))
        .collect();
    stale.into_iter().collect()
}
