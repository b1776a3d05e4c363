//! Call-site escape policy.
//!
//! The analysis treats every call as an escape boundary: a reference
//! argument has left the method's control, and a reference result could be
//! anything. For well-known callees the host compiler knows better —
//! intrinsified runtime helpers that never capture their arguments, or
//! factory methods guaranteed to return a fresh object. That knowledge is
//! supplied here as a table keyed by callee identity; nothing is baked in.

use jade_ir::Name;
use rustc_hash::FxHashMap;

/// What a callee may do with its reference arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgPolicy {
    /// The callee never retains any argument.
    NotCaptured,
    /// The callee may retain arguments, but not publish them beyond its
    /// own frame. Arguments escape no further than `ArgEscape`.
    Captured,
    /// The callee may publish arguments anywhere (native code, reflective
    /// sinks). Arguments are `GlobalEscape`.
    Escapes,
}

/// What a callee's reference result may be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnPolicy {
    /// Always a freshly allocated object the caller alone holds.
    FreshObject,
    /// May return one of the arguments (the hidden-alias case).
    MayAliasArgs,
    /// Anything at all.
    Unknown,
}

/// Combined effect record for one callee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalleeEffect {
    pub args: ArgPolicy,
    pub ret: ReturnPolicy,
}

impl CalleeEffect {
    /// Effect assumed for a callee the table knows nothing about:
    /// arguments are captured, the result is unknown.
    pub const UNKNOWN: CalleeEffect = CalleeEffect {
        args: ArgPolicy::Captured,
        ret: ReturnPolicy::Unknown,
    };
}

/// Table of per-callee escape effects.
///
/// Host-provided; an empty table makes every call maximally conservative
/// (modulo the `Captured` default, which is what keeps plain calls at
/// `ArgEscape` rather than `GlobalEscape`).
#[derive(Clone, Debug, Default)]
pub struct EscapePolicyTable {
    effects: FxHashMap<Name, CalleeEffect>,
}

impl EscapePolicyTable {
    /// Empty table: every callee gets [`CalleeEffect::UNKNOWN`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the effect of a callee, replacing any previous entry.
    pub fn insert(&mut self, callee: Name, effect: CalleeEffect) {
        self.effects.insert(callee, effect);
    }

    /// The effect of a callee, defaulting to [`CalleeEffect::UNKNOWN`].
    pub fn effect(&self, callee: Name) -> CalleeEffect {
        self.effects
            .get(&callee)
            .copied()
            .unwrap_or(CalleeEffect::UNKNOWN)
    }
}

impl FromIterator<(Name, CalleeEffect)> for EscapePolicyTable {
    fn from_iter<T: IntoIterator<Item = (Name, CalleeEffect)>>(iter: T) -> Self {
        Self {
            effects: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests;
