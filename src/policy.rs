use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::NeckSearchError;
use crate::program::PropertyTable;

/// A per-property binary integer operator: `(existing value, incoming
/// value) -> merged value`. `None` means the destination table has no
/// existing value for this property yet.
pub type PolicyFn = Arc<dyn Fn(Option<i64>, i64) -> i64 + Send + Sync>;

/// A named table of [`PolicyFn`]s, one per property, used for a single
/// merge purpose. Three such tables exist simultaneously — see
/// [`PolicySet`] — and every property appearing anywhere in a program's
/// static properties must have an entry in all three, with no implicit
/// fallback: an unregistered property is a fatal
/// [`NeckSearchError::MissingPolicy`], not silently skipped.
#[derive(Clone, Default)]
pub struct Policy {
    ops: FxHashMap<String, PolicyFn>,
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("properties", &self.ops.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Policy {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register (or overwrite) the operator for `property`.
    pub fn register(mut self, property: impl Into<String>, op: PolicyFn) -> Self {
        self.ops.insert(property.into(), op);
        self
    }

    fn resolve(&self, property: &str) -> Option<&PolicyFn> {
        self.ops.get(property)
    }
}

/// Apply `policy[prop_name]` to `dst[prop_name]` and `value`, storing the
/// result back into `dst`. Fails if `policy` has no entry for `prop_name`.
pub fn apply_policy_to_property(
    dst: &mut PropertyTable,
    prop_name: &str,
    value: i64,
    policy: &Policy,
    policy_label: &'static str,
) -> Result<i64, NeckSearchError> {
    let op = policy
        .resolve(prop_name)
        .ok_or_else(|| NeckSearchError::MissingPolicy {
            policy: policy_label,
            property: prop_name.to_owned(),
        })?;
    let merged = op(dst.get(prop_name).copied(), value);
    dst.insert(prop_name.to_owned(), merged);
    Ok(merged)
}

/// Fold every property of `src` into `dst` under `policy`.
pub fn apply_policy(
    dst: &mut PropertyTable,
    src: &PropertyTable,
    policy: &Policy,
    policy_label: &'static str,
) -> Result<(), NeckSearchError> {
    for (prop_name, &value) in src {
        apply_policy_to_property(dst, prop_name, value, policy, policy_label)?;
    }
    Ok(())
}

fn sum_op() -> PolicyFn {
    Arc::new(|x, y| x.map_or(y, |x| x + y))
}

fn max_op() -> PolicyFn {
    Arc::new(|x, y| x.map_or(y, |x| x.max(y)))
}

/// The three independent per-property policy tables the engine needs.
///
/// Bundled and constructed the way `kirin_interpreter::StackInterpreter`
/// bundles its own configuration (`with_fuel`, `with_max_depth` builder
/// methods over an owned struct) rather than as free-standing globals, so
/// callers can run more than one search concurrently with different
/// policies without touching shared mutable state.
#[derive(Clone, Debug, Default)]
pub struct PolicySet {
    pub exit_path_summary: Policy,
    pub exit_path_merge: Policy,
    pub block_contribution: Policy,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two well-known properties, `numSucceededLoopHeads` and
    /// `numSucceededGAF`, summed across an exit path and across basic-block
    /// contribution, and maxed when merging exit paths together.
    pub fn defaults() -> Self {
        let props = ["numSucceededLoopHeads", "numSucceededGAF"];
        let mut set = Self::new();
        for prop in props {
            set.exit_path_summary = set.exit_path_summary.register(prop, sum_op());
            set.exit_path_merge = set.exit_path_merge.register(prop, max_op());
            set.block_contribution = set.block_contribution.register(prop, sum_op());
        }
        set
    }

    pub fn with_exit_path_summary_policy(mut self, policy: Policy) -> Self {
        self.exit_path_summary = policy;
        self
    }

    pub fn with_exit_path_merge_policy(mut self, policy: Policy) -> Self {
        self.exit_path_merge = policy;
        self
    }

    pub fn with_block_contribution_policy(mut self, policy: Policy) -> Self {
        self.block_contribution = policy;
        self
    }
}
