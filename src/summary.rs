use crate::error::NeckSearchError;
use crate::path::{CompletePath, FunctionPath};
use crate::policy::{apply_policy, Policy, PolicySet};
use crate::program::{Program, PropertyTable};

/// Summarize one exit path (or, equivalently, any function-scoped path
/// whose final step is the block whose static contribution should count)
/// under the exit-path summary policy.
///
/// Folds in the last step's block's static `props` first, then folds in
/// every step's callee-summary table from last to first. The last step's
/// callee-summary table is folded in twice this way — once alongside its
/// static props, once again as the first entry of the reversed pass — and
/// both contributions are real and additive under the default policy.
pub fn summarize_exit_path(
    program: &Program,
    funcname: &str,
    exit_path: &FunctionPath,
    policy: &Policy,
) -> Result<PropertyTable, NeckSearchError> {
    let mut accumulator = PropertyTable::default();

    let last = exit_path
        .last()
        .ok_or(NeckSearchError::InvariantViolation(
            "exit path has no steps",
        ))?;
    let static_contrib = &program.expect_block(funcname, &last.block).props;
    apply_policy(&mut accumulator, static_contrib, policy, "exit_path_summary")?;

    for step in exit_path.iter().rev() {
        apply_policy(
            &mut accumulator,
            &step.callee_summary,
            policy,
            "exit_path_summary",
        )?;
    }

    Ok(accumulator)
}

/// Merge a list of per-exit-path summaries into one table under the
/// exit-path merge policy (default: per-property max, so iteration
/// direction is irrelevant).
pub fn merge_exit_path_summaries(
    exit_path_contribs: &[PropertyTable],
    policy: &Policy,
) -> Result<PropertyTable, NeckSearchError> {
    let mut final_contribution = PropertyTable::default();
    for contrib in exit_path_contribs {
        apply_policy(&mut final_contribution, contrib, policy, "exit_path_merge")?;
    }
    Ok(final_contribution)
}

/// Fold `summary` into `summarization` in place under the basic-block
/// contribution policy. Used when a completed callee's final summary is
/// attributed back to the call-site block.
pub fn merge_basic_block_contribution(
    summarization: &mut PropertyTable,
    summary: &PropertyTable,
    policy: &Policy,
) -> Result<(), NeckSearchError> {
    apply_policy(summarization, summary, policy, "block_contribution")
}

/// Summarize a complete path: treat each function-scoped segment as an
/// exit path, summarize each under the exit-path summary policy, then fold
/// the per-segment summaries from leaf to root under the basic-block
/// contribution policy.
///
/// This is what a visitor calls to get a numeric snapshot of "what has
/// been traversed so far."
pub fn summarize_complete_path(
    program: &Program,
    fpath: &CompletePath,
    policies: &PolicySet,
) -> Result<PropertyTable, NeckSearchError> {
    let mut contribs = Vec::with_capacity(fpath.len());
    for (funcname, segment) in fpath {
        contribs.push(summarize_exit_path(
            program,
            funcname,
            segment,
            &policies.exit_path_summary,
        )?);
    }

    let mut accumulate = PropertyTable::default();
    for contrib in contribs.iter().rev() {
        apply_policy(
            &mut accumulate,
            contrib,
            &policies.block_contribution,
            "block_contribution",
        )?;
    }
    Ok(accumulate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathStep;
    use crate::program::{Block, Function};

    fn single_block_program(props: PropertyTable) -> Program {
        let block = Block::new(vec!["nop".to_owned()], None, false).with_props(props);
        let func = Function::new("b0").with_block("b0", block);
        Program::new().with_function("f", func)
    }

    #[test]
    fn summarize_exit_path_sums_static_and_callee_contributions() {
        let mut props = PropertyTable::default();
        props.insert("numSucceededGAF".to_owned(), 2);
        let program = single_block_program(props);

        let mut callee_summary = PropertyTable::default();
        callee_summary.insert("numSucceededGAF".to_owned(), 3);
        let path = vec![PathStep::new("b0", None, callee_summary)];

        let policy = PolicySet::defaults().exit_path_summary;
        let summary = summarize_exit_path(&program, "f", &path, &policy).unwrap();
        // static 2 + callee 3, summed twice over (once as static props,
        // once as the last step's own callee_summary in the reversed loop)
        assert_eq!(summary.get("numSucceededGAF"), Some(&5));
    }

    #[test]
    fn merge_exit_path_summaries_takes_max_per_property() {
        let policy = PolicySet::defaults().exit_path_merge;
        let mut a = PropertyTable::default();
        a.insert("numSucceededLoopHeads".to_owned(), 1);
        let mut b = PropertyTable::default();
        b.insert("numSucceededLoopHeads".to_owned(), 4);
        let merged = merge_exit_path_summaries(&[a, b], &policy).unwrap();
        assert_eq!(merged.get("numSucceededLoopHeads"), Some(&4));
    }

    #[test]
    fn merge_basic_block_contribution_is_additive_in_place() {
        let policy = PolicySet::defaults().block_contribution;
        let mut summarization = PropertyTable::default();
        summarization.insert("numSucceededGAF".to_owned(), 1);
        let mut summary = PropertyTable::default();
        summary.insert("numSucceededGAF".to_owned(), 2);
        merge_basic_block_contribution(&mut summarization, &summary, &policy).unwrap();
        assert_eq!(summarization.get("numSucceededGAF"), Some(&3));
    }
}
