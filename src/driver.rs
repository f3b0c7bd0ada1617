use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::NeckSearchError;
use crate::explorer::Explorer;
use crate::path::CompletePath;
use crate::policy::PolicySet;
use crate::program::{FunctionName, Program};
use crate::visitor::{Visit, Visitor};

/// The cross-function driver: owns the stack of per-function
/// [`Explorer`]s and interleaves them into one single-threaded cooperative
/// traversal, descending into participating, non-recursive callees and
/// folding their summaries back into the caller on return.
pub struct NeckSearch {
    program: Program,
    participation: FxHashSet<FunctionName>,
    start_func: FunctionName,
    policies: PolicySet,
    verbose: bool,
    stack: Vec<Explorer>,
}

impl NeckSearch {
    /// Construct a search rooted at `start_func`'s entry block.
    ///
    /// Fails if `start_func` has no entry in `program` — the same
    /// "named function must resolve" contract that applies to
    /// participating callees encountered mid-search.
    pub fn new(
        program: Program,
        participation: FxHashSet<FunctionName>,
        start_func: impl Into<FunctionName>,
        policies: PolicySet,
        verbose: bool,
    ) -> Result<Self, NeckSearchError> {
        let start_func = start_func.into();
        if !program.functions.contains_key(&start_func) {
            return Err(NeckSearchError::UnknownCallee {
                function: start_func,
            });
        }

        let mut search = Self {
            program,
            participation,
            start_func,
            policies,
            verbose,
            stack: Vec::new(),
        };
        search.reinitialize();
        Ok(search)
    }

    /// Reset the search back to the entry of `start_func`, discarding all
    /// in-progress exploration state.
    pub fn reinitialize(&mut self) {
        let entry = self.program.expect_entry(&self.start_func).to_owned();
        self.stack = vec![Explorer::new(self.start_func.clone(), entry, false)];
    }

    fn active(&self) -> &Explorer {
        self.stack
            .last()
            .expect("search stack is never empty between constructor and drop")
    }

    fn active_mut(&mut self) -> &mut Explorer {
        self.stack
            .last_mut()
            .expect("search stack is never empty between constructor and drop")
    }

    /// True once the root explorer has drained its queue and finished
    /// processing its last visit, with no descendants left on the stack.
    pub fn finished(&self) -> bool {
        self.stack.len() == 1 && self.active().finished()
    }

    /// The current search-stack path: one function-scoped path per
    /// explorer on the stack, root to leaf.
    pub fn get_complete_path(&self) -> CompletePath {
        self.stack
            .iter()
            .map(|explorer| (explorer.func_name().to_owned(), explorer.function_path()))
            .collect()
    }

    /// Just the function names in the current search-stack path.
    pub fn get_function_path(&self) -> Vec<FunctionName> {
        self.stack
            .iter()
            .map(|explorer| explorer.func_name().to_owned())
            .collect()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Perform one visit and expand until the next visit is ready (or the
    /// search is finished).
    ///
    /// Returns `(more_work_remains, visitor_was_called, visitor_return)`.
    pub fn visit_next(
        &mut self,
        visitor: &mut dyn Visitor,
    ) -> Result<(bool, bool, Option<bool>), NeckSearchError> {
        if self.active().queue_len() == 0 {
            // visit_next() called on an already-finished search: expand()
            // is pushed as far as it can go by the end of every prior call,
            // so an empty queue here means there is truly nothing left.
            return Ok((!self.finished(), false, None));
        }

        let (block, chokep) = self.active_mut().visit(&self.program)?;
        let complete_path = self.get_complete_path();
        let visit = Visit {
            function: self.active().func_name().to_owned(),
            block,
            chokep,
            forbidden: self.active().choke_point_forbidden(),
            complete_path,
        };
        let ret = visitor.visit(visit);

        loop {
            let outcome = self.active_mut().expand(&self.program, &self.participation)?;
            if self.verbose {
                trace!(?outcome, "driver: expand outcome");
            }

            if self.active().finished() {
                if self.stack.len() == 1 {
                    break;
                }

                let finished = self
                    .stack
                    .pop()
                    .expect("just checked stack.len() > 1 above");
                let final_contrib =
                    finished.compute_final_contribution(&self.program, &self.policies)?;
                self.active_mut()
                    .accumulate_callee_contribution(&final_contrib, &self.policies)?;
                trace!(
                    func = %self.active().func_name(),
                    "driver: backtracked, folded callee contribution"
                );
                continue;
            }

            if self.active().is_yielded() {
                let callee = self
                    .active()
                    .yield_at_callee()
                    .expect("is_yielded() implies a callee name is recorded")
                    .to_owned();

                if self.get_function_path().contains(&callee) {
                    trace!(callee = %callee, "driver: ignoring recursive call");
                    // Leave the explorer yielded; the next `expand` call
                    // resumes scanning right after the refused call site.
                    continue;
                }

                let Some(entry) = self.program.functions.get(&callee).map(|f| f.entry.clone())
                else {
                    return Err(NeckSearchError::UnknownCallee { function: callee });
                };

                let forbid_choke_points =
                    !self.active().visiting_chokep() || self.active().choke_point_forbidden();
                trace!(callee = %callee, forbid_choke_points, "driver: descending into callee");
                self.stack.push(Explorer::new(callee, entry, forbid_choke_points));
                // Only a `visit()` on the new active explorer makes sense
                // next; stop expanding here.
                break;
            }

            // Not finished, not yielded: a visit is the only thing left.
            break;
        }

        Ok((!self.finished(), true, Some(ret)))
    }

    /// Call `visit_next` until either the search is finished or the
    /// visitor returns `false`.
    ///
    /// Returns `(more_work_remains, last_visitor_return)`.
    pub fn visit_all(
        &mut self,
        visitor: &mut dyn Visitor,
    ) -> Result<(bool, Option<bool>), NeckSearchError> {
        let mut last_ret = None;
        while !self.finished() {
            let (more_to_search, _called, ret) = self.visit_next(visitor)?;
            last_ret = ret;
            if !more_to_search || ret == Some(false) {
                return Ok((more_to_search, last_ret));
            }
        }
        Ok((false, last_ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Block, Function, Program};

    fn leaf_program(name: &str) -> Program {
        let block = Block::new(Vec::new(), None, false);
        let func = Function::new("b0").with_block("b0", block);
        Program::new().with_function(name, func)
    }

    #[test]
    fn new_rejects_an_unknown_start_function() {
        let program = leaf_program("main");
        let err = NeckSearch::new(
            program,
            FxHashSet::default(),
            "missing",
            PolicySet::defaults(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, NeckSearchError::UnknownCallee { .. }));
    }

    #[test]
    fn single_leaf_block_finishes_after_one_visit() {
        let program = leaf_program("main");
        let mut search =
            NeckSearch::new(program, FxHashSet::default(), "main", PolicySet::defaults(), false).unwrap();
        assert!(!search.finished());

        let mut visits = Vec::new();
        search
            .visit_next(&mut |visit: Visit| {
                visits.push((visit.function, visit.block));
                true
            })
            .unwrap();

        assert_eq!(visits, vec![("main".to_string(), "b0".to_string())]);
        assert!(search.finished());
    }

    #[test]
    fn reinitialize_discards_in_progress_state() {
        let main_b0 = Block::new(Vec::new(), Some(vec!["b1".to_string()]), false);
        let main_b1 = Block::new(Vec::new(), None, false);
        let main = Function::new("b0")
            .with_block("b0", main_b0)
            .with_block("b1", main_b1);
        let program = Program::new().with_function("main", main);

        let mut search =
            NeckSearch::new(program, FxHashSet::default(), "main", PolicySet::defaults(), false).unwrap();
        search.visit_next(&mut |_: Visit| true).unwrap();
        assert!(!search.finished());

        search.reinitialize();
        assert_eq!(search.get_function_path(), vec!["main".to_string()]);
        assert!(!search.finished());
    }

    #[test]
    fn self_recursive_call_is_refused_without_descending() {
        let main_b0 = Block::new(vec!["call main".to_string()], None, false);
        let main = Function::new("b0").with_block("b0", main_b0);
        let program = Program::new().with_function("main", main);
        let mut participation = FxHashSet::default();
        participation.insert("main".to_string());

        let mut search =
            NeckSearch::new(program, participation, "main", PolicySet::defaults(), false).unwrap();

        let mut visits = Vec::new();
        search
            .visit_all(&mut |visit: Visit| {
                visits.push((visit.function, visit.block));
                true
            })
            .unwrap();

        // Only one stack frame is ever active: the self-call is refused, not
        // descended into.
        assert_eq!(visits, vec![("main".to_string(), "b0".to_string())]);
        assert!(search.finished());
    }

    #[test]
    fn descending_through_a_non_choke_point_block_forbids_callee_choke_points() {
        let main_b0 = Block::new(vec!["call f0".to_string()], None, false);
        let main = Function::new("b0").with_block("b0", main_b0);
        let f0_b0 = Block::new(Vec::new(), None, true);
        let f0 = Function::new("b0").with_block("b0", f0_b0);
        let program = Program::new().with_function("main", main).with_function("f0", f0);
        let mut participation = FxHashSet::default();
        participation.insert("f0".to_string());

        let mut search =
            NeckSearch::new(program, participation, "main", PolicySet::defaults(), false).unwrap();

        let mut forbidden_at_f0 = None;
        search
            .visit_all(&mut |visit: Visit| {
                if visit.function == "f0" {
                    forbidden_at_f0 = Some(visit.forbidden);
                }
                true
            })
            .unwrap();

        assert_eq!(forbidden_at_f0, Some(true));
    }
}
