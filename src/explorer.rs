use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::error::NeckSearchError;
use crate::path::{FunctionPath, PathStep};
use crate::policy::PolicySet;
use crate::program::{call_target, BlockName, FunctionName, Program, PropertyTable};
use crate::summary::{merge_basic_block_contribution, merge_exit_path_summaries, summarize_exit_path};

/// Outcome of one call to [`Explorer::expand`].
#[derive(Debug)]
pub(crate) enum ExpandOutcome {
    /// The explorer was already finished; nothing to do.
    Idle,
    /// A participating call was found; the explorer is now yielded awaiting
    /// the callee's completion.
    Yield { callee: FunctionName, inst_idx: usize },
    /// Instructions were scanned to the end and successors (if any) were
    /// enqueued.
    Expanded {
        block: BlockName,
        newly_enqueued: Vec<BlockName>,
    },
}

/// A breadth-first explorer over one function's basic-block graph. Owns the
/// BFS queue, the first-arrival parent map used to reconstruct the current
/// path, the per-block callee-summary tables synthesized from calls made in
/// that block, and the yield/resume state used to suspend mid-block when a
/// participating call is encountered.
///
/// Invariant: `yielded` and `visiting_inst_processed` are never both true at
/// once. `finished` only returns true when the queue is drained and the
/// last visit's instructions were fully scanned without yielding.
#[derive(Debug)]
pub struct Explorer {
    func_name: FunctionName,
    queue: VecDeque<BlockName>,
    observed: FxHashSet<BlockName>,
    parents: FxHashMap<BlockName, Option<BlockName>>,
    visiting: Option<BlockName>,
    visiting_inst_processed: bool,
    chokep: bool,

    yielded: bool,
    /// Instruction index to resume scanning from on the next `expand`.
    scan_cursor: usize,
    yield_at_callee: Option<FunctionName>,
    yield_at_inst_idx: Option<usize>,

    exit_paths: Vec<FunctionPath>,
    callee_summaries: FxHashMap<BlockName, PropertyTable>,

    choke_point_forbidden: bool,
}

impl Explorer {
    pub fn new(
        func_name: impl Into<FunctionName>,
        entry_block: impl Into<BlockName>,
        choke_point_forbidden: bool,
    ) -> Self {
        let func_name = func_name.into();
        let entry_block = entry_block.into();
        let mut queue = VecDeque::new();
        queue.push_back(entry_block.clone());
        let mut observed = FxHashSet::default();
        observed.insert(entry_block.clone());
        let mut parents = FxHashMap::default();
        parents.insert(entry_block, None);

        Self {
            func_name,
            queue,
            observed,
            parents,
            visiting: None,
            visiting_inst_processed: false,
            chokep: false,
            yielded: false,
            scan_cursor: 0,
            yield_at_callee: None,
            yield_at_inst_idx: None,
            exit_paths: Vec::new(),
            callee_summaries: FxHashMap::default(),
            choke_point_forbidden,
        }
    }

    pub fn func_name(&self) -> &str {
        &self.func_name
    }

    pub fn choke_point_forbidden(&self) -> bool {
        self.choke_point_forbidden
    }

    /// Choke-point flag of the block most recently returned by `visit`.
    pub fn visiting_chokep(&self) -> bool {
        self.chokep
    }

    pub fn is_yielded(&self) -> bool {
        self.yielded
    }

    pub fn yield_at_callee(&self) -> Option<&str> {
        self.yield_at_callee.as_deref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Queue drained, not yielded, and the last visit's instructions were
    /// fully processed.
    pub fn finished(&self) -> bool {
        debug_assert!(
            !(self.yielded && self.visiting_inst_processed),
            "cannot be both yielded and have processed instructions"
        );
        !self.yielded && self.queue.is_empty() && self.visiting_inst_processed
    }

    fn callee_summary_or_default(&self, block: &str) -> PropertyTable {
        self.callee_summaries.get(block).cloned().unwrap_or_default()
    }

    /// Dequeue the next pending block and record it as visiting. Observes
    /// the choke-point flag before any instruction-level expansion, so a
    /// block's choke-point status is fixed at first visit regardless of
    /// what the block's instructions later do.
    pub fn visit(&mut self, program: &Program) -> Result<(BlockName, bool), NeckSearchError> {
        if self.yielded {
            return Err(NeckSearchError::InvariantViolation(
                "cannot visit() while yielded",
            ));
        }
        let block = self
            .queue
            .pop_front()
            .ok_or(NeckSearchError::InvariantViolation(
                "visit() called with an empty queue",
            ))?;
        let chokep = program.expect_block(&self.func_name, &block).chokep;
        self.visiting = Some(block.clone());
        self.chokep = chokep;
        self.visiting_inst_processed = false;
        trace!(func = %self.func_name, block = %block, chokep, "visit");
        Ok((block, chokep))
    }

    /// The function-scoped path from entry to the currently-visiting
    /// block, recomputed fresh from the parent map each call. Must not be
    /// memoized: a later call can observe a callee-summary table that was
    /// mutated (by a callee folding its contribution back in) since the
    /// previous call.
    pub fn function_path(&self) -> FunctionPath {
        let Some(visiting) = self.visiting.as_ref() else {
            return Vec::new();
        };

        let yield_idx = if self.yielded {
            self.yield_at_inst_idx
        } else {
            None
        };

        let mut path = vec![PathStep::new(
            visiting.clone(),
            yield_idx,
            self.callee_summary_or_default(visiting),
        )];

        let mut parent = self.parents.get(visiting).cloned().flatten();
        while let Some(p) = parent {
            path.push(PathStep::new(
                p.clone(),
                None,
                self.callee_summary_or_default(&p),
            ));
            parent = self.parents.get(&p).cloned().flatten();
        }
        path.reverse();
        path
    }

    /// Scan the visiting block's instructions (from scratch, or resuming a
    /// saved cursor), yielding at the first participating call found, or
    /// enqueuing successors / recording an exit path once the scan
    /// completes without yielding.
    pub fn expand(
        &mut self,
        program: &Program,
        participation: &FxHashSet<FunctionName>,
    ) -> Result<ExpandOutcome, NeckSearchError> {
        if self.finished() {
            return Ok(ExpandOutcome::Idle);
        }

        let visiting = self
            .visiting
            .clone()
            .ok_or(NeckSearchError::InvariantViolation(
                "expand() called with nothing visiting",
            ))?;

        let start_idx = if self.yielded {
            trace!(func = %self.func_name, block = %visiting, "expand: resume");
            self.yielded = false;
            self.scan_cursor
        } else {
            if self.visiting_inst_processed {
                return Err(NeckSearchError::InvariantViolation(
                    "expand() called after instructions were already processed",
                ));
            }
            trace!(func = %self.func_name, block = %visiting, "expand: start");
            0
        };

        let block = program.expect_block(&self.func_name, &visiting);

        for idx in start_idx..block.inst.len() {
            let inst = &block.inst[idx];
            let Some(callee) = call_target(inst) else {
                continue;
            };
            if !participation.contains(callee) {
                trace!(func = %self.func_name, block = %visiting, idx, inst, "expand: non-participating call, skipped");
                continue;
            }

            self.yielded = true;
            self.scan_cursor = idx + 1;
            self.yield_at_callee = Some(callee.to_owned());
            self.yield_at_inst_idx = Some(idx);
            trace!(func = %self.func_name, block = %visiting, idx, callee, "expand: yield");
            return Ok(ExpandOutcome::Yield {
                callee: callee.to_owned(),
                inst_idx: idx,
            });
        }

        if self.visiting_inst_processed {
            return Err(NeckSearchError::InvariantViolation(
                "attempted to expand when already visited the instructions",
            ));
        }
        self.visiting_inst_processed = true;

        let newly_enqueued = match &block.succ {
            Some(succs) => {
                let mut newly = Vec::new();
                for succ in succs {
                    if self.observed.insert(succ.clone()) {
                        self.parents.insert(succ.clone(), Some(visiting.clone()));
                        self.queue.push_back(succ.clone());
                        newly.push(succ.clone());
                    }
                }
                newly
            }
            None => {
                // Leaf block: snapshot the current function-scoped path as
                // an exit path. `observed` means a leaf can only be reached
                // here on its first BFS arrival; later arrivals along a
                // different path are never expanded, so only one path per
                // leaf is ever captured.
                self.exit_paths.push(self.function_path());
                Vec::new()
            }
        };

        trace!(func = %self.func_name, block = %visiting, ?newly_enqueued, "expand: expanded");
        Ok(ExpandOutcome::Expanded {
            block: visiting,
            newly_enqueued,
        })
    }

    /// Map every captured exit path through the exit-path summary, then
    /// merge the results under the exit-merge policy. Called once this
    /// explorer is finished, to hand a single summary to its parent.
    pub fn compute_final_contribution(
        &self,
        program: &Program,
        policies: &PolicySet,
    ) -> Result<PropertyTable, NeckSearchError> {
        let mut results = Vec::with_capacity(self.exit_paths.len());
        for exit_path in &self.exit_paths {
            results.push(summarize_exit_path(
                program,
                &self.func_name,
                exit_path,
                &policies.exit_path_summary,
            )?);
        }
        merge_exit_path_summaries(&results, &policies.exit_path_merge)
    }

    /// Fold a completed callee's final contribution into the
    /// callee-summary table of the block currently being visited (the
    /// call site).
    pub fn accumulate_callee_contribution(
        &mut self,
        final_contrib: &PropertyTable,
        policies: &PolicySet,
    ) -> Result<(), NeckSearchError> {
        let visiting = self
            .visiting
            .clone()
            .ok_or(NeckSearchError::InvariantViolation(
                "accumulate_callee_contribution() called with nothing visiting",
            ))?;
        let csum = self.callee_summaries.entry(visiting).or_default();
        merge_basic_block_contribution(csum, final_contrib, &policies.block_contribution)
    }
}
