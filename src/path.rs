use crate::program::{BlockName, FunctionName, PropertyTable};

/// One step of a function-scoped path: the block visited, the instruction
/// index a yield happened at (if any — only ever set on the final step of
/// a *currently yielded* explorer's path), and the callee-summary table
/// this block has accumulated so far from calls made inside it.
///
/// Owned, not borrowed: a `PathStep` captured inside an
/// [`crate::explorer::Explorer`]'s `exit_paths` is a deep snapshot taken at
/// BFS discovery time, and must not change when the live callee-summary
/// table it was copied from is later mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub block: BlockName,
    pub yield_inst_idx: Option<usize>,
    pub callee_summary: PropertyTable,
}

impl PathStep {
    pub fn new(
        block: impl Into<BlockName>,
        yield_inst_idx: Option<usize>,
        callee_summary: PropertyTable,
    ) -> Self {
        Self {
            block: block.into(),
            yield_inst_idx,
            callee_summary,
        }
    }
}

/// A path from a function's entry block to its currently-visiting block,
/// ordered root-to-leaf.
pub type FunctionPath = Vec<PathStep>;

/// The full search-stack path: one `(function name, function-scoped path)`
/// pair per explorer on the stack, ordered root-to-leaf. The last pair's
/// final step names the block currently being visited.
pub type CompletePath = Vec<(FunctionName, FunctionPath)>;
