use crate::path::CompletePath;
use crate::program::{BlockName, FunctionName};

/// Everything the engine hands a visitor at one block visit.
#[derive(Debug, Clone)]
pub struct Visit {
    pub function: FunctionName,
    pub block: BlockName,
    pub chokep: bool,
    /// True if some ancestor on the current function stack was entered
    /// from a non-choke-point block of its parent — choke points visited
    /// under this flag are not candidate necks.
    pub forbidden: bool,
    pub complete_path: CompletePath,
}

/// A caller-supplied visitor. Returning `false` stops a `visit_all` loop;
/// the engine imposes no other semantics on the return value.
///
/// The visitor must not call back into the engine — it is invoked
/// synchronously on the driving thread and the engine is not reentrant.
pub trait Visitor {
    fn visit(&mut self, visit: Visit) -> bool;
}

impl<F> Visitor for F
where
    F: FnMut(Visit) -> bool,
{
    fn visit(&mut self, visit: Visit) -> bool {
        self(visit)
    }
}
