use rustc_hash::FxHashMap;

/// A function name in the analyzed program.
pub type FunctionName = String;

/// A basic-block name, scoped to the function that owns it.
pub type BlockName = String;

/// A map from property name to accumulated integer value.
///
/// The identity element is the empty map: a property absent from a
/// [`PropertyTable`] contributes nothing until some policy introduces it.
pub type PropertyTable = FxHashMap<String, i64>;

/// One basic block: its instruction stream, successors, choke-point flag,
/// and static per-property contribution.
///
/// Only two things about `inst` are semantically significant to the
/// engine: whether a given instruction string contains the literal
/// substring `"call"`, and, if so, its last whitespace-separated token
/// (read as a callee function name). Everything else about the
/// instruction stream is opaque.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub inst: Vec<String>,
    /// `None` marks a leaf (no-successor, typically return/exit) block.
    pub succ: Option<Vec<BlockName>>,
    pub chokep: bool,
    pub props: PropertyTable,
}

impl Block {
    pub fn new(inst: Vec<String>, succ: Option<Vec<BlockName>>, chokep: bool) -> Self {
        Self {
            inst,
            succ,
            chokep,
            props: PropertyTable::default(),
        }
    }

    pub fn with_props(mut self, props: PropertyTable) -> Self {
        self.props = props;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.succ.is_none()
    }
}

/// One function: its entry block and the block graph it owns.
#[derive(Clone, Debug, Default)]
pub struct Function {
    pub entry: BlockName,
    pub bbs: FxHashMap<BlockName, Block>,
}

impl Function {
    pub fn new(entry: impl Into<BlockName>) -> Self {
        Self {
            entry: entry.into(),
            bbs: FxHashMap::default(),
        }
    }

    pub fn with_block(mut self, name: impl Into<BlockName>, block: Block) -> Self {
        self.bbs.insert(name.into(), block);
        self
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.bbs.get(name)
    }
}

/// The program the search walks: a function table keyed by function name.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub functions: FxHashMap<FunctionName, Function>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, name: impl Into<FunctionName>, function: Function) -> Self {
        self.functions.insert(name.into(), function);
        self
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Look up a block inside a named function. Panics if either name is
    /// absent — the engine only ever calls this with names it has already
    /// validated (the entry function at construction, a participating
    /// callee it has already resolved via [`NeckSearchError::UnknownCallee`]).
    pub(crate) fn expect_block(&self, func: &str, block: &str) -> &Block {
        self.functions
            .get(func)
            .and_then(|f| f.bbs.get(block))
            .unwrap_or_else(|| panic!("program has no block {func}@{block}"))
    }

    pub(crate) fn expect_entry(&self, func: &str) -> &str {
        &self
            .functions
            .get(func)
            .unwrap_or_else(|| panic!("program has no function {func}"))
            .entry
    }
}

/// Extract the callee name from an instruction string, if it is a call.
///
/// The literal substring `"call"` anywhere in the instruction marks it as
/// a call, and the callee name is the last whitespace-separated token.
pub(crate) fn call_target(inst: &str) -> Option<&str> {
    if !inst.contains("call") {
        return None;
    }
    inst.split_whitespace().last()
}
