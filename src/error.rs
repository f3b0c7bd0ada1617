/// Error type for neck-search failures.
///
/// Every variant here corresponds to a programmer/configuration fault, not
/// ordinary control flow: a refused recursion, a call to a
/// non-participating function, or reaching a leaf block are not errors and
/// never construct one.
#[derive(Debug, thiserror::Error)]
pub enum NeckSearchError {
    /// A property was encountered in a block's static properties with no
    /// corresponding entry in the named policy map.
    #[error("no {policy} policy registered for property {property:?}")]
    MissingPolicy {
        policy: &'static str,
        property: String,
    },
    /// A call instruction named a function that is in the participation
    /// set but absent from the program's function table.
    #[error("participating function {function:?} has no entry in the program")]
    UnknownCallee { function: String },
    /// An internal state invariant was violated. This indicates a bug in
    /// the engine itself (or a caller reaching into `Explorer` directly in
    /// an unsupported order); it should never occur when the engine is
    /// only driven through `NeckSearch`.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}
