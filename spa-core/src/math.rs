/// Type alias for sets, we use this to hide which type of `HashSet` we are actually using.
/// Iteration follows insertion order, which keeps query orders and discovered procedures
/// reproducible between runs.
pub type Set<S> = indexmap::IndexSet<S>;

/// Type alias for maps, iterated in insertion order.
pub type Map<K, V> = indexmap::IndexMap<K, V>;
