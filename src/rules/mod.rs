// Detection rules, kept apart from the pipeline so the tables can evolve
// without touching scanner plumbing.

/// Security-relevant call and import patterns with their severity taxonomy.
pub mod danger;

/// Route-registration idioms marking externally exposed entry points.
pub mod routes;
