#![allow(dead_code)]

//! Replay harness for the scenario tests in `scenarios.rs`: each
//! `(function, block)` pair carries an ordered list of expected
//! `(complete_path, complete_path_summary)` pairs, one per BFS discovery of
//! that block, and the harness asserts on each dispatch before incrementing
//! that pair's visit count.

use std::collections::HashMap;

use tracing_subscriber::EnvFilter;

use neck_search::{summary::summarize_complete_path, CompletePath, PolicySet, Program, PropertyTable, Visit, Visitor};

/// Install a test-scoped tracing subscriber so `RUST_LOG=trace cargo test`
/// shows the engine's trace spans. Safe to call from every test: only the
/// first call in the process actually installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .with_test_writer()
        .try_init();
}

pub struct Expectation {
    pub complete_path: CompletePath,
    pub summary: PropertyTable,
    pub forbidden: Option<bool>,
}

impl Expectation {
    pub fn new(complete_path: CompletePath, summary: PropertyTable) -> Self {
        Self {
            complete_path,
            summary,
            forbidden: None,
        }
    }

    pub fn with_forbidden(mut self, forbidden: bool) -> Self {
        self.forbidden = Some(forbidden);
        self
    }
}

pub struct ScenarioVisitor<'a> {
    program: &'a Program,
    policies: &'a PolicySet,
    expectations: HashMap<(String, String), Vec<Expectation>>,
    visit_counts: HashMap<(String, String), usize>,
    pub visited: Vec<(String, String)>,
}

impl<'a> ScenarioVisitor<'a> {
    pub fn new(
        program: &'a Program,
        policies: &'a PolicySet,
        expectations: HashMap<(String, String), Vec<Expectation>>,
    ) -> Self {
        Self {
            program,
            policies,
            expectations,
            visit_counts: HashMap::new(),
            visited: Vec::new(),
        }
    }
}

impl Visitor for ScenarioVisitor<'_> {
    fn visit(&mut self, visit: Visit) -> bool {
        let key = (visit.function.clone(), visit.block.clone());
        self.visited.push(key.clone());

        let count = self.visit_counts.entry(key.clone()).or_insert(0);
        let summary = summarize_complete_path(self.program, &visit.complete_path, self.policies)
            .expect("scenario programs define a policy for every property they use");

        if let Some(expectations) = self.expectations.get(&key) {
            let expectation = expectations
                .get(*count)
                .unwrap_or_else(|| panic!("no expectation for visit #{count} of {key:?}"));
            assert_eq!(
                visit.complete_path, expectation.complete_path,
                "complete path mismatch at {key:?} visit #{count}"
            );
            assert_eq!(
                summary, expectation.summary,
                "complete-path summary mismatch at {key:?} visit #{count}"
            );
            if let Some(forbidden) = expectation.forbidden {
                assert_eq!(
                    visit.forbidden, forbidden,
                    "forbidden-bit mismatch at {key:?} visit #{count}"
                );
            }
        }

        *count += 1;
        true
    }
}

pub fn props(pairs: &[(&str, i64)]) -> PropertyTable {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
