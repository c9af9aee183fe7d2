//! Compiler benchmarks using divan
//!
//! Benchmarks for each compilation stage over queries of growing complexity.

use aql::{AqlCompiler, QueryRequest};
use std::sync::LazyLock;

fn main() {
    divan::main();
}

static COMPILER: LazyLock<AqlCompiler> =
    LazyLock::new(|| AqlCompiler::with_defaults().expect("default compiler"));

const SIMPLE: &str = "SELECT c/uid/value FROM EHR e CONTAINS COMPOSITION c";

const OBSERVATION: &str = "SELECT o/data[at0001]/events[at0006]/data[at0003]/items[at0004]/value/magnitude \
    FROM EHR e CONTAINS COMPOSITION c CONTAINS OBSERVATION o[openEHR-EHR-OBSERVATION.blood_pressure.v2] \
    WHERE o/data[at0001]/events[at0006]/data[at0003]/items[at0004]/value/magnitude > 140";

const ALTERNATIVES: &str = "SELECT c/uid/value, ev/name/value \
    FROM EHR e CONTAINS COMPOSITION c CONTAINS ((OBSERVATION o CONTAINS CLUSTER cl) OR EVALUATION ev) \
    WHERE cl/name/value = 'Values' ORDER BY ev/name/value";

const AGGREGATE: &str = "SELECT c/name/value, COUNT(o/uid/value) \
    FROM EHR e CONTAINS COMPOSITION c CONTAINS OBSERVATION o";

// === Parsing ===

mod parse {
    use super::*;

    #[divan::bench(args = [SIMPLE, OBSERVATION, ALTERNATIVES])]
    fn query(bencher: divan::Bencher, aql: &str) {
        bencher.bench_local(|| aql::parse(divan::black_box(aql)));
    }
}

// === Analysis ===

mod analyze {
    use super::*;

    #[divan::bench(args = [SIMPLE, OBSERVATION, ALTERNATIVES])]
    fn path_cohesion(bencher: divan::Bencher, aql: &str) {
        bencher.bench_local(|| COMPILER.analyze(divan::black_box(aql)));
    }
}

// === Full compilation ===

mod compile {
    use super::*;

    #[divan::bench(args = [SIMPLE, OBSERVATION, ALTERNATIVES, AGGREGATE])]
    fn to_sql(bencher: divan::Bencher, aql: &str) {
        let request = QueryRequest::new();
        bencher.bench_local(|| COMPILER.compile(divan::black_box(aql), &request));
    }

    #[divan::bench]
    fn plan_only(bencher: divan::Bencher) {
        let query = COMPILER
            .prepare(ALTERNATIVES, &QueryRequest::new())
            .expect("valid query");
        bencher.bench_local(|| COMPILER.plan(divan::black_box(&query)));
    }
}
