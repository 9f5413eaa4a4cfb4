// Graph fixtures and generators for integration tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tributary::lineage::{EdgeObservation, LineageEngine, ObjectKind};

/// The four-stage sales pipeline:
/// raw.sales -> staging.stg_sales -> curated.fact_sales -> analytics.mv_daily_summary
pub fn sales_pipeline() -> Vec<EdgeObservation> {
    vec![
        EdgeObservation::new(
            "raw.sales",
            ObjectKind::RawTable,
            "staging.stg_sales",
            ObjectKind::StagingTable,
            "stream+task",
        ),
        EdgeObservation::new(
            "staging.stg_sales",
            ObjectKind::StagingTable,
            "curated.fact_sales",
            ObjectKind::CuratedFact,
            "merge task",
        ),
        EdgeObservation::new(
            "curated.fact_sales",
            ObjectKind::CuratedFact,
            "analytics.mv_daily_summary",
            ObjectKind::MaterializedView,
            "materialized-view refresh",
        ),
    ]
}

/// Views wired by `(source, target)` pairs.
pub fn views(pairs: &[(&str, &str)]) -> Vec<EdgeObservation> {
    pairs
        .iter()
        .map(|(s, t)| EdgeObservation::new(*s, ObjectKind::View, *t, ObjectKind::View, "view"))
        .collect()
}

/// a -> b, a -> c, b -> d, c -> d
pub fn diamond() -> Vec<EdgeObservation> {
    views(&[
        ("g.a", "g.b"),
        ("g.a", "g.c"),
        ("g.b", "g.d"),
        ("g.c", "g.d"),
    ])
}

/// a -> b -> c -> a
pub fn cycle() -> Vec<EdgeObservation> {
    views(&[("g.a", "g.b"), ("g.b", "g.c"), ("g.c", "g.a")])
}

/// Random directed graph over `nodes` objects, cycles allowed, no self-loops.
pub fn random_graph(seed: u64, nodes: usize, edges: usize) -> Vec<EdgeObservation> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(edges);
    while out.len() < edges {
        let s = rng.gen_range(0..nodes);
        let t = rng.gen_range(0..nodes);
        if s == t {
            continue;
        }
        out.push(EdgeObservation::new(
            format!("r.n{}", s),
            ObjectKind::View,
            format!("r.n{}", t),
            ObjectKind::View,
            "view",
        ));
    }
    out
}

/// Reports every observation, panicking on rejection.
pub async fn load(engine: &LineageEngine, observations: &[EdgeObservation]) {
    let report = engine.ingestor.report_batch(observations).await;
    assert!(report.is_clean(), "fixture rejected: {:?}", report.rejected);
}
