//! Behavioral properties of propagation and diffusion, exercised through the
//! public engine API.

use std::sync::Arc;

use chrono::{Duration, Utc};
use conceptflow_core::assessment::AssessmentProcessor;
use conceptflow_core::diffusion::DiffusionEngine;
use conceptflow_core::store::UserStates;
use conceptflow_core::traits::RecordingSink;
use conceptflow_core::{
    ConceptEdge, ConceptGraph, ConceptNode, EdgeType, EngineConfig, KnowledgeEngine,
    KnowledgeError, KnowledgeLevel, NodeType,
};

fn node(id: &str) -> ConceptNode {
    ConceptNode {
        id: id.into(),
        label: id.to_uppercase(),
        domain: "math".into(),
        level: 1,
        difficulty: 2,
        node_type: NodeType::Concept,
    }
}

fn edge(source: &str, target: &str, edge_type: EdgeType, weight: f64) -> ConceptEdge {
    ConceptEdge {
        source: source.into(),
        target: target.into(),
        edge_type,
        weight,
    }
}

fn graph(ids: &[&str], edges: Vec<ConceptEdge>) -> Arc<ConceptGraph> {
    Arc::new(ConceptGraph::load(ids.iter().map(|id| node(id)).collect(), edges).unwrap())
}

fn engine(graph: Arc<ConceptGraph>) -> KnowledgeEngine {
    let config = EngineConfig {
        diffuse_after_assessment: false,
        ..Default::default()
    };
    KnowledgeEngine::new(graph, config).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn chain_scenario() {
    let engine = engine(graph(
        &["a", "b", "c"],
        vec![
            edge("a", "b", EdgeType::Prerequisite, 0.8),
            edge("b", "c", EdgeType::Prerequisite, 0.5),
        ],
    ));

    let outcome = engine.process_assessment("u1", "a", 1.0).unwrap();
    assert_eq!(outcome.updated_state.knowledge_state, KnowledgeLevel::Known);
    assert!(close(outcome.propagated[0].value, 0.24));
    assert!(close(outcome.propagated[1].value, 0.045));

    let b = engine.state("u1", "b").unwrap().unwrap();
    let c = engine.state("u1", "c").unwrap().unwrap();
    assert_eq!(b.knowledge_state, KnowledgeLevel::Unknown);
    assert_eq!(c.knowledge_state, KnowledgeLevel::Unknown);
}

#[test]
fn diffusion_scenario_never_lowers_partial_node() {
    let g = graph(
        &["a", "b", "c"],
        vec![
            edge("a", "b", EdgeType::Prerequisite, 0.8),
            edge("b", "c", EdgeType::Prerequisite, 0.5),
        ],
    );
    let engine = engine(Arc::clone(&g));
    let now = Utc::now();
    engine.store().set_at("u1", "b", 0.5, 0.5, now).unwrap();
    engine.store().set_at("u1", "c", 0.0, 0.0, now).unwrap();
    let before = engine.state("u1", "b").unwrap().unwrap().continuous();

    engine.run_diffusion_pass("u1", 0.3).unwrap();

    let after = engine.state("u1", "b").unwrap().unwrap();
    assert!(after.continuous() >= before);
    assert_eq!(after.knowledge_state, KnowledgeLevel::Partial);
}

#[test]
fn propagated_and_diffused_values_are_monotone() {
    let g = graph(
        &["a", "b", "c", "d"],
        vec![
            edge("a", "b", EdgeType::Related, 0.9),
            edge("b", "c", EdgeType::Prerequisite, 0.6),
            edge("c", "d", EdgeType::EquivalentTo, 0.7),
        ],
    );
    let engine = engine(g);
    engine.process_assessment("u1", "b", 1.0).unwrap();
    engine.process_assessment("u1", "d", 0.5).unwrap();

    let values = |engine: &KnowledgeEngine, skip: &str| -> Vec<(String, f64)> {
        engine
            .graph()
            .nodes()
            .iter()
            .filter(|n| n.id != skip)
            .map(|n| {
                let v = engine
                    .state("u1", &n.id)
                    .unwrap()
                    .map_or(0.0, |s| s.continuous());
                (n.id.clone(), v)
            })
            .collect()
    };

    // every node except the one directly tested must hold or rise
    let before = values(&engine, "a");
    engine.process_assessment("u1", "a", 0.0).unwrap();
    for ((id, old), (_, new)) in before.iter().zip(values(&engine, "a")) {
        assert!(new >= *old - 1e-12, "{id} dropped from {old} to {new}");
    }

    let before = values(&engine, "");
    for alpha in [0.0, 0.3, 1.0] {
        engine.run_diffusion_pass("u1", alpha).unwrap();
    }
    for ((id, old), (_, new)) in before.iter().zip(values(&engine, "")) {
        assert!(new >= *old - 1e-12, "{id} dropped from {old} to {new}");
    }
}

#[test]
fn quantization_boundaries() {
    assert_eq!(KnowledgeLevel::quantize(0.2499), KnowledgeLevel::Unknown);
    assert_eq!(KnowledgeLevel::quantize(0.25), KnowledgeLevel::Partial);
    assert_eq!(KnowledgeLevel::quantize(0.7499), KnowledgeLevel::Partial);
    assert_eq!(KnowledgeLevel::quantize(0.75), KnowledgeLevel::Known);
}

#[test]
fn diffusion_on_empty_state_leaves_everything_unknown() {
    let g = graph(
        &["a", "b", "c"],
        vec![
            edge("a", "b", EdgeType::Related, 1.0),
            edge("b", "c", EdgeType::Related, 1.0),
        ],
    );
    let engine = engine(g);
    let summary = engine.run_diffusion_pass("u1", 0.3).unwrap();
    assert!(summary.written.is_empty());

    let view = engine.user_view("u1").unwrap();
    assert!(view
        .nodes
        .iter()
        .all(|n| n.knowledge_state == KnowledgeLevel::Unknown));
}

#[test]
fn first_known_at_survives_later_failures() {
    let engine = engine(graph(&["a"], vec![]));
    let t0 = Utc::now();
    engine
        .process_assessment_at("u1", "a", 1.0, t0)
        .unwrap();
    engine
        .process_assessment_at("u1", "a", 0.0, t0 + Duration::hours(1))
        .unwrap();
    engine
        .process_assessment_at("u1", "a", 1.0, t0 + Duration::hours(2))
        .unwrap();

    let a = engine.state("u1", "a").unwrap().unwrap();
    assert_eq!(a.first_known_at, Some(t0));
}

#[test]
fn diamond_node_is_updated_once_at_shallowest_depth() {
    // a -> b -> d and a -> c -> e -> d
    let g = graph(
        &["a", "b", "c", "d", "e"],
        vec![
            edge("a", "b", EdgeType::Prerequisite, 1.0),
            edge("b", "d", EdgeType::Prerequisite, 1.0),
            edge("a", "c", EdgeType::Prerequisite, 1.0),
            edge("c", "e", EdgeType::Prerequisite, 1.0),
            edge("e", "d", EdgeType::Prerequisite, 1.0),
        ],
    );
    let mut states = UserStates::new("u1");
    let outcome = AssessmentProcessor::new(0.3, 3)
        .process(&g, &mut states, "a", KnowledgeLevel::Known, Utc::now())
        .unwrap();

    let d: Vec<_> = outcome
        .propagated
        .iter()
        .filter(|p| p.node_id == "d")
        .collect();
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].depth, 2);
    assert!(close(d[0].value, 0.09));
    assert_eq!(outcome.propagated.len(), 4);
}

#[test]
fn prerequisite_edges_flow_one_way() {
    let engine = engine(graph(
        &["a", "b"],
        vec![edge("a", "b", EdgeType::Prerequisite, 0.8)],
    ));
    let outcome = engine.process_assessment("u1", "b", 1.0).unwrap();
    assert!(outcome.propagated.is_empty());
    assert!(engine.state("u1", "a").unwrap().is_none());
}

#[test]
fn related_and_equivalent_edges_flow_both_ways() {
    for edge_type in [EdgeType::Related, EdgeType::EquivalentTo] {
        let engine = engine(graph(&["a", "b"], vec![edge("a", "b", edge_type, 0.8)]));
        let outcome = engine.process_assessment("u1", "b", 1.0).unwrap();
        assert_eq!(outcome.affected_node_ids(), vec!["a"], "{edge_type}");
    }
}

#[test]
fn rejected_inputs_leave_no_rows() {
    let engine = engine(graph(&["a", "b"], vec![edge("a", "b", EdgeType::Related, 0.5)]));
    assert_eq!(
        engine.process_assessment("u1", "a", 0.25).unwrap_err(),
        KnowledgeError::InvalidResult(0.25)
    );
    assert_eq!(
        engine.process_assessment("u1", "zzz", 1.0).unwrap_err(),
        KnowledgeError::NoSuchNode("zzz".into())
    );
    assert_eq!(
        engine.run_diffusion_pass("u1", f64::NAN).unwrap_err().to_string(),
        KnowledgeError::InvalidAlpha(f64::NAN).to_string()
    );
    assert!(engine.store().snapshot("u1").unwrap().is_none());
}

#[test]
fn bad_graphs_are_rejected_whole() {
    let err = ConceptGraph::load(
        vec![node("a"), node("b")],
        vec![
            edge("a", "b", EdgeType::Related, 0.5),
            edge("b", "missing", EdgeType::Related, 0.5),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, KnowledgeError::DanglingEdge { .. }));

    let err = ConceptGraph::load(vec![node("a")], vec![edge("a", "a", EdgeType::Related, 0.5)])
        .unwrap_err();
    assert_eq!(err, KnowledgeError::SelfLoop("a".into()));
}

#[test]
fn sink_receives_rows_in_write_order() {
    let g = graph(
        &["a", "b", "c"],
        vec![
            edge("a", "b", EdgeType::Prerequisite, 0.8),
            edge("b", "c", EdgeType::Prerequisite, 0.5),
        ],
    );
    let sink = Arc::new(RecordingSink::new());
    let engine = KnowledgeEngine::new(g, EngineConfig::default())
        .unwrap()
        .with_sink(sink.clone());

    let outcome = engine.process_assessment("u1", "a", 1.0).unwrap();
    let written = outcome.diffusion.map(|d| d.written).unwrap_or_default();

    let rows = sink.rows();
    assert_eq!(rows.len(), 3 + written.len());
    assert!(rows.iter().all(|r| r.user_id == "u1"));
    assert_eq!(rows[0].node_id, "a");
}

#[test]
fn one_pass_reads_only_pre_pass_values() {
    let g = graph(
        &["a", "b", "c"],
        vec![
            edge("a", "b", EdgeType::Prerequisite, 1.0),
            edge("b", "c", EdgeType::Prerequisite, 1.0),
        ],
    );
    let mut states = UserStates::new("u1");
    states.upsert("a", 1.0, 1.0, Utc::now());

    let summary = DiffusionEngine::new(0.0)
        .unwrap()
        .run_pass(&g, &mut states, Utc::now());
    assert_eq!(summary.raised, vec!["b".to_string()]);
    assert!(states.get("c").is_none());
}
