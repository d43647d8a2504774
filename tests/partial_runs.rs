//! Resuming runs from recorded results with `run_from_nodes`.

use std::sync::Arc;

use serde_json::json;

use flowmill::error::WorkflowError;
use flowmill::{
    ConnectionSpec, ExecutionMode, Graph, Node, PartialRunRequest, RunRequest, WorkflowEngine,
};

fn chain_graph() -> Graph {
    Graph::new(
        vec![
            Node::new("a", "set").with_parameters(json!({"values": {"x": 1}})),
            Node::new("b", "set").with_parameters(json!({"values": {"y": 2}})),
            Node::new("c", "no-op"),
        ],
        vec![
            ConnectionSpec::main("a", "b"),
            ConnectionSpec::main("b", "c"),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn test_resume_matches_full_run_output() {
    let engine = WorkflowEngine::new();

    let full = engine
        .run_workflow(Arc::new(chain_graph()), RunRequest::default())
        .await
        .unwrap()
        .wait()
        .await;
    assert!(full.finished);
    let full_c = full.data.result_data.run_data["c"][0]
        .data
        .as_ref()
        .unwrap()
        .first_main_batch()
        .unwrap()
        .clone();

    // Keep only "a"'s results and re-execute from "b".
    let mut run_data = full.data.result_data.run_data.clone();
    run_data.remove("b");
    run_data.remove("c");

    let resumed = engine
        .run_from_nodes(
            Arc::new(chain_graph()),
            PartialRunRequest {
                mode: ExecutionMode::Retry,
                run_data,
                start_nodes: vec!["b".to_string()],
                destination_node: None,
            },
        )
        .await
        .unwrap()
        .wait()
        .await;

    assert!(resumed.finished);
    let resumed_data = &resumed.data.result_data.run_data;
    assert_eq!(resumed_data["a"].len(), 1, "past results are preserved");
    assert_eq!(resumed_data["b"].len(), 1);
    let resumed_c = resumed_data["c"][0]
        .data
        .as_ref()
        .unwrap()
        .first_main_batch()
        .unwrap();
    assert_eq!(resumed_c, &full_c);
}

#[tokio::test]
async fn test_resume_without_source_data_is_rejected() {
    let engine = WorkflowEngine::new();

    let result = engine
        .run_from_nodes(
            Arc::new(chain_graph()),
            PartialRunRequest {
                mode: ExecutionMode::Retry,
                run_data: Default::default(),
                start_nodes: vec!["b".to_string()],
                destination_node: None,
            },
        )
        .await;

    match result {
        Err(WorkflowError::MissingRunData { node }) => assert_eq!(node, "a"),
        other => panic!("expected MissingRunData, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resume_prefills_join_from_recorded_results() {
    let diamond = || {
        Graph::new(
            vec![
                Node::new("a", "set").with_parameters(json!({"values": {"x": 1}})),
                Node::new("b", "set").with_parameters(json!({"values": {"from": "b"}})),
                Node::new("c", "set").with_parameters(json!({"values": {"from": "c"}})),
                Node::new("d", "no-op"),
            ],
            vec![
                ConnectionSpec::main("a", "b"),
                ConnectionSpec::main("a", "c"),
                ConnectionSpec::new("b", 0, "d", 0),
                ConnectionSpec::new("c", 0, "d", 1),
            ],
        )
        .unwrap()
    };

    let engine = WorkflowEngine::new();
    let full = engine
        .run_workflow(Arc::new(diamond()), RunRequest::default())
        .await
        .unwrap()
        .wait()
        .await;
    assert!(full.finished);

    // Re-run only the "c" branch towards "d": "b"'s slot comes from the
    // recorded results, "c" supplies its own on completion.
    let mut run_data = full.data.result_data.run_data.clone();
    run_data.remove("c");
    run_data.remove("d");

    let resumed = engine
        .run_from_nodes(
            Arc::new(diamond()),
            PartialRunRequest {
                mode: ExecutionMode::Retry,
                run_data,
                start_nodes: vec!["c".to_string()],
                destination_node: Some("d".to_string()),
            },
        )
        .await
        .unwrap()
        .wait()
        .await;

    assert!(resumed.finished);
    let resumed_data = &resumed.data.result_data.run_data;
    assert_eq!(resumed_data["c"].len(), 1);
    assert_eq!(resumed_data["d"].len(), 1, "join promoted from mixed slots");

    // The join's first slot carries "b"'s recorded output.
    let d_out = resumed_data["d"][0].data.as_ref().unwrap();
    let first = d_out.first_main_batch().unwrap();
    assert_eq!(first[0].json["from"], json!("b"));
    assert!(resumed.data.execution_data.waiting_execution.is_empty());
}

#[tokio::test]
async fn test_resume_from_unknown_node_is_rejected() {
    let engine = WorkflowEngine::new();
    let result = engine
        .run_from_nodes(
            Arc::new(chain_graph()),
            PartialRunRequest {
                mode: ExecutionMode::Manual,
                run_data: Default::default(),
                start_nodes: vec!["ghost".to_string()],
                destination_node: None,
            },
        )
        .await;

    assert!(matches!(result, Err(WorkflowError::NodeNotFound(name)) if name == "ghost"));
}
