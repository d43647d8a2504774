//! End-to-end coverage of the execution loop: propagation, joins, the
//! destination shortcut, error policy, and stall detection.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use flowmill::core::RuntimeContext;
use flowmill::error::NodeResult;
use flowmill::nodes::{NodeExecutor, NodeExecutorRegistry, NodeOutput};
use flowmill::{
    ConnectionSpec, DataBundle, ExecutionRecord, Graph, Node, Run, RunRequest, WorkflowEngine,
};

/// Executor that logs the order nodes run in and re-emits every `main`
/// input slot as its own output branch, appending the node's name to each
/// record's `path` array so a record's route stays inspectable downstream.
struct RecordingExecutor {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl NodeExecutor for RecordingExecutor {
    async fn execute(
        &self,
        node: &Node,
        input: &DataBundle,
        _context: &RuntimeContext,
    ) -> NodeResult<NodeOutput> {
        self.log.lock().unwrap().push(node.name.clone());
        let slots = input.main_slots().cloned().unwrap_or_default();
        let batches = slots
            .into_iter()
            .map(|slot| {
                let mut batch = slot.unwrap_or_default();
                for record in &mut batch {
                    if let Value::Object(map) = &mut record.json {
                        let path = map.entry("path").or_insert_with(|| Value::Array(Vec::new()));
                        if let Value::Array(steps) = path {
                            steps.push(Value::String(node.name.clone()));
                        }
                    }
                }
                batch
            })
            .collect();
        Ok(Some(batches))
    }
}

fn probe_engine(log: Arc<Mutex<Vec<String>>>) -> WorkflowEngine {
    let mut registry = NodeExecutorRegistry::new();
    registry.register("probe", Box::new(RecordingExecutor { log }));
    WorkflowEngine::builder().registry(registry).build()
}

async fn run_to_end(engine: &WorkflowEngine, graph: Graph) -> Arc<Run> {
    let handle = engine
        .run_workflow(Arc::new(graph), RunRequest::default())
        .await
        .unwrap();
    handle.wait().await
}

#[tokio::test]
async fn test_linear_flow_records_every_node() {
    let graph = Graph::new(
        vec![
            Node::new("a", "set").with_parameters(json!({"values": {"x": 1}})),
            Node::new("b", "set").with_parameters(json!({"values": {"y": 2}})),
        ],
        vec![ConnectionSpec::main("a", "b")],
    )
    .unwrap();

    let engine = WorkflowEngine::new();
    let run = run_to_end(&engine, graph).await;

    assert!(run.finished);
    assert!(run.error.is_none());
    let run_data = &run.data.result_data.run_data;
    assert_eq!(run_data["a"].len(), 1);
    assert_eq!(run_data["b"].len(), 1);
    assert_eq!(
        run.data.result_data.last_node_executed.as_deref(),
        Some("b")
    );

    let out = run_data["b"][0].data.as_ref().unwrap();
    let batch = out.first_main_batch().unwrap();
    assert_eq!(batch[0].json, json!({"x": 1, "y": 2}));
}

#[tokio::test]
async fn test_diamond_join_runs_each_node_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = probe_engine(log.clone());

    let graph = Graph::new(
        vec![
            Node::new("a", "probe"),
            Node::new("b", "probe"),
            Node::new("c", "probe"),
            Node::new("d", "probe"),
        ],
        vec![
            ConnectionSpec::main("a", "b"),
            ConnectionSpec::main("a", "c"),
            ConnectionSpec::new("b", 0, "d", 0),
            ConnectionSpec::new("c", 0, "d", 1),
        ],
    )
    .unwrap();

    let run = run_to_end(&engine, graph).await;
    assert!(run.finished);

    let order = log.lock().unwrap().clone();
    assert_eq!(order.len(), 4, "each node runs exactly once: {order:?}");
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(pos("d") > pos("b"));
    assert!(pos("d") > pos("c"));

    // The join saw both branches, in connection-index order: slot 0 came
    // through "b", slot 1 through "c".
    let d_task = &run.data.result_data.run_data["d"][0];
    let slots = d_task.data.as_ref().unwrap().main_slots().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(
        slots[0].as_ref().unwrap()[0].json["path"],
        json!(["a", "b", "d"])
    );
    assert_eq!(
        slots[1].as_ref().unwrap()[0].json["path"],
        json!(["a", "c", "d"])
    );
    assert!(
        run.data.execution_data.waiting_execution.is_empty(),
        "waiting buffer drains after promotion"
    );
}

#[tokio::test]
async fn test_destination_node_skips_unrelated_branches() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = probe_engine(log.clone());

    let graph = Graph::new(
        vec![
            Node::new("a", "probe"),
            Node::new("b", "probe"),
            Node::new("c", "probe"),
        ],
        vec![
            ConnectionSpec::main("a", "b"),
            ConnectionSpec::main("b", "c"),
        ],
    )
    .unwrap();

    let handle = engine
        .run_workflow(
            Arc::new(graph),
            RunRequest {
                destination_node: Some("b".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let run = handle.wait().await;

    assert!(run.finished);
    let run_data = &run.data.result_data.run_data;
    assert!(run_data.contains_key("a"));
    assert!(run_data.contains_key("b"));
    assert!(!run_data.contains_key("c"), "past-destination node must not run");
    assert_eq!(
        run.data.result_data.last_node_executed.as_deref(),
        Some("b")
    );
}

#[tokio::test]
async fn test_continue_on_fail_passes_input_through() {
    let graph = Graph::new(
        vec![
            Node::new("a", "set").with_parameters(json!({"values": {"x": 1}})),
            Node::new("f", "fail")
                .with_parameters(json!({"message": "boom"}))
                .continue_on_fail(),
            Node::new("c", "no-op"),
        ],
        vec![
            ConnectionSpec::main("a", "f"),
            ConnectionSpec::main("f", "c"),
        ],
    )
    .unwrap();

    let engine = WorkflowEngine::new();
    let run = run_to_end(&engine, graph).await;

    assert!(run.finished, "recovered failure must not halt the run");
    let run_data = &run.data.result_data.run_data;

    let f_task = &run_data["f"][0];
    assert!(f_task.error.is_some(), "the error is still recorded");
    let forwarded = f_task.data.as_ref().unwrap().first_main_batch().unwrap();
    assert_eq!(forwarded[0].json, json!({"x": 1}));

    // Downstream executed with the pass-through data.
    let c_out = run_data["c"][0].data.as_ref().unwrap();
    assert_eq!(c_out.first_main_batch().unwrap()[0].json, json!({"x": 1}));
}

#[tokio::test]
async fn test_failure_halts_and_requeues_at_front() {
    let graph = Graph::new(
        vec![
            Node::new("a", "no-op"),
            Node::new("f", "fail").with_parameters(json!({"message": "boom"})),
            Node::new("c", "no-op"),
        ],
        vec![
            ConnectionSpec::main("a", "f"),
            ConnectionSpec::main("f", "c"),
        ],
    )
    .unwrap();

    let engine = WorkflowEngine::new();
    let run = run_to_end(&engine, graph).await;

    assert!(!run.finished);
    assert!(run.error.is_none(), "a node failure is not an engine fault");
    let error = run.data.result_data.error.as_ref().unwrap();
    assert!(error.message.contains("boom"));

    let run_data = &run.data.result_data.run_data;
    assert!(run_data["f"][0].error.is_some());
    assert!(!run_data.contains_key("c"), "downstream must not run after halt");

    // The failed unit sits at the front of the preserved stack, ready for a
    // later resume.
    let front = run.data.execution_data.node_execution_stack.front().unwrap();
    assert_eq!(front.node, "f");
}

#[tokio::test]
async fn test_empty_success_ends_the_branch() {
    let graph = Graph::new(
        vec![
            Node::new("a", "no-op"),
            Node::new("d", "drop"),
            Node::new("c", "no-op"),
        ],
        vec![
            ConnectionSpec::main("a", "d"),
            ConnectionSpec::main("d", "c"),
        ],
    )
    .unwrap();

    let engine = WorkflowEngine::new();
    let run = run_to_end(&engine, graph).await;

    assert!(run.finished);
    let run_data = &run.data.result_data.run_data;
    assert!(run_data.contains_key("a"));
    assert!(!run_data.contains_key("d"), "empty success records no task");
    assert!(!run_data.contains_key("c"), "nothing propagates past the drop");
}

#[tokio::test]
async fn test_unsatisfiable_input_is_detected_as_stall() {
    // "b" only listens on its second input slot; starting it directly leaves
    // that slot forever empty, so it bounces on the stack until detected.
    let graph = Graph::new(
        vec![Node::new("a", "no-op"), Node::new("b", "no-op")],
        vec![ConnectionSpec::new("a", 0, "b", 1)],
    )
    .unwrap();

    let engine = WorkflowEngine::new();
    let handle = engine
        .run_workflow(
            Arc::new(graph),
            RunRequest {
                start_nodes: Some(vec!["b".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let run = handle.wait().await;

    assert!(!run.finished);
    let error = run.error.as_ref().expect("stall is an engine fault");
    assert!(error.message.contains('b'), "fault names the stuck node: {error}");
    assert!(run.data.result_data.run_data.is_empty());
}

#[tokio::test]
async fn test_disabled_node_is_a_transparent_wire() {
    let graph = Graph::new(
        vec![
            Node::new("a", "set").with_parameters(json!({"values": {"x": 1}})),
            Node::new("b", "fail")
                .with_parameters(json!({"message": "must never run"}))
                .disabled(),
            Node::new("c", "no-op"),
        ],
        vec![
            ConnectionSpec::main("a", "b"),
            ConnectionSpec::main("b", "c"),
        ],
    )
    .unwrap();

    let engine = WorkflowEngine::new();
    let run = run_to_end(&engine, graph).await;

    assert!(run.finished);
    let run_data = &run.data.result_data.run_data;
    assert!(run_data["b"][0].error.is_none());
    let c_out = run_data["c"][0].data.as_ref().unwrap();
    assert_eq!(c_out.first_main_batch().unwrap()[0].json, json!({"x": 1}));
}

#[tokio::test]
async fn test_if_node_routes_per_record() {
    let graph = Graph::new(
        vec![
            Node::new("cond", "if").with_parameters(json!({"field": "keep"})),
            Node::new("yes", "no-op"),
            Node::new("no", "no-op"),
        ],
        vec![
            ConnectionSpec::new("cond", 0, "yes", 0),
            ConnectionSpec::new("cond", 1, "no", 0),
        ],
    )
    .unwrap();

    let engine = WorkflowEngine::new();
    let seed = vec![
        ExecutionRecord::from_json(json!({"keep": true, "id": 1})),
        ExecutionRecord::from_json(json!({"keep": false, "id": 2})),
        ExecutionRecord::from_json(json!({"keep": true, "id": 3})),
    ];
    let handle = engine
        .run_workflow(
            Arc::new(graph),
            RunRequest {
                seed_data: Some(seed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let run = handle.wait().await;

    assert!(run.finished);
    let run_data = &run.data.result_data.run_data;
    let yes = run_data["yes"][0].data.as_ref().unwrap();
    let no = run_data["no"][0].data.as_ref().unwrap();
    assert_eq!(yes.first_main_batch().unwrap().len(), 2);
    assert_eq!(no.first_main_batch().unwrap().len(), 1);
    assert_eq!(no.first_main_batch().unwrap()[0].json["id"], json!(2));
}
