//! Runs a small branching workflow and prints the streamed events plus the
//! final per-node results.
//!
//! ```sh
//! cargo run --example engine_demo
//! ```

use std::sync::Arc;

use serde_json::json;

use flowmill::core::{create_event_channel, HookRegistry, PushHook, RuntimeContext};
use flowmill::{ConnectionSpec, ExecutionRecord, Graph, Node, RunRequest, WorkflowEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let graph = Arc::new(Graph::new(
        vec![
            Node::new("enrich", "set").with_parameters(json!({"values": {"source": "demo"}})),
            Node::new("route", "if").with_parameters(json!({"field": "important"})),
            Node::new("urgent", "set").with_parameters(json!({"values": {"queue": "urgent"}})),
            Node::new("bulk", "set").with_parameters(json!({"values": {"queue": "bulk"}})),
        ],
        vec![
            ConnectionSpec::main("enrich", "route"),
            ConnectionSpec::new("route", 0, "urgent", 0),
            ConnectionSpec::new("route", 1, "bulk", 0),
        ],
    )?);

    let (tx, mut rx) = create_event_channel();
    let context = RuntimeContext::default();
    let mut hooks = HookRegistry::new();
    hooks.register(Arc::new(PushHook::new(tx, context.time_provider.clone())));

    let engine = WorkflowEngine::builder()
        .hooks(hooks)
        .context(context)
        .build();

    let seed = vec![
        ExecutionRecord::from_json(json!({"id": 1, "important": true})),
        ExecutionRecord::from_json(json!({"id": 2, "important": false})),
        ExecutionRecord::from_json(json!({"id": 3, "important": true})),
    ];

    let handle = engine
        .run_workflow(
            graph,
            RunRequest {
                seed_data: Some(seed),
                ..Default::default()
            },
        )
        .await?;
    println!("execution id: {}", handle.id());

    let run = handle.wait().await;

    while let Ok(event) = rx.try_recv() {
        println!("event: {}", serde_json::to_string(&event)?);
    }

    println!("finished: {}", run.finished);
    for (node, tasks) in &run.data.result_data.run_data {
        for task in tasks {
            let items = task
                .data
                .as_ref()
                .and_then(|bundle| bundle.first_main_batch())
                .map_or(0, Vec::len);
            println!("{node}: {items} item(s) in {} ms", task.execution_time);
        }
    }

    Ok(())
}
