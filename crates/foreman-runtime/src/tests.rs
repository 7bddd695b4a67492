//! Runtime unit tests: the facade, delegation, and failure taxonomy.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use foreman_approval::{ApprovalMode, ApprovalPolicy, DecisionProvider};
use foreman_core::{RunId, ToolsetScope, Verbosity, WorkerSpec};
use foreman_events::EventBus;
use foreman_llm::{MessageRole, ModelResponse, Usage};
use foreman_test::{
    ApproveAllDecisions, DeferAllDecisions, DenyAllDecisions, ScriptedProvider, delegate_call,
    register_kv, tool_call,
};
use foreman_toolset::InstanceProvider;

use crate::config::RunConfig;
use crate::context::{ExecutionContext, RunPhase};
use crate::error::RuntimeError;
use crate::frame::CallFrame;
use crate::registry::ToolRegistry;
use crate::runtime::Runtime;
use crate::usage::UsageCollector;
use crate::worker::WorkerOutput;

fn runtime(
    model: Arc<ScriptedProvider>,
    provider: Arc<InstanceProvider>,
    decisions: Arc<dyn DecisionProvider>,
) -> Runtime {
    Runtime::new(model, provider, decisions)
}

// ---------------------------------------------------------------------------
// Plain turns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_plain_text_run() {
    let model = Arc::new(ScriptedProvider::new().script(
        "Answer plainly",
        vec![ModelResponse::text("hello").with_usage(Usage::new(10, 2))],
    ));
    let runtime = runtime(
        Arc::clone(&model),
        Arc::new(InstanceProvider::new()),
        Arc::new(ApproveAllDecisions::new()),
    );

    let entry = WorkerSpec::new("echo", "Answer plainly.");
    let outcome = runtime.execute(&entry, "hi".into()).await.unwrap();

    assert_eq!(outcome.output, WorkerOutput::Text("hello".to_string()));
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.messages[0].role, MessageRole::User);
    assert_eq!(outcome.messages[1].text(), Some("hello"));
    assert_eq!(outcome.usage.len(), 1);
    assert_eq!(outcome.usage[0].depth, 0);
    assert_eq!(outcome.totals.input_tokens, 10);
}

#[tokio::test]
async fn test_tool_call_flow_and_events() {
    let provider = Arc::new(InstanceProvider::new());
    register_kv(&provider, "store", ToolsetScope::Call);

    let model = Arc::new(ScriptedProvider::new().script(
        "Use the store",
        vec![
            ModelResponse::tool_calls(vec![tool_call("c1", "open", serde_json::json!({}))]),
            ModelResponse::text("done"),
        ],
    ));

    let events = EventBus::new();
    let mut receiver = events.subscribe();
    let runtime = runtime(model, provider, Arc::new(ApproveAllDecisions::new()))
        .with_approval_mode(ApprovalMode::ApproveAll)
        .with_event_bus(events);

    let entry = WorkerSpec::new("clerk", "Use the store.").with_toolset("store");
    let outcome = runtime.execute(&entry, "stash something".into()).await.unwrap();

    assert_eq!(outcome.output, WorkerOutput::Text("done".to_string()));

    // user, assistant tool-calls, tool result, assistant text
    assert_eq!(outcome.messages.len(), 4);
    assert_eq!(outcome.messages[2].role, MessageRole::Tool);

    let mut kinds = Vec::new();
    while let Some(event) = receiver.try_recv() {
        kinds.push(event.event_type());
    }
    assert_eq!(
        kinds,
        vec!["user_message", "tool_call", "tool_result", "completion"]
    );
}

#[tokio::test]
async fn test_quiet_verbosity_suppresses_tool_events() {
    let provider = Arc::new(InstanceProvider::new());
    register_kv(&provider, "store", ToolsetScope::Call);

    let model = Arc::new(ScriptedProvider::new().script(
        "Use the store",
        vec![
            ModelResponse::tool_calls(vec![tool_call("c1", "open", serde_json::json!({}))]),
            ModelResponse::text("done"),
        ],
    ));

    let events = EventBus::new();
    let mut receiver = events.subscribe();
    let runtime = runtime(model, provider, Arc::new(ApproveAllDecisions::new()))
        .with_approval_mode(ApprovalMode::ApproveAll)
        .with_event_bus(events)
        .with_verbosity(Verbosity::Quiet);

    let entry = WorkerSpec::new("clerk", "Use the store.").with_toolset("store");
    runtime.execute(&entry, "go".into()).await.unwrap();

    let mut kinds = Vec::new();
    while let Some(event) = receiver.try_recv() {
        kinds.push(event.event_type());
    }
    assert_eq!(kinds, vec!["completion"]);
}

// ---------------------------------------------------------------------------
// Depth safety
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_self_delegation_stops_at_max_depth() {
    let provider = Arc::new(InstanceProvider::new());
    let spec = WorkerSpec::new("ouroboros", "Delegate to yourself.").with_toolset("ouroboros");
    provider.register_worker(spec.clone());

    // Every level immediately delegates again.
    let model = Arc::new(ScriptedProvider::new().script(
        "Delegate to yourself",
        std::iter::repeat_with(|| {
            ModelResponse::tool_calls(vec![delegate_call("c1", "ouroboros", "again")])
        })
        .take(5)
        .collect(),
    ));

    let runtime = runtime(
        Arc::clone(&model),
        provider,
        Arc::new(ApproveAllDecisions::new()),
    )
    .with_approval_mode(ApprovalMode::ApproveAll)
    .with_max_depth(2);

    let error = runtime.execute(&spec, "go".into()).await.unwrap_err();
    assert!(matches!(
        error,
        RuntimeError::DepthExceeded {
            depth: 3,
            max_depth: 2,
            ..
        }
    ));

    // Depths 0, 1, and 2 each ran one model turn; nothing ran beyond the
    // limit.
    assert_eq!(model.calls(), 3);
}

// ---------------------------------------------------------------------------
// Model selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_model_override_wins_over_preference() {
    let model = Arc::new(
        ScriptedProvider::new().script("Answer", vec![ModelResponse::text("ok")]),
    );
    let runtime = runtime(
        Arc::clone(&model),
        Arc::new(InstanceProvider::new()),
        Arc::new(ApproveAllDecisions::new()),
    )
    .with_model_override("forced");

    let entry = WorkerSpec::new("echo", "Answer.").with_model("preferred");
    runtime.execute(&entry, "hi".into()).await.unwrap();

    assert_eq!(model.seen_models(), vec!["forced".to_string()]);
}

#[tokio::test]
async fn test_incompatible_model_fails_fast() {
    let model = Arc::new(
        ScriptedProvider::new().script("Answer", vec![ModelResponse::text("ok")]),
    );
    let runtime = runtime(
        Arc::clone(&model),
        Arc::new(InstanceProvider::new()),
        Arc::new(ApproveAllDecisions::new()),
    );

    let entry = WorkerSpec::new("picky", "Answer.")
        .with_model("big")
        .with_compatible_models(vec!["small".to_string()]);
    let error = runtime.execute(&entry, "hi".into()).await.unwrap_err();

    assert!(matches!(
        error,
        RuntimeError::ModelCompatibility { ref worker, ref model } if worker == "picky" && model == "big"
    ));
    // The model was never reached.
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_empty_compatible_models_is_fatal() {
    let runtime = runtime(
        Arc::new(ScriptedProvider::new()),
        Arc::new(InstanceProvider::new()),
        Arc::new(ApproveAllDecisions::new()),
    );

    let entry = WorkerSpec::new("broken", "Answer.").with_compatible_models(vec![]);
    let error = runtime.execute(&entry, "hi".into()).await.unwrap_err();
    assert!(matches!(error, RuntimeError::ModelCompatibility { .. }));
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unresolvable_reference_is_fatal() {
    let runtime = runtime(
        Arc::new(ScriptedProvider::new()),
        Arc::new(InstanceProvider::new()),
        Arc::new(ApproveAllDecisions::new()),
    );

    let entry = WorkerSpec::new("lost", "Answer.").with_toolset("ghost");
    let error = runtime.execute(&entry, "hi".into()).await.unwrap_err();
    assert!(matches!(
        error,
        RuntimeError::ToolsetResolution { ref reference, .. } if reference == "ghost"
    ));
}

// ---------------------------------------------------------------------------
// Approvals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_strict_deny_aborts_run() {
    let provider = Arc::new(InstanceProvider::new());
    register_kv(&provider, "store", ToolsetScope::Call);

    let model = Arc::new(ScriptedProvider::new().script(
        "Use the store",
        vec![ModelResponse::tool_calls(vec![tool_call(
            "c1",
            "open",
            serde_json::json!({}),
        )])],
    ));

    let runtime = runtime(
        Arc::clone(&model),
        provider,
        Arc::new(ApproveAllDecisions::new()),
    )
    .with_approval_mode(ApprovalMode::StrictDeny);

    let entry = WorkerSpec::new("clerk", "Use the store.").with_toolset("store");
    let error = runtime.execute(&entry, "go".into()).await.unwrap_err();

    assert!(matches!(error, RuntimeError::ApprovalDenied { ref tool, .. } if tool == "open"));
    // The model issued the call but never saw a result for it.
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_recoverable_denial_surfaces_to_model() {
    let provider = Arc::new(InstanceProvider::new());
    register_kv(&provider, "store", ToolsetScope::Call);

    let decisions = Arc::new(DenyAllDecisions::new());
    let model = Arc::new(ScriptedProvider::new().script(
        "Use the store",
        vec![
            ModelResponse::tool_calls(vec![tool_call("c1", "open", serde_json::json!({}))]),
            ModelResponse::text("adapted without the store"),
        ],
    ));

    let runtime = runtime(model, provider, Arc::clone(&decisions) as Arc<dyn DecisionProvider>);

    let entry = WorkerSpec::new("clerk", "Use the store.").with_toolset("store");
    let outcome = runtime.execute(&entry, "go".into()).await.unwrap();

    assert_eq!(
        outcome.output,
        WorkerOutput::Text("adapted without the store".to_string())
    );
    assert_eq!(decisions.calls(), 1);

    // The denial came back as an error tool-result the model could see.
    let denial = outcome.messages.iter().find_map(|m| match &m.content {
        foreman_llm::MessageContent::ToolResult(result) if result.is_error => Some(result.clone()),
        _ => None,
    });
    assert!(denial.unwrap().content.contains("denied"));
}

#[tokio::test]
async fn test_cancel_during_suspended_approval() {
    let provider = Arc::new(InstanceProvider::new());
    register_kv(&provider, "store", ToolsetScope::Call);

    let model = Arc::new(ScriptedProvider::new().script(
        "Use the store",
        vec![ModelResponse::tool_calls(vec![tool_call(
            "c1",
            "open",
            serde_json::json!({}),
        )])],
    ));

    let runtime = runtime(model, provider, Arc::new(DeferAllDecisions::new()));
    let entry = WorkerSpec::new("clerk", "Use the store.").with_toolset("store");

    let mut session = runtime.session(entry);
    let broker = Arc::clone(session.approvals());
    let cancel = session.cancel_token();

    let canceller = async {
        loop {
            if broker.pending_count() > 0 {
                cancel.cancel();
                break;
            }
            tokio::task::yield_now().await;
        }
    };

    let (result, ()) = tokio::join!(session.run_turn("go".into()), canceller);
    assert!(matches!(result, Err(RuntimeError::Cancelled { .. })));
    // The pending request was retracted when the wait was cancelled.
    assert_eq!(broker.pending_count(), 0);
}

// ---------------------------------------------------------------------------
// Delegation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delegation_keeps_nested_messages_private() {
    let provider = Arc::new(InstanceProvider::new());
    provider.register_worker(WorkerSpec::new("helper", "Help with subtasks."));

    let model = Arc::new(
        ScriptedProvider::new()
            .script(
                "Delegate the work",
                vec![
                    ModelResponse::tool_calls(vec![delegate_call("c1", "helper", "do it")]),
                    ModelResponse::text("finished"),
                ],
            )
            .script("Help with subtasks", vec![ModelResponse::text("sub-answer")]),
    );

    let runtime = runtime(model, provider, Arc::new(ApproveAllDecisions::new()))
        .with_approval_mode(ApprovalMode::ApproveAll);

    let entry = WorkerSpec::new("boss", "Delegate the work.").with_toolset("helper");
    let outcome = runtime.execute(&entry, "go".into()).await.unwrap();

    assert_eq!(outcome.output, WorkerOutput::Text("finished".to_string()));

    // The parent sees exactly: its input, its tool-call message, the tool
    // result carrying the child's answer, and its own final text. None of
    // the child's internal messages leak in.
    let roles: Vec<MessageRole> = outcome.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant
        ]
    );
    assert!(!outcome
        .messages
        .iter()
        .any(|m| m.text() == Some("sub-answer")));

    // Usage was recorded at both depths, in call order: the root turn,
    // the nested turn, then the root's follow-up turn.
    let depths: Vec<usize> = outcome.usage.iter().map(|record| record.depth).collect();
    assert_eq!(depths, vec![0, 1, 0]);
}

#[tokio::test]
async fn test_structured_output_contract() {
    let provider = Arc::new(InstanceProvider::new());
    provider.register_worker(
        WorkerSpec::new("tallier", "Count things.")
            .with_output_schema(serde_json::json!({"type": "object"})),
    );

    let model = Arc::new(
        ScriptedProvider::new()
            .script(
                "Delegate the count",
                vec![
                    ModelResponse::tool_calls(vec![delegate_call("c1", "tallier", "count")]),
                    ModelResponse::text("got the tally"),
                ],
            )
            .script("Count things", vec![ModelResponse::text("{\"total\": 3}")]),
    );

    let runtime = runtime(model, provider, Arc::new(ApproveAllDecisions::new()))
        .with_approval_mode(ApprovalMode::ApproveAll);

    let entry = WorkerSpec::new("boss", "Delegate the count.").with_toolset("tallier");
    let outcome = runtime.execute(&entry, "go".into()).await.unwrap();

    // The structured result reached the parent serialized as JSON.
    let tool_result = outcome.messages.iter().find_map(|m| match &m.content {
        foreman_llm::MessageContent::ToolResult(result) => Some(result.clone()),
        _ => None,
    });
    assert_eq!(tool_result.unwrap().content, "{\"total\":3}");
}

#[tokio::test]
async fn test_broken_output_contract_is_recoverable() {
    let provider = Arc::new(InstanceProvider::new());
    provider.register_worker(
        WorkerSpec::new("tallier", "Count things.")
            .with_output_schema(serde_json::json!({"type": "object"})),
    );

    let model = Arc::new(
        ScriptedProvider::new()
            .script(
                "Delegate the count",
                vec![
                    ModelResponse::tool_calls(vec![delegate_call("c1", "tallier", "count")]),
                    ModelResponse::text("gave up on the tally"),
                ],
            )
            .script("Count things", vec![ModelResponse::text("three-ish")]),
    );

    let runtime = runtime(model, provider, Arc::new(ApproveAllDecisions::new()))
        .with_approval_mode(ApprovalMode::ApproveAll);

    let entry = WorkerSpec::new("boss", "Delegate the count.").with_toolset("tallier");
    let outcome = runtime.execute(&entry, "go".into()).await.unwrap();

    // The contract violation surfaced as an error tool-result, and the
    // parent model adapted.
    assert_eq!(
        outcome.output,
        WorkerOutput::Text("gave up on the tally".to_string())
    );
    let errored = outcome.messages.iter().any(|m| {
        matches!(&m.content, foreman_llm::MessageContent::ToolResult(r) if r.is_error)
    });
    assert!(errored);
}

// ---------------------------------------------------------------------------
// Multi-turn sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_session_retains_root_history() {
    let model = Arc::new(ScriptedProvider::new().script(
        "Answer plainly",
        vec![
            ModelResponse::text("first answer"),
            ModelResponse::text("second answer"),
        ],
    ));
    let runtime = runtime(
        model,
        Arc::new(InstanceProvider::new()),
        Arc::new(ApproveAllDecisions::new()),
    );

    let mut session = runtime.session(WorkerSpec::new("echo", "Answer plainly."));

    session.run_turn("one".into()).await.unwrap();
    assert_eq!(session.messages().len(), 2);

    session.run_turn("two".into()).await.unwrap();
    // Both turns accumulated in the root conversation.
    assert_eq!(session.messages().len(), 4);
    assert_eq!(session.messages()[0].text(), Some("one"));
    assert_eq!(session.messages()[2].text(), Some("two"));

    session.finish().await;
}

// ---------------------------------------------------------------------------
// Phase transitions
// ---------------------------------------------------------------------------

fn bare_config(model: Arc<ScriptedProvider>) -> Arc<RunConfig> {
    Arc::new(RunConfig {
        run_id: RunId::new(),
        model_client: model,
        provider: Arc::new(InstanceProvider::new()),
        model_override: None,
        default_model: "base".to_string(),
        approval: ApprovalPolicy::new(ApprovalMode::ApproveAll, Arc::new(DeferAllDecisions::new())),
        max_depth: 2,
        events: EventBus::new(),
        usage: Arc::new(UsageCollector::new()),
        verbosity: Verbosity::Normal,
        cancel: CancellationToken::new(),
    })
}

#[tokio::test]
async fn test_run_phases() {
    let config = bare_config(Arc::new(
        ScriptedProvider::new().script("prompt", vec![ModelResponse::text("ok")]),
    ));
    let frame = CallFrame::new(ToolRegistry::new(), "base", "prompt");
    let mut context = ExecutionContext::root(
        config,
        frame,
        "worker",
        CancellationToken::new(),
        HashMap::new(),
    );

    assert_eq!(context.phase(), RunPhase::Idle);
    context.run("hi".to_string()).await.unwrap();
    assert_eq!(context.phase(), RunPhase::Completed);
    context.close().await;
}

#[tokio::test]
async fn test_failed_phase_is_terminal() {
    // No script: the model call fails.
    let config = bare_config(Arc::new(ScriptedProvider::new()));
    let frame = CallFrame::new(ToolRegistry::new(), "base", "prompt");
    let mut context = ExecutionContext::root(
        config,
        frame,
        "worker",
        CancellationToken::new(),
        HashMap::new(),
    );

    let error = context.run("hi".to_string()).await.unwrap_err();
    assert!(matches!(error, RuntimeError::Model { .. }));
    assert_eq!(context.phase(), RunPhase::Failed);
    context.close().await;
}
