//! Integration tests for the orchestrator loop
//!
//! A scripted model stands in for the provider so every run is
//! deterministic. Tools run for real against a temporary workspace.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    assert_no_dangling_calls, command_call, linux_config, orchestrator, write_call, EndlessModel,
    ScriptedModel, Step,
};
use siteforge::agent::{AgentConfig, AgentError, IncompleteReason, RunStatus};
use siteforge::model::{FunctionCall, Message, ModelError, ModelReply, Role};

/// A text reply on the first turn ends the run with that exact text
#[tokio::test]
async fn test_text_reply_ends_run() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![Step::Reply(ModelReply::text("Hello there"))]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let result = orch.run(vec![Message::user("hi")]).await.unwrap();

    assert_eq!(result.final_response, "Hello there");
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.iterations, 1);
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.history[1].role, Role::Model);
    assert_eq!(result.history[1].text().as_deref(), Some("Hello there"));
    assert_eq!(model.calls(), 1);
}

/// The model asks for a file and then reports back
#[tokio::test]
async fn test_write_file_then_done() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Step::Reply(ModelReply::call(write_call("proj/index.html", "<h1>Hi</h1>"))),
        Step::Reply(ModelReply::text("Done.")),
    ]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let result = orch
        .run(vec![Message::user("make a hello page")])
        .await
        .unwrap();

    assert_eq!(result.final_response, "Done.");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("proj/index.html")).unwrap(),
        "<h1>Hi</h1>"
    );

    let response = result.history[2].as_function_response().unwrap();
    assert_eq!(response.name, "writeFile");
    assert_eq!(
        response.response.result,
        "Success: Content written to proj/index.html"
    );
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].call.name, "writeFile");
}

/// N serviced calls leave initial + 2N + 1 messages
#[tokio::test]
async fn test_history_growth_per_tool_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Step::Reply(ModelReply::call(command_call("mkdir -p site"))),
        Step::Reply(ModelReply::call(write_call("site/style.css", "body {}"))),
        Step::Reply(ModelReply::call(command_call("ls site"))),
        Step::Reply(ModelReply::text("All set.")),
    ]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let initial = vec![
        Message::user("build a site"),
        Message::model("What colour scheme?"),
        Message::user("blue"),
    ];
    let result = orch.run(initial.clone()).await.unwrap();

    assert_eq!(result.history.len(), initial.len() + 2 * 3 + 1);
    assert_eq!(&result.history[..initial.len()], &initial[..]);
    assert_eq!(result.iterations, 4);
    assert_eq!(result.tool_calls.len(), 3);

    let listing = &result.tool_calls[2].result;
    assert!(listing.starts_with("Success: style.css"), "{}", listing);
    assert!(listing.ends_with("|| Task executed completely"));
}

/// Every model call sees a history where each call already has its result
#[tokio::test]
async fn test_model_never_sees_dangling_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Step::Reply(ModelReply::call(command_call("echo one"))),
        Step::Reply(ModelReply::call(command_call("echo two"))),
        Step::Reply(ModelReply::text("finished")),
    ]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let result = orch.run(vec![Message::user("go")]).await.unwrap();

    let seen = model.seen();
    assert_eq!(seen.len(), 3);
    for history in &seen {
        assert_no_dangling_calls(history);
    }
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[1].len(), 3);
    assert_eq!(seen[2].len(), 5);
    assert_no_dangling_calls(&result.history);
}

/// A failing command is reported to the model, not to the caller
#[tokio::test]
async fn test_command_failure_is_fed_back() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Step::Reply(ModelReply::call(command_call("echo broken >&2; exit 3"))),
        Step::Reply(ModelReply::text("I hit an error")),
    ]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let result = orch.run(vec![Message::user("try it")]).await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.tool_calls[0].result, "Error: broken\n");
    assert_eq!(result.final_response, "I hit an error");
}

/// Unknown tool names produce an error result and the loop carries on
#[tokio::test]
async fn test_unknown_tool_reported() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Step::Reply(ModelReply::call(FunctionCall::new(
            "deleteEverything",
            serde_json::json!({}),
        ))),
        Step::Reply(ModelReply::text("Sorry")),
    ]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let result = orch.run(vec![Message::user("x")]).await.unwrap();

    assert_eq!(
        result.tool_calls[0].result,
        "Error: Unknown tool: deleteEverything"
    );
    assert_eq!(result.final_response, "Sorry");
}

/// Only the first of several calls in one reply is serviced
#[tokio::test]
async fn test_only_first_call_serviced() {
    let dir = tempfile::tempdir().unwrap();
    let reply = ModelReply {
        function_calls: vec![
            write_call("first.txt", "1"),
            write_call("second.txt", "2"),
        ],
        text: String::new(),
    };
    let model = ScriptedModel::new(vec![
        Step::Reply(reply),
        Step::Reply(ModelReply::text("ok")),
    ]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let result = orch.run(vec![Message::user("two files")]).await.unwrap();

    assert!(dir.path().join("first.txt").exists());
    assert!(!dir.path().join("second.txt").exists());
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.history.len(), 1 + 2 + 1);
}

/// A model failure aborts the run with the model error
#[tokio::test]
async fn test_model_error_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Step::Reply(ModelReply::call(command_call("echo hi"))),
        Step::Fail(503, "model overloaded"),
    ]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let err = orch.run(vec![Message::user("hi")]).await.unwrap_err();

    match err {
        AgentError::Model(ModelError::Api { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "model overloaded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(model.calls(), 2);
}

/// An empty conversation is rejected before any model call
#[tokio::test]
async fn test_empty_conversation_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![]);
    let orch = orchestrator(model.clone(), dir.path(), linux_config());

    let err = orch.run(Vec::new()).await.unwrap_err();

    assert!(matches!(err, AgentError::EmptyConversation));
    assert_eq!(model.calls(), 0);
}

/// A model that never stops calling tools hits the iteration cap
#[tokio::test]
async fn test_max_iterations_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let config = AgentConfig {
        max_iterations: 3,
        ..linux_config()
    };
    let orch = orchestrator(Arc::new(EndlessModel), dir.path(), config);

    let result = orch.run(vec![Message::user("loop")]).await.unwrap();

    assert_eq!(
        result.status,
        RunStatus::Incomplete(IncompleteReason::MaxIterations(3))
    );
    assert!(!result.is_complete());
    assert!(result.final_response.is_empty());
    assert_eq!(result.iterations, 3);
    assert_eq!(result.tool_calls.len(), 3);
    assert_eq!(result.history.len(), 1 + 2 * 3);
    assert_no_dangling_calls(&result.history);
}

/// A slow model call past the deadline ends the run as incomplete
#[tokio::test]
async fn test_deadline_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![Step::Slow(
        Duration::from_secs(5),
        ModelReply::text("too late"),
    )]);
    let config = AgentConfig {
        deadline: Some(Duration::from_millis(100)),
        ..linux_config()
    };
    let orch = orchestrator(model.clone(), dir.path(), config);

    let result = orch.run(vec![Message::user("slow")]).await.unwrap();

    assert_eq!(
        result.status,
        RunStatus::Incomplete(IncompleteReason::DeadlineExceeded(Duration::from_millis(100)))
    );
    assert_eq!(result.history.len(), 1);
}

/// The deadline also covers time spent inside a tool
#[tokio::test]
async fn test_deadline_passes_during_tool_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Step::Reply(ModelReply::call(command_call("sleep 1"))),
        Step::Reply(ModelReply::text("never reached")),
    ]);
    let config = AgentConfig {
        deadline: Some(Duration::from_millis(300)),
        ..linux_config()
    };
    let orch = orchestrator(model.clone(), dir.path(), config);

    let result = orch.run(vec![Message::user("slow command")]).await.unwrap();

    assert_eq!(
        result.status,
        RunStatus::Incomplete(IncompleteReason::DeadlineExceeded(Duration::from_millis(300)))
    );
    assert_eq!(model.calls(), 1);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.tool_calls.len(), 1);
    assert!(result.tool_calls[0].result.starts_with("Success:"));
    assert_eq!(result.history.len(), 1 + 2);
    assert_no_dangling_calls(&result.history);
}

/// A custom system prompt replaces the rendered default
#[test]
fn test_custom_system_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![]);
    let config = AgentConfig {
        system_prompt: Some("Only reply with OK.".to_string()),
        ..linux_config()
    };
    let orch = orchestrator(model, dir.path(), config);
    assert_eq!(orch.system_instruction(), "Only reply with OK.");

    let default = orchestrator(ScriptedModel::new(vec![]), dir.path(), linux_config());
    assert!(default.system_instruction().contains("executeCommand"));
}
