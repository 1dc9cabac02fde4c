//! Cross-handler tests for the tools module

use super::*;
use crate::error::AssistantsError;
use crate::test_support::CountingProvider;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Minimal arguments that pass validation for each tool
fn valid_args(tool: &str) -> Value {
    let thread = json!("thread_abc");
    match tool {
        "assistant-create" => json!({ "model": "gpt-4o" }),
        "assistant-list" => json!({}),
        "assistant-get" | "assistant-delete" => json!({ "assistant_id": "asst_abc" }),
        "assistant-update" => json!({ "assistant_id": "asst_abc", "name": "renamed" }),
        "thread-create" => json!({}),
        "thread-get" | "thread-delete" => json!({ "thread_id": thread }),
        "thread-update" => json!({ "thread_id": thread, "metadata": { "k": "v" } }),
        "message-create" => json!({ "thread_id": thread, "role": "user", "content": "hi" }),
        "message-list" => json!({ "thread_id": thread }),
        "message-get" | "message-delete" => json!({ "thread_id": thread, "message_id": "msg_abc" }),
        "message-update" => json!({ "thread_id": thread, "message_id": "msg_abc", "metadata": {} }),
        "run-create" => json!({ "thread_id": thread, "assistant_id": "asst_abc" }),
        "run-list" => json!({ "thread_id": thread }),
        "run-get" | "run-cancel" => json!({ "thread_id": thread, "run_id": "run_abc" }),
        "run-update" => json!({ "thread_id": thread, "run_id": "run_abc", "metadata": {} }),
        "run-submit-tool-outputs" => json!({
            "thread_id": thread,
            "run_id": "run_abc",
            "tool_outputs": [{ "tool_call_id": "call_abc", "output": "done" }]
        }),
        "run-step-list" => json!({ "thread_id": thread, "run_id": "run_abc" }),
        "run-step-get" => json!({ "thread_id": thread, "run_id": "run_abc", "step_id": "step_abc" }),
        other => panic!("no fixture for {other}"),
    }
}

#[test]
fn test_stats_consistent_with_table() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let stats = registry.stats();
    let table_size: usize = HANDLER_TABLE.iter().map(|e| e.tools.len()).sum();

    assert_eq!(stats.total_handlers, 22);
    assert_eq!(stats.total_handlers, table_size);
    assert_eq!(stats.handlers_by_category.values().sum::<usize>(), table_size);
    assert_eq!(stats.registered_tools.len(), table_size);
}

#[test]
fn test_tool_names_unique_and_schemas_are_objects() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let mut seen = HashSet::new();
    for def in registry.definitions() {
        assert!(seen.insert(def.name.clone()), "duplicate {}", def.name);
        assert_eq!(def.input_schema["type"], "object", "{}", def.name);
        assert!(!def.description.is_empty());
    }
}

#[tokio::test]
async fn test_valid_args_reach_provider() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let provider = CountingProvider::new();
    let ctx = CallContext::new();

    for (i, name) in registry.stats().registered_tools.iter().enumerate() {
        // The ids do not exist, so most calls fail at the provider; they must
        // still get there.
        let result = registry.dispatch(name, valid_args(name), &provider, &ctx).await;
        assert_eq!(provider.calls(), i + 1, "{name} did not reach the provider");
        if let Err(err) = result {
            assert!(
                !matches!(err, AssistantsError::Validation(_)),
                "{name} rejected valid args: {err}"
            );
        }
    }
}

#[tokio::test]
async fn test_invalid_args_never_reach_provider() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let provider = CountingProvider::new();
    let ctx = CallContext::new();

    for name in registry.stats().registered_tools {
        let err = registry
            .dispatch(&name, json!("not an object"), &provider, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantsError::Validation(_)), "{name}: {err}");
    }

    let err = registry
        .dispatch("assistant-list", json!({ "limit": 500 }), &provider, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantsError::Validation(_)));

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_unknown_tool() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let provider = CountingProvider::new();

    let err = registry
        .dispatch("not-a-real-tool", json!({}), &provider, &CallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantsError::UnknownTool(ref name) if name == "not-a-real-tool"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_timeout() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let provider = CountingProvider::new().with_delay(Duration::from_secs(10));
    let ctx = CallContext::new()
        .with_timeout(Duration::from_secs(1))
        .with_provider("counting");

    let err = registry
        .dispatch("assistant-list", json!({}), &provider, &ctx)
        .await
        .unwrap_err();
    match &err {
        AssistantsError::Tool { category, tool, .. } => {
            assert_eq!(*category, ToolCategory::Assistant);
            assert_eq!(tool, "assistant-list");
        }
        other => panic!("expected tool context, got {other:?}"),
    }
    match err.root_cause() {
        AssistantsError::ProviderTimeout { provider, .. } => assert_eq!(provider, "counting"),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(
        AssistantsError::ProviderTimeout {
            provider: "counting".to_string(),
            elapsed: Duration::from_secs(1)
        }
        .is_retryable()
    );
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_cancelled() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let provider = CountingProvider::new().with_delay(Duration::from_secs(10));
    let token = CancellationToken::new();
    let ctx = CallContext::new().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let err = registry
        .dispatch("assistant-list", json!({}), &provider, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantsError::Cancelled(_)));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_cancelled_before_execution_skips_provider() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let provider = CountingProvider::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = registry
        .dispatch(
            "assistant-list",
            json!({}),
            &provider,
            &CallContext::new().with_cancellation(token),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantsError::Cancelled(_)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_all_field_errors_reported_together() {
    let registry = ToolHandlerRegistry::standard().unwrap();
    let provider = CountingProvider::new();

    let err = registry
        .dispatch(
            "assistant-create",
            json!({ "name": "x".repeat(300), "temperature": 3, "tools": [{ "type": "browser" }] }),
            &provider,
            &CallContext::new(),
        )
        .await
        .unwrap_err();

    let AssistantsError::Validation(failure) = err else {
        panic!("expected validation failure");
    };
    let fields: Vec<_> = failure.errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["model", "name", "tools[0].type", "temperature"]);
}
