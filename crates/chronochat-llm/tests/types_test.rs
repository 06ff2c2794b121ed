use chronochat_llm::types::{ContentPart, FunctionCall};
use chronochat_llm::{Completion, Content, Message, Tool, ToolCall};
use serde_json::json;

#[test]
fn test_content_from_string() {
    let content: Content = "Test".into();
    assert_eq!(content.as_text(), Some("Test"));
}

#[test]
fn test_content_parts_to_plain() {
    let content = Content::Parts(vec![
        ContentPart::Text { text: "Hello, ".to_string() },
        ContentPart::Text { text: "world".to_string() },
    ]);
    assert_eq!(content.as_text(), None);
    assert_eq!(content.to_plain(), "Hello, world");
}

#[test]
fn test_message_roles() {
    assert_eq!(Message::system("You are helpful").role(), "system");
    assert_eq!(Message::human("Hello").role(), "user");
    assert_eq!(Message::ai("Hi there!").role(), "assistant");
    assert_eq!(Message::tool_result("call_123", "42").role(), "tool");
}

#[test]
fn test_message_serialization_human() {
    let msg = Message::human("Hello");
    let encoded = serde_json::to_value(&msg).unwrap();
    assert_eq!(encoded, json!({ "role": "user", "content": "Hello" }));
}

#[test]
fn test_message_deserialization() {
    let json = r#"{"role":"user","content":"Test"}"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.role(), "user");
}

#[test]
fn test_ai_with_tools_drops_empty_preamble() {
    let call = ToolCall::new("call_1", "calculator", &json!({"expression": "1+2"}));
    let msg = Message::ai_with_tools(Some(String::new()), vec![call]);
    match &msg {
        Message::AI { content, .. } => assert!(content.is_none()),
        _ => panic!("expected assistant message"),
    }
    assert_eq!(msg.tool_calls().len(), 1);
}

#[test]
fn test_tool_descriptor_serializes_as_function() {
    let tool = Tool::new(
        "web_search",
        "Search the web",
        json!({ "type": "object", "properties": { "query": { "type": "string" } } }),
    );

    assert_eq!(tool.name(), "web_search");
    let encoded = serde_json::to_value(&tool).unwrap();
    assert_eq!(encoded["type"], "function");
    assert_eq!(encoded["function"]["parameters"]["properties"]["query"]["type"], "string");
}

#[test]
fn test_tool_call_parse_arguments() {
    let tool_call = ToolCall::new("call_7", "calculator", &json!({ "expression": "(2 + 3) * 4" }));

    #[derive(serde::Deserialize)]
    struct CalculatorArgs {
        expression: String,
    }

    let args: CalculatorArgs = tool_call.parse_arguments().unwrap();
    assert_eq!(args.expression, "(2 + 3) * 4");
    assert_eq!(tool_call.function.arguments, r#"{"expression":"(2 + 3) * 4"}"#);
}

#[test]
fn test_malformed_arguments_are_an_error() {
    let tool_call = ToolCall {
        id: "call_2".to_string(),
        tool_type: "function".to_string(),
        function: FunctionCall {
            name: "calculator".to_string(),
            arguments: "{\"expression\": ".to_string(),
        },
    };
    assert!(tool_call.arguments_value().is_err());
}

#[test]
fn test_empty_arguments_are_empty_object() {
    let tool_call = ToolCall {
        id: "call_1".to_string(),
        tool_type: "function".to_string(),
        function: FunctionCall {
            name: "current_time".to_string(),
            arguments: String::new(),
        },
    };
    assert_eq!(tool_call.arguments_value().unwrap(), json!({}));
}

#[test]
fn test_completion_to_message() {
    let text = Completion::Text("done".into());
    assert_eq!(text.to_message(), Message::ai("done"));
    assert!(text.tool_calls().is_empty());

    let calls = Completion::ToolCalls {
        content: Some("checking".into()),
        calls: vec![ToolCall::new("c1", "web_search", &json!({"query": "rust"}))],
    };
    assert_eq!(calls.text(), Some("checking"));
    assert_eq!(calls.to_message().tool_calls()[0].id, "c1");
}
