use chronochat_llm::{Message as ProviderMessage, ToolCall};
use chronochat_types::{Message, Role};

/// Provider history for stored messages, led by the system prompt
///
/// Tool results are persisted as plain tool messages. Each consecutive run of
/// them is replayed behind a synthesized assistant tool-call message so the
/// provider sees a well-formed call/result exchange.
pub fn to_provider_history(system_prompt: &str, stored: &[Message]) -> Vec<ProviderMessage> {
    let mut history = Vec::with_capacity(stored.len() + 2);
    if !system_prompt.is_empty() {
        history.push(ProviderMessage::system(system_prompt));
    }

    let mut index = 0;
    while index < stored.len() {
        let message = &stored[index];
        match message.role {
            Role::User => history.push(ProviderMessage::human(message.content.clone())),
            Role::Assistant => history.push(ProviderMessage::ai(message.content.clone())),
            Role::System => history.push(ProviderMessage::system(message.content.clone())),
            Role::Tool => {
                let run_end = stored[index..]
                    .iter()
                    .position(|m| m.role != Role::Tool)
                    .map_or(stored.len(), |offset| index + offset);
                push_tool_run(&mut history, &stored[index..run_end]);
                index = run_end;
                continue;
            }
        }
        index += 1;
    }
    history
}

fn push_tool_run(history: &mut Vec<ProviderMessage>, run: &[Message]) {
    let mut calls = Vec::with_capacity(run.len());
    let mut results = Vec::with_capacity(run.len());

    for message in run {
        let Some(trace) = message.tool_calls.first() else {
            continue;
        };
        calls.push(ToolCall::new(&trace.call_id, &trace.tool_name, &trace.input));
        results.push(ProviderMessage::tool_result(&trace.call_id, message.content.clone()));
    }

    if calls.is_empty() {
        return;
    }
    history.push(ProviderMessage::ai_with_tools(None, calls));
    history.extend(results);
}
