//! The built-in system prompt.
//!
//! The prompt teaches the model the `TOOL_CALL::` line format and lists the
//! tools actually registered, so the catalogue can never drift from the
//! registry.

use std::fmt::Write;

use crate::protocol::TOOL_CALL_MARKER;
use crate::tool::ToolRegistry;

const PREAMBLE: &str = "\
You are Joi, a helpful AI assistant that can operate parts of this computer through tools.
Only use a tool when the request needs it, whether asked for directly or clearly implied.
Think about what the user wants before acting. For multi-step tasks, run one tool, read its result, then decide on the next step.";

const FORMAT: &str = "\
To invoke a tool, write the call on its own new line, starting exactly with the marker and followed immediately by a JSON object with \"tool\" and \"args\":";

const FLOW: &str = "\
How a turn works:
1. The user sends a message.
2. You reply. If you need a tool, put each call on its own line.
3. You then receive a 'tool execution result' message for every call.
4. Only write a call line when you want the tool to run, never as an illustration.
5. Use the results to continue or to give the user a clear final answer.";

/// Assemble the full system prompt for the tools in `registry`.
pub fn system_prompt(registry: &ToolRegistry) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\n");
    prompt.push_str(FORMAT);
    let _ = writeln!(
        prompt,
        "\n{TOOL_CALL_MARKER}{{\"tool\": \"tool_name\", \"args\": {{\"arg_key\": \"value\"}}}}\n"
    );
    prompt.push_str(&tool_catalogue(registry));
    prompt.push('\n');
    prompt.push_str(FLOW);
    prompt.push('\n');
    prompt
}

/// The numbered "Available tools" section.
pub fn tool_catalogue(registry: &ToolRegistry) -> String {
    if registry.is_empty() {
        return "No tools are available in this session.\n".to_string();
    }

    let mut out = String::from("Available tools:\n");
    for (i, tool) in registry.tools().into_iter().enumerate() {
        let _ = writeln!(out, "{}. {} (`{}`): {}", i + 1, tool.label(), tool.name(), tool.description());
        for line in tool.usage().lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "   {}", line.trim());
        }
    }
    out
}
