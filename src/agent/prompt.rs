//! Prompt template for the ReAct loop.

use crate::tools::ToolRegistry;

/// Build the full prompt for one model round.
///
/// The scratchpad holds every previous reply and observation of this run and
/// is appended right after the final `Thought:` so the model continues it.
pub fn build_prompt(tools: &ToolRegistry, question: &str, scratchpad: &str) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("{}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let tool_names = tools.names().join(", ");

    format!(
        r#"Answer the following questions as best you can. You have access to the following tools:

{tool_descriptions}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!

Question: {question}
Thought:{scratchpad}"#,
        tool_descriptions = tool_descriptions,
        tool_names = tool_names,
        question = question,
        scratchpad = scratchpad
    )
}
