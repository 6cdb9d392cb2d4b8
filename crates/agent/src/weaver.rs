//! Context weaving — render memory into the prompt for a new turn.
//!
//! The final prompt is, in order: the knowledge block, the journal block,
//! the task framing sentence, and the user's raw text. Either block is
//! omitted entirely when its source is empty.

use memweave_core::interaction::InteractionRecord;
use memweave_core::knowledge::KnowledgeBase;
use memweave_core::provider::ToolDefinition;
use std::fmt::Write;

pub const JOURNAL_HEADER: &str = "This is a summary of our recent conversation (your journal):\n";
pub const KNOWLEDGE_HEADER: &str = "This is your permanent knowledge base of key facts:\n";
pub const SECTION_SEPARATOR: &str = "\n---\n";
pub const TASK_FRAMING: &str =
    "Based on your knowledge base and our recent conversation, please respond to this new prompt: ";

/// Render recent exchanges, oldest first. Empty input renders nothing.
pub fn render_journal(records: &[InteractionRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut out = String::from(JOURNAL_HEADER);
    for record in records {
        let _ = writeln!(out, "- User said: \"{}\"", record.user);
        let _ = writeln!(out, "- You (the AI) responded: \"{}\"", record.ai);
    }
    out.push_str(SECTION_SEPARATOR);
    out
}

/// Render the whole knowledge base. An empty base renders nothing.
pub fn render_knowledge(kb: &KnowledgeBase) -> String {
    if kb.is_empty() {
        return String::new();
    }
    format!("{KNOWLEDGE_HEADER}{}{SECTION_SEPARATOR}", kb.to_pretty_json())
}

/// Build the prompt for one turn.
pub fn weave(kb: &KnowledgeBase, recent: &[InteractionRecord], user_text: &str) -> String {
    let mut prompt = render_knowledge(kb);
    prompt.push_str(&render_journal(recent));
    prompt.push_str(TASK_FRAMING);
    prompt.push_str(user_text);
    prompt
}

/// The system instruction: the assistant persona followed by the tool
/// protocol and a manifest of every tool.
pub fn system_instruction(persona: &str, tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return persona.to_string();
    }

    let mut out = String::from(persona);
    out.push_str(
        "\n\nYou can use tools to work with files in your workspace. To call a tool, \
         reply with only a JSON object of the form \
         {\"name\": \"<tool name>\", \"arguments\": {<argument name>: <value>}}. \
         You will then be shown the tool's result. When no tool is needed, reply \
         in plain text without any JSON.\n\nAvailable tools:\n",
    );

    for tool in tools {
        let _ = writeln!(
            out,
            "- {}: {} Parameters: {}",
            tool.name,
            tool.description,
            describe_parameters(&tool.parameters)
        );
    }
    out
}

fn describe_parameters(schema: &serde_json::Value) -> String {
    let Some(properties) = schema["properties"].as_object().filter(|p| !p.is_empty()) else {
        return "none".into();
    };
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, schema)| {
            let kind = schema["type"].as_str().unwrap_or("any");
            if required.contains(&name.as_str()) {
                format!("{name} ({kind}, required)")
            } else {
                format!("{name} ({kind})")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use memweave_core::interaction::tail;
    use memweave_core::knowledge::SynthesisAction;

    fn history(n: usize) -> Vec<InteractionRecord> {
        (0..n)
            .map(|i| InteractionRecord::new(format!("q{i}"), format!("a{i}")))
            .collect()
    }

    #[test]
    fn empty_history_renders_nothing() {
        assert_eq!(render_journal(&[]), "");
    }

    #[test]
    fn empty_knowledge_renders_nothing() {
        assert_eq!(render_knowledge(&KnowledgeBase::new()), "");
    }

    #[test]
    fn journal_lines_and_separator() {
        let rendered = render_journal(&[InteractionRecord::new("Hi, I'm Ada", "Hello Ada!")]);
        assert_eq!(
            rendered,
            "This is a summary of our recent conversation (your journal):\n\
             - User said: \"Hi, I'm Ada\"\n\
             - You (the AI) responded: \"Hello Ada!\"\n\
             \n---\n"
        );
    }

    #[test]
    fn last_n_records_keep_order() {
        let records = history(8);
        let rendered = render_journal(tail(&records, 3));
        let q5 = rendered.find("\"q5\"").unwrap();
        let q6 = rendered.find("\"q6\"").unwrap();
        let q7 = rendered.find("\"q7\"").unwrap();
        assert!(q5 < q6 && q6 < q7);
        assert!(!rendered.contains("\"q4\""));

        let all = render_journal(tail(&records, 100));
        assert!(all.contains("\"q0\"") && all.contains("\"q7\""));
    }

    #[test]
    fn knowledge_block_is_pretty_printed() {
        let mut kb = KnowledgeBase::new();
        kb.apply(&SynthesisAction::AddFact {
            path: vec!["A".into(), "b".into()],
            value: "c".into(),
        });
        assert_eq!(
            render_knowledge(&kb),
            "This is your permanent knowledge base of key facts:\n{\n  \"A\": {\n    \"b\": \"c\"\n  }\n}\n---\n"
        );
    }

    #[test]
    fn weave_orders_blocks() {
        let mut kb = KnowledgeBase::new();
        kb.apply(&SynthesisAction::AddFact {
            path: vec!["Name".into()],
            value: "Ada".into(),
        });
        let prompt = weave(&kb, &history(1), "What's my name?");

        let knowledge = prompt.find(KNOWLEDGE_HEADER).unwrap();
        let journal = prompt.find(JOURNAL_HEADER).unwrap();
        let framing = prompt.find(TASK_FRAMING).unwrap();
        assert!(knowledge < journal && journal < framing);
        assert!(prompt.ends_with("please respond to this new prompt: What's my name?"));
    }

    #[test]
    fn weave_with_no_memory_is_framing_plus_text() {
        let prompt = weave(&KnowledgeBase::new(), &[], "hello");
        assert_eq!(prompt, format!("{TASK_FRAMING}hello"));
    }

    #[test]
    fn system_instruction_lists_tools() {
        let tools = vec![
            ToolDefinition {
                name: "list_files".into(),
                description: "List files.".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            },
            ToolDefinition {
                name: "read_file".into(),
                description: "Read a file.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"filename": {"type": "string"}},
                    "required": ["filename"]
                }),
            },
        ];
        let text = system_instruction("You are helpful.", &tools);
        assert!(text.starts_with("You are helpful."));
        assert!(text.contains("- list_files: List files. Parameters: none"));
        assert!(text.contains("- read_file: Read a file. Parameters: filename (string, required)"));
    }

    #[test]
    fn system_instruction_without_tools_is_persona() {
        assert_eq!(system_instruction("Persona.", &[]), "Persona.");
    }
}
