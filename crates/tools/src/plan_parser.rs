//! Plan Parser: turns raw planner LLM output into an ordered [`Plan`].

use regex::Regex;
use std::sync::OnceLock;

use dp_domain::plan::{Plan, PlanStep, Tool};

fn plan_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Plan:\s*(.+?)\s*(#E\d+)\s*=\s*(\w+)\s*\[([^\]]+)\]").expect("valid plan regex")
    })
}

fn think_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block regex"))
}

/// Strip a leading `<think>...</think>` chain-of-thought block, if present.
fn strip_think_block(raw: &str) -> std::borrow::Cow<'_, str> {
    match think_block().find(raw) {
        Some(m) => std::borrow::Cow::Owned(raw.replacen(m.as_str(), "", 1)),
        None => std::borrow::Cow::Borrowed(raw),
    }
}

/// Parse planner output into an ordered [`Plan`]. An empty result is a valid
/// outcome — it signals the Orchestrator to treat this as a parse failure
/// and replan, it is not itself an error.
///
/// Any unknown tool token rejects the whole plan (returns empty), rather than
/// dropping just that step — keeping the other steps would renumber the
/// remaining bindings around a gap; duplicate binding names keep their first
/// occurrence and drop later ones.
pub fn parse_plan(raw: &str) -> Plan {
    let stripped = strip_think_block(raw);
    let mut plan = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for caps in plan_pattern().captures_iter(&stripped) {
        let binding_name = caps[2].to_string();
        if !seen.insert(binding_name.clone()) {
            continue;
        }
        let Some(tool) = Tool::from_token(&caps[3]) else {
            return Vec::new();
        };
        plan.push(PlanStep {
            description: caps[1].trim().to_string(),
            binding_name,
            tool,
            tool_input: caps[4].trim().to_string(),
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_step_plan() {
        let plan = parse_plan(
            "Plan: find author\n#E1 = Search[author of The Old Man and the Sea]",
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].binding_name, "#E1");
        assert_eq!(plan[0].tool, Tool::Search);
        assert_eq!(plan[0].tool_input, "author of The Old Man and the Sea");
    }

    #[test]
    fn parses_multi_step_plan_in_order() {
        let plan = parse_plan(
            "Plan: fetch base\n#E1 = Search[distance between bases in baseball]\nPlan: double\n#E2 = Code[#E1 * 2]",
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].tool, Tool::Code);
        assert_eq!(plan[1].tool_input, "#E1 * 2");
    }

    #[test]
    fn strips_leading_think_block() {
        let plan = parse_plan(
            "<think>let me reason about this first</think>\nPlan: answer\n#E1 = LLM[what is 2+2]",
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].tool, Tool::Llm);
    }

    #[test]
    fn unknown_tool_rejects_whole_plan() {
        let plan = parse_plan("Plan: mystery\n#E1 = Teleport[somewhere]");
        assert!(plan.is_empty());
    }

    #[test]
    fn unknown_tool_among_valid_steps_rejects_whole_plan() {
        let plan = parse_plan(
            "Plan: first\n#E1 = Search[a]\nPlan: mystery\n#E2 = Teleport[somewhere]\nPlan: last\n#E3 = Code[b]",
        );
        assert!(plan.is_empty(), "a single unknown tool must void the whole plan, not leave a binding gap");
    }

    #[test]
    fn duplicate_binding_keeps_first_occurrence() {
        let plan = parse_plan(
            "Plan: first\n#E1 = Search[a]\nPlan: second\n#E1 = Code[b]",
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].tool, Tool::Search);
        assert_eq!(plan[0].tool_input, "a");
    }

    #[test]
    fn no_matches_yields_empty_plan() {
        let plan = parse_plan("I don't know how to plan this.");
        assert!(plan.is_empty());
    }
}
