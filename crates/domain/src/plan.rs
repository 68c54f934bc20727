use serde::{Deserialize, Serialize};

/// One of the three tools a PlanStep may dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Search,
    Code,
    #[serde(rename = "llm")]
    Llm,
}

impl Tool {
    /// Parse the case-sensitive tool token as it appears in plan grammar
    /// (`Search`, `Code`, `LLM`). Any other token is not a known tool.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Search" => Some(Tool::Search),
            "Code" => Some(Tool::Code),
            "LLM" => Some(Tool::Llm),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tool::Search => write!(f, "Search"),
            Tool::Code => write!(f, "Code"),
            Tool::Llm => write!(f, "LLM"),
        }
    }
}

/// A single step of a Plan: `Plan: <description>\n#E<k> = <Tool>[<tool_input>]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    pub binding_name: String,
    pub tool: Tool,
    pub tool_input: String,
}

/// An ordered sequence of PlanSteps. Binding names are unique and
/// monotonically increasing (`#E1, #E2, …`); a step's `tool_input` may only
/// reference bindings strictly before it.
pub type Plan = Vec<PlanStep>;

/// Render a plan-with-evidence string for the Solving transition: for every
/// step, substitute every known `binding_name → result` pair into *both* the
/// `tool_input` and the `binding_name` label, then join as
/// `Plan: {description}\n{binding_name} = {tool}[{tool_input}]` lines.
pub fn render_plan_with_evidence(plan: &Plan, results: &[(String, String)]) -> String {
    let mut lines = Vec::with_capacity(plan.len());
    for step in plan {
        let mut tool_input = step.tool_input.clone();
        let mut binding_name = step.binding_name.clone();
        for (k, v) in results {
            tool_input = tool_input.replace(k.as_str(), v.as_str());
            binding_name = binding_name.replace(k.as_str(), v.as_str());
        }
        lines.push(format!(
            "Plan: {}\n{} = {}[{}]",
            step.description, binding_name, step.tool, tool_input
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_from_token_is_case_sensitive() {
        assert_eq!(Tool::from_token("Search"), Some(Tool::Search));
        assert_eq!(Tool::from_token("search"), None);
        assert_eq!(Tool::from_token("LLM"), Some(Tool::Llm));
        assert_eq!(Tool::from_token("Bogus"), None);
    }

    #[test]
    fn render_plan_with_evidence_substitutes_bindings_and_labels() {
        let plan = vec![
            PlanStep {
                description: "fetch base".into(),
                binding_name: "#E1".into(),
                tool: Tool::Search,
                tool_input: "distance between bases".into(),
            },
            PlanStep {
                description: "double".into(),
                binding_name: "#E2".into(),
                tool: Tool::Code,
                tool_input: "#E1 * 2".into(),
            },
        ];
        let results = vec![
            ("#E1".to_string(), "90".to_string()),
            ("#E2".to_string(), "180".to_string()),
        ];
        let rendered = render_plan_with_evidence(&plan, &results);
        assert!(rendered.contains("90 = Code[90 * 2]"));
    }
}
