//! Prompt templates for each LLM call the Orchestrator and its adapters
//! make. Each function renders one call site's prompt; none of them carry
//! state, so they're plain functions rather than a templating engine.

pub fn plan_system_prompt() -> &'static str {
    "You are a planner. Given a task, produce a numbered plan that solves it \
     step by step. Each step must be written as exactly two lines:\n\
     Plan: <one-line description of what this step accomplishes>\n\
     #E<k> = <Tool>[<tool input>]\n\n\
     <Tool> is one of Search, Code, or LLM. Tool input may reference the \
     result of an earlier step by writing its binding name, e.g. #E1, \
     literally inside the input. Binding names must start at #E1 and \
     increase by one with every step. Do not explain your reasoning outside \
     of the plan lines."
}

pub fn plan_user_prompt(task: &str) -> String {
    format!("Task: {task}\n\nWrite the plan.")
}

pub fn replan_user_prompt(task: &str, previous_plan: &str, reflection: &str) -> String {
    format!(
        "Task: {task}\n\nThe previous plan did not produce a usable result:\n{previous_plan}\n\n\
         Reflection on what went wrong:\n{reflection}\n\n\
         Write a revised plan that avoids the same failure."
    )
}

pub fn reflection_prompt(task: &str, previous_plan: &str) -> String {
    format!(
        "Task: {task}\n\nThe following plan was executed but did not reach a \
         usable answer:\n{previous_plan}\n\n\
         In one or two sentences, explain what about the plan or its steps \
         likely caused this, so a revised plan can avoid it."
    )
}

pub fn commonsense_prompt(query: &str) -> String {
    format!(
        "Answer the following using your own knowledge, without searching or \
         executing code: {query}\n\n\
         If you are confident in a direct answer, wrap it in \
         <answer>...</answer>. If this question genuinely requires a tool \
         (search or code) to answer reliably, wrap a short explanation in \
         <replan>...</replan> instead."
    )
}

pub fn question_reword_prompt(query: &str) -> String {
    format!(
        "Rewrite the following as a single well-formed search engine query, \
         removing any placeholder tokens or scaffolding text that a search \
         engine would not understand: {query}\n\n\
         Respond with only <reworded_query>...</reworded_query>."
    )
}

pub fn summary_prompt(query: &str, context_block: &str) -> String {
    format!(
        "Using only the following search results, answer this query: \
         {query}\n\n{context_block}\n\n\
         If the results contain enough information to answer confidently, \
         wrap the answer in <answer>...</answer>. If they do not, say so \
         plainly without the tag."
    )
}

pub fn code_system_prompt() -> &'static str {
    "You write short, self-contained Python scripts that print their result \
     to stdout and nothing else. Respond with exactly one fenced code block."
}

pub fn code_user_prompt(task: &str) -> String {
    format!("Write a Python script that computes: {task}")
}

pub fn solver_prompt(task: &str, plan_with_evidence: &str) -> String {
    format!(
        "Task: {task}\n\nPlan and gathered evidence:\n{plan_with_evidence}\n\n\
         Using the evidence above, give a final answer to the task. Wrap the \
         answer in <answer>...</answer>."
    )
}

pub fn explanation_prompt(task: &str, plan_with_evidence: &str, answer: &str) -> String {
    format!(
        "Task: {task}\n\nPlan and gathered evidence:\n{plan_with_evidence}\n\n\
         Final answer: {answer}\n\n\
         In plain language, explain to the person who asked how this answer \
         was reached, referencing the evidence that supports it."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_interpolate_their_arguments() {
        assert!(plan_user_prompt("2+2").contains("2+2"));
        assert!(commonsense_prompt("capital of France").contains("capital of France"));
        assert!(question_reword_prompt("dist btwn bases").contains("dist btwn bases"));
    }
}
