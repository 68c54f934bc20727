//! Substitution Engine: resolves `#E_k` placeholders in a PlanStep's
//! `tool_input` using prior steps' recorded results.

/// An insertion-ordered `binding_name → result` map. Order matters: later
/// bindings' values may legally contain the literal text of an earlier
/// binding's token, so substitution must proceed in the order results were
/// recorded, not in some incidental hash order.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    entries: Vec<(String, String)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed step's result. Re-inserting an existing binding
    /// name overwrites its value in place, preserving its original position.
    pub fn insert(&mut self, binding_name: impl Into<String>, result: impl Into<String>) {
        let binding_name = binding_name.into();
        let result = result.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == binding_name) {
            entry.1 = result;
        } else {
            self.entries.push((binding_name, result));
        }
    }

    pub fn get(&self, binding_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == binding_name)
            .map(|(_, v)| v.as_str())
    }

    /// Resolve every known binding token in `tool_input`, left-to-right in
    /// insertion order. Missing bindings are left literal.
    pub fn resolve(&self, tool_input: &str) -> String {
        let mut resolved = tool_input.to_string();
        for (binding_name, result) in &self.entries {
            resolved = resolved.replace(binding_name.as_str(), result.as_str());
        }
        resolved
    }

    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.entries
    }
}
