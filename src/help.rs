// ABOUTME: First-class documentation registry for builtins, populated as each category registers

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub examples: Vec<String>,
    pub related: Vec<String>,
    pub category: String,
}

/// Usage: help_entry!("name", "category", "signature", "description", ["ex1"], ["related1"])
macro_rules! help_entry {
    (
        $name:literal,
        $category:literal,
        $signature:literal,
        $description:literal,
        [$($example:literal),* $(,)?],
        [$($related:literal),* $(,)?]
    ) => {
        $crate::help::register_help($crate::help::HelpEntry {
            name: $name.to_string(),
            category: $category.to_string(),
            signature: $signature.to_string(),
            description: $description.trim().to_string(),
            examples: vec![$($example.to_string()),*],
            related: vec![$($related.to_string()),*],
        });
    };
}

pub(crate) use help_entry;

pub struct HelpRegistry {
    entries: HashMap<String, HelpEntry>,
}

impl HelpRegistry {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, entry: HelpEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<HelpEntry> {
        self.entries.get(name).cloned()
    }

    pub fn by_category(&self) -> HashMap<String, Vec<HelpEntry>> {
        let mut by_cat: HashMap<String, Vec<HelpEntry>> = HashMap::new();
        for entry in self.entries.values() {
            by_cat.entry(entry.category.clone()).or_default().push(entry.clone());
        }
        for entries in by_cat.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
        by_cat
    }
}

impl Default for HelpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static HELP_REGISTRY: RefCell<HelpRegistry> = RefCell::new(HelpRegistry::new());
}

pub fn register_help(entry: HelpEntry) {
    HELP_REGISTRY.with(|reg| reg.borrow_mut().register(entry));
}

pub fn get_help(name: &str) -> Option<HelpEntry> {
    HELP_REGISTRY.with(|reg| reg.borrow().get(name))
}

pub fn all_by_category() -> HashMap<String, Vec<HelpEntry>> {
    HELP_REGISTRY.with(|reg| reg.borrow().by_category())
}

pub fn format_help_entry(entry: &HelpEntry) -> String {
    let mut output = String::new();
    output.push_str(&format!("{} - {}\n", entry.name, entry.category));
    output.push_str("----------------------------------------\n");
    output.push_str("Signature:\n");
    for line in entry.signature.lines() {
        output.push_str(&format!("  {}\n", line));
    }
    output.push('\n');
    output.push_str("Description:\n");
    for line in entry.description.lines() {
        output.push_str(&format!("  {}\n", line));
    }
    if !entry.examples.is_empty() {
        output.push('\n');
        output.push_str("Examples:\n");
        for example in &entry.examples {
            output.push_str(&format!("  {}\n", example));
        }
    }
    if !entry.related.is_empty() {
        output.push('\n');
        output.push_str("Related:\n");
        output.push_str(&format!("  {}\n", entry.related.join(", ")));
    }
    output.push_str("----------------------------------------");
    output
}

const CATEGORY_ORDER: &[&str] = &[
    "Arithmetic",
    "Comparison",
    "Conversion",
    "Sequence",
    "Control",
    "Booleans",
    "Host",
];

pub fn format_quick_reference() -> String {
    let mut output = String::new();
    let by_cat = all_by_category();
    let total = by_cat.values().map(|v| v.len()).sum::<usize>();
    output.push_str(&format!("Available functions ({} total)\n", total));
    output.push_str("----------------------------------------\n\n");
    for category in CATEGORY_ORDER {
        if let Some(entries) = by_cat.get(*category) {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            output.push_str(&format!("{} ({})\n  {}\n\n", category, names.len(), names.join(", ")));
        }
    }
    output.push_str("Call (help \"name\") for detailed help on one function.");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get_roundtrip() {
        register_help(HelpEntry {
            name: "test-fn".to_string(),
            signature: "(test-fn x)".to_string(),
            description: "Test function".to_string(),
            examples: vec![],
            related: vec![],
            category: "Test".to_string(),
        });
        assert_eq!(get_help("test-fn").unwrap().name, "test-fn");
    }

    #[test]
    fn format_help_entry_includes_all_sections() {
        let entry = HelpEntry {
            name: "test".to_string(),
            signature: "(test x)".to_string(),
            description: "A test function".to_string(),
            examples: vec!["(test 1)".to_string()],
            related: vec!["other".to_string()],
            category: "Test".to_string(),
        };
        let formatted = format_help_entry(&entry);
        assert!(formatted.contains("test - Test"));
        assert!(formatted.contains("A test function"));
        assert!(formatted.contains("(test 1)"));
    }
}
