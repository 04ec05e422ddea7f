//! Prompt pack builder for parser generation and repair.
//!
//! Templates mark their sections with `<!-- section:KEY required|droppable -->`.
//! After rendering, the builder keeps the pack within a byte budget by dropping
//! droppable sections in a fixed order. If that is still not enough, the
//! largest section outside the contract and the shape requirements is
//! truncated. Those two are always sent whole.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::Environment;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::structure::StructuralDescription;

const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");
const REPAIR_TEMPLATE: &str = include_str!("prompts/repair.md");

/// Sections removed first when the pack is over budget.
const DROP_ORDER: [&str; 3] = ["text", "tables", "samples"];
/// Sections never truncated.
const PROTECTED: [&str; 2] = ["contract", "expected"];
const TRUNCATION_MARKER: &str = "\n[truncated]";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section marker regex should be valid")
});

#[derive(Debug, Clone, Serialize)]
struct ColumnDtype {
    name: String,
    dtype: String,
}

/// Values shared by both templates, precomputed as display strings.
#[derive(Debug, Clone, Serialize)]
struct ShapeContext {
    columns: String,
    total_rows: usize,
    dtypes: Vec<ColumnDtype>,
    page_count: usize,
    table_count: usize,
    samples: String,
    tables: String,
    text: String,
}

impl ShapeContext {
    fn from_structure(structure: &StructuralDescription) -> Result<Self> {
        let expected = &structure.expected_output;
        let dtypes = expected
            .columns
            .iter()
            .map(|name| ColumnDtype {
                name: name.clone(),
                dtype: expected.dtype_of(name).to_string(),
            })
            .collect();
        Ok(Self {
            columns: python_list(&expected.columns),
            total_rows: expected.total_rows,
            dtypes,
            page_count: structure.page_count(),
            table_count: structure.tables.len(),
            samples: serde_json::to_string_pretty(&expected.sample_rows)
                .context("serialize sample rows")?,
            tables: serde_json::to_string_pretty(&structure.tables)
                .context("serialize extracted tables")?,
            text: page_text(&structure.text_blocks),
        })
    }
}

#[derive(Debug, Serialize)]
struct RepairContext<'a> {
    #[serde(flatten)]
    shape: &'a ShapeContext,
    error: &'a str,
    previous_code: &'a str,
}

/// `['a', 'b']`, the way the model will see column lists in errors too.
fn python_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn page_text(blocks: &[String]) -> String {
    blocks
        .iter()
        .enumerate()
        .map(|(idx, text)| format!("--- page {} ---\n{}", idx + 1, text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        env.add_template("repair", REPAIR_TEMPLATE)
            .expect("repair template should be valid");
        Self { env }
    }

    fn render_generate(&self, shape: &ShapeContext) -> Result<String> {
        let template = self.env.get_template("generate")?;
        let rendered = template
            .render(shape)
            .context("render generate template")?;
        Ok(rendered)
    }

    fn render_repair(&self, shape: &ShapeContext, previous_code: &str, error: &str) -> Result<String> {
        let template = self.env.get_template("repair")?;
        let rendered = template
            .render(RepairContext {
                shape,
                error: error.trim(),
                previous_code: previous_code.trim_end(),
            })
            .context("render repair template")?;
        Ok(rendered)
    }
}

#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::with_capacity(matches.len());

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |next| next.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

fn total_len(sections: &[ParsedSection]) -> usize {
    sections.iter().map(|s| s.content.len()).sum()
}

fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) <= budget {
        return;
    }
    let Some(idx) = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| !PROTECTED.contains(&s.key.as_str()))
        .max_by_key(|(_, s)| s.content.len())
        .map(|(idx, _)| idx)
    else {
        warn!(
            budget,
            total = total_len(sections),
            "prompt over budget with only protected sections left"
        );
        return;
    };
    let others = total_len(sections) - sections[idx].content.len();
    let allowed = budget.saturating_sub(others);
    let target = &mut sections[idx];
    let before_len = target.content.len();
    if allowed > TRUNCATION_MARKER.len() {
        truncate_at_char_boundary(&mut target.content, allowed - TRUNCATION_MARKER.len());
        target.content.push_str(TRUNCATION_MARKER);
    } else {
        truncate_at_char_boundary(&mut target.content, allowed);
    }
    debug!(
        section = target.key,
        before_len,
        after_len = target.content.len(),
        "truncated section for budget"
    );
}

fn truncate_at_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds prompt packs within a byte budget, dropping page text first.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Prompt for a first attempt.
    pub fn build_generate(&self, structure: &StructuralDescription) -> Result<PromptPack> {
        let shape = ShapeContext::from_structure(structure)?;
        let rendered = PromptEngine::new().render_generate(&shape)?;
        Ok(self.pack(&rendered))
    }

    /// Prompt for a repair attempt: the failing code and its error come first.
    pub fn build_repair(
        &self,
        structure: &StructuralDescription,
        previous_code: &str,
        error: &str,
    ) -> Result<PromptPack> {
        let shape = ShapeContext::from_structure(structure)?;
        let rendered = PromptEngine::new().render_repair(&shape, previous_code, error)?;
        Ok(self.pack(&rendered))
    }

    fn pack(&self, rendered: &str) -> PromptPack {
        let mut sections = parse_sections(rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        PromptPack {
            content: render_sections(&sections),
        }
    }
}

/// A rendered prompt ready to send to the generator.
#[derive(Debug, Clone)]
pub struct PromptPack {
    content: String,
}

impl PromptPack {
    pub fn as_str(&self) -> &str {
        &self.content
    }
}
