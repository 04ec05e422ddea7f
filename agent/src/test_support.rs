//! Test-only collaborators and statement fixtures.

use std::cell::{Cell as StdCell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::structure::{DocumentStructure, ExtractedTable};
use crate::core::table::Table;
use crate::io::document::DocumentReader;
use crate::io::generator::TextGenerator;
use crate::io::sandbox::{Sandbox, SandboxOutcome};

/// Generator that replays scripted responses in order and records each prompt.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Wrap each code string in a python fence.
    pub fn with_code(codes: &[&str]) -> Self {
        Self::new(
            codes
                .iter()
                .map(|code| Ok(format!("```python\n{code}\n```")))
                .collect(),
        )
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

/// Sandbox that replays scripted outcomes in order and records each candidate.
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    outcomes: RefCell<VecDeque<Result<SandboxOutcome, String>>>,
    codes: RefCell<Vec<String>>,
}

impl ScriptedSandbox {
    pub fn new(outcomes: Vec<Result<SandboxOutcome, String>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            codes: RefCell::new(Vec::new()),
        }
    }

    pub fn codes(&self) -> Vec<String> {
        self.codes.borrow().clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn execute(&self, code: &str, _document: &Path) -> Result<SandboxOutcome> {
        self.codes.borrow_mut().push(code.to_string());
        match self.outcomes.borrow_mut().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted outcome left")),
        }
    }
}

/// Reader that returns a fixed structure (or a fixed error) and counts calls.
#[derive(Debug)]
pub struct StaticDocumentReader {
    result: Result<DocumentStructure, String>,
    calls: StdCell<usize>,
}

impl StaticDocumentReader {
    pub fn new(structure: DocumentStructure) -> Self {
        Self {
            result: Ok(structure),
            calls: StdCell::new(0),
        }
    }

    /// One statement table and one text block per page.
    pub fn with_pages(pages: usize) -> Self {
        let header: Vec<Option<String>> = statement_columns().into_iter().map(Some).collect();
        let tables = (0..pages)
            .map(|page| ExtractedTable {
                page,
                header_row: header.clone(),
                rows: vec![header.clone()],
            })
            .collect();
        let text_blocks = (0..pages)
            .map(|page| format!("ICICI Bank statement page {}", page + 1))
            .collect();
        Self::new(DocumentStructure {
            tables,
            text_blocks,
        })
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: StdCell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl DocumentReader for StaticDocumentReader {
    fn read(&self, _path: &Path) -> Result<DocumentStructure> {
        self.calls.set(self.calls.get() + 1);
        self.result.clone().map_err(|message| anyhow!(message))
    }
}

pub fn statement_columns() -> Vec<String> {
    ["Date", "Description", "Debit Amt", "Credit Amt", "Balance"]
        .map(String::from)
        .to_vec()
}

/// `rows` deterministic statement records: debits on even rows, credits on odd.
pub fn statement_records(rows: usize) -> Vec<Vec<String>> {
    (0..rows)
        .map(|i| {
            let amount = format!("{}.5", 100 + i);
            let (debit, credit) = if i % 2 == 0 {
                (amount, String::new())
            } else {
                (String::new(), amount)
            };
            vec![
                format!("{:02}-{:02}-2024", i % 28 + 1, i / 28 % 12 + 1),
                format!("Transaction {i}"),
                debit,
                credit,
                format!("{}.25", 5000 + i),
            ]
        })
        .collect()
}

/// The table a correct parser would produce for [`write_statement_csv`].
pub fn statement_table(rows: usize) -> Table {
    Table::infer(statement_columns(), &statement_records(rows))
}

/// Write `result.csv` with `rows` statement records into `dir`.
pub fn write_statement_csv(dir: &Path, rows: usize) -> PathBuf {
    let mut body = statement_columns().join(",");
    body.push('\n');
    for record in statement_records(rows) {
        body.push_str(&record.join(","));
        body.push('\n');
    }
    let path = dir.join("result.csv");
    fs::write(&path, body).expect("write statement csv");
    path
}
