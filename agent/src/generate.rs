//! Code generation: structural description (and, on repair, the failing code
//! and its error) → candidate parser source.

use anyhow::{Context, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::code_block::{ExtractedCode, extract_code};
use crate::core::structure::StructuralDescription;
use crate::error::GenerationError;
use crate::io::generator::TextGenerator;
use crate::io::prompt::PromptBuilder;

/// What to ask the model for.
#[derive(Debug, Clone, Copy)]
pub enum GenerationRequest<'a> {
    Initial {
        structure: &'a StructuralDescription,
    },
    Repair {
        structure: &'a StructuralDescription,
        previous_code: &'a str,
        error: &'a str,
    },
}

impl GenerationRequest<'_> {
    pub fn is_repair(&self) -> bool {
        matches!(self, Self::Repair { .. })
    }
}

/// Build the prompt, call the model once, and pull the code out of the answer.
#[instrument(skip_all, fields(repair = request.is_repair()))]
pub fn generate_parser<G: TextGenerator + ?Sized>(
    generator: &G,
    prompts: &PromptBuilder,
    request: &GenerationRequest<'_>,
) -> Result<ExtractedCode, GenerationError> {
    let pack = match *request {
        GenerationRequest::Initial { structure } => prompts.build_generate(structure),
        GenerationRequest::Repair {
            structure,
            previous_code,
            error,
        } => prompts.build_repair(structure, previous_code, error),
    }
    .context("build prompt")
    .map_err(GenerationError)?;
    debug!(prompt_bytes = pack.as_str().len(), "prompt built");

    let response = generator.generate(pack.as_str()).map_err(GenerationError)?;
    let extracted =
        extract_code(&response).ok_or_else(|| GenerationError(anyhow!("empty response")))?;
    if !extracted.fenced {
        warn!("response has no fenced code block; using the whole response");
    }
    Ok(extracted)
}
