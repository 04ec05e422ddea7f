//! Loop controller: analyze → generate → validate → (repair → validate)*.
//!
//! The controller owns the [`RunContext`] for one target and moves it through
//! an explicit state machine. Validation failures feed the repair cycle until
//! the attempt budget is spent; any other step failure ends the run at once.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::branch::decide_branch;
use crate::core::types::{Branch, RunContext, ValidationResult};
use crate::extract::extract_structure;
use crate::generate::{GenerationRequest, generate_parser};
use crate::io::artifact::ArtifactStore;
use crate::io::document::DocumentReader;
use crate::io::generator::TextGenerator;
use crate::io::prompt::PromptBuilder;
use crate::io::sandbox::Sandbox;
use crate::validate::validate_parser;

/// Step that ended a run early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analyze,
    Generate,
    Repair,
    Persist,
}

/// Reason why [`Agent::run`] stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LoopStop {
    /// A candidate matched the reference and was saved.
    Success { artifact_path: PathBuf },
    /// Every allowed attempt failed validation.
    Exhausted { attempts: u32 },
    /// A step other than validation failed.
    Failed { stage: Stage, error: String },
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    Analyzed {
        tables: usize,
        pages: usize,
    },
    Generated {
        attempt: u32,
        repair: bool,
    },
    Validated {
        attempt: u32,
        max_attempts: u32,
        result: ValidationResult,
    },
    Repairing {
        attempt: u32,
        max_attempts: u32,
    },
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub target: String,
    pub success: bool,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub error_messages: Vec<String>,
    pub stop: LoopStop,
}

impl LoopOutcome {
    fn from_context(ctx: &RunContext, stop: LoopStop) -> Self {
        Self {
            target: ctx.target.clone(),
            success: ctx.success,
            attempt_count: ctx.attempt_count,
            max_attempts: ctx.max_attempts,
            error_messages: ctx.error_messages.clone(),
            stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Analyze,
    Generate,
    Validate,
    Repair,
}

/// Wires the collaborators of one run together.
#[derive(Debug)]
pub struct Agent<D, G, S> {
    reader: D,
    generator: G,
    sandbox: S,
    prompts: PromptBuilder,
    store: ArtifactStore,
}

impl<D: DocumentReader, G: TextGenerator, S: Sandbox> Agent<D, G, S> {
    pub fn new(
        reader: D,
        generator: G,
        sandbox: S,
        prompts: PromptBuilder,
        store: ArtifactStore,
    ) -> Self {
        Self {
            reader,
            generator,
            sandbox,
            prompts,
            store,
        }
    }

    pub fn reader(&self) -> &D {
        &self.reader
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Drive `ctx` to a terminal state.
    ///
    /// Never returns an error: failures are recorded in `ctx.error_messages`
    /// and reported through [`LoopStop`].
    #[instrument(skip_all, fields(target = %ctx.target, max_attempts = ctx.max_attempts))]
    pub fn run<F: FnMut(&LoopEvent)>(&self, ctx: &mut RunContext, mut on_event: F) -> LoopOutcome {
        let mut state = State::Analyze;
        let mut validations = 0u32;
        loop {
            state = match state {
                State::Analyze => {
                    match extract_structure(&self.reader, &ctx.pdf_path, &ctx.csv_path) {
                        Ok(structure) => {
                            on_event(&LoopEvent::Analyzed {
                                tables: structure.tables.len(),
                                pages: structure.page_count(),
                            });
                            ctx.structure = structure;
                            State::Generate
                        }
                        Err(err) => {
                            return fail(ctx, Stage::Analyze, format!("PDF analysis failed: {err}"));
                        }
                    }
                }
                State::Generate => {
                    let request = GenerationRequest::Initial {
                        structure: &ctx.structure,
                    };
                    match generate_parser(&self.generator, &self.prompts, &request) {
                        Ok(code) => {
                            ctx.parser_code = code.code;
                            on_event(&LoopEvent::Generated {
                                attempt: validations + 1,
                                repair: false,
                            });
                            State::Validate
                        }
                        Err(err) => {
                            return fail(
                                ctx,
                                Stage::Generate,
                                format!("Parser generation failed: {err}"),
                            );
                        }
                    }
                }
                State::Validate => {
                    validations += 1;
                    let result = validate_parser(
                        &self.sandbox,
                        &ctx.parser_code,
                        &ctx.pdf_path,
                        &ctx.csv_path,
                    );
                    ctx.record_validation(result.clone());
                    on_event(&LoopEvent::Validated {
                        attempt: validations,
                        max_attempts: ctx.max_attempts,
                        result,
                    });
                    match decide_branch(ctx) {
                        Branch::Success => return self.finish(ctx),
                        Branch::Exhausted => {
                            warn!(attempts = ctx.attempt_count, "attempts exhausted");
                            let stop = LoopStop::Exhausted {
                                attempts: ctx.attempt_count,
                            };
                            return LoopOutcome::from_context(ctx, stop);
                        }
                        Branch::Continue => State::Repair,
                    }
                }
                State::Repair => {
                    on_event(&LoopEvent::Repairing {
                        attempt: ctx.attempt_count,
                        max_attempts: ctx.max_attempts,
                    });
                    let error = ctx.last_error().unwrap_or("validation failed");
                    let request = GenerationRequest::Repair {
                        structure: &ctx.structure,
                        previous_code: &ctx.parser_code,
                        error,
                    };
                    match generate_parser(&self.generator, &self.prompts, &request) {
                        Ok(code) => {
                            ctx.parser_code = code.code;
                            on_event(&LoopEvent::Generated {
                                attempt: validations + 1,
                                repair: true,
                            });
                            State::Validate
                        }
                        Err(err) => {
                            return fail(ctx, Stage::Repair, format!("Parser fixing failed: {err}"));
                        }
                    }
                }
            };
        }
    }

    fn finish(&self, ctx: &mut RunContext) -> LoopOutcome {
        match self.store.save(&ctx.target, &ctx.parser_code) {
            Ok(artifact_path) => {
                info!(path = %artifact_path.display(), "run succeeded");
                LoopOutcome::from_context(ctx, LoopStop::Success { artifact_path })
            }
            Err(err) => fail(ctx, Stage::Persist, format!("Failed to save parser: {err:#}")),
        }
    }
}

fn fail(ctx: &mut RunContext, stage: Stage, message: String) -> LoopOutcome {
    warn!(?stage, error = %message, "run failed");
    ctx.record_error(message.clone());
    LoopOutcome::from_context(
        ctx,
        LoopStop::Failed {
            stage,
            error: message,
        },
    )
}
