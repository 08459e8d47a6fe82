//! `mnemograph ingest`: appends a resource and runs extraction in one
//! transaction (§4.4, §4.12).

use crate::config::Settings;
use crate::embedding::build_embedder;
use crate::llm::OpenAiCompatibleClient;
use crate::pipeline;
use crate::storage::build_factory;
use crate::Result;

/// Ingests `content` from `source`, extracts facts from it, and commits.
///
/// # Errors
///
/// Returns an error if storage cannot be opened, the LLM call fails
/// outright, or the transaction cannot be committed.
#[allow(clippy::print_stdout)]
pub fn run(settings: &Settings, content: &str, source: &str) -> Result<()> {
    let factory = build_factory(settings)?;
    let embedder = build_embedder(&settings.embedding)?;
    let llm = OpenAiCompatibleClient::from_settings(&settings.llm);

    let mut uow = factory.begin()?;
    let resource = pipeline::ingest(uow.as_mut(), source, content, std::collections::HashMap::new())?;
    let items = pipeline::extract(uow.as_mut(), &llm, embedder.as_ref(), settings, &resource)?;
    uow.commit()?;

    println!("ingested resource {} ({} items extracted)", resource.id, items.len());
    Ok(())
}
