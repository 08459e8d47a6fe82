//! `mnemograph jobs <which>`: runs one maintenance pipeline synchronously
//! from the CLI (§4.8, §4.12).

use super::JobKind;
use crate::config::Settings;
use crate::embedding::build_embedder;
use crate::jobs::{run_monthly, run_nightly, run_weekly};
use crate::llm::OpenAiCompatibleClient;
use crate::storage::build_factory;
use crate::Result;

/// Runs the selected maintenance pipeline once and prints its stats as
/// pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if storage cannot be opened, a storage call within the
/// pipeline fails, or the transaction cannot be committed.
#[allow(clippy::print_stdout)]
pub fn run(settings: &Settings, which: JobKind) -> Result<()> {
    let factory = build_factory(settings)?;
    let mut uow = factory.begin()?;

    let report = match which {
        JobKind::Nightly => {
            let llm = OpenAiCompatibleClient::from_settings(&settings.llm);
            let stats = run_nightly(uow.as_mut(), &llm)?;
            serde_json::to_string_pretty(&stats)
        },
        JobKind::Weekly => {
            let stats = run_weekly(uow.as_mut())?;
            serde_json::to_string_pretty(&stats)
        },
        JobKind::Monthly => {
            let embedder = build_embedder(&settings.embedding)?;
            let stats = run_monthly(uow.as_mut(), embedder.as_ref(), settings.embedding.storage_dimensions)?;
            serde_json::to_string_pretty(&stats)
        },
    };

    uow.commit()?;
    println!("{}", report.unwrap_or_else(|_| "{}".to_string()));
    Ok(())
}
