//! `mnemograph status`: prints storage and pipeline health counters,
//! mirroring `/health/detailed` (§4.12, §6).

use crate::config::Settings;
use crate::models::ItemStatus;
use crate::storage::build_factory;
use crate::Result;

/// Prints resource, item, embedding, and edge counts for the configured
/// storage backend.
///
/// # Errors
///
/// Returns an error if storage cannot be opened or a count query fails.
#[allow(clippy::print_stdout)]
pub fn run(settings: &Settings) -> Result<()> {
    let factory = build_factory(settings)?;
    let mut uow = factory.begin()?;

    let resources = uow.count_resources()?;
    let active_items = uow.count_items(None, ItemStatus::Active)?;
    let archived_items = uow.count_items(None, ItemStatus::Archived)?;
    let embeddings = uow.count_embeddings()?;
    let edges = uow.count_edges()?;
    let avg_confidence = uow.avg_confidence()?;

    println!("storage backend:  {:?}", settings.storage.backend);
    println!("resources:        {resources}");
    println!("active items:     {active_items}");
    println!("archived items:   {archived_items}");
    println!("embeddings:       {embeddings}");
    println!("graph edges:      {edges}");
    println!("avg confidence:   {avg_confidence:.3}");
    Ok(())
}
