//! `mnemograph config`: prints the resolved configuration and which
//! fields were sourced from the environment (§4.12).

use crate::config::Settings;

/// Prints the resolved, non-secret configuration fields.
#[allow(clippy::print_stdout)]
pub fn run(settings: &Settings) {
    println!("storage.backend:            {:?}", settings.storage.backend);
    println!("storage.connection_string:  {}", settings.storage.connection_string);
    println!("embedding.provider:         {:?}", settings.embedding.provider);
    println!("embedding.model:            {}", settings.embedding.model);
    println!("embedding.storage_dimensions: {}", settings.embedding.storage_dimensions);
    println!("llm.endpoint:               {}", settings.llm.endpoint);
    println!("llm.model:                  {}", settings.llm.model);
    println!("llm.use_llm:                {}", settings.llm.use_llm);
    println!("conflict_strategy:          {:?}", settings.conflict_strategy);
    println!("http:                       {}:{}", settings.http.bind_address, settings.http.port);
    println!("log_level:                  {} (json={})", settings.log_level, settings.log_json);
    println!("limits.max_items_per_run:   {}", settings.limits.max_items_per_run);
    println!();
    println!("fields set from environment:");
    if settings.sources.is_empty() {
        println!("  (none, all defaults)");
    }
    for (key, env_name) in &settings.sources {
        println!("  {key} <- {env_name}");
    }
}
