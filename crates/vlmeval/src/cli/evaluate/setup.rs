//! Run setup: config overrides, credentials, segment loading, run directory.

use std::path::Path;
use std::time::Duration;

use vlmeval_core::config::expand_path;
use vlmeval_core::{
    load_segments, Config, ModelSelector, OutputWriter, PromptTemplate, ProviderConfig,
    ProviderFactory, RetryPolicy, RunManager, SegmentFilter,
};

use super::{EvaluateArgs, RunContext};

/// Apply CLI path overrides on top of the loaded config.
pub fn apply_overrides(config: &mut Config, args: &EvaluateArgs) {
    if let Some(path) = &args.segments {
        config.general.segments_index = path.clone();
    }
    if let Some(path) = &args.crops_dir {
        config.general.crops_dir = path.clone();
    }
    if let Some(path) = &args.output_dir {
        config.general.output_dir = path.clone();
    }
}

/// Resolve the provider for the selected model, with per-run overrides.
pub fn provider_config(config: &Config, args: &EvaluateArgs) -> anyhow::Result<ProviderConfig> {
    let selector: ModelSelector = args.model.into();
    let mut provider = ProviderConfig::resolve(config, selector)?;
    if let Some(max_tokens) = args.max_tokens {
        provider = provider.with_max_output_tokens(max_tokens);
    }
    if let Some(delay) = args.delay {
        provider = provider.with_inter_request_delay(Duration::from_secs(delay));
    }
    Ok(provider)
}

/// Validate input, load config and segments, and assemble everything a run needs.
///
/// Returns `None` when the filter leaves nothing to evaluate; no run directory
/// is created in that case.
pub(crate) fn setup_run(args: &EvaluateArgs, config_path: Option<&Path>) -> anyhow::Result<Option<RunContext>> {
    let mut config = crate::cli::load_config(config_path)?;
    apply_overrides(&mut config, args);

    // Credentials are checked before any file is touched
    let provider_config = provider_config(&config, args)?;
    let prompt = PromptTemplate::select(
        args.prompt.map(Into::into),
        args.custom_prompt.as_deref(),
    );

    let index = config.segments_index();
    if !index.exists() {
        anyhow::bail!(
            "Segment index does not exist: {:?}\n\n  Hint: Pass --segments or set general.segments_index in the config file.",
            index
        );
    }
    let filter = SegmentFilter {
        page: args.page.clone(),
        limit: args.limit,
    };
    let segments = load_segments(&index, &config.crops_dir(), &filter)?;
    if segments.is_empty() {
        return Ok(None);
    }

    let writer = match &args.resume {
        Some(run_dir) => OutputWriter::resume(&expand_path(run_dir))?,
        None => OutputWriter::create_run(
            &config.output_dir(),
            &provider_config.model_dir_name(),
            chrono::Local::now(),
        )?,
    };

    tracing::info!(
        "Model: {} ({}), max_tokens={}, delay={:?}",
        provider_config.model_id,
        provider_config.api,
        provider_config.max_output_tokens,
        provider_config.inter_request_delay
    );
    tracing::info!("Prompt [{}]: {}", prompt.id, prompt.preview(80));

    let manager = RunManager::new(
        ProviderFactory::create(provider_config.api),
        provider_config,
        RetryPolicy::from_config(&config.run),
        prompt,
        writer,
    );

    Ok(Some(RunContext { manager, segments }))
}
