//! Run command handler

use crate::cli::RunArgs;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use morph_core::{
    Context, Dispatch, HttpProvider, MediaOptions, MorphConfig, ObjectSchema, OutputFormat, PromptTransformer,
    Provider, Runtime, TransformationEvent, TransformerResult,
};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

/// Handle the run command
#[instrument(skip_all, fields(transformer = %args.name, asynchronous = args.asynchronous))]
pub async fn handle_run(args: RunArgs, mut config: MorphConfig, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::new("run_command");

    if args.no_cache {
        debug!("Result cache disabled for this run");
        config.cache.enabled = false;
    }

    let provider = match &args.provider {
        Some(name) => name.parse::<Provider>()?,
        None => config.providers.default,
    };
    let transformer = build_transformer(&args, provider)?;
    let context = parse_context(&args.context)?;

    let mut adapter = HttpProvider::new(config.providers.clone(), &config.http)?;
    if let Some(key) = &args.api_key {
        adapter = adapter.with_api_key(provider, key.clone());
    }

    let Runtime {
        orchestrator,
        events,
        worker,
    } = Runtime::from_config(&config, Arc::new(adapter))?;

    let mut request = orchestrator
        .request()
        .with_transformer(Arc::new(transformer))
        .with_context(context);

    if let Some(text) = &args.text {
        request = request.with_text(text.clone());
    } else if let Some(url) = &args.url {
        info!(url = %url, "Fetching content");
        request = request.with_url(url, None).await?;
    } else if let Some(path) = &args.media {
        let options = MediaOptions {
            kind: args.media_kind.map(Into::into),
            ..MediaOptions::default()
        };
        request = request.with_media(path, options).await?;
    } else {
        return Err(Error::invalid_args("One of --text, --url or --media is required"));
    }

    if !args.asynchronous {
        return match request.run().await? {
            Dispatch::Completed(result) => report(result, output),
            Dispatch::Pending(job) => Err(Error::other(format!("Job {} was queued unexpectedly", job.id))),
        };
    }

    let mut receiver = events.subscribe();
    let worker_handle = worker.spawn();

    let outcome = match request.with_async().run().await? {
        Dispatch::Completed(result) => report(result, output),
        Dispatch::Pending(job) => {
            output.pending_job(&job)?;
            loop {
                match receiver.recv().await {
                    Ok(event) if event.job_id() == job.id => {
                        output.event(&event)?;
                        match event {
                            TransformationEvent::Completed { result, .. } => break report(result, output),
                            TransformationEvent::Failed {
                                error, terminal: true, ..
                            } => break Err(Error::TransformationFailed { errors: vec![error] }),
                            _ => {}
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event stream lagged"),
                    Err(RecvError::Closed) => {
                        break Err(Error::other(format!("Event stream closed before job {} finished", job.id)))
                    }
                }
            }
        }
    };

    worker_handle.abort();
    outcome
}

fn report(result: TransformerResult, output: &mut OutputWriter) -> Result<()> {
    output.transformer_result(&result)?;
    if result.is_successful() {
        Ok(())
    } else {
        Err(Error::TransformationFailed {
            errors: result.errors().to_vec(),
        })
    }
}

fn build_transformer(args: &RunArgs, provider: Provider) -> Result<PromptTransformer> {
    let mut transformer = PromptTransformer::new(args.name.clone(), args.prompt.clone()).with_provider(provider);

    if let Some(system) = &args.system {
        transformer = transformer.with_system_prompt(system.clone());
    }
    if let Some(model) = &args.model {
        transformer = transformer.with_model(model.clone());
    }
    if let Some(temperature) = args.temperature {
        transformer = transformer.with_temperature(temperature);
    }
    if let Some(top_p) = args.top_p {
        transformer = transformer.with_top_p(top_p);
    }
    if let Some(path) = &args.schema {
        transformer = transformer.with_output_format(OutputFormat::Schema(load_schema(path)?));
    }
    Ok(transformer)
}

/// Read an object schema from a JSON or YAML file
fn load_schema(path: &Path) -> Result<ObjectSchema> {
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s == "yaml" || s == "yml")
        .unwrap_or(false);

    if is_yaml {
        serde_yaml::from_str(&content).map_err(|_| Error::InvalidFormat {
            path: path.to_path_buf(),
            expected: "YAML object schema".to_string(),
        })
    } else {
        serde_json::from_str(&content).map_err(|_| Error::InvalidFormat {
            path: path.to_path_buf(),
            expected: "JSON object schema".to_string(),
        })
    }
}

/// Parse `KEY=VALUE` pairs; values that parse as JSON keep their type
fn parse_context(entries: &[String]) -> Result<Context> {
    let mut context = Context::new();
    for entry in entries {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| Error::invalid_args(format!("Context entry '{}' must be KEY=VALUE", entry)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::invalid_args(format!("Context entry '{}' has an empty key", entry)));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}
