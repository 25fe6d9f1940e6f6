//! Session driver: run one node of a session until the policy stops it.
//!
//! Each iteration validates the request, runs the provider, reconciles its
//! result files, applies the termination policy, and records every step in the
//! session's audit log. Any failure is logged as an `error` event and returned;
//! nothing is retried.

use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use crate::core::event::{Cursor, Event};
use crate::core::termination::{FixedPolicy, Verdict};
use crate::core::types::{AgentResult, Source};
use crate::error::{PipelineError, Result};
use crate::io::config::PipelineConfig;
use crate::io::event_log::EventLog;
use crate::io::layout::SessionPaths;
use crate::io::provider::{Provider, ProviderRequest, Validator};
use crate::io::result_store::normalize_files;

/// What to run for a session.
#[derive(Debug, Clone)]
pub struct SessionSpec<'a> {
    pub session: &'a str,
    /// Node position recorded in cursors (e.g. `"0"` or `"0.2"`).
    pub node_path: &'a str,
    /// How many times this node has been run, 1-based.
    pub node_run: u32,
    pub prompt: &'a str,
}

/// Outcome of one iteration, passed to the `on_iteration` callback.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: u32,
    pub source: Source,
    pub result: AgentResult,
    pub verdict: Verdict,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session: String,
    pub iterations: u32,
    pub verdict: Verdict,
}

/// Drive `provider` until the termination policy stops the loop.
///
/// `config.provider` must name `provider`; a mismatch is a config error and
/// nothing is logged.
#[instrument(skip_all, fields(session = spec.session, provider = provider.name()))]
pub fn run_session<P: Provider, V: Validator, F: FnMut(&IterationReport)>(
    paths: &SessionPaths,
    config: &PipelineConfig,
    spec: &SessionSpec<'_>,
    provider: &P,
    validator: &V,
    mut on_iteration: F,
) -> Result<SessionOutcome> {
    if config.provider.trim() != provider.name() {
        return Err(PipelineError::Config(format!(
            "session is configured for provider {:?} but {:?} was supplied",
            config.provider.trim(),
            provider.name()
        )));
    }

    let policy = FixedPolicy::new(config.termination);
    let log = EventLog::new(&paths.events_path);
    let node = Cursor::node(spec.node_path, spec.node_run, provider.name());

    log.append(Event::session_start(
        spec.session,
        data(json!({
            "provider": provider.name(),
            "model": config.model,
            "max_iterations": policy.target(),
        })),
    ))?;
    log.append(Event::node_start(spec.session, node.clone()))?;

    let mut iteration = 0u32;
    let verdict = loop {
        iteration += 1;
        let cursor = node.at_iteration(iteration);
        log.append(Event::iteration_start(spec.session, cursor.clone()))?;

        let report = match run_iteration(paths, config, spec, provider, validator, &policy, iteration)
        {
            Ok(report) => report,
            Err((stage, err)) => {
                let message = err.to_string();
                if let Err(log_err) = log.append(Event::error(
                    spec.session,
                    Some(cursor),
                    data(json!({ "stage": stage, "message": message })),
                )) {
                    warn!(error = %log_err, "could not record error event");
                }
                return Err(err);
            }
        };

        log.append(Event::iteration_complete(
            spec.session,
            cursor,
            data(json!({
                "source": report.source,
                "summary": report.result.summary,
                "decision": report.result.decision,
                "done": report.verdict.done,
                "reason": report.verdict.reason,
            })),
        ))?;
        info!(
            iteration,
            source = %report.source,
            done = report.verdict.done,
            "iteration complete"
        );
        on_iteration(&report);

        if report.verdict.done {
            break report.verdict;
        }
    };

    log.append(Event::node_complete(
        spec.session,
        node,
        data(json!({ "iterations": iteration, "reason": verdict.reason })),
    ))?;
    log.append(Event::session_complete(
        spec.session,
        data(json!({
            "iterations": iteration,
            "reason": verdict.reason,
            "status": if verdict.is_error() { "error" } else { "complete" },
        })),
    ))?;

    Ok(SessionOutcome {
        session: spec.session.to_string(),
        iterations: iteration,
        verdict,
    })
}

type StageResult<T> = std::result::Result<T, (&'static str, PipelineError)>;

fn run_iteration<P: Provider, V: Validator>(
    paths: &SessionPaths,
    config: &PipelineConfig,
    spec: &SessionSpec<'_>,
    provider: &P,
    validator: &V,
    policy: &FixedPolicy,
    iteration: u32,
) -> StageResult<IterationReport> {
    let iter_paths = paths.iteration(iteration);
    let request = ProviderRequest::for_iteration(
        spec.prompt,
        config.model.as_deref(),
        &paths.root,
        &iter_paths,
    );

    validator.check(&request).map_err(|err| ("validate", err))?;
    provider.execute(&request).map_err(|err| ("provider", err))?;

    let loaded = normalize_files(Some(&iter_paths.result_path), Some(&iter_paths.status_path))
        .map_err(|err| ("reconcile", err))?;
    let verdict = policy.decide(iteration, &loaded.result);

    Ok(IterationReport {
        iteration,
        source: loaded.source,
        result: loaded.result,
        verdict,
    })
}

fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
