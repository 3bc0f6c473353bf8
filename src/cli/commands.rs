use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::cli::config::AppConfig;
use crate::driver::appium::AppiumDriver;
use crate::error::TransferError;
use crate::event::event_model::load_events;
use crate::explorer::explorer::{AppScope, Explorer, save_target_events};
use crate::explorer::runner::Runner;
use crate::explorer::session::{SessionContext, SessionSnapshot};
use crate::graph::nav_graph::NavGraph;
use crate::rank::oracle::{HttpOracle, LexicalOracle, MemoOracle, SimilarityOracle};
use crate::rank::ranker::sort_candidates;
use crate::report::console::{TransferSummary, format_paths, format_ranking, format_transfer_report};
use crate::trace::logger::TraceLogger;
use crate::widget::static_seed::{JsonWidgetFile, NoStaticWidgets, StaticExtractor};
use crate::widget::widget_db::WidgetDb;

// ============================================================================
// transfer subcommand
// ============================================================================

pub struct TransferArgs {
    pub events: PathBuf,
    pub widgets: Option<PathBuf>,
    pub graph: Option<PathBuf>,
    pub rid_names: Option<PathBuf>,
    pub test_name: Option<String>,
    pub resume: Option<PathBuf>,
    pub endpoint: Option<String>,
}

pub fn cmd_transfer(
    args: &TransferArgs,
    config: &AppConfig,
    oracle_endpoint: Option<&str>,
) -> Result<(), TransferError> {
    let package = config.app.package.as_str();
    if package.is_empty() {
        return Err(TransferError::Config("app.package is not set".into()));
    }

    let src_events = load_events(&args.events)?;
    let test_name = args
        .test_name
        .clone()
        .unwrap_or_else(|| file_stem(&args.events));
    info!("Transferring '{}' ({} source events) to {}", test_name, src_events.len(), package);

    let ctx = match &args.resume {
        Some(snapshot) => {
            info!("Resuming from {}", snapshot.display());
            SessionContext::restore(SessionSnapshot::load(snapshot)?)
        }
        None => SessionContext::new(
            seed_widgets(args.widgets.as_deref())?,
            load_graph(args.graph.as_deref(), args.rid_names.as_deref())?,
        ),
    };

    let endpoint = args.endpoint.as_deref().unwrap_or(&config.driver.endpoint);
    let driver = AppiumDriver::connect(endpoint, package, &config.driver.capabilities)?;
    let oracle = build_oracle(config, oracle_endpoint)?;
    let scope = AppScope::new(package).excluding(&config.app.out_of_scope)?;

    let trace = match &config.output.trace_file {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };

    let mut explorer = Explorer::new(driver, oracle, src_events.clone(), scope)
        .with_context(ctx)
        .with_settings(config.transfer.settings())
        .with_runner(Runner::new(&config.runner_settings())?)
        .with_rules(config.clickability.clone())
        .with_trace(trace)
        .with_snapshot_path(config.output.snapshot_dir.join(format!("{}.json", test_name)));

    let termination = explorer.run()?;
    save_target_events(&config.output.dir, &test_name, explorer.target_events())?;

    let ctx = explorer.context();
    let summary = TransferSummary {
        test_name: &test_name,
        source: &src_events,
        target: &ctx.run.tgt_events,
        termination,
        fitness: ctx.run.fitness,
        rounds: ctx.run.rounds,
    };
    print!("{}", format_transfer_report(&summary));
    Ok(())
}

// ============================================================================
// rank subcommand
// ============================================================================

pub fn cmd_rank(
    events: &Path,
    widgets: &Path,
    index: usize,
    top: Option<usize>,
    config: &AppConfig,
    oracle_endpoint: Option<&str>,
) -> Result<(), TransferError> {
    let src_events = load_events(events)?;
    let src = src_events.get(index).ok_or_else(|| TransferError::MalformedEvent {
        index,
        reason: format!("only {} source events", src_events.len()),
    })?;
    let db = seed_widgets(Some(widgets))?;
    let oracle = build_oracle(config, oracle_endpoint)?;

    let candidates = sort_candidates(
        src,
        db.iter(),
        &oracle,
        config.transfer.use_stopwords,
        top.unwrap_or(config.transfer.top_candidates),
    );
    print!("{}", format_ranking(src, &candidates));
    Ok(())
}

// ============================================================================
// paths subcommand
// ============================================================================

pub fn cmd_paths(graph: &Path, rid_names: &Path, from: &str, to: &str) -> Result<(), TransferError> {
    let graph = NavGraph::load_model(graph, rid_names)?;
    let paths = graph.paths_between(from, to);
    print!("{}", format_paths(from, to, &paths));
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Build the configured oracle, memoized for the session.
fn build_oracle(
    config: &AppConfig,
    cli_endpoint: Option<&str>,
) -> Result<MemoOracle<Box<dyn SimilarityOracle>>, TransferError> {
    let backend: Box<dyn SimilarityOracle> = match config.oracle_endpoint(cli_endpoint) {
        Some(endpoint) => {
            let timeout = Duration::from_millis(config.oracle.timeout_ms);
            let oracle = HttpOracle::new(endpoint, timeout)
                .map_err(|e| TransferError::Config(format!("oracle client: {}", e)))?;
            Box::new(oracle)
        }
        None => Box::new(LexicalOracle),
    };
    Ok(MemoOracle::new(backend))
}

fn seed_widgets(path: Option<&Path>) -> Result<WidgetDb, TransferError> {
    let extractor: Box<dyn StaticExtractor> = match path {
        Some(path) => Box::new(JsonWidgetFile::new(path)),
        None => Box::new(NoStaticWidgets),
    };
    let widgets = extractor.extract()?;
    info!("{} static widgets", widgets.len());
    Ok(WidgetDb::seeded(widgets))
}

fn load_graph(graph: Option<&Path>, rid_names: Option<&Path>) -> Result<NavGraph, TransferError> {
    match (graph, rid_names) {
        (Some(graph), Some(rid_names)) => NavGraph::load_model(graph, rid_names),
        (Some(_), None) => Err(TransferError::Config(
            "a navigation model needs its resource id names".into(),
        )),
        _ => Ok(NavGraph::new()),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transfer".to_string())
}
