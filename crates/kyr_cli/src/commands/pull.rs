use std::sync::Arc;
use std::time::Duration;

use console::style;
use kyr::fetch::{ApiRateLimiter, FetchContext};
use kyr::github::GitHub;
use kyr::http::ReqwestTransport;
use kyr::{
    GitHostKind, NameMatcher, PullEvent, PullSummary, Reconciler, RepoFilter, TokenPool,
    connect_and_migrate,
};

use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown::until_interrupted;
use crate::{PullAction, PullOptions};

type BoxError = Box<dyn std::error::Error>;

pub(crate) async fn handle_pull(
    host: GitHostKind,
    action: PullAction,
    opts: PullOptions,
    config: &Config,
    database_url: &str,
) -> Result<(), BoxError> {
    let db = connect_and_migrate(database_url).await?;
    let reconciler = match host {
        GitHostKind::GitHub => github_reconciler(db, config, &opts)?,
    };

    match action {
        PullAction::Org { org_name } => {
            let Some(events) = until_interrupted(reconciler.pull_organization(&org_name)).await
            else {
                return Ok(());
            };
            print_events(&events?);
        }
        PullAction::Repos {
            org_name,
            repo_names,
            prefix,
        } => {
            let filter = repo_filter(repo_names, prefix);
            let reporter = Arc::new(ProgressReporter::new(&org_name));
            let callback = reporter.as_callback();

            let outcome =
                until_interrupted(reconciler.pull_repos(&org_name, filter, Some(&callback))).await;
            reporter.finish();

            let Some(report) = outcome else {
                return Ok(());
            };
            let report = report?;
            print_events(&report.events);
            print_summary(&org_name, &report.summary);
        }
    }

    Ok(())
}

fn github_reconciler(
    db: sea_orm::DatabaseConnection,
    config: &Config,
    opts: &PullOptions,
) -> Result<Reconciler<GitHub>, BoxError> {
    let tokens = config.github_tokens();
    if tokens.is_empty() {
        return Err(
            "No GitHub token configured. Set github.tokens in kyr.toml or KYR_GITHUB__TOKENS."
                .into(),
        );
    }

    let timeout = Duration::from_secs(
        opts.request_timeout_secs
            .unwrap_or(config.pull.request_timeout_secs),
    );
    let transport = ReqwestTransport::with_timeout(timeout)?;
    let mut fetch = FetchContext::new(Arc::new(transport), Arc::new(TokenPool::new(tokens)))
        .with_request_timeout(timeout);

    let rps = config.pull.requests_per_second;
    if opts.no_rate_limit || rps == 0 {
        eprintln!("Warning: Rate limiting disabled - you may experience API throttling\n");
    } else {
        fetch = fetch.with_rate_limiter(ApiRateLimiter::new(rps));
    }

    let page_size = opts.page_size.unwrap_or(config.pull.page_size);
    let host = GitHub::new(fetch)
        .with_api_base(&config.github.api_url)
        .with_page_size(page_size);

    let file_paths = if opts.file_paths.is_empty() {
        config.pull.file_paths.clone()
    } else {
        opts.file_paths.clone()
    };

    Ok(Reconciler::new(db, host).with_file_paths(file_paths))
}

/// Explicit names win over a prefix; neither selects every repository.
fn repo_filter(repo_names: Vec<String>, prefix: Option<String>) -> RepoFilter {
    if !repo_names.is_empty() {
        RepoFilter::by_name(NameMatcher::one_of(repo_names))
    } else if let Some(prefix) = prefix {
        RepoFilter::by_name(NameMatcher::starts_with(prefix))
    } else {
        RepoFilter::all()
    }
}

fn print_events(events: &[PullEvent]) {
    for event in events {
        if event.is_failure() {
            eprintln!("{}", style(event).red());
        } else {
            println!("{}", style(event).green());
        }
    }
}

fn print_summary(org_name: &str, summary: &PullSummary) {
    println!();
    println!(
        "{} {}: {} new, {} updated, {} unchanged, {} removed, {} failed",
        style("Pulled").bold(),
        org_name,
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.removed,
        summary.failed,
    );
    if summary.dependencies_created > 0 {
        println!("  {} new dependency versions", summary.dependencies_created);
    }
}
