use console::{Term, style};
use kyr::entity::repo;
use kyr::query::{DependencyQuery, find_repos};
use kyr::{GitHostKind, connect, store};

use crate::ShowAction;

pub(crate) async fn handle_show(
    action: ShowAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = connect(database_url).await?;
    let is_tty = Term::stdout().is_term();

    match action {
        ShowAction::Deps { query, language } => {
            let query = DependencyQuery::parse(&query, &language)?;
            for repo in find_repos(&db, &query).await? {
                println!("{}", repo_link(&repo, is_tty));
            }
        }
        ShowAction::Repos { org_name } => {
            let org = store::organization::get_by_name(&db, GitHostKind::GitHub, &org_name).await?;
            for repo in store::repo::find_by_organization(&db, org.id).await? {
                println!(
                    "{} {}",
                    style(repo_link(&repo, is_tty)).bold(),
                    style(format!(
                        "(pushed {})",
                        repo.pushed_at.with_timezone(&chrono::Utc).format("%Y-%m-%d")
                    ))
                    .dim()
                );
                for dep in store::dependency::find_by_repo(&db, repo.id).await? {
                    println!("  {} {}", dep.pin(), style(&dep.language).dim());
                }
            }
        }
    }

    Ok(())
}

/// Repository name as an OSC 8 hyperlink on terminals, `name url` otherwise.
fn repo_link(repo: &repo::Model, is_tty: bool) -> String {
    if is_tty {
        format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", repo.html_url, repo.name)
    } else {
        format!("{} {}", repo.name, repo.html_url)
    }
}
