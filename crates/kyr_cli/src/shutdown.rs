use std::future::Future;

use console::Term;

/// Run `work` until it finishes or Ctrl+C is pressed.
///
/// A pull writes in a single transaction at its end, so dropping it early
/// leaves the database as it was. Returns `None` when interrupted.
pub(crate) async fn until_interrupted<F: Future>(work: F) -> Option<F::Output> {
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        output = work => Some(output),
        () = interrupted => {
            if Term::stdout().is_term() {
                eprintln!("\n\nInterrupted, nothing was written.");
            } else {
                tracing::warn!("Interrupted, nothing was written");
            }
            None
        }
    }
}
