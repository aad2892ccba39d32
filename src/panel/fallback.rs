use crate::panel::runner::CommandRunner;

/// What to do when an attempt's command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Swallow the failure and try the next attempt.
    TryNext,
    /// Stop here and report the failure.
    Surface,
    /// Swallow the failure and treat the command as issued anyway.
    Proceed,
}

/// One backend command in an ordered fallback chain.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub backend: &'static str,
    pub argv: Vec<String>,
    pub on_failure: OnFailure,
}

impl Attempt {
    pub fn new(backend: &'static str, argv: &[&str], on_failure: OnFailure) -> Self {
        Self {
            backend,
            argv: argv.iter().map(|s| s.to_string()).collect(),
            on_failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    Issued { backend: &'static str },
    Failed { backend: &'static str, message: String },
}

/// Run attempts in order until one is issued or a failure must be surfaced.
///
/// A chain whose last attempt is `TryNext` surfaces that attempt's failure.
pub async fn run_chain(runner: &dyn CommandRunner, app: &str, attempts: &[Attempt]) -> ChainOutcome {
    let mut last: Option<(&'static str, String)> = None;
    for a in attempts {
        let argv: Vec<&str> = a.argv.iter().map(|s| s.as_str()).collect();
        let out = runner.run(&argv).await;
        if out.success {
            log::info!("[service] app={app} attempt={} backend={} outcome=issued", argv.join(" "), a.backend);
            return ChainOutcome::Issued { backend: a.backend };
        }
        let err = out.error_text();
        match a.on_failure {
            OnFailure::TryNext => {
                log::debug!(
                    "[service] app={app} attempt={} backend={} outcome=failed decision=try_next err={err:?}",
                    argv.join(" "),
                    a.backend
                );
                last = Some((a.backend, err));
            }
            OnFailure::Proceed => {
                log::debug!(
                    "[service] app={app} attempt={} backend={} outcome=failed decision=proceed err={err:?}",
                    argv.join(" "),
                    a.backend
                );
                return ChainOutcome::Issued { backend: a.backend };
            }
            OnFailure::Surface => {
                log::warn!(
                    "[service] app={app} attempt={} backend={} outcome=failed err={err:?}",
                    argv.join(" "),
                    a.backend
                );
                return ChainOutcome::Failed { backend: a.backend, message: err };
            }
        }
    }
    match last {
        Some((backend, message)) => ChainOutcome::Failed { backend, message },
        None => ChainOutcome::Failed {
            backend: "none",
            message: "no backend configured".to_string(),
        },
    }
}
