//! `levelup update`: run an update description to completion.
//!
//! The handler starts the pipeline, renders every progress snapshot of the
//! game and, when a resource stops on a failure, asks the manager to retry
//! after a short delay until the retry budget is spent.

use std::time::Duration;

use levelup_core::{
    DownloadStatus, GameId, GameInfoRepository, InterruptReason, PipelineSettings,
    RemoteUpdateInfo, UpdateEvent, UpdateProgressSnapshot, UpdateRequest,
};
use levelup_update::StartOutcome;
use tracing::{debug, info, warn};

use crate::adapters::ProgressView;
use crate::adapters::terminal::install_label;
use crate::bootstrap::CliContext;
use crate::commands::UpdateArgs;
use crate::error::CliError;

const MIB: u64 = 1024 * 1024;

/// Pipeline settings requested on the command line.
pub fn pipeline_settings(args: &UpdateArgs) -> PipelineSettings {
    let mut settings =
        PipelineSettings::default().with_strict_hash_verification(args.strict_hashes);
    if let Some(mib) = args.free_space_mib {
        settings = settings.with_free_space_threshold(mib.saturating_mul(MIB));
    }
    for (name, value) in &args.headers {
        settings = settings.with_request_header(name, value);
    }
    settings
}

/// Read the update description from a file or fetch it over HTTP.
pub async fn load_update_info(
    http: &reqwest::Client,
    source: &str,
) -> Result<RemoteUpdateInfo, CliError> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        http.get(source)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    } else {
        tokio::fs::read(source)
            .await
            .map_err(|e| CliError::Io(format!("{source}: {e}")))?
    };
    Ok(RemoteUpdateInfo::from_json(&bytes)?)
}

fn build_request(args: &UpdateArgs, info: RemoteUpdateInfo) -> UpdateRequest {
    UpdateRequest {
        game_id: GameId::new(args.game_id.as_str()),
        title: args.title.clone().unwrap_or_else(|| args.game_id.clone()),
        target_directory: args.target.clone(),
        runnable_path: args.runnable.clone(),
        should_create_shortcut: args.shortcut,
        resources: info.into_resources(),
    }
}

/// First failure a retry could clear, described for the user.
pub fn failure_of(snapshot: &UpdateProgressSnapshot) -> Option<String> {
    snapshot.resources.iter().find_map(|resource| {
        let version = resource.internal_version;
        if resource.install.status.is_failure() {
            return Some(format!("v{version}: {}", install_label(resource.install.status)));
        }
        let download = &resource.download;
        if download.status != DownloadStatus::Interrupted {
            return None;
        }
        match &download.interrupt_reason {
            InterruptReason::Pause => None,
            InterruptReason::None => Some(format!("v{version}: download interrupted")),
            reason => Some(format!("v{version}: download interrupted ({reason})")),
        }
    })
}

/// What to do after a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Retry { attempt: u32, reason: String },
    GiveUp(String),
}

/// Spends a fixed retry budget on failures.
///
/// After a retry, snapshots that still show the old failure are ignored
/// until one arrives without a failure.
#[derive(Debug)]
pub struct RetrySupervisor {
    max_retries: u32,
    used: u32,
    recovering: bool,
}

impl RetrySupervisor {
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            used: 0,
            recovering: false,
        }
    }

    pub fn observe(&mut self, snapshot: &UpdateProgressSnapshot) -> Verdict {
        let Some(reason) = failure_of(snapshot) else {
            self.recovering = false;
            return Verdict::Continue;
        };
        if self.recovering {
            return Verdict::Continue;
        }
        if self.used >= self.max_retries {
            return Verdict::GiveUp(reason);
        }
        self.used += 1;
        self.recovering = true;
        Verdict::Retry {
            attempt: self.used,
            reason,
        }
    }
}

pub async fn execute(ctx: &CliContext, args: &UpdateArgs) -> Result<(), CliError> {
    let info = load_update_info(&ctx.http, &args.manifest).await?;
    let request = build_request(args, info);
    let game_id = request.game_id.clone();
    let resources = request.resources.len();

    match ctx.manager.start(request).await? {
        StartOutcome::Started { operation_id } => {
            info!(%game_id, %operation_id, resources, "update started");
        }
        StartOutcome::AlreadyInProgress => {
            return Err(CliError::Update(format!(
                "an update of {game_id} is already running"
            )));
        }
    }

    let mut view = ProgressView::new();
    let mut supervisor = RetrySupervisor::new(args.retries);
    let retry_delay = Duration::from_secs(args.retry_delay);
    let mut events = ctx.events.lock().await;

    let outcome = loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                ctx.manager.cancel(&game_id).await;
                break Err(CliError::Cancelled);
            }
        };
        let Some(event) = event else {
            break Err(CliError::Update("update pipeline stopped".into()));
        };
        let UpdateEvent::Progress { snapshot } = event else {
            continue;
        };
        if snapshot.game_id != game_id {
            continue;
        }

        view.render(&snapshot);
        if snapshot.is_finished {
            break Ok(snapshot);
        }
        match supervisor.observe(&snapshot) {
            Verdict::Continue => {}
            Verdict::Retry { attempt, reason } => {
                warn!(%game_id, attempt, %reason, "retrying failed update step");
                view.note(format!(
                    "{reason}; retrying ({attempt}/{})",
                    args.retries
                ));
                tokio::time::sleep(retry_delay).await;
                let retried = ctx.manager.retry(&game_id);
                debug!(%game_id, ?retried, "retry issued");
                if retried.is_noop() {
                    break Err(CliError::Failed(reason));
                }
            }
            Verdict::GiveUp(reason) => break Err(CliError::Failed(reason)),
        }
    };

    match outcome {
        Ok(snapshot) => {
            ctx.manager.acknowledge_finished(&game_id);
            view.finish(format!("{} is up to date", snapshot.title));
            if let Some(record) = ctx.game_info.get_game_info(&game_id).await? {
                println!(
                    "Installed v{} at {}",
                    record.internal_version,
                    record.runnable_path.display()
                );
            }
            Ok(())
        }
        Err(err) => {
            view.abandon(err.to_string());
            Err(err)
        }
    }
}
