use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use strand_config::{ConfigLoader, StrandConfig};
use strand_core::{CallRecorder, Channel, Clock, StrandError, SystemClock, WorkflowStats};
use strand_driver::{CdpDriver, Driver};
use strand_flow::{SessionFactory, TemplateReply, Workflows};
use strand_gateway::{HttpTransport, RequestGateway, SessionHeaders};
use strand_sched::{Coordinator, IntervalCoordinator, WorkflowKind};
use strand_state::{Gate, StateStore};

/// Strand — resilient extraction-and-delivery engine
#[derive(Parser)]
#[command(name = "strand", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to strand.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one workflow once and print its stats as JSON
    Run {
        /// Workflow: story_sync, feed_sync, capability_scan, capability_refresh
        workflow: String,

        /// Maximum items to process in this run
        #[arg(short = 'n', long, default_value = "10")]
        limit: u32,
    },
    /// Show recent outcome and call counts from the state store
    Status {
        /// Look-back window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },
    /// Show the interaction gate for one target
    Gate {
        /// Target identifier
        target: String,

        /// Channel: message or story_reply
        #[arg(long, default_value = "message")]
        channel: String,
    },
    /// Run all workflows on their schedule until interrupted
    Daemon {
        /// Per-run item limit passed to every workflow
        #[arg(short = 'n', long, default_value = "10")]
        limit: u32,
    },
}

/// Browser sessions over the local Chrome DevTools port.
struct CdpSessionFactory {
    config: strand_config::DriverConfig,
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
    async fn open(&self) -> strand_core::Result<Arc<dyn Driver>> {
        let driver = CdpDriver::connect(
            self.config.cdp_port,
            std::time::Duration::from_secs(self.config.nav_timeout_secs),
        )
        .await?;
        Ok(Arc::new(driver))
    }
}

/// Everything a command needs, wired over one account.
struct Engine {
    config: StrandConfig,
    store: Arc<StateStore>,
    workflows: Workflows,
}

impl Engine {
    fn build(config: StrandConfig) -> strand_core::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(open_store(&config, clock.clone())?);

        let headers = SessionHeaders::from_account(&config.account);
        let transport = Arc::new(HttpTransport::new(config.account.api_base.clone(), headers)?);
        let gateway = Arc::new(RequestGateway::new(
            config.account.account_id.clone(),
            config.gateway.clone(),
            transport,
            store.clone() as Arc<dyn CallRecorder>,
            clock,
        ));
        let sessions = Arc::new(CdpSessionFactory {
            config: config.driver.clone(),
        });
        let workflows = Workflows::new(
            config.clone(),
            store.clone(),
            gateway,
            sessions,
            Arc::new(TemplateReply::default()),
        );
        Ok(Self {
            config,
            store,
            workflows,
        })
    }

    async fn run_workflow(&self, kind: WorkflowKind, limit: u32) -> strand_core::Result<WorkflowStats> {
        match kind {
            WorkflowKind::StorySync => self.workflows.story_sync(limit).await,
            WorkflowKind::FeedSync => self.workflows.feed_sync(limit).await,
            WorkflowKind::CapabilityScan => self.workflows.capability_scan(limit).await,
            WorkflowKind::CapabilityRefresh => self.workflows.capability_refresh(limit).await,
        }
    }
}

fn open_store(config: &StrandConfig, clock: Arc<dyn Clock>) -> strand_core::Result<StateStore> {
    let path = match &config.storage.db_path {
        Some(p) => p.clone(),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".strand")
            .join("strand.db"),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    StateStore::open(&path, clock)
}

impl Cli {
    pub async fn run(self) -> strand_core::Result<()> {
        let config = ConfigLoader::load(self.config.as_deref())?;

        let level = self
            .log_level
            .as_deref()
            .unwrap_or(&config.logging.level)
            .to_string();
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
        if config.logging.json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }

        match self.command {
            Commands::Run { workflow, limit } => Self::cmd_run(config, &workflow, limit).await,
            Commands::Status { hours } => Self::cmd_status(config, hours),
            Commands::Gate { target, channel } => Self::cmd_gate(config, &target, &channel),
            Commands::Daemon { limit } => Self::cmd_daemon(config, limit).await,
        }
    }

    async fn cmd_run(config: StrandConfig, workflow: &str, limit: u32) -> strand_core::Result<()> {
        let kind = WorkflowKind::parse(workflow).ok_or_else(|| {
            StrandError::Config(format!(
                "unknown workflow {workflow:?} — expected story_sync, feed_sync, \
                 capability_scan, or capability_refresh"
            ))
        })?;
        let engine = Engine::build(config)?;
        let stats = engine.run_workflow(kind, limit).await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        Ok(())
    }

    fn cmd_status(config: StrandConfig, hours: i64) -> strand_core::Result<()> {
        let store = open_store(&config, Arc::new(SystemClock))?;
        let since = (chrono::Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();
        let outcomes = store.outcome_counts_since(&since)?;
        let calls = store.call_counts_since(&since)?;
        let targets = store.known_targets()?;

        let status = serde_json::json!({
            "account": config.account.account_id,
            "window_hours": hours,
            "known_targets": targets.len(),
            "outcomes": outcomes.iter().map(|(k, v)| (k.clone(), *v))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "calls": calls.iter().map(|(k, v)| (k.clone(), *v))
                .collect::<std::collections::BTreeMap<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }

    fn cmd_gate(config: StrandConfig, target: &str, channel: &str) -> strand_core::Result<()> {
        let channel = Channel::parse(channel).ok_or_else(|| {
            StrandError::Config(format!(
                "unknown channel {channel:?} — expected message or story_reply"
            ))
        })?;
        let store = open_store(&config, Arc::new(SystemClock))?;
        let target = target.to_string();

        let gate = store.gate(&target, channel)?;
        let record = store.interaction(&target, channel)?;
        let out = match gate {
            Gate::Allow => serde_json::json!({
                "target": target,
                "channel": channel.as_str(),
                "allow": true,
                "state": record.map(|r| r.state.as_str()),
            }),
            Gate::Skip { state, until } => serde_json::json!({
                "target": target,
                "channel": channel.as_str(),
                "allow": false,
                "state": state.as_str(),
                "until": until.to_rfc3339(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        Ok(())
    }

    async fn cmd_daemon(config: StrandConfig, limit: u32) -> strand_core::Result<()> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let coordinator = IntervalCoordinator::new(&config.scheduler, clock)?;
        let engine = Engine::build(config)?;
        let account = engine.config.account.account_id.clone();
        let deadline =
            std::time::Duration::from_secs(engine.config.scheduler.workflow_deadline_secs);
        info!(account = %account, "daemon started");

        loop {
            for kind in WorkflowKind::SCHEDULED {
                if !coordinator.due(&account, kind) {
                    continue;
                }
                let effective = coordinator.effective(kind);
                info!(workflow = %effective, limit, "workflow due");

                // Timing out drops the in-flight run; the driver guard
                // releases its browser session in the background.
                let run = tokio::time::timeout(deadline, engine.run_workflow(effective, limit));
                match run.await {
                    Err(_) => {
                        warn!(workflow = %effective, deadline_secs = deadline.as_secs(), "workflow hit the deadline");
                        coordinator.set_health(false);
                    }
                    Ok(Ok(stats)) => {
                        info!(
                            workflow = %effective,
                            items = stats.items_seen,
                            succeeded = stats.succeeded,
                            failed = stats.failed,
                            exit = %stats.exit_reason,
                            "workflow finished"
                        );
                        coordinator.set_health(stats.exit_reason.is_healthy());
                    }
                    Ok(Err(StrandError::AuthExpired(why))) => {
                        error!(error = %why, "session expired — stopping the daemon");
                        return Err(StrandError::AuthExpired(why));
                    }
                    Ok(Err(e)) => {
                        warn!(workflow = %effective, error = %e, "workflow failed");
                        coordinator.set_health(false);
                    }
                }
                coordinator.reschedule(&account, kind, coordinator.next_fire(kind));
            }

            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
    }
}
