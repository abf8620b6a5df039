//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde::Serialize;
use skillverse_core::Settings;
use skillverse_http::types::{Scenario, WhatIfRequest};
use skillverse_http::{ClientError, SessionStore, SkillverseClient};
use skillverse_realtime::{
    BridgeConfig, CacheKey, ConnectionState, NotificationCenter, QueryCache, RealtimeBridge,
    WebSocketTransport,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "SKILLVERSE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Follow live updates until Ctrl+C
    Watch,

    #[command(flatten)]
    Query(QueryCommands),
}

/// One-shot reads for the logged-in user
#[derive(Subcommand)]
pub enum QueryCommands {
    /// Dashboard summary
    Dashboard,

    /// Skill graph nodes
    Skills,

    /// Skill gaps against a target role
    Gap {
        #[arg(long)]
        role: Option<String>,
    },

    /// Learning path towards a target role
    LearningPath {
        #[arg(long)]
        role: Option<String>,
    },

    /// Questions of the quiz for a skill
    Quiz { skill: String },

    /// Market trend signals
    Trends,

    /// Recommended roles
    Roles,

    /// Project the effect of learning new skills
    WhatIf {
        /// Skill to learn; repeat for several
        #[arg(long = "skill", required = true)]
        skills: Vec<String>,

        /// Timeframe in months
        #[arg(long, default_value = "6")]
        months: u32,

        #[arg(long)]
        role: Option<String>,
    },
}

impl Commands {
    /// Commands that run until interrupted
    pub const fn is_long_running(&self) -> bool {
        matches!(self, Self::Watch)
    }

    pub async fn execute(self, settings: Settings, json: bool) -> Result<()> {
        let session = config::open_session(&settings)?;

        match self {
            Self::Login { email, password } => {
                let user = session.login(&email, &password).await?;
                println!("Logged in as {} <{}>", user.name, user.email);
                Ok(())
            }
            Self::Logout => {
                session.logout();
                println!("Logged out");
                Ok(())
            }
            Self::Whoami => {
                let user = require_user(&session).await?;
                emit(json, &user, || format!("{} <{}> ({})", user.name, user.email, user.id))
            }
            Self::Watch => {
                let user_id = require_user(&session).await?.id;
                watch(&settings, session.client(), &user_id).await
            }
            Self::Query(query) => {
                let user_id = require_user(&session).await?.id;
                query.run(session.client(), &user_id, json).await
            }
        }
    }
}

impl QueryCommands {
    async fn run(self, client: &SkillverseClient, user_id: &str, json: bool) -> Result<()> {
        match self {
            Self::Dashboard => {
                let dashboard = client.dashboard(user_id).await?;
                emit(json, &dashboard, || {
                    let stats = &dashboard.stats;
                    format!(
                        "{}\n  skills: {} (+{}%)\n  courses completed: {}\n  quizzes: {} (avg {:.0}%)\n  streak: {} days",
                        dashboard.user.name,
                        stats.total_skills,
                        stats.skill_growth,
                        stats.completed_courses,
                        stats.quizzes_taken,
                        stats.average_score,
                        stats.streak
                    )
                })
            }
            Self::Skills => {
                let graph = client.skill_graph(user_id).await?;
                emit(json, &graph, || {
                    graph
                        .nodes
                        .iter()
                        .map(|node| format!("{:<24} {:>3}  {}", node.data.label, node.data.level, node.data.category))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            Self::Gap { role } => {
                let analysis = client.gap_analysis(user_id, role.as_deref()).await?;
                emit(json, &analysis, || {
                    let mut lines = vec![format!(
                        "{}: {:.0}% ready",
                        analysis.role_name, analysis.overall_readiness
                    )];
                    lines.extend(analysis.gaps.iter().map(|gap| {
                        format!(
                            "  {:<24} {:>3} -> {:<3} {:?}",
                            gap.skill_name, gap.current_level, gap.required_level, gap.severity
                        )
                    }));
                    lines.join("\n")
                })
            }
            Self::LearningPath { role } => {
                let path = client.learning_path(user_id, role.as_deref()).await?;
                emit(json, &path, || {
                    let mut lines = vec![format!("{} ({})", path.role_name, path.total_duration)];
                    lines.extend(path.steps.iter().map(|step| {
                        let mark = if step.completed { "x" } else { " " };
                        format!("  [{mark}] {}. {} ({})", step.order, step.title, step.duration)
                    }));
                    lines.join("\n")
                })
            }
            Self::Quiz { skill } => {
                let quiz = client.quiz(&skill, Some(user_id)).await?;
                emit(json, &quiz, || {
                    let mut lines = vec![format!("{} quiz", quiz.skill_name)];
                    for (i, question) in quiz.questions.iter().enumerate() {
                        lines.push(format!("{}. {}", i + 1, question.question));
                        lines.extend(
                            question
                                .options
                                .iter()
                                .enumerate()
                                .map(|(n, option)| format!("   {n}) {option}")),
                        );
                    }
                    lines.join("\n")
                })
            }
            Self::Trends => {
                let trends = client.trend_signals().await?;
                emit(json, &trends, || {
                    trends
                        .signals
                        .iter()
                        .map(|s| format!("{:<24} {:<9} demand {:.0}", s.skill_name, s.trend.to_string(), s.demand_score))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            Self::Roles => {
                let roles = client.role_recommendations(user_id).await?;
                emit(json, &roles, || {
                    roles
                        .recommendations
                        .iter()
                        .map(|r| format!("{:<32} {:.0}% match", r.title, r.match_score))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            Self::WhatIf {
                skills,
                months,
                role,
            } => {
                let request = WhatIfRequest {
                    user_id: user_id.to_string(),
                    scenario: Scenario {
                        skills_to_learn: skills,
                        target_role: role,
                        timeframe: months,
                    },
                };
                let outcome = client.simulate_what_if(&request).await?;
                emit(json, &outcome, || {
                    format!(
                        "match score: {:.0} -> {:.0}\nmarketability: {:.0} -> {:.0}\neffort: {} hours ({} per day)",
                        outcome.current_state.match_score,
                        outcome.projected_state.match_score,
                        outcome.current_state.marketability,
                        outcome.projected_state.marketability,
                        outcome.required_effort.total_hours,
                        outcome.required_effort.daily_commitment
                    )
                })
            }
        }
    }
}

/// Human-readable text for a failed command
pub fn describe_error(error: &anyhow::Error) -> String {
    error.downcast_ref::<ClientError>().map_or_else(
        || format!("Error: {error:#}"),
        |e| format!("{}: {}", e.title(), e.user_message()),
    )
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human());
    }
    Ok(())
}

async fn require_user(session: &SessionStore) -> Result<skillverse_http::types::User> {
    match session.restore().await {
        Some(user) => Ok(user),
        None => bail!("Not logged in, run `skillverse login`"),
    }
}

async fn watch(settings: &Settings, client: &SkillverseClient, user_id: &str) -> Result<()> {
    let transport = WebSocketTransport::new(settings.socket_url(), &settings.realtime.path)
        .context("Invalid live channel URL")?;
    let cache = Arc::new(QueryCache::new());
    let notifications = Arc::new(NotificationCenter::new());
    let bridge = RealtimeBridge::builder(Arc::new(transport))
        .cache(cache.clone())
        .notifications(notifications.clone())
        .config(BridgeConfig::from_settings(settings))
        .build();

    let dashboard_key = CacheKey::dashboard(user_id);
    print_streak(&cache, client, &dashboard_key, user_id).await;

    let mut appended = notifications.subscribe();
    let mut invalidated = cache.subscribe();
    let mut state = bridge.subscribe_state();
    if bridge.connect(Some(user_id)).is_none() {
        bail!("No user to connect as");
    }
    println!("Watching live updates, Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            notification = appended.recv() => match notification {
                Ok(n) => {
                    let link = n.action_url.as_deref().unwrap_or("");
                    println!("[{:?}] {}: {} {}", n.kind, n.title, n.message, link);
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Notification output lagged"),
                Err(RecvError::Closed) => break,
            },
            scope = invalidated.recv() => match scope {
                Ok(scope) => {
                    println!("stale: {scope}");
                    if scope == dashboard_key {
                        print_streak(&cache, client, &dashboard_key, user_id).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Invalidation output lagged"),
                Err(RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                println!("live channel: {current:?}");
                if let ConnectionState::Failed(reason) = current {
                    bridge.disconnect();
                    bail!("Live channel failed: {reason}");
                }
            }
        }
    }

    bridge.disconnect();
    println!(
        "{} notifications this session, {} unread",
        notifications.len(),
        notifications.unread_count()
    );
    Ok(())
}

/// Fetch the dashboard through the cache and print the headline stats
async fn print_streak(
    cache: &QueryCache,
    client: &SkillverseClient,
    key: &CacheKey,
    user_id: &str,
) {
    match cache
        .fetch(key.clone(), || client.dashboard(user_id))
        .await
    {
        Ok(dashboard) => println!(
            "dashboard: {} skills, {} quizzes, {} day streak",
            dashboard.stats.total_skills, dashboard.stats.quizzes_taken, dashboard.stats.streak
        ),
        Err(e) => eprintln!("dashboard unavailable: {}", e.user_message()),
    }
}
