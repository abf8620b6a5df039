//! Typed event dispatch
//!
//! One handler per event name. Every standard handler invalidates its cache
//! scope before decoding the payload, so a malformed payload still marks the
//! data stale. Handlers decode only the fields their notification renders.

use crate::cache::{CacheInvalidator, CacheKey};
use crate::error::Result;
use crate::event::{Envelope, EventName};
use crate::notifications::{NewNotification, NotificationCenter};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub const SKILLS_VIEW: &str = "/skills";
pub const TRENDS_VIEW: &str = "/trends";

/// What a handler can touch
pub struct HandlerContext<'a> {
    pub user_id: &'a str,
    pub cache: &'a dyn CacheInvalidator,
    pub notifications: &'a NotificationCenter,
}

pub type Handler = Box<dyn Fn(&HandlerContext<'_>, &Value) -> Result<()> + Send + Sync>;

/// Event name to handler
#[derive(Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Handler>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table wired with the handlers for every [`EventName`]
    pub fn standard() -> Self {
        Self::new()
            .on(EventName::SkillUpdated, skill_updated)
            .on(EventName::TrendAlert, trend_alert)
            .on(EventName::QuizCompleted, |ctx, _| {
                ctx.cache.invalidate(&CacheKey::dashboard(ctx.user_id));
                Ok(())
            })
            .on(EventName::LearningProgress, |ctx, _| {
                ctx.cache.invalidate(&CacheKey::learning_path(ctx.user_id));
                Ok(())
            })
    }

    /// Register or replace the handler for `event`
    #[must_use]
    pub fn on<F>(mut self, event: impl ToString, handler: F) -> Self
    where
        F: Fn(&HandlerContext<'_>, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(event.to_string(), Box::new(handler));
        self
    }

    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Run the handler for the envelope's event; `Ok(false)` when none is registered
    ///
    /// # Errors
    ///
    /// Returns the handler's error, typically a payload that failed to decode
    pub fn dispatch(&self, ctx: &HandlerContext<'_>, envelope: &Envelope) -> Result<bool> {
        let Some(handler) = self.handlers.get(&envelope.event) else {
            debug!(event = %envelope.event, "Ignoring unknown live event");
            return Ok(false);
        };
        handler(ctx, &envelope.data)?;
        Ok(true)
    }
}

#[derive(Deserialize)]
struct NamedSkill {
    name: String,
}

#[derive(Deserialize)]
struct SkillUpdated {
    skill: NamedSkill,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendAlert {
    skill_name: String,
    trend: String,
}

fn skill_updated(ctx: &HandlerContext<'_>, data: &Value) -> Result<()> {
    ctx.cache.invalidate(&CacheKey::skill_graph(ctx.user_id));
    let payload = SkillUpdated::deserialize(data)?;
    ctx.notifications.append(
        NewNotification::success(
            "Skill Updated",
            format!("{} has been updated", payload.skill.name),
        )
        .with_action(SKILLS_VIEW),
    );
    Ok(())
}

fn trend_alert(ctx: &HandlerContext<'_>, data: &Value) -> Result<()> {
    ctx.cache.invalidate(&CacheKey::trends());
    let signal = TrendAlert::deserialize(data)?;
    ctx.notifications.append(
        NewNotification::info(
            "Trend Alert",
            format!("{} is {}!", signal.skill_name, signal.trend),
        )
        .with_action(TRENDS_VIEW),
    );
    Ok(())
}
