//! Recurrence engine
//!
//! Evaluates daily time-of-day rules on a fixed tick. A rule fires when the
//! clock's hour and minute match its trigger and it has not fired yet in
//! that minute; it becomes eligible again once the minute has passed.
//!
//! Known edge case: firing is decided per observed minute. A tick missed
//! across a minute boundary skips that day's firing, and a wall-clock
//! adjustment that replays a minute can fire a rule twice. The per-minute
//! guard only prevents duplicates within one observed minute.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use harvest_core::domain::run::RunStatus;
use harvest_core::domain::schedule::{RecurrenceRule, RuleAction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::Config;
use crate::scheduler::Clock;
use crate::service::Dispatcher;

/// Calendar minute a rule last fired in
type MinuteKey = (NaiveDate, u32, u32);

fn minute_key(time: NaiveDateTime) -> MinuteKey {
    (time.date(), time.hour(), time.minute())
}

struct ScheduledRule {
    rule: RecurrenceRule,
    fired_in: Option<MinuteKey>,
}

pub struct RecurrenceEngine {
    rules: Vec<ScheduledRule>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    run_on_start: bool,
}

impl RecurrenceEngine {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        rules: Vec<RecurrenceRule>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        run_on_start: bool,
    ) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| ScheduledRule { rule, fired_in: None })
                .collect(),
            dispatcher,
            clock,
            poll_interval,
            run_on_start,
        }
    }

    /// Builds the daily plan for every configured site
    pub fn from_config(config: &Config, dispatcher: Arc<Dispatcher>, clock: Arc<dyn Clock>) -> Self {
        let rules = RecurrenceRule::daily_plan(
            config.batch_time,
            config.site_base_hour,
            dispatcher.sites().ids(),
        );
        Self::new(
            dispatcher,
            rules,
            clock,
            config.poll_interval,
            config.run_on_start,
        )
    }

    pub fn rules(&self) -> impl Iterator<Item = &RecurrenceRule> {
        self.rules.iter().map(|r| &r.rule)
    }

    /// Actions of the rules due at `now`, marking them fired for this minute
    fn due(&mut self, now: NaiveDateTime) -> Vec<RuleAction> {
        let key = minute_key(now);
        let mut due = Vec::new();

        for scheduled in &mut self.rules {
            if !scheduled.rule.at.matches(now.time()) {
                continue;
            }
            if scheduled.fired_in == Some(key) {
                continue;
            }
            scheduled.fired_in = Some(key);
            due.push(scheduled.rule.action.clone());
        }

        due
    }

    /// Evaluates every rule once and fires the due ones
    ///
    /// Returns the number of rules fired.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let due = self.due(now);

        for action in &due {
            info!("Rule fired at {}: {}", now.format("%H:%M:%S"), action);
            self.fire(action.clone());
        }

        due.len()
    }

    /// Hands an action to the dispatcher without waiting for it
    fn fire(&self, action: RuleAction) {
        let dispatcher = Arc::clone(&self.dispatcher);

        match action {
            RuleAction::RunAll => {
                tokio::spawn(async move {
                    let batch = dispatcher.run_all().await;
                    let summary = batch.wait().await;
                    info!("Batch finished: {}", summary);
                });
            }
            RuleAction::RunOne(site_id) => {
                tokio::spawn(async move {
                    let outcome = dispatcher.run_one(&site_id).await;
                    debug!("Scheduled run of site {}: {}", site_id, outcome);
                });
            }
        }
    }

    /// Runs the polling loop until `shutdown` resolves
    ///
    /// In-flight runs are neither cancelled nor awaited on shutdown.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Recurrence engine started: {} rule(s), tick {:?}",
            self.rules.len(),
            self.poll_interval
        );
        for rule in self.rules() {
            debug!("  {} -> {}", rule.at, rule.action);
        }

        if self.run_on_start {
            info!("Running all sites on start");
            self.fire(RuleAction::RunAll);
        }

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        let status = self.dispatcher.status();
        let count = |s: RunStatus| status.iter().filter(|r| r.status == s).count();
        info!(
            "Recurrence engine stopped: {} running, {} succeeded, {} failed, {} never run",
            count(RunStatus::Running),
            count(RunStatus::Succeeded),
            count(RunStatus::Failed),
            count(RunStatus::NeverRun)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::clock::manual::ManualClock;
    use crate::service::testing::{Behavior, Calls, ScriptedHandler};
    use crate::service::{DispatchSettings, RunRegistry};
    use crate::sites::SiteRegistry;
    use harvest_core::domain::schedule::TimeOfDay;
    use harvest_core::domain::site::SiteConfig;
    use harvest_crawl::{HandlerRegistry, SinkSet};

    fn dispatcher(ids: &[&str]) -> (Arc<Dispatcher>, Calls) {
        let handler = ScriptedHandler::new(Behavior::Succeed);
        let calls = handler.calls();
        let mut handlers = HandlerRegistry::new();
        handlers.register_category(harvest_core::domain::site::SiteCategory::Wiki, handler);

        let sites = ids
            .iter()
            .map(|id| SiteConfig::new(*id, *id).with_category("wiki"));
        let dispatcher = Dispatcher::new(
            Arc::new(SiteRegistry::new(sites)),
            Arc::new(handlers),
            Arc::new(RunRegistry::new()),
            SinkSet::default(),
            DispatchSettings {
                launch_delay: Duration::ZERO,
                ..DispatchSettings::default()
            },
        );
        (Arc::new(dispatcher), calls)
    }

    fn rule(at: &str, action: RuleAction) -> RecurrenceRule {
        RecurrenceRule {
            at: at.parse::<TimeOfDay>().unwrap(),
            action,
        }
    }

    fn time(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[tokio::test]
    async fn test_rule_fires_once_per_minute() {
        let (dispatcher, _) = dispatcher(&[]);
        let clock = Arc::new(ManualClock::at("2026-01-01 00:00:00"));
        let mut engine = RecurrenceEngine::new(
            dispatcher,
            vec![rule("02:00", RuleAction::RunAll)],
            clock,
            Duration::from_secs(1),
            false,
        );

        assert!(engine.due(time("2026-01-01 01:59:59")).is_empty());
        assert_eq!(engine.due(time("2026-01-01 02:00:00")), vec![RuleAction::RunAll]);
        assert!(engine.due(time("2026-01-01 02:00:01")).is_empty());
        assert!(engine.due(time("2026-01-01 02:00:59")).is_empty());
        assert!(engine.due(time("2026-01-01 02:01:00")).is_empty());

        // Next day the rule is eligible again
        assert_eq!(engine.due(time("2026-01-02 02:00:30")), vec![RuleAction::RunAll]);
    }

    #[tokio::test]
    async fn test_all_due_rules_fire_in_same_tick() {
        let (dispatcher, _) = dispatcher(&[]);
        let clock = Arc::new(ManualClock::at("2026-01-01 00:00:00"));
        let mut engine = RecurrenceEngine::new(
            dispatcher,
            vec![
                rule("08:00", RuleAction::RunOne("a".to_string())),
                rule("08:00", RuleAction::RunOne("b".to_string())),
                rule("09:00", RuleAction::RunOne("c".to_string())),
            ],
            clock,
            Duration::from_secs(1),
            false,
        );

        let due = engine.due(time("2026-01-01 08:00:10"));
        assert_eq!(due.len(), 2);
        assert!(due.contains(&RuleAction::RunOne("a".to_string())));
        assert!(due.contains(&RuleAction::RunOne("b".to_string())));
    }

    #[tokio::test]
    async fn test_tick_dispatches_due_site_once() {
        let (dispatcher, calls) = dispatcher(&["a", "b"]);
        let clock = Arc::new(ManualClock::at("2026-01-01 07:59:59"));
        let mut engine = RecurrenceEngine::new(
            Arc::clone(&dispatcher),
            vec![rule("08:00", RuleAction::RunOne("a".to_string()))],
            clock.clone(),
            Duration::from_secs(1),
            false,
        );

        assert_eq!(engine.tick(), 0);

        clock.set("2026-01-01 08:00:00");
        assert_eq!(engine.tick(), 1);
        clock.set("2026-01-01 08:00:01");
        assert_eq!(engine.tick(), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.count(), 1);
        assert_eq!(
            dispatcher.runs().snapshot("a").status,
            RunStatus::Succeeded
        );
        assert_eq!(dispatcher.runs().snapshot("b").status, RunStatus::NeverRun);
    }

    #[tokio::test]
    async fn test_from_config_builds_daily_plan() {
        let (dispatcher, _) = dispatcher(&["a", "b", "c"]);
        let config = Config::default();
        let engine = RecurrenceEngine::from_config(&config, dispatcher, Arc::new(ManualClock::at("2026-01-01 00:00:00")));

        let rules: Vec<_> = engine.rules().cloned().collect();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0], rule("02:00", RuleAction::RunAll));
        assert_eq!(rules[1], rule("08:00", RuleAction::RunOne("a".to_string())));
        assert_eq!(rules[3], rule("10:00", RuleAction::RunOne("c".to_string())));
    }

    #[tokio::test]
    async fn test_run_on_start_then_stop() {
        let (dispatcher, calls) = dispatcher(&["a", "b"]);
        let clock = Arc::new(ManualClock::at("2026-01-01 12:30:00"));
        let engine = RecurrenceEngine::new(
            Arc::clone(&dispatcher),
            vec![rule("02:00", RuleAction::RunAll)],
            clock,
            Duration::from_millis(10),
            true,
        );

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(engine.run(async {
            let _ = stopped.await;
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(calls.count(), 2);
        assert!(dispatcher.status().iter().all(|r| r.status == RunStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_without_run_on_start_nothing_runs_off_schedule() {
        let (dispatcher, calls) = dispatcher(&["a"]);
        let clock = Arc::new(ManualClock::at("2026-01-01 12:30:00"));
        let engine = RecurrenceEngine::new(
            dispatcher,
            vec![rule("02:00", RuleAction::RunAll)],
            clock,
            Duration::from_millis(10),
            false,
        );

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(engine.run(async {
            let _ = stopped.await;
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(calls.count(), 0);
    }
}
