// In-memory schedule registry

use crate::errors::ScheduleError;
use crate::models::ScheduledJobView;
use crate::schedule::CronExpression;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use uuid::Uuid;

/// A registered job with its parsed expression and pending fire instant
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub job_id: Uuid,
    pub endpoint: String,
    pub expression: CronExpression,
    /// `None` once the job is dormant (no next match within the horizon)
    pub next_fire: Option<DateTime<Utc>>,
    /// Second of the most recent fire
    pub last_fired: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    /// Parse `schedule` and compute the first fire instant after `now`
    pub fn new(
        job_id: Uuid,
        endpoint: impl Into<String>,
        schedule: &str,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<Self, ScheduleError> {
        let expression = CronExpression::parse(schedule)?;
        let next_fire = expression.next_fire_after(now, tz)?;
        Ok(Self {
            job_id,
            endpoint: endpoint.into(),
            expression,
            next_fire: Some(next_fire),
            last_fired: None,
        })
    }

    pub fn view(&self) -> ScheduledJobView {
        ScheduledJobView {
            job_id: self.job_id,
            schedule: self.expression.to_string(),
            api: self.endpoint.clone(),
            next_execution: self.next_fire,
        }
    }
}

/// Job id → scheduled entry. Not synchronized on its own; the owner guards it.
#[derive(Debug, Default)]
pub struct ScheduleRegistry {
    jobs: HashMap<Uuid, ScheduledJob>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully built entry; an existing entry with the same id is replaced
    pub fn add(&mut self, job: ScheduledJob) {
        self.jobs.insert(job.job_id, job);
    }

    /// Replace the entry wholesale; returns false when the id was not registered
    pub fn update(&mut self, job: ScheduledJob) -> bool {
        match self.jobs.get_mut(&job.job_id) {
            Some(entry) => {
                *entry = job;
                true
            }
            None => false,
        }
    }

    /// Idempotent delete
    pub fn remove(&mut self, job_id: &Uuid) -> Option<ScheduledJob> {
        self.jobs.remove(job_id)
    }

    pub fn contains(&self, job_id: &Uuid) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Detached snapshot of every entry
    pub fn list(&self) -> Vec<ScheduledJobView> {
        let mut views: Vec<ScheduledJobView> = self.jobs.values().map(ScheduledJob::view).collect();
        views.sort_by_key(|v| v.next_execution);
        views
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut ScheduledJob> {
        self.jobs.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 3).unwrap()
    }

    fn job(id: Uuid, schedule: &str) -> ScheduledJob {
        ScheduledJob::new(id, "http://localhost/hook", schedule, now(), &chrono_tz::UTC).unwrap()
    }

    #[test]
    fn test_new_computes_first_fire() {
        let entry = job(Uuid::new_v4(), "*/10 * * * * *");
        assert_eq!(
            entry.next_fire,
            Some(Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 10).unwrap())
        );
    }

    #[test]
    fn test_invalid_schedule_is_not_registered() {
        let result = ScheduledJob::new(
            Uuid::new_v4(),
            "http://x",
            "* * * *",
            now(),
            &chrono_tz::UTC,
        );
        assert!(matches!(
            result,
            Err(ScheduleError::InvalidScheduleExpression { .. })
        ));

        let impossible =
            ScheduledJob::new(Uuid::new_v4(), "http://x", "0 0 0 30 2 *", now(), &chrono_tz::UTC);
        assert!(matches!(
            impossible,
            Err(ScheduleError::NoNextExecution { .. })
        ));
    }

    #[test]
    fn test_update_replaces_entry_and_remove_is_idempotent() {
        let id = Uuid::new_v4();
        let mut registry = ScheduleRegistry::new();
        assert!(!registry.update(job(id, "* * * * * *")));
        assert!(!registry.contains(&id));

        registry.add(job(id, "* * * * * *"));
        assert!(registry.update(job(id, "0 0 * * * *")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].schedule, "0 0 * * * *");
        assert_eq!(
            registry.list()[0].next_execution,
            Some(Utc.with_ymd_and_hms(2024, 6, 15, 11, 0, 0).unwrap())
        );

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_is_a_detached_snapshot() {
        let id = Uuid::new_v4();
        let mut registry = ScheduleRegistry::new();
        registry.add(job(id, "* * * * * *"));

        let mut snapshot = registry.list();
        snapshot[0].next_execution = None;
        snapshot[0].api = "http://elsewhere".to_string();

        let fresh = registry.list();
        assert!(fresh[0].next_execution.is_some());
        assert_eq!(fresh[0].api, "http://localhost/hook");
    }
}
