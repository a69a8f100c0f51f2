use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use super::domain::{AlertLevel, EscalationAlert, EscalationReason, EscalationRecord, HazardEvent};
use super::feed::{HazardFeed, UpstreamFeedError};
use super::store::EscalationStore;
use crate::config::EscalationConfig;
use crate::workflows::sites::Site;

/// Thresholds deciding whether an event sighting is worth notifying about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationPolicy {
    pub radius_km: f64,
    pub minimum_level: AlertLevel,
    pub score_delta: f64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            radius_km: 500.0,
            minimum_level: AlertLevel::Orange,
            score_delta: 0.5,
        }
    }
}

impl From<&EscalationConfig> for EscalationPolicy {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            radius_km: config.radius_km,
            minimum_level: config.minimum_alert,
            score_delta: config.score_delta,
        }
    }
}

impl EscalationPolicy {
    /// Compare a sighting against the last recorded state of the same identifier.
    fn escalation(
        &self,
        event: &HazardEvent,
        previous: Option<&EscalationRecord>,
    ) -> Option<EscalationReason> {
        let Some(previous) = previous else {
            return Some(EscalationReason::FirstSighting);
        };

        if event.alert_score - previous.alert_score >= self.score_delta {
            return Some(EscalationReason::ScoreIncrease {
                previous_score: previous.alert_score,
            });
        }

        if previous.alert_level < self.minimum_level && event.alert_level >= self.minimum_level {
            return Some(EscalationReason::LevelCrossed {
                previous_level: previous.alert_level,
            });
        }

        None
    }
}

/// Turns hazard feed snapshots into actionable alerts for monitored sites.
///
/// Polls are serialised: decisions for a whole cycle are computed against the store and
/// pending in-cycle updates, then written with a single `put_all`.
pub struct EscalationDetector<S> {
    policy: EscalationPolicy,
    sites: Vec<Site>,
    store: Arc<S>,
    poll_guard: Mutex<()>,
}

impl<S> EscalationDetector<S>
where
    S: EscalationStore,
{
    pub fn new(policy: EscalationPolicy, sites: Vec<Site>, store: Arc<S>) -> Self {
        Self {
            policy,
            sites,
            store,
            poll_guard: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Fetch from the feed and process the result. Never fails; feed errors yield no alerts.
    pub fn poll<F>(&self, feed: &F, now: DateTime<Utc>) -> Vec<EscalationAlert>
    where
        F: HazardFeed + ?Sized,
    {
        self.process(feed.fetch(), now)
    }

    pub fn process(
        &self,
        fetched: Result<Vec<HazardEvent>, UpstreamFeedError>,
        now: DateTime<Utc>,
    ) -> Vec<EscalationAlert> {
        let events = match fetched {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "hazard feed unavailable; skipping poll");
                return Vec::new();
            }
        };

        let _guard = self
            .poll_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut pending: BTreeMap<String, EscalationRecord> = BTreeMap::new();
        let mut alerts = Vec::new();

        for event in &events {
            if event.alert_level < self.policy.minimum_level {
                continue;
            }

            let nearby = self.nearby_sites(event);
            if nearby.is_empty() {
                continue;
            }

            let previous = match pending.get(&event.id) {
                Some(record) => Some(record.clone()),
                None => match self.store.get(&event.id) {
                    Ok(record) => record,
                    Err(err) => {
                        error!(event_id = %event.id, error = %err, "escalation lookup failed");
                        continue;
                    }
                },
            };

            let Some(reason) = self.policy.escalation(event, previous.as_ref()) else {
                debug!(event_id = %event.id, "no new information for event");
                continue;
            };

            for (site, distance_km) in nearby {
                alerts.push(EscalationAlert {
                    event_id: event.id.clone(),
                    event_type: event.event_type.clone(),
                    alert_level: event.alert_level,
                    alert_score: event.alert_score,
                    severity: event.severity,
                    country: event.country.clone(),
                    from_date: event.from_date,
                    coordinates: event.coordinates,
                    site_id: site.id.clone(),
                    site_name: site.name.clone(),
                    distance_km,
                    reason: reason.clone(),
                });
            }

            pending.insert(
                event.id.clone(),
                EscalationRecord {
                    alert_score: event.alert_score,
                    alert_level: event.alert_level,
                    last_notified: now,
                },
            );
        }

        let updated = pending.len();
        if updated > 0 {
            if let Err(err) = self.store.put_all(pending.into_iter().collect()) {
                error!(error = %err, updated, "failed to persist escalation records");
            }
        }

        info!(
            fetched = events.len(),
            actionable = updated,
            alerts = alerts.len(),
            "hazard poll complete"
        );
        alerts
    }

    fn nearby_sites(&self, event: &HazardEvent) -> Vec<(&Site, f64)> {
        self.sites
            .iter()
            .filter_map(|site| {
                let distance = site.coordinates.distance_km(&event.coordinates);
                (distance <= self.policy.radius_km).then_some((site, distance))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinates;
    use crate::workflows::hazards::store::{InMemoryEscalationStore, StoreError};
    use crate::workflows::sites::SegmentCounts;
    use chrono::TimeZone;

    fn nairobi() -> Site {
        Site::new(
            "ken-nbo",
            "Nairobi",
            "Kenya",
            Coordinates::new(-1.2921, 36.8219),
            SegmentCounts::new(100, 100, 100, 100),
        )
    }

    fn kakuma() -> Site {
        Site::new(
            "ken-kak",
            "Kakuma",
            "Kenya",
            Coordinates::new(3.7167, 34.8667),
            SegmentCounts::new(100, 100, 100, 100),
        )
    }

    fn event(id: &str, level: AlertLevel, score: f64) -> HazardEvent {
        HazardEvent {
            id: id.to_string(),
            event_type: "FL".to_string(),
            alert_level: level,
            alert_score: score,
            coordinates: Coordinates::new(-0.5, 36.0),
            country: "Kenya".to_string(),
            from_date: None,
            severity: 1.0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn detector(sites: Vec<Site>) -> EscalationDetector<InMemoryEscalationStore> {
        EscalationDetector::new(
            EscalationPolicy::default(),
            sites,
            Arc::new(InMemoryEscalationStore::default()),
        )
    }

    #[test]
    fn repoll_needs_score_delta_to_be_actionable() {
        let detector = detector(vec![nairobi()]);

        let first = detector.process(Ok(vec![event("1", AlertLevel::Orange, 0.8)]), now());
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].reason, EscalationReason::FirstSighting);

        let small = detector.process(Ok(vec![event("1", AlertLevel::Orange, 1.2)]), now());
        assert!(small.is_empty());

        let large = detector.process(Ok(vec![event("1", AlertLevel::Orange, 1.4)]), now());
        assert_eq!(large.len(), 1);
        assert_eq!(
            large[0].reason,
            EscalationReason::ScoreIncrease {
                previous_score: 0.8
            }
        );
    }

    #[test]
    fn same_state_twice_is_not_actionable() {
        let detector = detector(vec![nairobi()]);
        assert_eq!(
            detector
                .process(Ok(vec![event("9", AlertLevel::Red, 2.0)]), now())
                .len(),
            1
        );
        assert!(detector
            .process(Ok(vec![event("9", AlertLevel::Red, 2.3)]), now())
            .is_empty());
    }

    #[test]
    fn level_crossing_is_actionable_without_score_change() {
        let policy = EscalationPolicy {
            minimum_level: AlertLevel::Orange,
            ..EscalationPolicy::default()
        };
        let store = Arc::new(InMemoryEscalationStore::default());
        store
            .put(
                "7",
                EscalationRecord {
                    alert_score: 1.0,
                    alert_level: AlertLevel::Green,
                    last_notified: now(),
                },
            )
            .expect("seed");
        let detector = EscalationDetector::new(policy, vec![nairobi()], store);

        let alerts = detector.process(Ok(vec![event("7", AlertLevel::Orange, 1.1)]), now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(
            alerts[0].reason,
            EscalationReason::LevelCrossed {
                previous_level: AlertLevel::Green
            }
        );
    }

    #[test]
    fn filters_low_levels_and_distant_events() {
        let detector = detector(vec![nairobi()]);
        let mut far = event("far", AlertLevel::Red, 3.0);
        far.coordinates = Coordinates::new(35.0, 139.0);

        let alerts = detector.process(
            Ok(vec![event("green", AlertLevel::Green, 5.0), far]),
            now(),
        );
        assert!(alerts.is_empty());
        assert!(detector.store().is_empty());
    }

    #[test]
    fn emits_one_alert_per_nearby_site() {
        let detector = detector(vec![nairobi(), kakuma()]);
        let mut quake = event("eq", AlertLevel::Red, 2.0);
        quake.coordinates = Coordinates::new(1.0, 36.0);

        let alerts = detector.process(Ok(vec![quake]), now());
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].site_name, "Nairobi");
        assert_eq!(alerts[1].site_name, "Kakuma");
        assert!(alerts.iter().all(|alert| alert.distance_km <= 500.0));
        assert_eq!(detector.store().len(), 1);
    }

    #[test]
    fn duplicate_identifiers_within_a_poll_alert_once() {
        let detector = detector(vec![nairobi()]);
        let alerts = detector.process(
            Ok(vec![
                event("dup", AlertLevel::Orange, 1.0),
                event("dup", AlertLevel::Orange, 1.1),
            ]),
            now(),
        );
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn feed_errors_leave_store_untouched() {
        let detector = detector(vec![nairobi()]);
        detector.process(Ok(vec![event("1", AlertLevel::Orange, 0.8)]), now());

        let alerts = detector.process(
            Err(UpstreamFeedError::Unreachable("timeout".to_string())),
            now(),
        );
        assert!(alerts.is_empty());
        let record = detector.store().get("1").expect("get").expect("record");
        assert!((record.alert_score - 0.8).abs() < f64::EPSILON);
    }

    struct FlakyStore {
        inner: InMemoryEscalationStore,
    }

    impl EscalationStore for FlakyStore {
        fn get(&self, event_id: &str) -> Result<Option<EscalationRecord>, StoreError> {
            if event_id == "broken" {
                return Err(StoreError::Unavailable("lookup failed".to_string()));
            }
            self.inner.get(event_id)
        }

        fn put(&self, event_id: &str, record: EscalationRecord) -> Result<(), StoreError> {
            self.inner.put(event_id, record)
        }
    }

    #[test]
    fn store_error_for_one_event_does_not_block_others() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryEscalationStore::default(),
        });
        let detector = EscalationDetector::new(EscalationPolicy::default(), vec![nairobi()], store);

        let alerts = detector.process(
            Ok(vec![
                event("broken", AlertLevel::Red, 2.0),
                event("ok", AlertLevel::Red, 2.0),
            ]),
            now(),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event_id, "ok");
    }
}
