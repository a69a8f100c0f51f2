use chrono::{TimeZone, Utc};
use relief_ai::workflows::hazards::{
    AlertLevel, EscalationDetector, EscalationPolicy, EscalationReason, EscalationStore,
    FileHazardFeed, JsonFileEscalationStore,
};
use relief_ai::workflows::notifications::{AlertKind, NotificationAlert};
use relief_ai::workflows::sites::builtin_sites;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn feature(id: u64, level: &str, score: f64, lat: f64, lon: f64) -> serde_json::Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": {
            "eventid": id,
            "eventtype": "FL",
            "alertlevel": level,
            "alertscore": score,
            "country": "Kenya",
            "fromdate": "2025-04-01T06:00:00",
            "severitydata": { "severity": 1.5 }
        }
    })
}

fn write_feed(path: &Path, features: Vec<serde_json::Value>) {
    let body = json!({ "type": "FeatureCollection", "features": features });
    std::fs::write(path, serde_json::to_vec(&body).expect("serialise feed")).expect("write feed");
}

#[test]
fn escalation_state_survives_restart_and_only_worsening_events_realert() {
    let dir = tempfile::tempdir().expect("tempdir");
    let feed_path = dir.path().join("gdacs.json");
    let store_path = dir.path().join("escalations.json");
    let now = Utc.with_ymd_and_hms(2025, 4, 2, 12, 0, 0).unwrap();

    write_feed(
        &feed_path,
        vec![
            // Near Nairobi.
            feature(1001, "Orange", 1.0, -1.0, 37.0),
            // Green is never actionable.
            feature(1002, "Green", 2.5, -1.1, 36.9),
            // Far from every monitored site.
            feature(1003, "Red", 3.0, 40.0, -100.0),
        ],
    );

    let feed = FileHazardFeed::new(&feed_path);
    {
        let store = Arc::new(JsonFileEscalationStore::open(&store_path).expect("open store"));
        let detector = EscalationDetector::new(EscalationPolicy::default(), builtin_sites(), store);
        let alerts = detector.poll(&feed, now);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event_id, "1001");
        assert_eq!(alerts[0].site_name, "Nairobi");
        assert_eq!(alerts[0].reason, EscalationReason::FirstSighting);
        assert!(alerts[0].distance_km < 100.0);
    }

    let store = Arc::new(JsonFileEscalationStore::open(&store_path).expect("reopen store"));
    let recorded = store.get("1001").expect("lookup").expect("record persisted");
    assert_eq!(recorded.alert_level, AlertLevel::Orange);
    assert!(store.get("1002").expect("lookup").is_none());

    let detector = EscalationDetector::new(EscalationPolicy::default(), builtin_sites(), store);
    assert!(detector.poll(&feed, now).is_empty(), "unchanged event must not re-alert");

    write_feed(&feed_path, vec![feature(1001, "Red", 1.6, -1.0, 37.0)]);
    let alerts = detector.poll(&feed, now);
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        alerts[0].reason,
        EscalationReason::ScoreIncrease {
            previous_score: 1.0
        }
    );

    let notification = NotificationAlert::hazard_escalation(
        &alerts[0],
        vec!["Action Against Hunger".to_string()],
    );
    assert_eq!(notification.kind, AlertKind::HazardEscalation);
    assert_eq!(notification.fields["event_id"], "1001");
    assert_eq!(notification.subject, "FL (Red) near Nairobi");
}

#[test]
fn unreadable_feed_produces_no_alerts_and_no_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(
        JsonFileEscalationStore::open(dir.path().join("escalations.json")).expect("open store"),
    );
    let detector = EscalationDetector::new(
        EscalationPolicy::default(),
        builtin_sites(),
        Arc::clone(&store),
    );

    let feed = FileHazardFeed::new(dir.path().join("missing.json"));
    let alerts = detector.poll(&feed, Utc::now());

    assert!(alerts.is_empty());
    assert!(store.get("1001").expect("lookup").is_none());
}
