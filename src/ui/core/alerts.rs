use crate::error::{DecodeError, ElementError};
use crate::model::{AlertId, AlertRecord, AlertStatus};
use crate::ui::core::notify::NotificationDispatcher;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Keyed snapshot of every alert seen so far, one record per id.
///
/// Cloning is cheap and a clone never changes: merging builds a new map and
/// leaves the old one untouched for whoever still holds it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertStore {
    entries: Arc<BTreeMap<AlertId, AlertRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub id: AlertId,
    pub from_status: AlertStatus,
    pub to_status: AlertStatus,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub store: AlertStore,
    pub transitions: Vec<TransitionEvent>,
    pub rejected: Vec<ElementError>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &AlertId) -> Option<&AlertRecord> {
        self.entries.get(id)
    }

    /// Records in id order.
    pub fn records(&self) -> impl Iterator<Item = &AlertRecord> {
        self.entries.values()
    }

    pub fn count(&self, status: AlertStatus) -> usize {
        self.records().filter(|r| r.status == status).count()
    }

    /// Decodes a raw snapshot frame and merges it.
    ///
    /// A frame that is not a JSON array fails as a whole and leaves nothing
    /// changed. Inside an array, bad elements are collected in
    /// `MergeOutcome::rejected` and the rest are merged.
    pub fn merge(&self, frame: &str) -> Result<MergeOutcome, DecodeError> {
        let elements = decode_frame(frame)?;
        Ok(self.merge_elements(&elements))
    }

    pub fn merge_elements(&self, elements: &[Value]) -> MergeOutcome {
        let mut next = (*self.entries).clone();
        let mut transitions = Vec::new();
        let mut rejected = Vec::new();
        let mut fired = BTreeSet::new();

        for (index, element) in elements.iter().enumerate() {
            let record = match AlertRecord::from_element(index, element) {
                Ok(record) => record,
                Err(e) => {
                    rejected.push(e);
                    continue;
                }
            };

            // Transitions are judged against the store as it was before this frame.
            let previous = self.entries.get(&record.id).map(|r| r.status);
            if previous == Some(AlertStatus::Pending)
                && record.status == AlertStatus::Completed
                && fired.insert(record.id.clone())
            {
                transitions.push(TransitionEvent {
                    id: record.id.clone(),
                    from_status: AlertStatus::Pending,
                    to_status: AlertStatus::Completed,
                });
            }

            next.insert(record.id.clone(), record);
        }

        MergeOutcome {
            store: AlertStore {
                entries: Arc::new(next),
            },
            transitions,
            rejected,
        }
    }
}

pub fn decode_frame(frame: &str) -> Result<Vec<Value>, DecodeError> {
    match serde_json::from_str::<Value>(frame)? {
        Value::Array(elements) => Ok(elements),
        other => Err(DecodeError::NotAnArray {
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Single writer for the alert store.
///
/// Frames must be fed in arrival order from one consumer; readers take
/// snapshots through [`Reconciler::store`].
pub struct Reconciler {
    store: AlertStore,
    dispatcher: NotificationDispatcher,
    frames_applied: u64,
}

impl Reconciler {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self {
            store: AlertStore::new(),
            dispatcher,
            frames_applied: 0,
        }
    }

    pub fn store(&self) -> AlertStore {
        self.store.clone()
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    /// Merges one frame and dispatches its transitions.
    ///
    /// Decode failures are logged and the store is kept as is; they never
    /// reach the connection.
    pub fn apply_frame(&mut self, frame: &str) -> Result<Vec<TransitionEvent>, DecodeError> {
        let outcome = match self.store.merge(frame) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Dropping snapshot frame: {}", e);
                return Err(e);
            }
        };

        for rejected in &outcome.rejected {
            warn!("Skipping alert: {}", rejected);
        }
        for event in &outcome.transitions {
            info!("Alert {} completed", event.id);
        }
        debug!(
            "Merged frame: {} alerts, {} transitions, {} skipped",
            outcome.store.len(),
            outcome.transitions.len(),
            outcome.rejected.len()
        );

        self.store = outcome.store;
        self.frames_applied += 1;
        self.dispatcher.dispatch(&outcome.transitions);
        Ok(outcome.transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::core::notify::{Notification, Notifier};
    use crate::error::NotifyError;
    use std::sync::Mutex;

    fn store_with(frame: &str) -> AlertStore {
        AlertStore::new().merge(frame).unwrap().store
    }

    fn status(store: &AlertStore, id: &str) -> Option<AlertStatus> {
        store.get(&AlertId::new(id)).map(|r| r.status)
    }

    const FRAME: &str = r#"[
        {"id": "1", "value": 10.0, "direction": "up", "indicator": "MACD", "status": "pending"},
        {"id": "2", "value": 55.0, "direction": "down", "indicator": "RSI", "status": "completed"}
    ]"#;

    #[test]
    fn merging_same_frame_twice_is_idempotent() {
        let first = AlertStore::new().merge(FRAME).unwrap();
        let second = first.store.merge(FRAME).unwrap();

        assert_eq!(first.store, second.store);
        assert!(second.transitions.is_empty());
    }

    #[test]
    fn later_frame_replaces_whole_record() {
        let store = store_with(FRAME);
        let outcome = store
            .merge(r#"[{"id": "3", "status": "pending"}, {"id": "1", "value": 99.0, "status": "pending"}]"#)
            .unwrap();

        let record = outcome.store.get(&AlertId::new("1")).unwrap();
        assert_eq!(record.value, Some(99.0));
        assert_eq!(record.direction, None);
        assert_eq!(record.indicator, None);
        assert_eq!(outcome.store.len(), 3);
    }

    #[test]
    fn pending_to_completed_emits_one_event() {
        let store = store_with(r#"[{"id": "1", "status": "pending"}]"#);
        let outcome = store
            .merge(r#"[{"id": "1", "value": 5, "direction": "up", "indicator": "RSI", "status": "completed"}]"#)
            .unwrap();

        assert_eq!(
            outcome.transitions,
            vec![TransitionEvent {
                id: AlertId::new("1"),
                from_status: AlertStatus::Pending,
                to_status: AlertStatus::Completed,
            }]
        );
        assert_eq!(status(&outcome.store, "1"), Some(AlertStatus::Completed));
    }

    #[test]
    fn completed_staying_completed_emits_nothing() {
        let store = store_with(r#"[{"id": "1", "status": "completed"}]"#);
        let outcome = store.merge(r#"[{"id": "1", "status": "completed"}]"#).unwrap();
        assert!(outcome.transitions.is_empty());
    }

    #[test]
    fn first_sighting_as_completed_is_not_a_transition() {
        let outcome = AlertStore::new()
            .merge(r#"[{"id": "1", "status": "completed"}]"#)
            .unwrap();
        assert!(outcome.transitions.is_empty());
    }

    #[test]
    fn other_status_changes_are_not_transitions() {
        let store = store_with(r#"[{"id": "1", "status": "completed"}, {"id": "2", "status": "pending"}]"#);
        let outcome = store
            .merge(r#"[{"id": "1", "status": "pending"}, {"id": "2", "status": "weird"}]"#)
            .unwrap();
        assert!(outcome.transitions.is_empty());
        assert_eq!(status(&outcome.store, "2"), Some(AlertStatus::Unknown));
    }

    #[test]
    fn element_without_id_is_skipped() {
        let outcome = AlertStore::new()
            .merge(r#"[{"id": "1", "status": "completed"}, {"status": "pending"}]"#)
            .unwrap();

        assert_eq!(outcome.store.len(), 1);
        assert_eq!(status(&outcome.store, "1"), Some(AlertStatus::Completed));
        assert_eq!(outcome.rejected, vec![ElementError::MissingId { index: 1 }]);
    }

    #[test]
    fn object_frame_is_a_decode_error() {
        let err = AlertStore::new()
            .merge(r#"{"id": "1", "status": "pending"}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotAnArray { found: "object" }));
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let err = AlertStore::new().merge("[{").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn merge_leaves_previous_snapshot_untouched() {
        let before = store_with(r#"[{"id": "1", "status": "pending"}]"#);
        let held = before.clone();
        let after = before
            .merge(r#"[{"id": "1", "status": "completed"}, {"id": "2", "status": "pending"}]"#)
            .unwrap()
            .store;

        assert_eq!(held.len(), 1);
        assert_eq!(status(&held, "1"), Some(AlertStatus::Pending));
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn repeated_id_in_one_frame_fires_once() {
        let store = store_with(r#"[{"id": "1", "status": "pending"}]"#);
        let outcome = store
            .merge(r#"[
                {"id": "1", "status": "completed"},
                {"id": "1", "status": "pending"},
                {"id": "1", "status": "completed"}
            ]"#)
            .unwrap();
        assert_eq!(outcome.transitions.len(), 1);
        assert_eq!(status(&outcome.store, "1"), Some(AlertStatus::Completed));
    }

    #[test]
    fn unseen_id_repeated_in_frame_never_transitions() {
        let frame = r#"[{"id": "1", "status": "pending"}, {"id": "1", "status": "completed"}]"#;

        let first = AlertStore::new().merge(frame).unwrap();
        assert!(first.transitions.is_empty());
        assert_eq!(status(&first.store, "1"), Some(AlertStatus::Completed));

        let second = first.store.merge(frame).unwrap();
        assert!(second.transitions.is_empty());
        assert_eq!(first.store, second.store);
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<AlertId>>);

    impl Notifier for Arc<Recorder> {
        fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(notification.key.clone());
            Ok(())
        }
    }

    #[test]
    fn reconciler_keeps_store_on_bad_frame_and_notifies_once() {
        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register(Box::new(recorder.clone()));
        let mut reconciler = Reconciler::new(dispatcher);

        reconciler
            .apply_frame(r#"[{"id": "1", "status": "pending"}]"#)
            .unwrap();
        assert!(reconciler.apply_frame(r#"{"oops": true}"#).is_err());
        assert_eq!(reconciler.store().len(), 1);

        let events = reconciler
            .apply_frame(r#"[{"id": "1", "status": "completed"}]"#)
            .unwrap();
        assert_eq!(events.len(), 1);
        reconciler
            .apply_frame(r#"[{"id": "1", "status": "completed"}]"#)
            .unwrap();

        assert_eq!(*recorder.0.lock().unwrap(), vec![AlertId::new("1")]);
        assert_eq!(reconciler.frames_applied(), 3);
    }
}
