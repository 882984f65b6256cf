//! Debounce timing for auto-save and manual entry, on a paused clock

use agrisk_intake::{
    AutoSaver, Catalogue, IntakeBackend, IntakeError, ManualEntry, Result, Route, WizardState,
    DEFAULT_DEBOUNCE,
};
use agrisk_model::{AssessmentId, IntakeAnswers};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Default)]
struct Backend {
    saves: Mutex<Vec<BTreeMap<String, String>>>,
    failures_left: AtomicUsize,
    detections: AtomicUsize,
}

impl Backend {
    fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    fn saves(&self) -> Vec<BTreeMap<String, String>> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntakeBackend for Backend {
    async fn save_answers(&self, _: AssessmentId, answers: &IntakeAnswers) -> Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(IntakeError::Backend("connection reset".to_string()));
        }
        self.saves.lock().unwrap().push(answers.answers.clone());
        Ok(())
    }

    async fn start_gap_detection(&self, _: AssessmentId) -> Result<()> {
        self.detections.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

const ID: AssessmentId = AssessmentId(3);

#[tokio::test(start_paused = true)]
async fn burst_of_edits_coalesces_into_one_save() {
    let backend = Arc::new(Backend::default());
    let saver = AutoSaver::spawn(backend.clone(), ID, DEFAULT_DEBOUNCE);

    saver.record("region", "Otago");
    sleep(Duration::from_millis(100)).await;
    saver.record("acreage", "300");
    sleep(Duration::from_millis(100)).await;
    saver.record("region", "Southland");

    sleep(Duration::from_millis(799)).await;
    assert!(backend.saves().is_empty());

    sleep(Duration::from_millis(2)).await;
    assert_eq!(
        backend.saves(),
        vec![map(&[("acreage", "300"), ("region", "Southland")])]
    );

    sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.saves().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn every_edit_restarts_the_quiet_period() {
    let backend = Arc::new(Backend::default());
    let saver = AutoSaver::spawn(backend.clone(), ID, DEFAULT_DEBOUNCE);

    for value in ["1", "12", "120", "1200"] {
        saver.record("acreage", value);
        sleep(Duration::from_millis(600)).await;
    }
    assert!(backend.saves().is_empty());

    sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.saves(), vec![map(&[("acreage", "1200")])]);
}

#[tokio::test(start_paused = true)]
async fn blank_values_are_not_sent() {
    let backend = Arc::new(Backend::default());
    let saver = AutoSaver::spawn(backend.clone(), ID, DEFAULT_DEBOUNCE);

    saver.record("region", "  ");
    sleep(Duration::from_secs(1)).await;
    assert!(backend.saves().is_empty());

    saver.record("region", "Waikato");
    saver.record("equity", "");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.saves(), vec![map(&[("region", "Waikato")])]);
}

#[tokio::test(start_paused = true)]
async fn failures_are_swallowed_and_not_requeued() {
    let backend = Arc::new(Backend::failing(1));
    let saver = AutoSaver::spawn(backend.clone(), ID, DEFAULT_DEBOUNCE);

    saver.record("region", "Otago");
    sleep(Duration::from_secs(1)).await;
    assert!(backend.saves().is_empty());

    saver.record("acreage", "300");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.saves(), vec![map(&[("acreage", "300")])]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_saver_cancels_the_timer() {
    let backend = Arc::new(Backend::default());
    let saver = AutoSaver::spawn(backend.clone(), ID, DEFAULT_DEBOUNCE);

    saver.record("region", "Otago");
    sleep(Duration::from_millis(100)).await;
    drop(saver);

    sleep(Duration::from_secs(5)).await;
    assert!(backend.saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_saves_without_waiting() {
    let backend = Arc::new(Backend::default());
    let saver = AutoSaver::spawn(backend.clone(), ID, DEFAULT_DEBOUNCE);

    saver.record("region", "Otago");
    saver.flush().await;
    assert_eq!(backend.saves(), vec![map(&[("region", "Otago")])]);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.saves().len(), 1);
}

fn manual(backend: Arc<Backend>) -> ManualEntry {
    ManualEntry::open(ID, Arc::new(Catalogue::standard()), backend, DEFAULT_DEBOUNCE)
}

#[tokio::test(start_paused = true)]
async fn manual_entry_gate_ignores_auto_save_failures() {
    let backend = Arc::new(Backend::failing(usize::MAX));
    let catalogue = Catalogue::standard();
    let mut form = manual(backend.clone());

    for id in catalogue.mandatory_ids() {
        form.set_answer(id, "value").unwrap();
    }
    sleep(Duration::from_secs(1)).await;

    assert!(backend.saves().is_empty());
    assert!(form.can_submit());
    assert_eq!(form.state(), &WizardState::Editing { step: 0 });
}

#[tokio::test(start_paused = true)]
async fn manual_entry_submit_flushes_then_starts_detection() {
    let backend = Arc::new(Backend::default());
    let catalogue = Catalogue::standard();
    let mut form = manual(backend.clone());

    for id in catalogue.mandatory_ids() {
        form.set_answer(id, "value").unwrap();
    }
    assert!(form.can_submit());

    let route = form.submit().await.unwrap();

    assert_eq!(route, Route::GapResults(ID));
    assert_eq!(form.state(), &WizardState::Submitted);
    assert_eq!(backend.detections.load(Ordering::SeqCst), 1);
    let saves = backend.saves();
    assert!(!saves.is_empty());
    assert_eq!(saves.last().map(BTreeMap::len), Some(8));
}

#[tokio::test(start_paused = true)]
async fn manual_entry_refuses_incomplete_submission() {
    let backend = Arc::new(Backend::default());
    let mut form = manual(backend.clone());
    form.set_answer("business_name", "Hillside Dairy").unwrap();

    let err = form.submit().await.unwrap_err();

    assert!(matches!(err, IntakeError::MandatoryIncomplete { .. }));
    assert_eq!(backend.detections.load(Ordering::SeqCst), 0);
    assert_eq!(form.state(), &WizardState::Editing { step: 0 });
}

#[tokio::test(start_paused = true)]
async fn manual_entry_save_now_skips_the_quiet_period() {
    let backend = Arc::new(Backend::default());
    let mut form = manual(backend.clone());
    form.set_answer("region", "Canterbury").unwrap();

    form.save_now().await;

    assert_eq!(backend.saves(), vec![map(&[("region", "Canterbury")])]);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.saves().len(), 1);
}
