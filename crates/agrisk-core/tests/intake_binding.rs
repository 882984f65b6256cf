//! Intake flows driven through the data layer

use agrisk_client::{ApiError, ClientConfig};
use agrisk_core::{DataLayer, QueryKey};
use agrisk_intake::{Catalogue, IntakeError, Route, WizardState, DEFAULT_DEBOUNCE};
use agrisk_model::{AssessmentId, AssessmentStatus};
use agrisk_test_utils::{fixture_assessment, FakeApi};
use std::sync::Arc;
use std::time::Duration;

const A: AssessmentId = AssessmentId(21);

fn setup() -> (Arc<FakeApi>, DataLayer) {
    let api = Arc::new(FakeApi::new().with_assessment(fixture_assessment(21, "Ridge Orchards")));
    let data = DataLayer::new(api.clone());
    (api, data)
}

#[tokio::test]
async fn guided_interview_submits_and_refreshes_the_assessment() {
    let (api, data) = setup();
    let _record = data.observe(QueryKey::Assessment(A));
    assert_eq!(data.assessment(A).await.unwrap().status, AssessmentStatus::Draft);

    let mut wizard = data.guided_interview(A);
    for id in Catalogue::standard().mandatory_ids() {
        wizard.set_answer(id, "42").unwrap();
    }
    while !wizard.is_final_step() {
        wizard.advance().await.unwrap();
    }
    let route = wizard.submit().await.unwrap();

    assert_eq!(route, Route::GapResults(A));
    assert_eq!(api.detections(), vec![A]);
    assert_eq!(api.saved_answers(A).get("business_name").map(String::as_str), Some("42"));
    assert_eq!(
        data.assessment(A).await.unwrap().status,
        AssessmentStatus::GapDetection
    );
}

#[tokio::test]
async fn pipeline_failure_surfaces_as_a_backend_error() {
    let (api, data) = setup();
    let mut wizard = data.guided_interview(A);
    for id in Catalogue::standard().mandatory_ids() {
        wizard.set_answer(id, "42").unwrap();
    }
    while !wizard.is_final_step() {
        wizard.advance().await.unwrap();
    }
    api.fail_next(
        "start_gap_detection",
        ApiError::Http {
            status: 503,
            body: "pipeline paused".to_string(),
        },
    );

    let err = wizard.submit().await.unwrap_err();

    assert_eq!(
        err,
        IntakeError::Backend("server returned 503: pipeline paused".to_string())
    );
    assert!(matches!(wizard.state(), WizardState::Error { .. }));
    assert!(api.detections().is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_entry_auto_saves_through_the_api() {
    let (api, data) = setup();
    assert_eq!(data.autosave_debounce(), DEFAULT_DEBOUNCE);
    let mut form = data.manual_entry(A);
    form.set_answer("region", "Hawke's Bay").unwrap();
    form.set_answer("acreage", "55").unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(api.call_count("save_answers"), 1);
    assert_eq!(api.saved_answers(A).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn manual_entry_uses_the_configured_quiet_period() {
    let api = Arc::new(FakeApi::new().with_assessment(fixture_assessment(21, "Ridge Orchards")));
    let config = ClientConfig {
        autosave_debounce_ms: 2_000,
        ..ClientConfig::default()
    };
    let data = DataLayer::from_config(api.clone(), &config);
    let mut form = data.manual_entry(A);
    form.set_answer("region", "Hawke's Bay").unwrap();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(api.call_count("save_answers"), 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(api.call_count("save_answers"), 1);
}
