//! End-to-end wizard runs against the simulated device: the full
//! first-run flow with the suggestions download, the retry path, and the
//! gate decisions a freshly configured device produces afterward.

use std::sync::Arc;

use vocabgate::policy::{evaluate, AccessDecision, DeviceState, ScreenGate, ScreenPolicy};
use vocabgate::services::{
    ConfigStore, DeviceServices, RootCheck, SimulatedAlertSignal, SimulatedDevice,
};
use vocabgate::wizard::{
    hash_admin_password, EnterOutcome, FailureChoice, FailureResolution, SetupWizardController,
    Transition, WizardConfig, STEP_ADMIN_PASSWORD, STEP_FEATURES_INSTALL,
    STEP_FINISHED, STEP_ORG_NAME, STEP_SUGGESTIONS_CHOICE, STEP_WELCOME,
};

fn new_wizard() -> (SetupWizardController, Arc<SimulatedDevice>) {
    let (services, device) = DeviceServices::simulated();
    (
        SetupWizardController::new(WizardConfig::default(), services),
        device,
    )
}

async fn run_job(controller: &mut SetupWizardController) -> Transition {
    let mut rx = controller
        .start_job_if_needed()
        .unwrap()
        .expect("step declares a job");
    let msg = rx.recv().await.unwrap();
    controller.handle_message(msg).unwrap()
}

#[tokio::test]
async fn first_run_with_suggestions_commits_and_restarts() {
    let (mut controller, device) = new_wizard();

    assert_eq!(
        controller.enter(STEP_WELCOME).unwrap(),
        EnterOutcome::Entered(STEP_WELCOME)
    );

    {
        let session = controller.session_mut();
        session.org_name = "Demo Academy".to_string();
        *session.admin_password = "vb-admin-1".to_string();
        session.suggestions_enabled = true;
    }

    assert_eq!(controller.next().unwrap(), Transition::Moved(STEP_ORG_NAME));
    assert_eq!(
        controller.next().unwrap(),
        Transition::Moved(STEP_ADMIN_PASSWORD)
    );
    assert_eq!(
        controller.next().unwrap(),
        Transition::Moved(STEP_SUGGESTIONS_CHOICE)
    );
    assert_eq!(
        controller.next().unwrap(),
        Transition::Moved(STEP_FEATURES_INSTALL)
    );

    let transition = run_job(&mut controller).await;
    assert_eq!(transition, Transition::Moved(STEP_FINISHED));

    assert_eq!(controller.next().unwrap(), Transition::Completed);

    assert!(device.is_app_configured());
    assert!(device.is_organization_managed());
    assert_eq!(device.downloads_attempted(), 1);
    assert_eq!(device.restarts_requested(), 1);
    assert_eq!(
        device.admin_password_hash(),
        Some(hash_admin_password("vb-admin-1"))
    );
}

#[tokio::test]
async fn download_failure_then_retry_completes_with_the_same_answers() {
    let (mut controller, device) = new_wizard();
    device.fail_next_downloads(1);

    controller.enter(STEP_WELCOME).unwrap();
    {
        let session = controller.session_mut();
        session.org_name = "Demo Academy".to_string();
        session.suggestions_enabled = true;
    }

    while controller.current_index() != STEP_FEATURES_INSTALL {
        assert!(matches!(controller.next().unwrap(), Transition::Moved(_)));
    }

    let transition = run_job(&mut controller).await;
    assert_eq!(transition, Transition::Stayed);
    assert_eq!(controller.session().org_name, "Demo Academy");

    assert_eq!(
        controller.resolve_failure(FailureChoice::Retry),
        Some(FailureResolution::RetryStep(STEP_FEATURES_INSTALL))
    );

    let transition = run_job(&mut controller).await;
    assert_eq!(transition, Transition::Moved(STEP_FINISHED));
    assert_eq!(controller.next().unwrap(), Transition::Completed);

    // One failed attempt, one successful retry.
    assert_eq!(device.downloads_attempted(), 2);
    assert!(device.is_app_configured());
}

#[tokio::test]
async fn completed_setup_turns_on_the_admin_gate() {
    let (mut controller, device) = new_wizard();
    controller.enter(STEP_WELCOME).unwrap();
    {
        let session = controller.session_mut();
        session.org_name = "Demo Academy".to_string();
        *session.admin_password = "vb-admin-1".to_string();
        session.suggestions_enabled = false;
    }

    loop {
        match controller.next().unwrap() {
            Transition::Completed => break,
            Transition::Moved(_) => {}
            other => panic!("unexpected transition: {other:?}"),
        }
    }

    // The device the wizard just configured now answers the gate.
    let state = DeviceState {
        organization_managed: device.is_organization_managed(),
        app_configured: device.is_app_configured(),
        license_accepted: device.is_license_accepted(),
        ..DeviceState::default()
    };
    let protected = ScreenPolicy {
        is_protected: true,
        ..ScreenPolicy::default()
    };
    assert_eq!(evaluate(&protected, &state), AccessDecision::RequireAdminAuth);
    assert_eq!(
        evaluate(&ScreenPolicy::default(), &state),
        AccessDecision::Allow
    );
}

#[test]
fn rooted_device_is_blocked_before_the_license_check() {
    let (_, device) = DeviceServices::simulated();
    device.set_rooted(true);
    device.set_license_accepted(false);

    let state = DeviceState {
        rooted: device.is_device_rooted(),
        license_accepted: device.is_license_accepted(),
        organization_managed: device.is_organization_managed(),
        app_configured: device.is_app_configured(),
        ..DeviceState::default()
    };

    // Root wins over the missing license approval on license-protected
    // screens; screens without that protection ignore both.
    assert_eq!(
        evaluate(&ScreenPolicy::default(), &state),
        AccessDecision::BlockRooted
    );
    let unprotected = ScreenPolicy {
        apply_license_protection: false,
        ..ScreenPolicy::default()
    };
    assert_eq!(evaluate(&unprotected, &state), AccessDecision::Allow);
}

#[test]
fn emergency_block_arms_the_alert_through_the_gate() {
    let alert = Arc::new(SimulatedAlertSignal::new());
    let gate = ScreenGate::new(alert.clone());

    let state = DeviceState {
        emergency_mode: true,
        license_accepted: true,
        ..DeviceState::default()
    };

    assert_eq!(
        gate.admit(&ScreenPolicy::default(), &state),
        AccessDecision::BlockEmergencyMode
    );
    assert_eq!(alert.times_armed(), 1);
}
