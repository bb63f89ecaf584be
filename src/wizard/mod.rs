//! Setup wizard state machine.
//!
//! [`SetupWizardController`] drives the [`SetupStepGraph`]: it tracks the
//! current step, mediates Back/Next events by delegating to the active
//! step's contract, runs asynchronous step jobs off the foreground
//! thread, and on terminal completion persists the [`SetupSession`] and
//! requests a host restart.

mod config;
pub mod error;
mod session;
mod steps;

pub use config::{AdminConfig, CompletionConfig, GeneralConfig, SuggestionsConfig, WizardConfig};
pub use session::SetupSession;
pub use steps::{
    NextOutcome, SetupStepGraph, StepContract, StepId, STEP_ADMIN_PASSWORD, STEP_FEATURES_INSTALL,
    STEP_FINISHED, STEP_ORG_NAME, STEP_RESET_APP, STEP_SUGGESTIONS_CHOICE, STEP_WELCOME,
};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::services::DeviceServices;
use error::{Result, SetupError};

/// Outcome of an asynchronous step job, delivered back to the foreground
/// loop. All state mutation happens in [`SetupWizardController::handle_message`].
#[derive(Debug)]
pub enum WizardMessage {
    JobSucceeded(usize),
    JobFailed(usize, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase {
    /// Waiting for input on the current step.
    Idle,
    /// A step job is outstanding; input is disabled.
    JobRunning,
    /// A job failed; waiting for the retry/abandon choice.
    AwaitingFailureChoice,
    /// Committed, abandoned, or auto-finished. No further transitions.
    Finished,
}

/// Result of entering the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    Entered(usize),
    /// The app is already configured and the requested step is not an
    /// exception step; the wizard terminates immediately.
    AlreadyConfigured,
    /// A step job is still outstanding; the entry request is ignored.
    Busy,
}

/// Result of a Back/Next event or a job completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    Stayed,
    /// Now on the given step.
    Moved(usize),
    /// The wizard was backed out of; the host pops the screen.
    Exited,
    /// The terminal step committed the session; a restart was requested.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureChoice {
    Retry,
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResolution {
    /// Re-enter the step's job, with the session untouched.
    RetryStep(usize),
    /// Terminate the host application.
    Abandoned,
}

/// Hex-encoded SHA-256 of an admin password, the form stored in the
/// persistent configuration.
pub fn hash_admin_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

pub struct SetupWizardController {
    graph: SetupStepGraph,
    session: SetupSession,
    services: DeviceServices,
    config: WizardConfig,
    current: usize,
    phase: WizardPhase,
}

impl SetupWizardController {
    pub fn new(config: WizardConfig, services: DeviceServices) -> Self {
        let graph = SetupStepGraph::new(&config);
        let session = SetupSession::new(config.suggestions.enabled_by_default);
        Self {
            graph,
            session,
            services,
            config,
            current: STEP_WELCOME,
            phase: WizardPhase::Idle,
        }
    }

    pub fn graph(&self) -> &SetupStepGraph {
        &self.graph
    }

    pub fn session(&self) -> &SetupSession {
        &self.session
    }

    /// Answers are written here by the host UI on behalf of the active
    /// step, before the Next event is delivered.
    pub fn session_mut(&mut self) -> &mut SetupSession {
        &mut self.session
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> Result<&dyn StepContract> {
        self.graph.step_at(self.current)
    }

    /// Enter the wizard at the requested step. When the app is already
    /// fully configured the wizard terminates immediately, unless the
    /// requested step is in the exception set (forced reset entry).
    pub fn enter(&mut self, requested: usize) -> Result<EnterOutcome> {
        // Same latch as next/back: no transition may start while a job
        // is outstanding.
        if self.phase == WizardPhase::JobRunning {
            warn!("setup entry requested while a step job is outstanding");
            return Ok(EnterOutcome::Busy);
        }

        let step = self.graph.step_at(requested)?;

        if self.services.config.is_app_configured() && !self.graph.is_exception(step.id()) {
            info!(
                "app already configured, refusing setup entry at step {}",
                requested
            );
            self.phase = WizardPhase::Finished;
            return Ok(EnterOutcome::AlreadyConfigured);
        }

        if let Err(e) = self.check_consistency() {
            // Should not occur; there is no recovery path beyond a reset.
            warn!("{}", e);
        }

        self.current = requested;
        self.phase = WizardPhase::Idle;
        info!("entering setup at step {} ({})", requested, step.title());
        Ok(EnterOutcome::Entered(requested))
    }

    fn check_consistency(&self) -> Result<()> {
        let store = &self.services.config;
        if store.is_app_configured()
            && store.is_organization_managed()
            && store.admin_password_hash().is_none()
        {
            return Err(SetupError::ConfigurationInconsistent("admin password hash"));
        }
        Ok(())
    }

    /// Deliver a Next event to the active step.
    pub fn next(&mut self) -> Result<Transition> {
        if self.phase != WizardPhase::Idle {
            return Ok(Transition::Stayed);
        }

        let (outcome, next) = {
            let step = self.graph.step_at(self.current)?;
            if !step.display_next_button() {
                return Ok(Transition::Stayed);
            }
            let outcome = step.on_next_pressed(&mut self.session);
            let next = step.next_step(&self.session);
            (outcome, next)
        };

        match outcome {
            NextOutcome::Stay(reason) => {
                info!("staying on step {}: {}", self.current, reason);
                Ok(Transition::Stayed)
            }
            NextOutcome::Proceed => match next {
                Some(index) => {
                    debug!("step {} -> {}", self.current, index);
                    self.current = index;
                    Ok(Transition::Moved(index))
                }
                None => {
                    self.commit()?;
                    Ok(Transition::Completed)
                }
            },
        }
    }

    /// Deliver a Back event to the active step. Ignored entirely while a
    /// job is outstanding or when the step does not display Back,
    /// including the host navigation-bar back action.
    pub fn back(&mut self) -> Result<Transition> {
        if self.phase != WizardPhase::Idle {
            return Ok(Transition::Stayed);
        }

        let step = self.graph.step_at(self.current)?;
        if !step.display_back_button() {
            return Ok(Transition::Stayed);
        }

        if step.on_back_pressed(&mut self.session) {
            info!("backing out of setup from step {}", self.current);
            Ok(Transition::Exited)
        } else {
            Ok(Transition::Stayed)
        }
    }

    /// Start the current step's asynchronous job, if it declares one.
    /// Returns a receiver for the job outcome; input stays disabled until
    /// the message is handed back via [`handle_message`].
    ///
    /// The job is the suggestions language-pack download. Connectivity is
    /// checked up front so an offline device fails fast instead of timing
    /// out mid-download.
    ///
    /// [`handle_message`]: SetupWizardController::handle_message
    pub fn start_job_if_needed(
        &mut self,
    ) -> Result<Option<mpsc::UnboundedReceiver<WizardMessage>>> {
        if self.phase != WizardPhase::Idle {
            return Ok(None);
        }

        let step = self.graph.step_at(self.current)?;
        if !step.has_job() {
            return Ok(None);
        }

        let index = self.current;
        let (tx, rx) = mpsc::unbounded_channel();
        self.phase = WizardPhase::JobRunning;

        if !self.session.suggestions_enabled {
            // Nothing to download.
            let _ = tx.send(WizardMessage::JobSucceeded(index));
            return Ok(Some(rx));
        }

        if !self.services.connectivity.is_internet_connected() {
            warn!("no internet connection, language pack download not started");
            let _ = tx.send(WizardMessage::JobFailed(
                index,
                "no internet connection".to_string(),
            ));
            return Ok(Some(rx));
        }

        let downloads = self.services.downloads.clone();
        let source = self.config.suggestions.source_language.clone();
        let target = self.config.suggestions.target_language.clone();

        info!("starting language pack download {} -> {}", source, target);

        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || downloads.download(&source, &target)).await;

            match result {
                Ok(Ok(())) => {
                    let _ = tx.send(WizardMessage::JobSucceeded(index));
                }
                Ok(Err(e)) => {
                    let _ = tx.send(WizardMessage::JobFailed(index, e.to_string()));
                }
                Err(e) => {
                    let _ = tx.send(WizardMessage::JobFailed(index, e.to_string()));
                }
            }
        });

        Ok(Some(rx))
    }

    /// Apply a job outcome on the foreground thread. A success advances
    /// past the job step (such steps have no Next button); a failure
    /// parks the wizard until the retry/abandon choice arrives.
    pub fn handle_message(&mut self, msg: WizardMessage) -> Result<Transition> {
        // Messages are only meaningful for the job this controller is
        // waiting on; anything else is stale.
        if self.phase != WizardPhase::JobRunning {
            debug!("dropping job message outside of a running job: {:?}", msg);
            return Ok(Transition::Stayed);
        }

        match msg {
            WizardMessage::JobSucceeded(index) => {
                debug!("job on step {} succeeded", index);
                self.phase = WizardPhase::Idle;
                let next = self.graph.step_at(self.current)?.next_step(&self.session);
                match next {
                    Some(index) => {
                        self.current = index;
                        Ok(Transition::Moved(index))
                    }
                    None => {
                        self.commit()?;
                        Ok(Transition::Completed)
                    }
                }
            }
            WizardMessage::JobFailed(index, reason) => {
                warn!("job on step {} failed: {}", index, reason);
                self.phase = WizardPhase::AwaitingFailureChoice;
                Ok(Transition::Stayed)
            }
        }
    }

    /// Apply the user's retry/abandon choice after a job failure.
    /// Returns `None` when no failure is pending.
    pub fn resolve_failure(&mut self, choice: FailureChoice) -> Option<FailureResolution> {
        if self.phase != WizardPhase::AwaitingFailureChoice {
            return None;
        }

        match choice {
            FailureChoice::Retry => {
                info!("retrying step {}", self.current);
                self.phase = WizardPhase::Idle;
                Some(FailureResolution::RetryStep(self.current))
            }
            FailureChoice::Abandon => {
                info!("abandoning setup at step {}", self.current);
                self.phase = WizardPhase::Finished;
                Some(FailureResolution::Abandoned)
            }
        }
    }

    /// Terminal commit: persist the session into durable configuration,
    /// mark setup complete and request the host restart. The wizard
    /// accepts no further transitions afterward.
    fn commit(&mut self) -> Result<()> {
        let store = &self.services.config;

        match store.setup_collection() {
            Err(SetupError::CollectionAlreadyInitialized) => {
                debug!("collection already initialized, continuing");
            }
            other => other?,
        }

        if !self.session.admin_password.is_empty() {
            store.set_admin_password_hash(&hash_admin_password(&self.session.admin_password));
        }

        if !self.session.org_name.is_empty() {
            store.set_organization_name(&self.session.org_name);
        }

        store.mark_setup_complete();
        self.phase = WizardPhase::Finished;
        info!("setup committed");

        if self.config.completion.restart {
            self.services.restart.restart_app();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ConfigStore, SimulatedDevice};
    use std::sync::Arc;

    fn controller() -> (SetupWizardController, Arc<SimulatedDevice>) {
        let (services, device) = DeviceServices::simulated();
        let controller = SetupWizardController::new(WizardConfig::default(), services);
        (controller, device)
    }

    fn fill_answers(controller: &mut SetupWizardController, suggestions: bool) {
        let session = controller.session_mut();
        session.org_name = "Lycee Condorcet".to_string();
        *session.admin_password = "vb-admin-1".to_string();
        session.suggestions_enabled = suggestions;
    }

    #[test]
    fn back_on_a_step_without_back_button_is_a_no_op() {
        let (mut controller, _device) = controller();
        controller.enter(STEP_WELCOME).unwrap();

        assert_eq!(controller.back().unwrap(), Transition::Stayed);
        assert_eq!(controller.current_index(), STEP_WELCOME);
        assert_eq!(controller.phase(), WizardPhase::Idle);
    }

    #[test]
    fn back_on_a_regular_step_exits_the_wizard() {
        let (mut controller, _device) = controller();
        controller.enter(STEP_ORG_NAME).unwrap();
        assert_eq!(controller.back().unwrap(), Transition::Exited);
    }

    #[test]
    fn configured_app_refuses_entry_except_at_the_reset_step() {
        let (mut controller, device) = controller();
        device.set_configured(true);
        device.set_admin_password_hash("cafe");

        assert_eq!(
            controller.enter(STEP_WELCOME).unwrap(),
            EnterOutcome::AlreadyConfigured
        );
        assert_eq!(controller.phase(), WizardPhase::Finished);

        assert_eq!(
            controller.enter(STEP_RESET_APP).unwrap(),
            EnterOutcome::Entered(STEP_RESET_APP)
        );
        assert_eq!(controller.phase(), WizardPhase::Idle);
    }

    #[test]
    fn suggestions_disabled_path_commits_without_a_download() {
        let (mut controller, device) = controller();
        controller.enter(STEP_WELCOME).unwrap();
        fill_answers(&mut controller, false);

        assert_eq!(controller.next().unwrap(), Transition::Moved(STEP_ORG_NAME));
        assert_eq!(
            controller.next().unwrap(),
            Transition::Moved(STEP_ADMIN_PASSWORD)
        );
        assert_eq!(
            controller.next().unwrap(),
            Transition::Moved(STEP_SUGGESTIONS_CHOICE)
        );
        // Branch: straight to the terminal step, skipping the install.
        assert_eq!(controller.next().unwrap(), Transition::Moved(STEP_FINISHED));
        assert_eq!(controller.next().unwrap(), Transition::Completed);

        assert!(device.is_app_configured());
        assert_eq!(device.downloads_attempted(), 0);
        assert_eq!(device.restarts_requested(), 1);
        assert_eq!(
            device.organization_name().as_deref(),
            Some("Lycee Condorcet")
        );
        assert_eq!(
            device.admin_password_hash(),
            Some(hash_admin_password("vb-admin-1"))
        );

        // Terminal: no transitions after completion.
        assert_eq!(controller.next().unwrap(), Transition::Stayed);
        assert_eq!(controller.phase(), WizardPhase::Finished);
    }

    #[test]
    fn empty_answers_are_not_persisted() {
        let (mut controller, device) = controller();
        controller.enter(STEP_FINISHED).unwrap();
        assert_eq!(controller.next().unwrap(), Transition::Completed);

        assert!(device.is_app_configured());
        assert_eq!(device.organization_name(), None);
        assert_eq!(device.admin_password_hash(), None);
    }

    #[tokio::test]
    async fn install_job_success_advances_to_the_terminal_step() {
        let (mut controller, device) = controller();
        controller.enter(STEP_FEATURES_INSTALL).unwrap();
        fill_answers(&mut controller, true);

        let mut rx = controller.start_job_if_needed().unwrap().unwrap();
        assert_eq!(controller.phase(), WizardPhase::JobRunning);

        // Input is latched while the job is outstanding.
        assert_eq!(controller.next().unwrap(), Transition::Stayed);
        assert_eq!(controller.back().unwrap(), Transition::Stayed);

        let msg = rx.recv().await.unwrap();
        assert_eq!(
            controller.handle_message(msg).unwrap(),
            Transition::Moved(STEP_FINISHED)
        );
        assert_eq!(device.downloads_attempted(), 1);
    }

    #[tokio::test]
    async fn failed_download_waits_for_retry_and_reuses_the_session() {
        let (mut controller, device) = controller();
        controller.enter(STEP_FEATURES_INSTALL).unwrap();
        fill_answers(&mut controller, true);
        device.fail_next_downloads(1);

        let mut rx = controller.start_job_if_needed().unwrap().unwrap();
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, WizardMessage::JobFailed(_, _)));
        assert_eq!(controller.handle_message(msg).unwrap(), Transition::Stayed);
        assert_eq!(controller.phase(), WizardPhase::AwaitingFailureChoice);
        assert_eq!(controller.session().org_name, "Lycee Condorcet");

        assert_eq!(
            controller.resolve_failure(FailureChoice::Retry),
            Some(FailureResolution::RetryStep(STEP_FEATURES_INSTALL))
        );

        let mut rx = controller.start_job_if_needed().unwrap().unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(
            controller.handle_message(msg).unwrap(),
            Transition::Moved(STEP_FINISHED)
        );
        assert_eq!(device.downloads_attempted(), 2);
    }

    #[tokio::test]
    async fn offline_device_fails_fast_without_attempting_a_download() {
        let (mut controller, device) = controller();
        controller.enter(STEP_FEATURES_INSTALL).unwrap();
        fill_answers(&mut controller, true);
        device.set_connected(false);

        let mut rx = controller.start_job_if_needed().unwrap().unwrap();
        let msg = rx.recv().await.unwrap();
        match &msg {
            WizardMessage::JobFailed(_, reason) => {
                assert!(reason.contains("internet"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(device.downloads_attempted(), 0);
    }

    #[tokio::test]
    async fn abandoning_a_failed_job_terminates_the_wizard() {
        let (mut controller, device) = controller();
        controller.enter(STEP_FEATURES_INSTALL).unwrap();
        fill_answers(&mut controller, true);
        device.fail_next_downloads(1);

        let mut rx = controller.start_job_if_needed().unwrap().unwrap();
        let msg = rx.recv().await.unwrap();
        controller.handle_message(msg).unwrap();

        assert_eq!(
            controller.resolve_failure(FailureChoice::Abandon),
            Some(FailureResolution::Abandoned)
        );
        assert_eq!(controller.phase(), WizardPhase::Finished);
        assert_eq!(controller.next().unwrap(), Transition::Stayed);
        assert!(!device.is_app_configured());
    }

    #[tokio::test]
    async fn entry_is_latched_while_a_job_is_outstanding() {
        let (mut controller, device) = controller();
        controller.enter(STEP_FEATURES_INSTALL).unwrap();
        fill_answers(&mut controller, true);

        let mut rx = controller.start_job_if_needed().unwrap().unwrap();
        assert_eq!(controller.phase(), WizardPhase::JobRunning);

        // Re-entry must not reset the phase or move the cursor while the
        // download is outstanding.
        assert_eq!(controller.enter(STEP_WELCOME).unwrap(), EnterOutcome::Busy);
        assert_eq!(controller.phase(), WizardPhase::JobRunning);
        assert_eq!(controller.current_index(), STEP_FEATURES_INSTALL);
        assert_eq!(controller.next().unwrap(), Transition::Stayed);

        // The job result still lands on the step that started it.
        let msg = rx.recv().await.unwrap();
        assert_eq!(
            controller.handle_message(msg).unwrap(),
            Transition::Moved(STEP_FINISHED)
        );
        assert_eq!(device.downloads_attempted(), 1);
    }

    #[tokio::test]
    async fn stale_job_message_is_dropped_after_abandon() {
        let (mut controller, device) = controller();
        controller.enter(STEP_FEATURES_INSTALL).unwrap();
        fill_answers(&mut controller, true);
        device.fail_next_downloads(1);

        let mut rx = controller.start_job_if_needed().unwrap().unwrap();
        let msg = rx.recv().await.unwrap();
        controller.handle_message(msg).unwrap();
        controller.resolve_failure(FailureChoice::Abandon);
        assert_eq!(controller.phase(), WizardPhase::Finished);

        // A success report arriving now no longer has a running job to
        // resolve.
        assert_eq!(
            controller
                .handle_message(WizardMessage::JobSucceeded(STEP_FEATURES_INSTALL))
                .unwrap(),
            Transition::Stayed
        );
        assert_eq!(controller.phase(), WizardPhase::Finished);
        assert!(!device.is_app_configured());
    }

    #[test]
    fn inconsistent_configuration_still_permits_reset_entry() {
        let (mut controller, device) = controller();
        // Configured and managed but no stored admin hash: logged as an
        // inconsistency, entry at the reset step still goes through.
        device.set_configured(true);
        device.set_managed(true);
        assert_eq!(device.admin_password_hash(), None);

        assert_eq!(
            controller.enter(STEP_RESET_APP).unwrap(),
            EnterOutcome::Entered(STEP_RESET_APP)
        );
        assert_eq!(controller.phase(), WizardPhase::Idle);
    }

    #[test]
    fn resolve_failure_without_a_pending_failure_is_none() {
        let (mut controller, _device) = controller();
        controller.enter(STEP_WELCOME).unwrap();
        assert_eq!(controller.resolve_failure(FailureChoice::Retry), None);
    }

    #[test]
    fn short_admin_password_blocks_the_transition() {
        let (mut controller, _device) = controller();
        controller.enter(STEP_ADMIN_PASSWORD).unwrap();
        *controller.session_mut().admin_password = "ab".to_string();

        assert_eq!(controller.next().unwrap(), Transition::Stayed);
        assert_eq!(controller.current_index(), STEP_ADMIN_PASSWORD);
    }
}
