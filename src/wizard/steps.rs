use tracing::debug;

use super::config::WizardConfig;
use super::error::{Result, SetupError};
use super::session::SetupSession;

/// Unique identifier for each wizard step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepId {
    Welcome,
    OrgName,
    AdminPassword,
    SuggestionsChoice,
    FeaturesInstall,
    Finished,
    ResetApp,
}

impl StepId {
    pub fn short_name(&self) -> &'static str {
        match self {
            StepId::Welcome => "Welcome",
            StepId::OrgName => "Organization",
            StepId::AdminPassword => "Admin",
            StepId::SuggestionsChoice => "Suggestions",
            StepId::FeaturesInstall => "Install",
            StepId::Finished => "Finished",
            StepId::ResetApp => "Reset",
        }
    }
}

// Step indices. The graph is a fixed mapping from index to step; the
// reset entry sits past the normal pages so a forced reset can be
// requested directly.
pub const STEP_WELCOME: usize = 0;
pub const STEP_ORG_NAME: usize = 1;
pub const STEP_ADMIN_PASSWORD: usize = 2;
pub const STEP_SUGGESTIONS_CHOICE: usize = 3;
pub const STEP_FEATURES_INSTALL: usize = 4;
pub const STEP_FINISHED: usize = 5;
pub const STEP_RESET_APP: usize = 6;

/// What the Next button should do after the step's hook ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextOutcome {
    Proceed,
    /// Remain on the step; the host shows the reason as a blocking
    /// message.
    Stay(&'static str),
}

/// Per-step contract. One implementation per step type, selected by the
/// graph via step index.
pub trait StepContract: Send + Sync {
    fn id(&self) -> StepId;

    fn title(&self) -> &'static str;

    fn display_back_button(&self) -> bool {
        true
    }

    fn display_next_button(&self) -> bool {
        true
    }

    /// Index of the step that follows, or `None` for a terminal step.
    /// May depend on answers collected earlier in the session.
    fn next_step(&self, session: &SetupSession) -> Option<usize>;

    /// Invoked when Next is pressed, before any transition.
    fn on_next_pressed(&self, _session: &mut SetupSession) -> NextOutcome {
        NextOutcome::Proceed
    }

    /// Invoked when Back is pressed. `true` exits the wizard.
    fn on_back_pressed(&self, _session: &mut SetupSession) -> bool {
        true
    }

    /// Whether entering this step starts an asynchronous job.
    fn has_job(&self) -> bool {
        false
    }
}

struct WelcomeStep;

impl StepContract for WelcomeStep {
    fn id(&self) -> StepId {
        StepId::Welcome
    }

    fn title(&self) -> &'static str {
        "Welcome"
    }

    fn display_back_button(&self) -> bool {
        false
    }

    fn next_step(&self, _session: &SetupSession) -> Option<usize> {
        Some(STEP_ORG_NAME)
    }
}

struct OrgNameStep;

impl StepContract for OrgNameStep {
    fn id(&self) -> StepId {
        StepId::OrgName
    }

    fn title(&self) -> &'static str {
        "Organization name"
    }

    fn next_step(&self, _session: &SetupSession) -> Option<usize> {
        Some(STEP_ADMIN_PASSWORD)
    }

    fn on_next_pressed(&self, session: &mut SetupSession) -> NextOutcome {
        // An empty name means the device is personal, not managed.
        session.org_name = session.org_name.trim().to_string();
        NextOutcome::Proceed
    }
}

struct AdminPasswordStep {
    min_password_length: usize,
}

impl StepContract for AdminPasswordStep {
    fn id(&self) -> StepId {
        StepId::AdminPassword
    }

    fn title(&self) -> &'static str {
        "Administrator password"
    }

    fn next_step(&self, _session: &SetupSession) -> Option<usize> {
        Some(STEP_SUGGESTIONS_CHOICE)
    }

    fn on_next_pressed(&self, session: &mut SetupSession) -> NextOutcome {
        // Empty is allowed: no admin lock on this device.
        if !session.admin_password.is_empty()
            && session.admin_password.len() < self.min_password_length
        {
            return NextOutcome::Stay("Administrator password is too short");
        }
        NextOutcome::Proceed
    }
}

struct SuggestionsChoiceStep;

impl StepContract for SuggestionsChoiceStep {
    fn id(&self) -> StepId {
        StepId::SuggestionsChoice
    }

    fn title(&self) -> &'static str {
        "Suggestions"
    }

    fn next_step(&self, session: &SetupSession) -> Option<usize> {
        // Nothing to download when suggestions are off.
        if session.suggestions_enabled {
            Some(STEP_FEATURES_INSTALL)
        } else {
            Some(STEP_FINISHED)
        }
    }
}

struct FeaturesInstallStep;

impl StepContract for FeaturesInstallStep {
    fn id(&self) -> StepId {
        StepId::FeaturesInstall
    }

    fn title(&self) -> &'static str {
        "Preparing the app"
    }

    fn display_back_button(&self) -> bool {
        false
    }

    fn display_next_button(&self) -> bool {
        false
    }

    fn next_step(&self, _session: &SetupSession) -> Option<usize> {
        Some(STEP_FINISHED)
    }

    fn has_job(&self) -> bool {
        true
    }
}

struct FinishedStep;

impl StepContract for FinishedStep {
    fn id(&self) -> StepId {
        StepId::Finished
    }

    fn title(&self) -> &'static str {
        "Let's begin"
    }

    fn display_back_button(&self) -> bool {
        false
    }

    fn next_step(&self, _session: &SetupSession) -> Option<usize> {
        None
    }
}

struct ResetAppStep;

impl StepContract for ResetAppStep {
    fn id(&self) -> StepId {
        StepId::ResetApp
    }

    fn title(&self) -> &'static str {
        "Reset this app"
    }

    fn next_step(&self, _session: &SetupSession) -> Option<usize> {
        Some(STEP_WELCOME)
    }
}

/// Fixed, statically-declared mapping from step index to step contract.
pub struct SetupStepGraph {
    steps: Vec<Box<dyn StepContract>>,
}

impl SetupStepGraph {
    pub fn new(config: &WizardConfig) -> Self {
        let steps: Vec<Box<dyn StepContract>> = vec![
            Box::new(WelcomeStep),
            Box::new(OrgNameStep),
            Box::new(AdminPasswordStep {
                min_password_length: config.admin.min_password_length,
            }),
            Box::new(SuggestionsChoiceStep),
            Box::new(FeaturesInstallStep),
            Box::new(FinishedStep),
            Box::new(ResetAppStep),
        ];
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_at(&self, index: usize) -> Result<&dyn StepContract> {
        self.steps
            .get(index)
            .map(|step| step.as_ref())
            .ok_or(SetupError::UnknownStep(index))
    }

    /// Steps that stay reachable after the app is already configured.
    pub fn is_exception(&self, id: StepId) -> bool {
        matches!(id, StepId::ResetApp)
    }

    /// Walk every path of the graph under every combination of session
    /// answers and confirm each one reaches a terminal step within a
    /// bounded number of hops.
    pub fn validate(&self) -> Result<()> {
        for suggestions_enabled in [false, true] {
            let session = SetupSession::new(suggestions_enabled);

            for start in 0..self.steps.len() {
                let mut index = start;
                let mut hops = 0;

                loop {
                    let step = self.step_at(index)?;
                    match step.next_step(&session) {
                        None => break,
                        Some(next) => {
                            hops += 1;
                            if hops > self.steps.len() {
                                return Err(SetupError::NonTerminating {
                                    start,
                                    last: step.id(),
                                });
                            }
                            index = next;
                        }
                    }
                }

                debug!(
                    "walk from step {} terminates in {} hops (suggestions={})",
                    start, hops, suggestions_enabled
                );
            }
        }

        Ok(())
    }
}
