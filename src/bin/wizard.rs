use clap::Parser;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vocabgate::error::Result;
use vocabgate::policy::{DeviceState, ScreenGate, ScreenPolicy};
use vocabgate::services::DeviceServices;
use vocabgate::wizard::{
    EnterOutcome, FailureChoice, FailureResolution, SetupWizardController, Transition,
    WizardConfig, STEP_WELCOME,
};

#[derive(Parser, Debug)]
#[command(name = "vocabgate-wizard")]
#[command(author, version, about = "Setup wizard harness for vocabgate (simulated device)")]
struct Args {
    /// Path to wizard config file (default: /etc/vocabgate/wizard.toml)
    #[arg(long)]
    config: Option<String>,

    /// Validate the step graph and exit
    #[arg(long)]
    check: bool,

    /// Run against the simulated device (overrides the config file)
    #[arg(long)]
    dryrun: bool,

    /// Disable the suggestions feature for this run
    #[arg(long)]
    no_suggestions: bool,

    /// Make the first N language pack downloads fail, to exercise the
    /// retry flow
    #[arg(long, default_value_t = 0)]
    fail_downloads: usize,

    /// Log file path (logging disabled if not specified)
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging only if log file is specified
    if let Some(ref log_path) = args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .ok();

        if let Some(file) = file {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false)
                .init();

            info!("Starting vocabgate-wizard");
        }
    }

    let result = run_wizard(&args).await;

    if let Err(ref e) = result {
        error!("Wizard error: {}", e);
        eprintln!("error: {e}");
    }

    result
}

async fn run_wizard(args: &Args) -> Result<()> {
    let mut config = match args.config.as_deref() {
        Some(path) => WizardConfig::load_from(path)?,
        None => WizardConfig::load().unwrap_or_default(),
    };
    if args.dryrun {
        config.general.dryrun = true;
    }

    let (services, device) = DeviceServices::simulated();
    device.fail_next_downloads(args.fail_downloads);

    let mut controller = SetupWizardController::new(config.clone(), services.clone());

    if args.check {
        controller.graph().validate()?;
        println!(
            "step graph ok: {} steps, every path terminates",
            controller.graph().len()
        );
        return Ok(());
    }

    // Live device services come from the host app; this harness only
    // drives the simulated device.
    if !config.general.dryrun {
        println!("no live device available; pass --dryrun (or set general.dryrun) to run against the simulated device");
        return Ok(());
    }

    demo_screen_gate(&services);

    println!("== {} ==", config.general.title);

    match controller.enter(STEP_WELCOME)? {
        EnterOutcome::AlreadyConfigured => {
            println!("app already configured, nothing to do");
            return Ok(());
        }
        EnterOutcome::Entered(index) => {
            info!("wizard entered at step {}", index);
        }
        EnterOutcome::Busy => {
            println!("a step job is still outstanding");
            return Ok(());
        }
    }

    // Scripted answers for the simulated device.
    {
        let session = controller.session_mut();
        session.org_name = "Demo Academy".to_string();
        *session.admin_password = "vb-admin-1".to_string();
        session.suggestions_enabled = !args.no_suggestions;
    }

    loop {
        let step = controller.current_step()?;
        println!("step: {}", step.title());

        if let Some(mut rx) = controller.start_job_if_needed()? {
            println!("  working...");
            while let Some(msg) = rx.recv().await {
                match controller.handle_message(msg)? {
                    Transition::Moved(index) => {
                        info!("job done, moved to step {}", index);
                        break;
                    }
                    Transition::Stayed => {
                        // Job failed; the scripted user always retries.
                        println!("  job failed, retrying");
                        match controller.resolve_failure(FailureChoice::Retry) {
                            Some(FailureResolution::RetryStep(_)) => {
                                rx = controller
                                    .start_job_if_needed()?
                                    .expect("retry re-enters the job step");
                            }
                            _ => unreachable!("a failure was pending"),
                        }
                    }
                    Transition::Completed => {
                        finish(&config).await;
                        return Ok(());
                    }
                    Transition::Exited => return Ok(()),
                }
            }
            continue;
        }

        match controller.next()? {
            Transition::Moved(_) => {}
            Transition::Stayed => {
                println!("  blocked on this step, backing out");
                controller.back()?;
                return Ok(());
            }
            Transition::Completed => {
                finish(&config).await;
                return Ok(());
            }
            Transition::Exited => return Ok(()),
        }
    }
}

async fn finish(config: &WizardConfig) {
    tokio::time::sleep(Duration::from_millis(config.completion.finish_delay_ms)).await;
    println!("setup complete, restart requested");
}

/// Show a few gate decisions for the simulated device before the wizard
/// runs.
fn demo_screen_gate(services: &DeviceServices) {
    let gate = ScreenGate::new(services.alert.clone());

    let state = DeviceState {
        rooted: services.root.is_device_rooted(),
        emergency_mode: false,
        admin_unlocked: false,
        organization_managed: services.config.is_organization_managed(),
        app_configured: services.config.is_app_configured(),
        license_accepted: services.config.is_license_accepted(),
        reconfig_requested: services.config.is_reconfig_requested(),
    };

    for (name, policy) in [
        ("home", ScreenPolicy::default()),
        ("reset options", ScreenPolicy::reset_screen()),
        ("license display", ScreenPolicy::license_screen()),
    ] {
        let decision = gate.admit(&policy, &state);
        println!("gate[{name}]: {decision:?}");
    }
}
