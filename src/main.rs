//! Bugshake demo - runs one report cycle from the command line
//!
//! ```text
//! BUGSHAKE_CLIENT_ID=Iv1.xxxx bugshake-demo [--sign-in]
//! ```

use std::sync::Arc;

use bugshake::logic::auth::AuthState;
use bugshake::logic::shake::{ManualSensorSource, ShakeEvent, ShakeSample};
use bugshake::logic::system_log::CommandLogSource;
use bugshake::{BugReporter, SdkConfig, Severity};
use log::LevelFilter;

/// Fallback secret for the demo's encrypted credential file
const DEMO_STORE_SECRET: &str = "bugshake-demo";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("bugshake-demo: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> bugshake::Result<()> {
    let sign_in = std::env::args().any(|a| a == "--sign-in");
    let config = SdkConfig::from_env();

    let sensor = Arc::new(ManualSensorSource::new());
    let secret = std::env::var("BUGSHAKE_STORE_SECRET").unwrap_or_else(|_| DEMO_STORE_SECRET.to_string());

    let reporter = BugReporter::builder(config)
        .sensor(sensor.clone())
        .system_log(Arc::new(CommandLogSource::default()))
        .encrypted_store(&secret)?
        .build()?;

    if let Err(e) = reporter.install_logger(LevelFilter::Debug) {
        eprintln!("Logger already installed: {}", e);
    }

    log::info!("Starting {} demo v{}", bugshake::constants::SDK_NAME, bugshake::constants::SDK_VERSION);

    // Simulated shake: a still sample followed by a hard jolt
    let shaken = reporter.start_shake_detection(Arc::new(|event: ShakeEvent| {
        log::warn!("Shake detected ({:.1} G)", event.magnitude_g);
    }));
    if shaken {
        sensor.push(ShakeSample::new(0.0, 0.0, 0.0, 0));
        sensor.push(ShakeSample::new(40.0, 0.0, 0.0, 100));
    }

    // One captured request
    let client = reporter.instrumented_client();
    match client.send(client.client().get("https://api.github.com/zen")).await {
        Ok(response) => log::info!("GET /zen -> {}", response.status),
        Err(e) => log::error!("GET /zen failed: {}", e),
    }

    if sign_in {
        let mut states = reporter.observe_state();
        if reporter.ensure_signed_in()? {
            println!("Already signed in");
        } else {
            // Snapshot from before the sign-in started
            states.next().await;
            while let Some(state) = states.next().await {
                match &state {
                    AuthState::AwaitingUserAction { user_code, verification_uri } => {
                        println!("Open {} and enter {}", verification_uri, user_code);
                    }
                    AuthState::Authenticated { username, .. } => {
                        println!("Signed in as {}", username.as_deref().unwrap_or("(unknown)"));
                    }
                    AuthState::Failed { reason } => println!("Sign-in failed: {}", reason),
                    AuthState::NotAuthenticated => println!("Sign-in expired"),
                    AuthState::RequestingGrant => {}
                }
                if state.is_terminal() {
                    break;
                }
            }
        }
    }

    reporter.log(Severity::Info, "Demo", "collecting report");
    let report = reporter.snapshot_report();
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Could not serialize report: {}", e),
    }

    reporter.stop_shake_detection();
    Ok(())
}
