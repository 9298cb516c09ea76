//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Main loop:
//!         - Command script processing
//!         - Vision measurement input
//!         - Drive control processing (sensing, pose estimation, primitive
//!           evaluation, module actuation)
//!         - Telemetry archiving
//!         - Cycle management
//!
//! The executable runs the drive over simulated hardware, driven by a JSON
//! command script given as the single command line argument.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use drive_lib::{
    data_store::DataStore,
    drive_ctrl::{DriveCtrl, Params},
    pose_est::VisionMeasurement,
    script::{PendingCmds, ScriptInterpreter},
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Standard deviation of the simulated vision beacon on each axis.
const SIM_VISION_STD_DEVS: [f64; 3] = [0.5, 0.5, 0.5];

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Ursa Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let drive_params: Params =
        util::params::load("drive_ctrl.toml").wrap_err("Could not load drive params")?;

    info!("Drive parameters loaded");

    // ---- INITIALISE COMMAND SCRIPT ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        return Err(eyre!(
            "Expected the command script path as the single argument, found {} arguments",
            args.len() - 1
        ));
    }

    info!("Loading script from \"{}\"", &args[1]);

    let mut script =
        ScriptInterpreter::new(&args[1]).wrap_err("Failed to load the command script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} commands\n",
        script.get_duration(),
        script.get_num_cmds()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let cycle_period_s = drive_params.period_s;
    let cycle_frequency_hz = 1.0 / cycle_period_s;

    let mut ds = DataStore::new(DriveCtrl::simulated(cycle_period_s));
    ds.drive_ctrl.init_from_params(drive_params);

    info!("DriveCtrl init complete ({} Hz loop)", cycle_frequency_hz);
    info!("Module initialisation complete\n");

    // ---- INITIALISE TELEMETRY ARCHIVE ----

    let mut tm_archiver = util::archive::Archiver::from_path(&session, "drive_ctrl/drive_tm.csv")
        .map_err(|e| eyre!("Failed to create the telemetry archive: {}", e))?;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();
        let elapsed_s = session::get_elapsed_seconds();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz, elapsed_s);

        // ---- COMMAND PROCESSING ----

        match script.get_pending_cmds(elapsed_s) {
            PendingCmds::None => (),
            PendingCmds::Some(cmds) => {
                // Commands within one cycle supersede each other, keep the
                // latest
                for cmd in cmds {
                    ds.drive_ctrl_input.cmd = Some(cmd);
                }
            }
            // Exit if end of script reached
            PendingCmds::EndOfScript => {
                info!("End of command script reached, stopping");
                break;
            }
        }

        // ---- VISION INPUT ----

        // The simulated vision beacon observes the current pose estimate at
        // 1 Hz with moderate confidence
        if ds.is_1_hz_cycle && ds.num_cycles > 0 {
            ds.drive_ctrl_input.vision.push(VisionMeasurement {
                pose: ds.drive_ctrl.pose(),
                timestamp_s: elapsed_s,
                std_devs: SIM_VISION_STD_DEVS,
            });
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        match ds.drive_ctrl.proc(&ds.drive_ctrl_input) {
            Ok((output, report)) => {
                ds.drive_ctrl_output = output;
                ds.drive_ctrl_status_rpt = report;
            }
            Err(e) => {
                warn!("Error during DriveCtrl processing: {}", e)
            }
        };

        // ---- TELEMETRY ----

        let tm = ds.drive_ctrl.telemetry(elapsed_s);
        if let Err(e) = tm_archiver.serialise(&tm) {
            warn!("Could not archive telemetry: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period_s
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    // Save the self test report, if one ran, alongside the archives
    if let Some(report) = ds.drive_ctrl.self_test_report() {
        let path = session.session_root.join("self_test_report.json");
        match std::fs::File::create(&path) {
            Ok(file) => {
                if let Err(e) = serde_json::to_writer_pretty(file, report) {
                    warn!("Could not write the self test report: {}", e);
                }
            }
            Err(e) => warn!("Could not create the self test report file: {}", e),
        }
    }

    ds.drive_ctrl.shutdown();

    info!("End of execution");

    Ok(())
}
