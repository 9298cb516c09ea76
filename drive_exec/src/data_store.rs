//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::drive_ctrl::{self, DriveCtrl};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session time at the start of the current cycle
    pub elapsed_s: f64,

    // DriveCtrl
    pub drive_ctrl: DriveCtrl,
    pub drive_ctrl_input: drive_ctrl::InputData,
    pub drive_ctrl_output: drive_ctrl::OutputData,
    pub drive_ctrl_status_rpt: drive_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(drive_ctrl: DriveCtrl) -> Self {
        Self {
            num_cycles: 0,
            is_1_hz_cycle: false,
            elapsed_s: 0.0,
            drive_ctrl,
            drive_ctrl_input: drive_ctrl::InputData::default(),
            drive_ctrl_output: drive_ctrl::OutputData::default(),
            drive_ctrl_status_rpt: drive_ctrl::StatusReport::default(),
            num_consec_cycle_overruns: 0,
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and
    /// sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64, elapsed_s: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128) == 0;

        self.elapsed_s = elapsed_s;

        self.drive_ctrl_input = drive_ctrl::InputData {
            time_s: elapsed_s,
            cmd: None,
            vision: Vec::new(),
        };
        self.drive_ctrl_output = drive_ctrl::OutputData::default();
        self.drive_ctrl_status_rpt = drive_ctrl::StatusReport::default();
    }
}
