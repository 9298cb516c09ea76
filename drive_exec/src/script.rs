//! Drive command script interpreter
//!
//! Loads a JSON script of timestamped drive commands and replays them
//! against the drive as session time passes. Scripts are the autonomous
//! test-drive mechanism of the executable.
//!
//! A script is an array of entries:
//!
//! ```json
//! [
//!     {"time_s": 0.0, "cmd": {"Velocity": {"vx_ms": 1.0, "vy_ms": 0.0,
//!         "omega_rads": 0.0, "frame": "Field"}}},
//!     {"time_s": 2.0, "cmd": "Stop"}
//! ]
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;

// Internal
use crate::drive_ctrl::DriveCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single timestamped command within a script.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ScriptEntry {
    /// Session time at which the command fires.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// The command to issue.
    pub cmd: DriveCmd,
}

/// A loaded command script, replayed by elapsed session time.
pub struct ScriptInterpreter {
    entries: Vec<ScriptEntry>,
    next_idx: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Commands pending at a point in time.
pub enum PendingCmds {
    /// Nothing due yet.
    None,

    /// Commands which have become due since the last poll, in script order.
    Some(Vec<DriveCmd>),

    /// All entries have fired.
    EndOfScript,
}

/// Errors raised while loading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Cannot load the script file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot parse the script file: {0}")]
    ParseError(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Load a script from the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let script_str = read_to_string(path).map_err(ScriptError::FileLoadError)?;

        Self::from_str(&script_str)
    }

    /// Parse a script from a JSON string.
    pub fn from_str(script_str: &str) -> Result<Self, ScriptError> {
        let mut entries: Vec<ScriptEntry> =
            serde_json::from_str(script_str).map_err(ScriptError::ParseError)?;

        // Entries fire in time order regardless of how the file lists them
        entries.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));

        Ok(Self {
            entries,
            next_idx: 0,
        })
    }

    /// Get the commands which have become due at the given elapsed time.
    pub fn get_pending_cmds(&mut self, elapsed_s: f64) -> PendingCmds {
        if self.next_idx >= self.entries.len() {
            return PendingCmds::EndOfScript;
        }

        let mut pending = Vec::new();

        while self.next_idx < self.entries.len()
            && self.entries[self.next_idx].time_s <= elapsed_s
        {
            pending.push(self.entries[self.next_idx].cmd);
            self.next_idx += 1;
        }

        if pending.is_empty() {
            PendingCmds::None
        } else {
            PendingCmds::Some(pending)
        }
    }

    /// The time of the final entry.
    ///
    /// Units: seconds
    pub fn get_duration(&self) -> f64 {
        self.entries.last().map(|e| e.time_s).unwrap_or(0.0)
    }

    /// The number of commands in the script.
    pub fn get_num_cmds(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"[
        {"time_s": 0.0, "cmd": {"Velocity":
            {"vx_ms": 1.0, "vy_ms": 0.0, "omega_rads": 0.0, "frame": "Field"}}},
        {"time_s": 2.0, "cmd": "SelfTest"},
        {"time_s": 3.0, "cmd": "Stop"}
    ]"#;

    #[test]
    fn test_parse_script() {
        let si = ScriptInterpreter::from_str(SCRIPT).unwrap();

        assert_eq!(si.get_num_cmds(), 3);
        assert!((si.get_duration() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_commands_fire_in_order() {
        let mut si = ScriptInterpreter::from_str(SCRIPT).unwrap();

        match si.get_pending_cmds(0.5) {
            PendingCmds::Some(cmds) => {
                assert_eq!(cmds.len(), 1);
                assert!(matches!(cmds[0], DriveCmd::Velocity { .. }));
            }
            _ => panic!("expected a pending command"),
        }

        assert!(matches!(si.get_pending_cmds(1.0), PendingCmds::None));

        match si.get_pending_cmds(3.5) {
            PendingCmds::Some(cmds) => {
                assert_eq!(cmds.len(), 2);
                assert!(matches!(cmds[0], DriveCmd::SelfTest));
                assert!(matches!(cmds[1], DriveCmd::Stop));
            }
            _ => panic!("expected two pending commands"),
        }

        assert!(matches!(si.get_pending_cmds(4.0), PendingCmds::EndOfScript));
    }

    #[test]
    fn test_bad_script_rejected() {
        assert!(matches!(
            ScriptInterpreter::from_str("not json"),
            Err(ScriptError::ParseError(_))
        ));
    }
}
