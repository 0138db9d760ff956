//! Human-readable error descriptions for fatal exits.

use rig_core::{BuildError, RigError};

/// Map an eyre::Report to an explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingActuator => {
                "What happened: No actuator was provided to the pipette.\nLikely causes: Stepper pins failed to initialize or were not wired into the builder.\nHow to fix: Check [pins] in the config and GPIO permissions.".to_string()
            }
            BuildError::MissingEndstop => {
                "What happened: No limit switch was provided to the pipette.\nLikely causes: Limit pin failed to initialize or was not wired into the builder.\nHow to fix: Check pins.pipette_limit in the config.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid motion configuration ({msg}).\nLikely causes: Out-of-range values in the [motion] table.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RigError>() {
        if let RigError::HomingTimeout(ms) = re {
            return format!(
                "What happened: Homing did not reach the limit switch within {ms} ms.\nLikely causes: Switch unplugged, wrong pin, or the carriage is jammed.\nHow to fix: Check the switch wiring, or raise motion.homing_timeout_ms (0 waits forever)."
            );
        }
        if let RigError::Hardware(detail) = re {
            return format!(
                "What happened: A device fault stopped the loop ({detail}).\nLikely causes: Wiring or GPIO permission problems.\nHow to fix: Check connections and rerun with --log-level=debug."
            );
        }
        return format!(
            "What happened: {re}.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("config") {
        return format!(
            "What happened: Configuration is invalid or unreadable.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}
