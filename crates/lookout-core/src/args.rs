use crate::operation::Observation;

/// Argument placeholder replaced by the triggering observation's instance.
pub const RESERVED_INSTANCE_TOKEN: &str = "__obsv_instance__";

/// Substitute every [`RESERVED_INSTANCE_TOKEN`] in `arg_spec` with the
/// observation's instance. Other arguments pass through unchanged.
pub fn resolve_args(arg_spec: &[String], observation: &Observation) -> Vec<String> {
    arg_spec
        .iter()
        .map(|a| {
            if a == RESERVED_INSTANCE_TOKEN {
                observation.instance.clone()
            } else {
                a.clone()
            }
        })
        .collect()
}
