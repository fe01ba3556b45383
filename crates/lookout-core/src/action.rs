use crate::engine::Engine;
use crate::exec::CommandSpec;
use crate::operation::{Action, ActionResult};

impl Engine {
    /// Run a fully resolved action. Failures are reported in the result, never
    /// returned as errors.
    pub fn run_action(&self, action: &Action) -> ActionResult {
        match self.executor().run(&CommandSpec::from(action)) {
            Ok(out) => ActionResult {
                succeeded: true,
                output: out.stdout,
                logs: out.stderr,
                action: action.clone(),
            },
            Err(e) => {
                let (stdout, stderr) = e.captured();
                ActionResult {
                    succeeded: false,
                    output: stdout.to_string(),
                    logs: format!("Error: {e}, Logs: {stderr}"),
                    action: action.clone(),
                }
            }
        }
    }
}
