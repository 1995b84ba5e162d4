use crate::Result;
use crate::supervisor::Supervisor;

/// Runs the supervisor in the foreground
///
/// The platform root defaults to the current directory; set `SPOT_DIR`
/// (or `SPOT_SUBSYSTEMS_DIR` / `SPOT_CONFIG_FILE` individually) to point
/// elsewhere.
#[derive(Debug, clap::Args)]
pub struct Run {}

impl Run {
    pub async fn run(&self) -> Result<()> {
        let supervisor = Supervisor::new().await?;
        supervisor.start().await
    }
}
