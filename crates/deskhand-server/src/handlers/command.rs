//! Shell command execution.

use async_trait::async_trait;
use deskhand_types::{Event, FailureKind};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::registry::{EventContext, EventHandler};

/// Run a shell command and return its standard output.
pub struct RunCommand;

#[async_trait]
impl EventHandler for RunCommand {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let [line] = fields else {
            return Err(ServerError::malformed(
                Event::CommandRequest,
                "expected a command field",
            ));
        };
        let Ok(line) = std::str::from_utf8(line) else {
            return Err(ServerError::malformed(
                Event::CommandRequest,
                "command is not utf-8",
            ));
        };

        let output = match shell(line).output().await {
            Ok(output) => output,
            Err(error) => {
                warn!(command = line, error = %error, "command failed to start");
                ctx.conn
                    .send_failure(FailureKind::UnknownError, &[])
                    .await?;
                return Ok(());
            }
        };
        ctx.conn
            .send_message(Event::CommandOutput, &[&output.stdout])
            .await?;
        ctx.conn.send_success().await?;
        info!(command = line, bytes = output.stdout.len(), "ran command");
        Ok(())
    }
}

#[cfg(unix)]
fn shell(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(windows)]
fn shell(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}
