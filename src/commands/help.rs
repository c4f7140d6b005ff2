use std::io::Write;

use crate::error::CommandResult;

pub const USAGE: &str = "\
Usage: enricher [OPTIONS] [COMMAND]

Commands:
  start   Build images and start all services in the foreground
  stop    Stop all services (volumes are kept)
  logs    Follow the combined service logs
  setup   Start the model service and pull the configured model
  clean   Stop all services and remove their volumes
  run     Run the enrichment pipeline
  help    Show this message

Run `enricher --help` for the full list of options.
";

/// Writes the static usage text.
pub fn write_usage(out: &mut impl Write) -> CommandResult<()> {
    out.write_all(USAGE.as_bytes())?;
    out.flush()?;
    Ok(())
}
