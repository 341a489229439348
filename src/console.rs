use log::{debug, info};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config_store::ConfigStore;
use crate::dispatcher;

/// Read command lines from stdin until it is closed, writing one reply line per command
pub async fn run(store: &mut ConfigStore) -> io::Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    info!("Reading commands from console");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let outcome = dispatcher::handle_line(store, &line);
        debug!("Reply: {}", outcome.reply);

        stdout.write_all(outcome.reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("Console closed");
    Ok(())
}
