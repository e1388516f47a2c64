use anyhow::Context;
use channel_futures::{Narrator, Outcome, TaskWalkthrough, WalkthroughConfig};
use colored::Colorize;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = WalkthroughConfig::load().context("loading walkthrough config")?;
    log::debug!("running with {:?}", config);

    let walkthrough = TaskWalkthrough::new(config, Narrator::stdout());
    match walkthrough.run().await.context("async walkthrough failed")? {
        Outcome::Completed => println!("\n{}", "All futures delivered".green()),
        Outcome::TimedOut => println!("\n{}", "Stopped after the timeout".yellow()),
    }
    Ok(())
}
