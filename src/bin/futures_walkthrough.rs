use anyhow::Context;
use channel_futures::{Narrator, Outcome, ThreadWalkthrough, WalkthroughConfig};
use colored::Colorize;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = WalkthroughConfig::load().context("loading walkthrough config")?;
    log::debug!("running with {:?}", config);

    let walkthrough = ThreadWalkthrough::new(config, Narrator::stdout());
    match walkthrough.run().context("walkthrough failed")? {
        Outcome::Completed => println!("\n{}", "All futures delivered".green()),
        Outcome::TimedOut => println!("\n{}", "Stopped after the timeout".yellow()),
    }
    Ok(())
}
