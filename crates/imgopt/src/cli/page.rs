//! The `imgopt page` command: print the home page loader data.

use chrono::NaiveDate;
use clap::Args;
use imgopt_core::page;

/// Arguments for the `page` command.
#[derive(Args, Debug)]
pub struct PageArgs {
    /// Evaluate as of this date (YYYY-MM-DD) instead of today
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

/// Execute the page command.
pub fn execute(args: PageArgs) -> anyhow::Result<()> {
    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let response = page::load(today);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
