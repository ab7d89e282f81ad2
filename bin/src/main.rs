use anyhow::Result;

mod backends;
mod cli;
mod distpaths;
mod report;

fn main() -> Result<()> {
    cli::run()
}
