use anyhow::Result;

fn main() -> Result<()> {
    gradebox::cli::run()
}
