//! The `trainfeed init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("trainfeed.toml").exists() {
        println!("trainfeed.toml already exists, skipping.");
    } else {
        std::fs::write("trainfeed.toml", SAMPLE_CONFIG)?;
        println!("Created trainfeed.toml");
    }

    println!("\nNext steps:");
    println!("  1. Optionally set a relay endpoint in trainfeed.toml");
    println!("  2. Run: trainfeed instructor add \"<name>\"");
    println!("  3. Run: trainfeed submit --course \"<course>\" --location \"<room>\"");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# trainfeed configuration

# Where records and the instructor roster are stored.
data_dir = "./trainfeed-data"

# Default destination for `trainfeed export`.
export_dir = "."

# Forward every saved record and roster change to a spreadsheet webhook.
# TRAINFEED_RELAY_URL overrides the endpoint.
# [relay]
# endpoint = "${TRAINFEED_SHEET_WEBHOOK}"
# timeout_secs = 10
"#;
