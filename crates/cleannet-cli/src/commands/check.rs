//! Check command: test a domain against a block list offline

use anyhow::{Context, Result};

use cleannet_core::Blocklist;

use crate::args::CheckArgs;

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let blocklist = Blocklist::new();
    let count = blocklist
        .load_file(&args.blocklist)
        .with_context(|| format!("Failed to load block list {}", args.blocklist.display()))?;

    println!("{count} patterns loaded from {}", args.blocklist.display());

    if blocklist.matches(&args.domain) {
        println!("{}: BLOCKED", args.domain);
    } else {
        println!("{}: allowed", args.domain);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_check_with_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "*.ads.test").unwrap();
        file.flush().unwrap();

        let args = CheckArgs {
            blocklist: file.path().to_path_buf(),
            domain: "banner.ads.test".to_string(),
        };
        assert!(execute(args).is_ok());
    }

    #[test]
    fn test_check_missing_file() {
        let args = CheckArgs {
            blocklist: PathBuf::from("/nonexistent/list.txt"),
            domain: "example.com".to_string(),
        };
        assert!(execute(args).is_err());
    }
}
