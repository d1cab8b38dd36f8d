//! Human-readable progress output.
//!
//! Progress goes to any `Write` (stdout in the binary, a buffer in tests)
//! and is independent of `tracing` logs, which go to stderr.

use std::io::Write;

use crate::config::DeployConfig;
use crate::deploy_state::DeployStage;
use crate::error::Result;

const KEYCAPS: [&str; 9] = [
    "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣",
];

/// Writes progress markers for one deployment.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Opening banner naming the region and bucket.
    pub fn banner(&mut self, config: &DeployConfig) -> Result<()> {
        writeln!(
            self.out,
            "🚀 Starting Frontend Deployment to AWS S3 ({})...",
            config.region()
        )?;
        writeln!(self.out, "📦 Bucket Name: {}", config.bucket_name())?;
        Ok(())
    }

    /// Header printed before a step runs.
    pub fn step(&mut self, stage: DeployStage) -> Result<()> {
        match stage.step_number() {
            Some(n) => {
                let keycap = KEYCAPS.get(usize::from(n) - 1).copied().unwrap_or("▶️");
                writeln!(self.out, "\n{}  {}...", keycap, stage.description())?;
            }
            None => writeln!(self.out, "\n{}", stage.description())?,
        }
        self.out.flush()?;
        Ok(())
    }

    /// Indented informational line under the current step.
    pub fn note(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "   ({})", message)?;
        Ok(())
    }

    /// Final success message with the live URL.
    pub fn complete(&mut self, website_url: &str) -> Result<()> {
        writeln!(self.out, "\n✅ DEPLOYMENT COMPLETE!")?;
        writeln!(self.out, "🌍 Live URL: {}", website_url)?;
        self.out.flush()?;
        Ok(())
    }
}
