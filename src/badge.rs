use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use qrcode::render::svg;
use qrcode::QrCode;

/// Directory under the workspace holding rendered badges.
pub const BADGES_DIR: &str = "badges";

/// Renders scannable identity badges. The registry calls this after its own
/// write commits and never waits on the outcome for correctness.
pub trait BadgeEncoder {
    /// Where the artifact for `roll` lives, whether or not it exists yet.
    fn badge_path(&self, roll: &str) -> PathBuf;
    /// Renders and writes the artifact, returning its path.
    fn encode(&self, roll: &str) -> Result<PathBuf>;
}

/// Writes one SVG per roll under `<workspace>/badges/`. The encoded payload
/// is the roll string itself, so any scanner that can read the badge can
/// feed `attendance.mark` directly.
pub struct SvgBadgeEncoder {
    badges_dir: PathBuf,
}

impl SvgBadgeEncoder {
    pub fn new(workspace: &Path) -> Self {
        SvgBadgeEncoder {
            badges_dir: workspace.join(BADGES_DIR),
        }
    }
}

// Rolls are user input and become file names. Anything that could walk out
// of the badges directory is refused outright.
fn names_a_plain_file(roll: &str) -> bool {
    !roll.contains('/') && !roll.contains('\\') && !roll.contains("..")
}

impl BadgeEncoder for SvgBadgeEncoder {
    fn badge_path(&self, roll: &str) -> PathBuf {
        self.badges_dir.join(format!("{roll}.svg"))
    }

    fn encode(&self, roll: &str) -> Result<PathBuf> {
        if !names_a_plain_file(roll) {
            bail!("roll {roll:?} cannot name a badge artifact");
        }
        fs::create_dir_all(&self.badges_dir)
            .with_context(|| format!("create {}", self.badges_dir.display()))?;

        let code = QrCode::new(roll.as_bytes()).context("QR encoding failed")?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(300, 300)
            .build();

        let path = self.badge_path(roll);
        fs::write(&path, image).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Best-effort render. Failures land in the log and nowhere else: a student
/// record must never fail to exist because its badge did not render.
pub fn refresh(encoder: &dyn BadgeEncoder, roll: &str) {
    if let Err(err) = encoder.encode(roll) {
        tracing::warn!(roll, "badge render failed: {err:#}");
    }
}

/// Best-effort cleanup when a student leaves the roster. A missing artifact
/// is not worth a log line.
pub fn remove_artifact(encoder: &dyn BadgeEncoder, roll: &str) {
    if !names_a_plain_file(roll) {
        return;
    }
    let path = encoder.badge_path(roll);
    if let Err(err) = fs::remove_file(&path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(roll, "badge cleanup failed: {err}");
        }
    }
}
