use std::path::Path;

use tracing::{info, warn};

const DEV_ENV_FILES: [&str; 3] = ["config/common.env", "config/dev.env", ".secrets.env"];
const PROD_ENV_FILES: [&str; 3] = ["config/common.env", "config/prod.env", ".secrets.env"];

pub fn is_production() -> bool {
    dotenvy::var("ROCKET_PROFILE").is_ok_and(|profile| profile == "production")
}

/// Layers the profile's env files over the process environment; later files win.
pub fn load_environment() -> Result<(), dotenvy::Error> {
    let files = if is_production() {
        PROD_ENV_FILES
    } else {
        DEV_ENV_FILES
    };

    for path in files.iter().map(Path::new) {
        if !path.exists() {
            warn!(path = %path.display(), "Env file not found, skipping");
            continue;
        }

        dotenvy::from_path_override(path)?;
        info!(path = %path.display(), "Loaded environment file");
    }

    Ok(())
}
