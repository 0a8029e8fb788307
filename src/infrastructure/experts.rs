use crate::domain::entities::expert::ExpertProfile;
use crate::domain::error::DomainError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Load every `*.json` profile in `dir`, keyed by profile id.
///
/// A missing directory yields no profiles. Files that fail to parse are
/// skipped with a warning so one bad profile does not disable the rest.
pub fn load_profiles(dir: &Path) -> Result<HashMap<String, ExpertProfile>, DomainError> {
    let mut profiles = HashMap::new();
    if !dir.exists() {
        debug!(dir = %dir.display(), "no expert profile directory");
        return Ok(profiles);
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| DomainError::Config(format!("Cannot read {}: {e}", dir.display())))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<ExpertProfile>(&raw).map_err(|e| e.to_string()));
        match parsed {
            Ok(profile) => {
                debug!(id = %profile.id, "loaded expert profile");
                profiles.insert(profile.id.clone(), profile);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable expert profile"),
        }
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_valid_and_skips_broken() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("howell.json"),
            r#"{"id":"howell","name":"Michael Howell","role":"liquidity analyst",
                "mental_models":[{"concept":"Global liquidity","logic":"Follow the money"}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let profiles = load_profiles(dir.path()).unwrap();
        assert_eq!(profiles.len(), 1);
        let howell = &profiles["howell"];
        assert_eq!(howell.mental_models.len(), 1);
        assert!(howell.decision_logic.is_empty());
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let profiles = load_profiles(Path::new("/nonexistent/profiles")).unwrap();
        assert!(profiles.is_empty());
    }
}
