//! Token cache persistence.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use drivekit_common::Result;

use super::auth::Credential;

/// Load a cached credential.
///
/// # Errors
/// - File missing or unreadable
/// - Contents do not match the credential schema
pub fn load(path: &Path) -> Result<Credential> {
    let data = std::fs::read(path)?;
    let credential: Credential = serde_json::from_slice(&data)?;
    Ok(credential)
}

/// Write `credential` to `path`, replacing any previous cache.
///
/// The file is readable and writable by the owner only.
pub fn save(path: &Path, credential: &Credential) -> Result<()> {
    tracing::info!(path = %path.display(), "Saving credential file");

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // `mode` only applies to newly created files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    serde_json::to_writer(&mut file, credential)?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use drivekit_common::Error;

    fn credential(token: &str) -> Credential {
        Credential {
            access_token: token.to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("refresh".to_string()),
            expiry: Some(Utc::now()),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        let saved = credential("first");
        save(&path, &saved).unwrap();
        assert_eq!(load(&path).unwrap(), saved);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        save(&path, &credential("a-much-longer-first-token")).unwrap();
        save(&path, &credential("second")).unwrap();

        assert_eq!(load(&path).unwrap().access_token, "second");
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        save(&path, &credential("tok")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(&dir.path().join("nope.json")), Err(Error::Io(_))));
    }

    #[test]
    fn test_load_rejects_wrong_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token": "abc"}"#).unwrap();

        assert!(matches!(load(&path), Err(Error::Serialization(_))));
    }
}
