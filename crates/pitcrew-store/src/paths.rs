//! Object path scheme for build artifacts and user assets

/// Expected object path for a build artifact:
/// `game-builds/universal/<branch>/<commit>/<commit>.zip`
pub fn build_object_path(branch: &str, commit: &str) -> String {
    format!(
        "game-builds/universal/{}/{}/{}.zip",
        branch, commit, commit
    )
}

/// Prefix all of a session's uploaded asset files live under
pub fn asset_prefix(session_id: &str) -> String {
    format!("user-asset-files/{}/assets/", session_id)
}

/// Object path for one uploaded asset file
pub fn asset_object_path(session_id: &str, file_name: &str) -> String {
    format!("{}{}", asset_prefix(session_id), file_name)
}

/// Object path for a session's compiled preview bundle
pub fn asset_bundle_path(session_id: &str) -> String {
    format!("user-asset-files/{}/bundles/preview.bundle", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_object_path() {
        assert_eq!(
            build_object_path("main", "1fe522b566d272fb22a71a30ade5f3bd8199d057"),
            "game-builds/universal/main/1fe522b566d272fb22a71a30ade5f3bd8199d057/\
             1fe522b566d272fb22a71a30ade5f3bd8199d057.zip"
        );
    }

    #[test]
    fn test_branch_with_slash_keeps_its_segments() {
        let path = build_object_path("feature/new-ui", "abc123def");
        assert!(path.starts_with("game-builds/universal/feature/new-ui/"));
    }

    #[test]
    fn test_asset_paths() {
        assert_eq!(
            asset_object_path("session_001", "my-asset.glb"),
            "user-asset-files/session_001/assets/my-asset.glb"
        );
        assert!(asset_bundle_path("session_001").ends_with("bundles/preview.bundle"));
    }
}
