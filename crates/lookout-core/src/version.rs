pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const REPOSITORY: &str = env!("CARGO_PKG_REPOSITORY");

/// Download URL of a release artifact for this version.
pub fn release_artifact(name: &str) -> String {
    format!("{REPOSITORY}/releases/download/v{VERSION}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_url_is_versioned() {
        let url = release_artifact("lookout");
        assert!(url.ends_with(&format!("/releases/download/v{VERSION}/lookout")));
    }
}
