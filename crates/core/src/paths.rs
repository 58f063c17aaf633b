use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".sentoogle"))
            .unwrap_or_else(|| PathBuf::from(".sentoogle"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// AI model selections, written by `save_ai_setting`.
    pub fn settings_file(&self) -> PathBuf {
        self.base.join("settings.json")
    }

    /// Chrome user data directory for the shell's browser profile.
    pub fn browser_profile_dir(&self) -> PathBuf {
        self.base.join("browser-profile")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.browser_profile_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
