// version.rs -- Engine build metadata and game-wide limits

pub const ENGINE_VERSION: &str = "DOOM 1.3.1";
pub const BUILD_NUMBER: i32 = 1304;
pub const GAME_VERSION: &str = "baseDOOM-1";

pub const MAX_CLIENTS: usize = 32;
pub const GENTITYNUM_BITS: u32 = 12;
pub const MAX_GENTITIES: usize = 1 << GENTITYNUM_BITS;
pub const MAX_RENDERENTITY_GUI: usize = 3;

/// Build description reported to modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub engine_version: &'static str,
    pub build_number: i32,
    pub build_type: &'static str,
    pub build_arch: String,
    pub build_date: &'static str,
    pub build_time: &'static str,
}

impl BuildInfo {
    /// Metadata of the running build. Date and time come from
    /// `IDTECH4_BUILD_DATE` / `IDTECH4_BUILD_TIME` at compile time.
    pub fn current() -> Self {
        Self {
            engine_version: ENGINE_VERSION,
            build_number: BUILD_NUMBER,
            build_type: if cfg!(debug_assertions) { "-debug" } else { "-release" },
            build_arch: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            build_date: option_env!("IDTECH4_BUILD_DATE").unwrap_or("unknown"),
            build_time: option_env!("IDTECH4_BUILD_TIME").unwrap_or("unknown"),
        }
    }

    /// `"DOOM 1.3.1.1304-release linux-x86_64"`
    pub fn version_string(&self) -> String {
        format!(
            "{}.{}{} {}",
            self.engine_version, self.build_number, self.build_type, self.build_arch
        )
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        assert_eq!(MAX_GENTITIES, 4096);
        assert_eq!(MAX_CLIENTS, 32);
        assert_eq!(MAX_RENDERENTITY_GUI, 3);
    }

    #[test]
    fn test_build_info() {
        let info = BuildInfo::current();
        assert!(info.build_type == "-debug" || info.build_type == "-release");
        assert!(info.build_arch.contains(std::env::consts::ARCH));
        assert!(info.version_string().starts_with("DOOM 1.3.1.1304"));
        assert!(!info.build_date.is_empty());
    }
}
