/// Application name, used for directory names and log targets.
pub const APP_NAME: &str = "warpfox";

/// Default manifest file name, relative to the current directory.
pub const DEFAULT_MANIFEST: &str = "warpfox.json";

/// Default work directory, relative to the current directory.
pub const DEFAULT_WORK_DIR: &str = ".warpfox";

/// Environment variable that overrides the work directory.
pub const WORK_DIR_ENV: &str = "WARPFOX_WORKDIR";

/// State file name within the work directory.
pub const STATE_FILENAME: &str = "cache.json";

/// Source archive file name within the work directory.
pub const ARCHIVE_FILENAME: &str = "firefox-source.tar.gz";

/// Extracted source tree directory name within the work directory.
pub const SOURCE_DIRNAME: &str = "firefox-source";

/// Generated build configuration file name within the source tree.
pub const MOZCONFIG_FILENAME: &str = "mozconfig";

/// Run lock file name within the work directory.
pub const LOCK_FILENAME: &str = ".lock";
