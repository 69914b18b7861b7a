//! Constants used throughout maker

/// Configuration file names in order of preference
pub const CONFIG_FILENAMES: &[&str] = &["maker.json", "maker.yaml", "maker.yml"];

/// Suffix stripped from template file names
pub const TEMPLATE_FILE_SUFFIX: &str = ".t";

/// Extension of the specially handled Go source kind
pub const GO_EXTENSION: &str = "go";

/// Suffix required and appended to generated file names in fixture mode
pub const FIXTURE_SUFFIX: &str = ".e";

/// Default external formatter program
pub const DEFAULT_FORMATTER_COMMAND: &str = "gofmt";

/// Field that disambiguates repeated entries by value
pub const MERGE_FIELD: &str = "name";

/// Field name and value bound to the root directory insert
pub const ROOT_PATH_FIELD: &str = "path";

/// Field whose value may pull a fixed import into a Go file
pub const TYPE_GO_FIELD: &str = "type_go";

/// Go types that need an import, with the import path they need
pub const TYPE_GO_IMPORTS: &[(&str, &str)] = &[
    ("uuid.UUID", "github.com/google/uuid"),
    ("time.Time", "time"),
    ("json.RawMessage", "encoding/json"),
];

/// Entries of a template directory that are never compiled
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    ".git/**",
    ".hg",
    ".hg/**",
    ".svn",
    ".svn/**",
    "**/.DS_Store",
    "maker.json",
    "maker.yaml",
    "maker.yml",
];

/// Markers of the path-name placeholder grammar
pub mod path_markers {
    pub const START: char = '{';
    pub const END: char = '}';
    pub const KEY: char = '!';
}

/// Markers of the file-content placeholder grammar
pub mod content_markers {
    pub const START: char = '▶';
    pub const END: char = '◀';
    pub const ENTRY_START: char = '⏩';
    pub const ENTRY_END: char = '⏪';
    pub const CONDITION: char = '↔';
    pub const SEPARATOR: char = '➡';
    pub const KEY: char = '⬇';
}

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}

/// Verbosity levels
pub mod verbosity {
    pub const OFF: u8 = 0;
    pub const INFO: u8 = 1;
    pub const DEBUG: u8 = 2;
    pub const TRACE: u8 = 3;
}
