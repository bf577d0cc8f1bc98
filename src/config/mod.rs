pub mod parser;
pub mod table;

pub use parser::{load_mapping, parse_mapping, CANDIDATE_DELIMITER, KEY_DELIMITER};
pub use table::{
    normalize_candidate, normalize_logical_key, separator_count, MappingRule, MappingTable, ROOT,
    ROOT_DISPLAY_NAME, SEPARATOR,
};

/// Mapping file used when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "fs.conf";
