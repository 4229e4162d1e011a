//! Canonical default values shared across the loader, store and CLI.

pub const DEFAULT_CATALOG: &str = "wholesale";
pub const DEFAULT_SCHEMA: &str = "tpch";
pub const DEFAULT_INPUT_DELIMITER: u8 = b'|';
pub const DEFAULT_REFERENCE_DELIMITER: u8 = b',';
pub const DEFAULT_INPUT_EXTENSION: &str = "tbl";
pub const DEFAULT_CONFIG_FILE: &str = "wholesale.toml";
pub const DEFAULT_ACTIVE_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_TOP_CUSTOMERS: usize = 50;
pub const DEFAULT_TOP_SUPPLIERS: usize = 10;
pub const DEFAULT_CHEAPEST_PER_PART: usize = 3;
