mod fs_utils;
mod layout;
mod logger;
mod storage;

pub use layout::{config_root_from_env, default_log_dir, ConfigLayout};
pub use logger::{log_file_name, RunLogger};
pub use storage::FsStorage;

#[cfg(test)]
mod tests;
