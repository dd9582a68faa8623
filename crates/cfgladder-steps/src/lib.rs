mod config_tree;
mod db_loads;
mod db_records;
mod device_screens;
mod env_path;
mod folders;
mod hosts;
mod ioc_macros;
mod ledger_file;
mod meta_element;
mod mysql;
mod noop;
mod pv_names;
mod remote;
mod sequence;
mod sql;
mod text_files;

pub use db_loads::AddDbLoadMacros;
pub use db_records::{DbField, EditDbRecords, RecordEdit};
pub use device_screens::RemoveDeviceScreen;
pub use env_path::{expand_env_path, resolve_step_path};
pub use folders::{RemoveFolders, WarnIfPresent};
pub use hosts::OnlyOnHosts;
pub use ioc_macros::{AddMacro, ChangeMacros, MacroChange};
pub use ledger_file::{
    build_step, ledger_file_version, parse_ledger_file, LedgerFile, LedgerFileEntry, StepSpec,
};
pub use meta_element::AddMetaXmlElement;
pub use mysql::{MysqlCliConnector, MysqlCliSession, MYSQL_PASSWORD_ENV};
pub use noop::NoOp;
pub use pv_names::{PvRename, RenamePvs};
pub use remote::SetRemoteUrl;
pub use sequence::Sequence;
pub use sql::{split_sql_statements, ApplySqlFile, RunSql};
pub use text_files::{AppendLines, EnsureLines, ReplaceText};
