pub mod ask;
pub mod config_cmd;
pub mod run;
pub mod settings_cmd;
