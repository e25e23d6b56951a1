mod run;
mod status;

pub use run::cmd_run;
pub use status::print_status;
