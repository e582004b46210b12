mod quick;
mod report;

pub use quick::cmd_quick;
pub use report::cmd_report;
