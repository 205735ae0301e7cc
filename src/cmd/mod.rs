//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled            |
//! |----------|-----------------------------|
//! | `run`    | `Run`                       |
//! | `phase`  | `List`, `Status`, `Reset`   |
//! | `config` | `Config`                    |
//! | `device` | `Device`                    |

pub mod config;
pub mod device;
pub mod phase;
pub mod run;

pub use config::cmd_config;
pub use device::cmd_device;
pub use phase::{cmd_list, cmd_reset, cmd_status};
pub use run::cmd_run;
