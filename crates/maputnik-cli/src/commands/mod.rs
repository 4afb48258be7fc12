pub mod export;
pub mod open;
pub mod repair;
pub mod sources;
pub mod validate;

pub use export::{ExportArgs, run_export};
pub use open::{OpenArgs, run_open};
pub use repair::{RepairArgs, run_repair};
pub use sources::{SourcesArgs, run_sources};
pub use validate::{ValidateArgs, run_validate};
