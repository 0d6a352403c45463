pub use self::build_mode::*;
pub use self::build_options::*;
pub use self::bundle_descriptor::*;
pub use self::job_spec::*;

mod build_mode;
mod build_options;
mod bundle_descriptor;
mod job_spec;
