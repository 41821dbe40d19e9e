mod emergency;
mod mixer;
mod roles;
mod schedule;
mod session;
mod util;

pub use emergency::*;
pub use mixer::*;
pub use roles::*;
pub use schedule::*;
pub use session::*;
pub use util::*;

/// The type used for primary keys in the station's database.
pub type PrimaryKey = i32;
