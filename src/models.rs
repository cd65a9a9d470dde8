pub mod administration;
pub mod alert;
pub mod audit;
pub mod custody;
pub mod directory;
pub mod enums;
pub mod filters;
pub mod medication;

pub use administration::*;
pub use alert::*;
pub use audit::*;
pub use custody::*;
pub use directory::*;
pub use filters::*;
pub use medication::*;
