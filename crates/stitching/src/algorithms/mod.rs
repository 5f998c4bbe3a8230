pub mod order;
pub mod correlation;
pub mod policy;
pub mod legacy;
pub mod estimation;
pub mod composite;

pub use order::*;
pub use correlation::*;
pub use policy::*;
pub use legacy::*;
pub use estimation::*;
pub use composite::*;
