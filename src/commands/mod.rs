pub mod list;
pub mod transform;

pub use list::{list, ListArgs};
pub use transform::{decrypt, encrypt, TransformArgs};
