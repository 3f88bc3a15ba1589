pub mod append;
pub mod create;
pub mod delete;
pub mod extract;
pub mod list;

pub use append::run as append;
pub use create::run as create;
pub use delete::run as delete;
pub use extract::run as extract;
pub use list::run as list;
pub use test::run as test;
