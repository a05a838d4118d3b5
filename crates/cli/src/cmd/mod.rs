mod make;
mod pack;
mod test;
mod unpack;

pub use make::cmd_make;
pub use pack::cmd_pack;
pub use test::{cmd_test, cmd_testall};
pub use unpack::cmd_unpack;
