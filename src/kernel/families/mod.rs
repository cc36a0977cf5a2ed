pub mod diagonal;
pub mod mixing;
pub mod swap_scalar;
