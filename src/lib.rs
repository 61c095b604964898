pub mod hanoi;
pub mod solver;
