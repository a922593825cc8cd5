pub mod nll;

pub use nll::NllLoss;
