#[macro_use]
mod macros;

mod length;
mod rate;
mod volume;

pub use self::{
    length::Millimeters,
    rate::FlowRate,
    volume::{Microliters, Milliliters},
};
