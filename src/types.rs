pub type Lengthf32    = f32;
pub type Anglef32     = f32;
pub type Weightf32    = f32;
pub type Ratiof32     = f32;
pub type Intensityf32 = f32;

pub type Point  = nalgebra::Point2 <Lengthf32>;
pub type Vector = nalgebra::Vector2<Lengthf32>;

pub use crate::index::{Index1_u, Index2_u};
