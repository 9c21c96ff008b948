// Domain layer: card models and ports (interfaces). No HTTP or process code here.

pub mod model;
pub mod ports;
