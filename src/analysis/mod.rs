//! The independent detectors. Each examines one physical property of the
//! document image and never sees another detector's output.

pub mod brightness;
pub mod edge_density;
pub mod ela;
pub mod layout;
pub mod text_consistency;
