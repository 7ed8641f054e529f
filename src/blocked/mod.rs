//! Cache-blocked GEMM over packed panels.
//!
//! B is packed once into K-block × column-block panels, M is cut into row
//! tiles sized to the kernel table, and the driver walks tiles × K-blocks
//! calling one micro-kernel per step.
//!
//! Available items:
//! - `pack`: `PackedMatrix` and its layout
//! - `partition`: greedy row tiling over a sparse kernel table
//! - `driver`: `Driver`, validation and the tile loop

pub mod driver;
pub mod pack;
pub mod partition;
