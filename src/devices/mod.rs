// MIT License - Copyright (c) 2026 Peter Wright
// Panel devices

pub mod zone;
pub mod system;

pub use zone::{Zone, ZoneFlags};
pub use system::BatteryFlags;
