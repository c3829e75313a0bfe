pub mod export;
pub mod status;
pub mod update;
pub mod version;

pub mod util;
