pub mod cmip;
pub mod gridmet;
pub mod gridmet_agroibis;

pub use cmip::{cmip, CmipArgs};
pub use gridmet::{gridmet_daycent, gridmet_daycent_batch, Location};
pub use gridmet_agroibis::gridmet_agroibis;
